//! Page rasterization via PDFium

use crate::error::{Error, FailureKind, Result};
use pdfium_render::prelude::*;

/// PDF user space units per inch
const POINTS_PER_INCH: f32 = 72.0;

/// One rendered page, PNG encoded
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Page number (1-indexed)
    pub page: u32,
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

/// Get PDFium instance (creates new instance each time - PDFium is not thread-safe)
fn create_pdfium() -> Result<Pdfium> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "/opt/pdfium/lib",
            ))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| {
            Error::operation_failed(
                FailureKind::Internal,
                format!("failed to initialize PDFium: {}", e),
            )
        })?;

    Ok(Pdfium::new(bindings))
}

fn map_load_error(err: PdfiumError) -> Error {
    match err {
        PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
            Error::operation_failed(
                FailureKind::EncryptedDocument,
                "document is password protected",
            )
        }
        _ => Error::operation_failed(FailureKind::MalformedDocument, err.to_string()),
    }
}

/// Render every page of `data` to PNG at `dpi`, in page order
pub fn render_pages(data: &[u8], dpi: u32) -> Result<Vec<RenderedPage>> {
    let pdfium = create_pdfium()?;
    let document = pdfium
        .load_pdf_from_byte_slice(data, None)
        .map_err(map_load_error)?;

    let scale = dpi as f32 / POINTS_PER_INCH;
    let config = PdfRenderConfig::new()
        .scale_page_by_factor(scale)
        .render_form_data(true)
        .render_annotations(true);

    let pages = document.pages();
    let page_count = pages.len() as u32;
    let mut rendered = Vec::with_capacity(page_count as usize);

    for index in 0..page_count {
        let page_num = index + 1;
        let page = pages.get(index as u16).map_err(|e| {
            Error::operation_failed(
                FailureKind::RenderFailed,
                format!("failed to get page {}: {}", page_num, e),
            )
        })?;

        let bitmap = page.render_with_config(&config).map_err(|e| {
            Error::operation_failed(
                FailureKind::RenderFailed,
                format!("failed to render page {}: {}", page_num, e),
            )
        })?;

        let dynamic_image = bitmap.as_image();
        let mut png = Vec::new();
        dynamic_image
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .map_err(|e| {
                Error::operation_failed(
                    FailureKind::RenderFailed,
                    format!("failed to encode page {} as PNG: {}", page_num, e),
                )
            })?;

        rendered.push(RenderedPage {
            page: page_num,
            width: dynamic_image.width(),
            height: dynamic_image.height(),
            png,
        });
    }

    Ok(rendered)
}
