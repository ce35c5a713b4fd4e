//! Tool operation layer
//!
//! Each tool decodes and validates its payload, runs the document
//! transformation and only then commits the finished output to the
//! artifact store. Nothing is stored for a call that fails.

mod params;
mod payload;
mod response;

pub use params::{
    CreateTextPdfParams, MergePdfsParams, PdfFile, PdfToImagesParams, SplitPdfParams,
    UploadFileParams,
};
pub use payload::{decode_base64, sanitize_filename};
pub use response::{ErrorBody, FileLink, ToolOutput, ToolResponse};

use crate::config::ServerConfig;
use crate::error::{Error, FailureKind, Result};
use crate::link::LinkResolver;
use crate::pdf::{parse_page_range, DocumentEngine};
use crate::store::{ArtifactMeta, ArtifactStore, NewArtifact};
use bytes::Bytes;
use std::sync::Arc;

const PDF_MEDIA_TYPE: &str = "application/pdf";
const PNG_MEDIA_TYPE: &str = "image/png";
const DEFAULT_MEDIA_TYPE: &str = "application/octet-stream";
const DEFAULT_STEM: &str = "document";

/// Bounds applied to tool parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolLimits {
    pub default_dpi: u32,
    pub min_dpi: u32,
    pub max_dpi: u32,
    pub max_render_pages: u32,
}

impl Default for ToolLimits {
    fn default() -> Self {
        Self::from_config(&ServerConfig::default())
    }
}

impl ToolLimits {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            default_dpi: config.default_dpi,
            min_dpi: config.min_dpi,
            max_dpi: config.max_dpi,
            max_render_pages: config.max_render_pages,
        }
    }
}

/// Runs tool calls against a document engine and an artifact store
#[derive(Clone)]
pub struct ToolService {
    store: Arc<ArtifactStore>,
    links: LinkResolver,
    engine: Arc<dyn DocumentEngine>,
    limits: ToolLimits,
}

impl ToolService {
    pub fn new(
        store: Arc<ArtifactStore>,
        links: LinkResolver,
        engine: Arc<dyn DocumentEngine>,
        limits: ToolLimits,
    ) -> Self {
        Self {
            store,
            links,
            engine,
            limits,
        }
    }

    pub fn store(&self) -> &Arc<ArtifactStore> {
        &self.store
    }

    pub fn links(&self) -> &LinkResolver {
        &self.links
    }

    /// Run `f` on the blocking pool with access to the engine and the store
    async fn run_blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn DocumentEngine, &ArtifactStore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let engine = self.engine.clone();
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || f(engine.as_ref(), store.as_ref()))
            .await
            .map_err(|e| {
                Error::operation_failed(FailureKind::Internal, format!("Task join error: {}", e))
            })?
    }

    fn link(&self, meta: &ArtifactMeta, page: Option<u32>) -> FileLink {
        FileLink {
            url: self.links.build_link(meta.id, &meta.filename),
            filename: meta.filename.clone(),
            media_type: meta.media_type.clone(),
            size: meta.size,
            expires_at: meta.expires_at,
            page,
        }
    }

    /// Concatenate the given PDFs in order into one artifact
    pub async fn merge_pdfs(&self, params: MergePdfsParams) -> Result<ToolOutput> {
        if params.pdf_files.is_empty() {
            return Err(Error::invalid_input(
                "pdf_files must contain at least one document",
            ));
        }

        let (meta, page_count, inputs) = self
            .run_blocking(move |engine, store| {
                let documents = params
                    .pdf_files
                    .iter()
                    .enumerate()
                    .map(|(i, file)| {
                        let label = match &file.filename {
                            Some(name) => format!("pdf_files[{}] ({})", i, name),
                            None => format!("pdf_files[{}]", i),
                        };
                        payload::decode_pdf(&file.content, &label)
                    })
                    .collect::<Result<Vec<_>>>()?;

                let inputs: Vec<&[u8]> = documents.iter().map(Vec::as_slice).collect();
                let merged = engine.merge(&inputs)?;
                let page_count = engine.page_count(&merged)?;

                let meta = store.put(
                    Bytes::from(merged),
                    payload::merged_name(store.now()),
                    PDF_MEDIA_TYPE,
                )?;
                Ok((meta, page_count, documents.len()))
            })
            .await?;

        tracing::info!(id = %meta.id, inputs, pages = page_count, "Merged PDFs");

        let link = self.link(&meta, None);
        Ok(ToolOutput {
            message: format!(
                "Merged {} PDFs ({} pages). Download: {}",
                inputs, page_count, link.url
            ),
            files: vec![link],
            page_count: Some(page_count),
        })
    }

    /// Extract a page selection of one PDF into a new artifact
    pub async fn split_pdf(&self, params: SplitPdfParams) -> Result<ToolOutput> {
        if params.pages.trim().is_empty() {
            return Err(Error::invalid_input("pages must not be empty"));
        }

        let (meta, selected) = self
            .run_blocking(move |engine, store| {
                let data = payload::decode_pdf(&params.pdf_base64, "pdf_base64")?;
                let total = engine.page_count(&data)?;
                let indices = parse_page_range(&params.pages, total)?;

                let output = engine.split(&data, &indices)?;
                let stem = payload::file_stem(params.filename.as_deref(), DEFAULT_STEM);
                let meta = store.put(
                    Bytes::from(output),
                    payload::split_name(&stem, &params.pages),
                    PDF_MEDIA_TYPE,
                )?;
                Ok((meta, indices.len() as u32))
            })
            .await?;

        tracing::info!(id = %meta.id, pages = selected, "Split PDF");

        let link = self.link(&meta, None);
        Ok(ToolOutput {
            message: format!("Extracted {} pages. Download: {}", selected, link.url),
            files: vec![link],
            page_count: Some(selected),
        })
    }

    /// Render every page to PNG; one artifact per page, in page order
    pub async fn pdf_to_images(&self, params: PdfToImagesParams) -> Result<ToolOutput> {
        let limits = self.limits;
        let dpi = params.dpi.unwrap_or(limits.default_dpi);
        if !(limits.min_dpi..=limits.max_dpi).contains(&dpi) {
            return Err(Error::invalid_input(format!(
                "dpi must be between {} and {} (got {})",
                limits.min_dpi, limits.max_dpi, dpi
            )));
        }

        let stored = self
            .run_blocking(move |engine, store| {
                let data = payload::decode_pdf(&params.pdf_base64, "pdf_base64")?;
                let total = engine.page_count(&data)?;
                if total > limits.max_render_pages {
                    return Err(Error::invalid_input(format!(
                        "document has {} pages, at most {} can be rendered per call",
                        total, limits.max_render_pages
                    )));
                }

                let mut pages = engine.rasterize(&data, dpi)?;
                pages.sort_by_key(|p| p.page);

                let stem = payload::file_stem(params.filename.as_deref(), DEFAULT_STEM);
                let numbers: Vec<u32> = pages.iter().map(|p| p.page).collect();
                let items = pages
                    .into_iter()
                    .map(|p| NewArtifact {
                        filename: payload::page_image_name(&stem, p.page),
                        media_type: PNG_MEDIA_TYPE.to_string(),
                        content: Bytes::from(p.png),
                    })
                    .collect();

                let metas = store.put_all(items)?;
                Ok(metas.into_iter().zip(numbers).collect::<Vec<_>>())
            })
            .await?;

        tracing::info!(pages = stored.len(), dpi, "Rendered PDF pages");

        let files: Vec<FileLink> = stored
            .iter()
            .map(|(meta, page)| self.link(meta, Some(*page)))
            .collect();
        let count = files.len() as u32;
        Ok(ToolOutput {
            message: format!("Exported {} pages as PNG images at {} dpi.", count, dpi),
            files,
            page_count: Some(count),
        })
    }

    /// Typeset plain text into a PDF artifact
    pub async fn create_text_pdf(&self, params: CreateTextPdfParams) -> Result<ToolOutput> {
        if params.text.trim().is_empty() {
            return Err(Error::invalid_input("text must not be empty"));
        }

        let (meta, page_count) = self
            .run_blocking(move |engine, store| {
                let pdf = engine.text_to_pdf(&params.text)?;
                let page_count = engine.page_count(&pdf)?;
                let meta = store.put(
                    Bytes::from(pdf),
                    payload::text_pdf_name(params.filename.as_deref()),
                    PDF_MEDIA_TYPE,
                )?;
                Ok((meta, page_count))
            })
            .await?;

        tracing::info!(id = %meta.id, pages = page_count, "Created text PDF");

        let link = self.link(&meta, None);
        Ok(ToolOutput {
            message: format!("PDF created. Download: {}", link.url),
            files: vec![link],
            page_count: Some(page_count),
        })
    }

    /// Store caller bytes unchanged
    pub async fn upload_file(&self, params: UploadFileParams) -> Result<ToolOutput> {
        let media_type = payload::validate_media_type(
            params.mime_type.as_deref().unwrap_or(DEFAULT_MEDIA_TYPE),
        )?;
        let filename = sanitize_filename(&params.filename, "upload.bin");

        let meta = self
            .run_blocking(move |_, store| {
                let content = decode_base64(&params.content_base64)?;
                store.put(Bytes::from(content), filename, media_type)
            })
            .await?;

        tracing::info!(
            id = %meta.id,
            size = meta.size,
            media_type = %meta.media_type,
            "Stored upload"
        );

        let link = self.link(&meta, None);
        Ok(ToolOutput {
            message: format!("File stored. Download: {}", link.url),
            files: vec![link],
            page_count: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fixtures::{numbered_pdf, page_markers};
    use crate::pdf::{PdfEngine, RenderedPage};
    use crate::store::{ArtifactId, MemoryBackend};
    use base64::Engine;
    use std::time::Duration;

    /// Real qpdf/lopdf engine with rasterization replaced by one PNG
    /// signature per page, so rendering tests run without PDFium
    struct StubRasterEngine;

    impl DocumentEngine for StubRasterEngine {
        fn page_count(&self, pdf: &[u8]) -> Result<u32> {
            PdfEngine.page_count(pdf)
        }

        fn merge(&self, inputs: &[&[u8]]) -> Result<Vec<u8>> {
            PdfEngine.merge(inputs)
        }

        fn split(&self, pdf: &[u8], pages: &[u32]) -> Result<Vec<u8>> {
            PdfEngine.split(pdf, pages)
        }

        fn rasterize(&self, pdf: &[u8], dpi: u32) -> Result<Vec<RenderedPage>> {
            let count = self.page_count(pdf)?;
            Ok((1..=count)
                .rev()
                .map(|page| {
                    let mut png = b"\x89PNG\r\n\x1a\n".to_vec();
                    png.extend_from_slice(format!("page={} dpi={}", page, dpi).as_bytes());
                    RenderedPage {
                        page,
                        width: dpi,
                        height: dpi,
                        png,
                    }
                })
                .collect())
        }

        fn text_to_pdf(&self, text: &str) -> Result<Vec<u8>> {
            PdfEngine.text_to_pdf(text)
        }
    }

    fn service_with_budget(max_bytes: usize) -> ToolService {
        let store = Arc::new(ArtifactStore::new(
            Box::new(MemoryBackend::new(max_bytes)),
            Duration::from_secs(3600),
        ));
        let links = LinkResolver::new("https://tools.example.com/mcp-files", "/files").unwrap();
        ToolService::new(
            store,
            links,
            Arc::new(StubRasterEngine),
            ToolLimits::default(),
        )
    }

    fn service() -> ToolService {
        service_with_budget(64 * 1024 * 1024)
    }

    fn b64(data: &[u8]) -> String {
        base64::engine::general_purpose::STANDARD.encode(data)
    }

    fn fetch(service: &ToolService, link: &FileLink) -> Bytes {
        let id: ArtifactId = service.links().resolve(&link.url).unwrap();
        service.store().get(id).unwrap().content
    }

    #[tokio::test]
    async fn test_merge_two_and_three_pages() {
        let service = service();
        let params = MergePdfsParams {
            pdf_files: vec![
                PdfFile {
                    filename: Some("a.pdf".to_string()),
                    content: b64(&numbered_pdf(2, 10)),
                },
                PdfFile {
                    filename: Some("b.pdf".to_string()),
                    content: b64(&numbered_pdf(3, 20)),
                },
            ],
        };

        let output = service.merge_pdfs(params).await.unwrap();

        assert_eq!(output.page_count, Some(5));
        assert_eq!(output.files.len(), 1);
        let file = &output.files[0];
        assert_eq!(file.media_type, "application/pdf");
        assert!(file.filename.starts_with("merged_") && file.filename.ends_with(".pdf"));

        let merged = fetch(&service, file);
        assert_eq!(file.size, merged.len() as u64);
        assert_eq!(page_markers(&merged), vec![11, 12, 21, 22, 23]);
    }

    #[tokio::test]
    async fn test_merge_empty_list_stores_nothing() {
        let service = service();
        let err = service
            .merge_pdfs(MergePdfsParams { pdf_files: vec![] })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
        assert!(service.store().is_empty());
    }

    #[tokio::test]
    async fn test_merge_malformed_document_stores_nothing() {
        let service = service();
        let params = MergePdfsParams {
            pdf_files: vec![
                PdfFile {
                    filename: None,
                    content: b64(&numbered_pdf(1, 0)),
                },
                PdfFile {
                    filename: None,
                    content: b64(b"%PDF-1.7 this is not really a PDF"),
                },
            ],
        };
        let err = service.merge_pdfs(params).await.unwrap_err();
        assert_eq!(err.failure_kind(), Some(FailureKind::MalformedDocument));
        assert!(service.store().is_empty());
    }

    #[tokio::test]
    async fn test_merge_undecodable_payload() {
        let service = service();
        let params = MergePdfsParams {
            pdf_files: vec![PdfFile {
                filename: Some("x.pdf".to_string()),
                content: "not base64 !!".to_string(),
            }],
        };
        let err = service.merge_pdfs(params).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
        assert!(err.to_string().contains("pdf_files[0] (x.pdf)"), "{}", err);
        assert!(service.store().is_empty());
    }

    #[tokio::test]
    async fn test_split_single_page_and_range() {
        let service = service();
        let source = b64(&numbered_pdf(10, 0));

        let single = service
            .split_pdf(SplitPdfParams {
                pdf_base64: source.clone(),
                filename: Some("report.pdf".to_string()),
                pages: "3".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(single.page_count, Some(1));
        assert_eq!(single.files[0].filename, "report_pages_3.pdf");
        assert_eq!(page_markers(&fetch(&service, &single.files[0])), vec![3]);

        let range = service
            .split_pdf(SplitPdfParams {
                pdf_base64: source,
                filename: Some("report.pdf".to_string()),
                pages: "7-9".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(range.page_count, Some(3));
        assert_eq!(range.files[0].filename, "report_pages_7to9.pdf");
        assert_eq!(page_markers(&fetch(&service, &range.files[0])), vec![7, 8, 9]);
    }

    #[tokio::test]
    async fn test_split_out_of_bounds_is_invalid_input() {
        let service = service();
        let err = service
            .split_pdf(SplitPdfParams {
                pdf_base64: b64(&numbered_pdf(10, 0)),
                filename: None,
                pages: "9-12".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
        assert!(err.to_string().contains("outside 1-10"), "{}", err);
        assert!(service.store().is_empty());
    }

    #[tokio::test]
    async fn test_split_rejects_non_pdf() {
        let service = service();
        let err = service
            .split_pdf(SplitPdfParams {
                pdf_base64: b64(b"hello world"),
                filename: None,
                pages: "1".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_rasterize_three_pages_in_order() {
        let service = service();
        let output = service
            .pdf_to_images(PdfToImagesParams {
                pdf_base64: b64(&numbered_pdf(3, 0)),
                filename: Some("scan.pdf".to_string()),
                dpi: Some(100),
            })
            .await
            .unwrap();

        assert_eq!(output.files.len(), 3);
        assert_eq!(service.store().len(), 3);
        for (i, file) in output.files.iter().enumerate() {
            let page = i as u32 + 1;
            assert_eq!(file.page, Some(page));
            assert_eq!(file.filename, format!("scan_page_{}.png", page));
            assert_eq!(file.media_type, "image/png");
            let content = fetch(&service, file);
            assert!(content.ends_with(format!("page={} dpi=100", page).as_bytes()));
        }
    }

    #[tokio::test]
    async fn test_rasterize_default_and_bounded_dpi() {
        let service = service();
        let pdf = b64(&numbered_pdf(1, 0));

        let output = service
            .pdf_to_images(PdfToImagesParams {
                pdf_base64: pdf.clone(),
                filename: None,
                dpi: None,
            })
            .await
            .unwrap();
        let content = fetch(&service, &output.files[0]);
        assert!(content.ends_with(b"page=1 dpi=150"));
        assert_eq!(output.files[0].filename, "document_page_1.png");

        for dpi in [0, 35, 601, 10_000] {
            let err = service
                .pdf_to_images(PdfToImagesParams {
                    pdf_base64: pdf.clone(),
                    filename: None,
                    dpi: Some(dpi),
                })
                .await
                .unwrap_err();
            assert!(matches!(err, Error::InvalidInput { .. }), "dpi {}", dpi);
        }
        assert_eq!(service.store().len(), 1);
    }

    #[tokio::test]
    async fn test_rasterize_storage_exhausted_is_all_or_nothing() {
        // Budget holds the first page image but not all three
        let service = service_with_budget(40);
        let err = service
            .pdf_to_images(PdfToImagesParams {
                pdf_base64: b64(&numbered_pdf(3, 0)),
                filename: None,
                dpi: Some(72),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StorageExhausted { .. }));
        assert!(service.store().is_empty());
    }

    #[tokio::test]
    async fn test_create_text_pdf() {
        let service = service();
        let output = service
            .create_text_pdf(CreateTextPdfParams {
                text: "Minutes\n\nAll items approved.".to_string(),
                filename: Some("minutes".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(output.files[0].filename, "minutes.pdf");
        assert_eq!(output.page_count, Some(1));
        assert!(fetch(&service, &output.files[0]).starts_with(b"%PDF"));

        let err = service
            .create_text_pdf(CreateTextPdfParams {
                text: " \n ".to_string(),
                filename: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_upload_file_roundtrip() {
        let service = service();
        let output = service
            .upload_file(UploadFileParams {
                content_base64: b64(b"col1,col2\n1,2\n"),
                filename: "../data.csv".to_string(),
                mime_type: Some("text/csv".to_string()),
            })
            .await
            .unwrap();

        let file = &output.files[0];
        assert_eq!(file.filename, "data.csv");
        assert_eq!(file.media_type, "text/csv");
        assert!(file.url.starts_with("https://tools.example.com/mcp-files/"));
        assert!(file.url.ends_with("/data.csv"));
        assert_eq!(&fetch(&service, file)[..], b"col1,col2\n1,2\n");
    }

    #[tokio::test]
    async fn test_upload_file_rejects_bad_media_type() {
        let service = service();
        let err = service
            .upload_file(UploadFileParams {
                content_base64: b64(b"x"),
                filename: "x.bin".to_string(),
                mime_type: Some("not a type".to_string()),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
        assert!(service.store().is_empty());
    }
}
