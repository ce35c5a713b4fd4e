//! PDF processing layer
//!
//! Merging and page extraction run on qpdf, rasterization on PDFium, and
//! text typesetting on lopdf. Everything here is synchronous and CPU bound;
//! callers run it on the blocking pool.

mod pages;
mod qpdf;
mod render;
mod text;

pub use pages::parse_page_range;
pub use qpdf::QpdfWrapper;
pub use render::{render_pages, RenderedPage};
pub use text::text_to_pdf;

use crate::error::Result;

/// Document transformations used by the tool layer
pub trait DocumentEngine: Send + Sync {
    /// Number of pages in `pdf`
    fn page_count(&self, pdf: &[u8]) -> Result<u32>;

    /// Concatenate `inputs` in order
    fn merge(&self, inputs: &[&[u8]]) -> Result<Vec<u8>>;

    /// Extract the 0-indexed `pages` of `pdf`, in the given order
    fn split(&self, pdf: &[u8], pages: &[u32]) -> Result<Vec<u8>>;

    /// Render every page of `pdf` to PNG
    fn rasterize(&self, pdf: &[u8], dpi: u32) -> Result<Vec<RenderedPage>>;

    /// Typeset plain text into a new document
    fn text_to_pdf(&self, text: &str) -> Result<Vec<u8>>;
}

/// Default engine backed by qpdf, PDFium and lopdf
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfEngine;

impl DocumentEngine for PdfEngine {
    fn page_count(&self, pdf: &[u8]) -> Result<u32> {
        QpdfWrapper::get_page_count(pdf)
    }

    fn merge(&self, inputs: &[&[u8]]) -> Result<Vec<u8>> {
        QpdfWrapper::merge(inputs)
    }

    fn split(&self, pdf: &[u8], pages: &[u32]) -> Result<Vec<u8>> {
        QpdfWrapper::split_pages(pdf, pages)
    }

    fn rasterize(&self, pdf: &[u8], dpi: u32) -> Result<Vec<RenderedPage>> {
        render_pages(pdf, dpi)
    }

    fn text_to_pdf(&self, text: &str) -> Result<Vec<u8>> {
        text_to_pdf(text)
    }
}
