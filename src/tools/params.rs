//! Tool parameter types, shared by the MCP and REST surfaces

use schemars::JsonSchema;
use serde::Deserialize;

/// A single input document for merge
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PdfFile {
    /// Display name of the document (used in error messages only)
    #[serde(default)]
    pub filename: Option<String>,
    /// Base64 encoded PDF content
    pub content: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct MergePdfsParams {
    /// Documents to merge, in output order. Must not be empty.
    pub pdf_files: Vec<PdfFile>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SplitPdfParams {
    /// Base64 encoded source PDF
    pub pdf_base64: String,
    /// Original filename; its stem names the output (default: "document")
    #[serde(default)]
    pub filename: Option<String>,
    /// Pages to extract, in output order.
    ///
    /// Syntax:
    /// - "3" : page 3
    /// - "7-9" : pages 7 through 9 ("9-7" reverses)
    /// - "1-3,5" : combined ranges
    /// - "z" : last page, "r2" : second to last
    /// - "1-z:odd", "1-z:even" : odd or even pages of a range
    ///
    /// Every page must exist in the document.
    pub pages: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PdfToImagesParams {
    /// Base64 encoded source PDF
    pub pdf_base64: String,
    /// Original filename; its stem names the images (default: "document")
    #[serde(default)]
    pub filename: Option<String>,
    /// Resolution in dots per inch (default: 150, allowed: 36-600)
    #[serde(default)]
    pub dpi: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateTextPdfParams {
    /// Plain text; blank lines separate paragraphs
    pub text: String,
    /// Output filename, ".pdf" is appended if missing (default: "document.pdf")
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct UploadFileParams {
    /// Base64 encoded file content
    pub content_base64: String,
    /// Display filename for the download
    pub filename: String,
    /// MIME type served with the download (default: "application/octet-stream")
    #[serde(default)]
    pub mime_type: Option<String>,
}
