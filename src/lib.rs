//! PDF Artifact Server Library
//!
//! Document tools for AI agents that return download links instead of file
//! content:
//! - `merge_pdfs`: Concatenate PDFs in order
//! - `split_pdf`: Extract a page selection into a new PDF
//! - `pdf_to_images`: Rasterize every page to PNG
//! - `create_text_pdf`: Typeset plain text as an A4 PDF
//! - `upload_file`: Store arbitrary bytes unchanged
//!
//! Outputs live in an [`ArtifactStore`] for a bounded retention window and
//! are served over HTTP by [`http::build_app`]. A [`Sweeper`] reclaims the
//! storage of expired artifacts in the background.

pub mod config;
pub mod error;
pub mod http;
pub mod link;
pub mod pdf;
pub mod server;
pub mod store;
pub mod sweeper;
pub mod tools;

pub use config::{McpTransport, ServerConfig, StorageConfig};
pub use error::{Error, FailureKind, Result};
pub use link::LinkResolver;
pub use pdf::{DocumentEngine, PdfEngine};
pub use server::{run_server_with_config, ArtifactServer};
pub use store::{ArtifactId, ArtifactMeta, ArtifactStore};
pub use sweeper::Sweeper;
pub use tools::{ToolLimits, ToolResponse, ToolService};
