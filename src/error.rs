//! Error types for the PDF artifact server

use serde::Serialize;
use thiserror::Error;

/// Result type alias for the PDF artifact server
pub type Result<T> = std::result::Result<T, Error>;

/// Sub-classification of a transformation that could not complete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Input could not be parsed as a document
    MalformedDocument,
    /// The operation addressed a page the document does not have
    PageOutOfRange,
    /// The document is encrypted and cannot be processed without a password
    EncryptedDocument,
    /// Rendering a page to an image failed
    RenderFailed,
    /// Anything else the underlying library reported
    Internal,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::MalformedDocument => "malformed document",
            FailureKind::PageOutOfRange => "page out of range",
            FailureKind::EncryptedDocument => "encrypted document",
            FailureKind::RenderFailed => "render failed",
            FailureKind::Internal => "internal error",
        };
        f.write_str(s)
    }
}

/// Error types for the PDF artifact server
#[derive(Error, Debug)]
pub enum Error {
    /// Caller-supplied parameters or payload are malformed
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// The underlying transformation could not complete
    #[error("Operation failed ({kind}): {reason}")]
    OperationFailed { kind: FailureKind, reason: String },

    /// Artifact is unknown, expired or evicted
    #[error("Artifact not found")]
    NotFound,

    /// File-serving path does not contain a well-formed identifier
    #[error("Malformed artifact path: {path}")]
    MalformedPath { path: String },

    /// Backing medium cannot accept a new artifact
    #[error("Storage exhausted: {detail}")]
    StorageExhausted { detail: String },

    /// Base64 decode error
    #[error("Invalid base64 data: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn invalid_input(reason: impl Into<String>) -> Self {
        Error::InvalidInput {
            reason: reason.into(),
        }
    }

    pub(crate) fn operation_failed(kind: FailureKind, reason: impl Into<String>) -> Self {
        Error::OperationFailed {
            kind,
            reason: reason.into(),
        }
    }

    /// Stable machine-readable code reported to callers
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidInput { .. } | Error::Base64Decode(_) => "invalid_input",
            Error::OperationFailed { .. } => "operation_failed",
            Error::NotFound => "not_found",
            Error::MalformedPath { .. } => "malformed_path",
            Error::StorageExhausted { .. } => "storage_exhausted",
            Error::Io(_) | Error::Serialization(_) => "internal",
        }
    }

    /// Return a sanitized error message safe to send to clients.
    /// Internal details (paths, library errors) are omitted.
    /// Full details should be logged via tracing before calling this.
    pub fn client_message(&self) -> String {
        match self {
            Error::InvalidInput { reason } => format!("Invalid input: {}", reason),
            Error::OperationFailed { kind, .. } => match kind {
                FailureKind::MalformedDocument => "Document could not be parsed".to_string(),
                FailureKind::PageOutOfRange => "Page out of range".to_string(),
                FailureKind::EncryptedDocument => "Document is encrypted".to_string(),
                FailureKind::RenderFailed => "Page rendering failed".to_string(),
                FailureKind::Internal => "PDF processing error".to_string(),
            },
            Error::NotFound => "Not found".to_string(),
            Error::MalformedPath { .. } => "Malformed artifact path".to_string(),
            Error::StorageExhausted { .. } => {
                "Storage is temporarily exhausted, retry later".to_string()
            }
            Error::Base64Decode(_) => "Invalid input: payload is not valid base64".to_string(),
            Error::Io(_) => "I/O error".to_string(),
            Error::Serialization(_) => "Serialization error".to_string(),
        }
    }

    /// Sub-classification for `OperationFailed`, if any
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Error::OperationFailed { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}
