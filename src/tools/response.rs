//! Tool result types

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A download link for one stored artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileLink {
    pub url: String,
    pub filename: String,
    pub media_type: String,
    pub size: u64,
    pub expires_at: DateTime<Utc>,
    /// Source page (1-indexed), set for rasterized pages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

/// Successful outcome of a tool operation
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub files: Vec<FileLink>,
    pub page_count: Option<u32>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

/// Wire shape of every tool result
#[derive(Debug, Clone, Serialize)]
pub struct ToolResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<FileLink>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl ToolResponse {
    pub fn success(output: ToolOutput) -> Self {
        Self {
            success: true,
            files: Some(output.files),
            page_count: output.page_count,
            message: Some(output.message),
            error: None,
        }
    }

    /// Failure response. Only the sanitized message reaches the caller.
    pub fn failure(err: &Error) -> Self {
        Self {
            success: false,
            files: None,
            page_count: None,
            message: None,
            error: Some(ErrorBody {
                code: err.code(),
                message: err.client_message(),
            }),
        }
    }

    /// Build the response for `tool`, logging failures with full detail
    pub fn from_result(tool: &str, result: &Result<ToolOutput>) -> Self {
        match result {
            Ok(output) => Self::success(output.clone()),
            Err(e) => {
                tracing::warn!(tool, error = %e, code = e.code(), "Tool call failed");
                Self::failure(e)
            }
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| {
            format!(
                r#"{{"success":false,"error":{{"code":"internal","message":"{}"}}}}"#,
                Error::from(e).client_message()
            )
        })
    }
}
