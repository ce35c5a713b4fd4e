//! qpdf FFI wrapper for page operations
//!
//! Merging and page extraction using the qpdf crate (vendored FFI).

use crate::error::{Error, FailureKind, Result};
use qpdf::QPdf;

/// Wrapper for qpdf operations via FFI
pub struct QpdfWrapper;

/// Map errors raised while opening a document
fn map_read_error(e: qpdf::QPdfError) -> Error {
    match e.error_code() {
        qpdf::QPdfErrorCode::InvalidPassword => {
            Error::operation_failed(FailureKind::EncryptedDocument, e.to_string())
        }
        _ => Error::operation_failed(FailureKind::MalformedDocument, e.to_string()),
    }
}

/// Map errors raised while assembling or writing output
fn map_write_error(e: qpdf::QPdfError) -> Error {
    Error::operation_failed(FailureKind::Internal, e.to_string())
}

impl QpdfWrapper {
    /// Copy the pages at the given 0-indexed positions into a new PDF, in order
    ///
    /// # Arguments
    /// * `input_data` - Raw PDF bytes
    /// * `indices` - 0-indexed pages; duplicates and any order are allowed
    ///
    /// # Returns
    /// The extracted pages as a new PDF in bytes
    pub fn split_pages(input_data: &[u8], indices: &[u32]) -> Result<Vec<u8>> {
        let source = QPdf::read_from_memory(input_data).map_err(map_read_error)?;
        let num_pages = source.get_num_pages().map_err(map_read_error)?;

        let dest = QPdf::empty();

        for &idx in indices {
            let page = source.get_page(idx).ok_or_else(|| {
                Error::operation_failed(
                    FailureKind::PageOutOfRange,
                    format!("page {} does not exist (total: {})", idx + 1, num_pages),
                )
            })?;
            let copied = dest.copy_from_foreign(&page);
            dest.add_page(&copied, false).map_err(map_write_error)?;
        }

        let mut writer = dest.writer();
        writer.preserve_encryption(false);
        writer.write_to_memory().map_err(map_write_error)
    }

    /// Merge multiple PDFs into one, preserving input order
    ///
    /// # Arguments
    /// * `inputs` - Vector of raw PDF bytes to merge
    ///
    /// # Returns
    /// The merged PDF as bytes
    pub fn merge(inputs: &[&[u8]]) -> Result<Vec<u8>> {
        if inputs.is_empty() {
            return Err(Error::invalid_input("no input PDFs provided"));
        }

        let dest = QPdf::empty();

        for (i, input_data) in inputs.iter().enumerate() {
            let source = QPdf::read_from_memory(input_data).map_err(|e| {
                let err = map_read_error(e);
                match err {
                    Error::OperationFailed { kind, reason } => Error::OperationFailed {
                        kind,
                        reason: format!("input PDF {}: {}", i, reason),
                    },
                    other => other,
                }
            })?;

            let pages = source.get_pages().map_err(|e| {
                Error::operation_failed(
                    FailureKind::MalformedDocument,
                    format!("failed to get pages from input PDF {}: {}", i, e),
                )
            })?;

            for page in &pages {
                let copied = dest.copy_from_foreign(page);
                dest.add_page(&copied, false).map_err(map_write_error)?;
            }
        }

        dest.writer().write_to_memory().map_err(map_write_error)
    }

    /// Get the page count of a PDF
    pub fn get_page_count(input_data: &[u8]) -> Result<u32> {
        let qpdf = QPdf::read_from_memory(input_data).map_err(map_read_error)?;
        qpdf.get_num_pages().map_err(map_read_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fixtures::{numbered_pdf, page_markers};

    #[test]
    fn test_merge_preserves_order() {
        let a = numbered_pdf(2, 100);
        let b = numbered_pdf(3, 200);

        let merged = QpdfWrapper::merge(&[&a, &b]).unwrap();

        assert_eq!(QpdfWrapper::get_page_count(&merged).unwrap(), 5);
        assert_eq!(page_markers(&merged), vec![101, 102, 201, 202, 203]);
    }

    #[test]
    fn test_merge_empty_is_invalid_input() {
        assert!(matches!(
            QpdfWrapper::merge(&[]),
            Err(Error::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_merge_malformed_input() {
        let a = numbered_pdf(1, 0);
        let err = QpdfWrapper::merge(&[&a, b"%PDF-1.4 garbage"]).unwrap_err();
        assert_eq!(err.failure_kind(), Some(FailureKind::MalformedDocument));
        assert!(err.to_string().contains("input PDF 1"), "{}", err);
    }

    #[test]
    fn test_split_pages_in_selection_order() {
        let doc = numbered_pdf(10, 0);

        let single = QpdfWrapper::split_pages(&doc, &[2]).unwrap();
        assert_eq!(page_markers(&single), vec![3]);

        let range = QpdfWrapper::split_pages(&doc, &[6, 7, 8]).unwrap();
        assert_eq!(page_markers(&range), vec![7, 8, 9]);

        let reversed = QpdfWrapper::split_pages(&doc, &[1, 0]).unwrap();
        assert_eq!(page_markers(&reversed), vec![2, 1]);
    }

    #[test]
    fn test_split_page_out_of_range() {
        let doc = numbered_pdf(2, 0);
        let err = QpdfWrapper::split_pages(&doc, &[5]).unwrap_err();
        assert_eq!(err.failure_kind(), Some(FailureKind::PageOutOfRange));
    }

    #[test]
    fn test_page_count_malformed() {
        let err = QpdfWrapper::get_page_count(b"not a pdf at all").unwrap_err();
        assert_eq!(err.failure_kind(), Some(FailureKind::MalformedDocument));
    }
}
