//! Caller payload decoding and output naming

use crate::error::{Error, Result};
use base64::Engine;
use chrono::{DateTime, Utc};

const MAX_FILENAME_CHARS: usize = 200;

/// Decode a base64 payload.
///
/// Tolerates a `data:<mime>;base64,` prefix, embedded whitespace and
/// missing padding. Anything else that is not standard-alphabet base64 is
/// rejected.
pub fn decode_base64(input: &str) -> Result<Vec<u8>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::invalid_input("payload is empty"));
    }

    let body = match trimmed.strip_prefix("data:") {
        Some(rest) => match rest.split_once(',') {
            Some((header, data)) if header.ends_with(";base64") => data,
            _ => {
                return Err(Error::invalid_input(
                    "data URL payloads must be base64 encoded",
                ))
            }
        },
        None => trimmed,
    };

    let mut cleaned: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    match cleaned.len() % 4 {
        0 => {}
        1 => {
            return Err(Error::invalid_input(
                "payload is not valid base64 (truncated)",
            ))
        }
        n => cleaned.push_str(&"=="[..4 - n]),
    }

    let data = base64::engine::general_purpose::STANDARD.decode(cleaned.as_bytes())?;
    if data.is_empty() {
        return Err(Error::invalid_input("payload is empty"));
    }
    Ok(data)
}

/// Decode a base64 payload that must hold a PDF document
pub fn decode_pdf(input: &str, label: &str) -> Result<Vec<u8>> {
    let data = decode_base64(input).map_err(|e| match e {
        Error::InvalidInput { reason } => Error::invalid_input(format!("{}: {}", label, reason)),
        Error::Base64Decode(err) => {
            Error::invalid_input(format!("{}: not valid base64 ({})", label, err))
        }
        other => other,
    })?;
    if data.len() < 4 || &data[0..4] != b"%PDF" {
        return Err(Error::invalid_input(format!(
            "{} is not a PDF document",
            label
        )));
    }
    Ok(data)
}

/// Validate a `type/subtype` media type
pub fn validate_media_type(media_type: &str) -> Result<String> {
    let media_type = media_type.trim();
    let well_formed = match media_type.split_once('/') {
        Some((kind, subtype)) => {
            !kind.is_empty()
                && !subtype.is_empty()
                && !subtype.contains('/')
                && media_type
                    .chars()
                    .all(|c| c.is_ascii_graphic() && c != '"' && c != '\\')
        }
        None => false,
    };
    if !well_formed {
        return Err(Error::invalid_input(format!(
            "mime_type {:?} is not of the form type/subtype",
            media_type
        )));
    }
    Ok(media_type.to_string())
}

/// Reduce a caller supplied name to a safe display filename.
///
/// Keeps only the final path component and drops control characters and
/// quotes. Returns `fallback` when nothing usable is left.
pub fn sanitize_filename(name: &str, fallback: &str) -> String {
    let last = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = last
        .chars()
        .filter(|c| !c.is_control() && *c != '"')
        .take(MAX_FILENAME_CHARS)
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        fallback.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Sanitized filename without its extension
pub fn file_stem(name: Option<&str>, fallback: &str) -> String {
    let name = sanitize_filename(name.unwrap_or_default(), fallback);
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => name,
    }
}

pub fn merged_name(now: DateTime<Utc>) -> String {
    format!("merged_{}.pdf", now.format("%Y%m%d_%H%M%S"))
}

/// `report` + `1-3,5` -> `report_pages_1to3_5.pdf`
pub fn split_name(stem: &str, pages: &str) -> String {
    let pages: String = pages
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .replace(',', "_")
        .replace('-', "to")
        .replace(':', "_");
    format!("{}_pages_{}.pdf", stem, pages)
}

pub fn page_image_name(stem: &str, page: u32) -> String {
    format!("{}_page_{}.png", stem, page)
}

/// Caller filename for generated text documents, always ending in `.pdf`
pub fn text_pdf_name(filename: Option<&str>) -> String {
    let name = sanitize_filename(filename.unwrap_or_default(), "document.pdf");
    if name.to_ascii_lowercase().ends_with(".pdf") {
        name
    } else {
        format!("{}.pdf", name)
    }
}
