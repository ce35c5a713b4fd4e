//! Page range parsing
//!
//! Selections are validated against the actual page count before any
//! transformation runs, so an out-of-range page is a caller error.

use crate::error::{Error, Result};

fn invalid(range: &str, why: impl std::fmt::Display) -> Error {
    Error::invalid_input(format!("page range {:?}: {}", range, why))
}

/// Parse a page range string into 0-indexed page indices, in selection order.
///
/// Supports:
/// - `N` (single page, 1-indexed)
/// - `N-M` (range; reversed when N > M)
/// - `z` (last page), `rN` (N-th from last)
/// - `N-M:odd`, `N-M:even` (odd/even filter)
/// - Comma-separated combinations
pub fn parse_page_range(range: &str, num_pages: u32) -> Result<Vec<u32>> {
    if num_pages == 0 {
        return Err(Error::invalid_input("document has no pages"));
    }

    let mut all_pages: Vec<u32> = Vec::new();

    for part in range.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        let (range_part, modifier) = if let Some(r) = part.strip_suffix(":odd") {
            (r, Some(1))
        } else if let Some(r) = part.strip_suffix(":even") {
            (r, Some(0))
        } else {
            (part, None)
        };

        let pages = match range_part.split_once('-') {
            Some((start, end)) => {
                let start = resolve_page_ref(range, start, num_pages)?;
                let end = resolve_page_ref(range, end, num_pages)?;
                if start <= end {
                    (start..=end).collect::<Vec<u32>>()
                } else {
                    (end..=start).rev().collect::<Vec<u32>>()
                }
            }
            None => vec![resolve_page_ref(range, range_part, num_pages)?],
        };

        match modifier {
            Some(parity) => all_pages.extend(pages.into_iter().filter(|p| p % 2 == parity)),
            None => all_pages.extend(pages),
        }
    }

    if all_pages.is_empty() {
        return Err(invalid(range, "selects no pages"));
    }

    Ok(all_pages.iter().map(|p| p - 1).collect())
}

/// Resolve a page reference (1-indexed): numeric "N", "z" (last), "rN" (N-th from last)
fn resolve_page_ref(range: &str, s: &str, num_pages: u32) -> Result<u32> {
    let s = s.trim();
    if s == "z" {
        return Ok(num_pages);
    }
    if let Some(r_num) = s.strip_prefix('r') {
        let n: u32 = r_num
            .parse()
            .map_err(|_| invalid(range, format!("{:?} is not a page reference", s)))?;
        if n == 0 || n > num_pages {
            return Err(invalid(
                range,
                format!("{} must be within r1-r{}", s, num_pages),
            ));
        }
        return Ok(num_pages - n + 1);
    }
    let page: u32 = s
        .parse()
        .map_err(|_| invalid(range, format!("{:?} is not a page number", s)))?;
    if page == 0 || page > num_pages {
        return Err(invalid(
            range,
            format!("page {} is outside 1-{}", page, num_pages),
        ));
    }
    Ok(page)
}
