//! Plain text to PDF typesetting
//!
//! Renders text onto A4 pages in 11pt Helvetica with word wrapping. Only the
//! WinAnsi (Latin-1) repertoire is representable with the standard font;
//! anything else is substituted with `?`.

use crate::error::{Error, FailureKind, Result};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 50;
const FONT_SIZE: i64 = 11;
const LEADING: i64 = 14;
const TAB: &str = "    ";

/// Usable line width in glyph space units (1/1000 em)
const LINE_WIDTH_UNITS: u32 = ((PAGE_WIDTH - 2 * MARGIN) * 1000 / FONT_SIZE) as u32;
const LINES_PER_PAGE: usize = ((PAGE_HEIGHT - 2 * MARGIN) / LEADING) as usize;

/// Helvetica advance widths for 0x20..=0x7E
#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

fn glyph_width(byte: u8) -> u32 {
    match byte {
        0x20..=0x7E => HELVETICA_WIDTHS[(byte - 0x20) as usize] as u32,
        _ => 556,
    }
}

/// Encode a line for the WinAnsi-encoded standard font
fn encode_win_ansi(line: &str) -> Vec<u8> {
    line.chars()
        .map(|c| match c as u32 {
            code @ (0x20..=0x7E | 0xA0..=0xFF) => code as u8,
            _ => b'?',
        })
        .collect()
}

/// Greedy word wrap of one encoded source line
fn wrap_line(line: &[u8]) -> Vec<Vec<u8>> {
    let mut lines = Vec::new();
    let mut current: Vec<u8> = Vec::new();
    let mut current_width = 0u32;
    let space = glyph_width(b' ');

    for word in line.split(|&b| b == b' ') {
        let word_width: u32 = word.iter().map(|&b| glyph_width(b)).sum();
        let sep = if current.is_empty() { 0 } else { space };

        if current_width + sep + word_width <= LINE_WIDTH_UNITS {
            if !current.is_empty() {
                current.push(b' ');
            }
            current.extend_from_slice(word);
            current_width += sep + word_width;
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
            current_width = 0;
        }

        // Words wider than a line are broken at the margin
        for &b in word {
            let w = glyph_width(b);
            if current_width + w > LINE_WIDTH_UNITS && !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                current_width = 0;
            }
            current.push(b);
            current_width += w;
        }
    }

    lines.push(current);
    lines
}

/// Break text into pages of encoded lines
fn layout(text: &str) -> Vec<Vec<Vec<u8>>> {
    let normalized = text.replace("\r\n", "\n").replace('\t', TAB);
    let lines: Vec<Vec<u8>> = normalized
        .trim_end()
        .split('\n')
        .flat_map(|line| wrap_line(&encode_win_ansi(line.trim_end())))
        .collect();

    lines
        .chunks(LINES_PER_PAGE)
        .map(|chunk| chunk.to_vec())
        .collect()
}

fn page_content(lines: &[Vec<u8>]) -> Content {
    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), FONT_SIZE.into()]),
        Operation::new("TL", vec![LEADING.into()]),
        Operation::new(
            "Td",
            vec![MARGIN.into(), (PAGE_HEIGHT - MARGIN - FONT_SIZE).into()],
        ),
    ];
    for line in lines {
        if !line.is_empty() {
            operations.push(Operation::new(
                "Tj",
                vec![Object::string_literal(line.clone())],
            ));
        }
        operations.push(Operation::new("T*", vec![]));
    }
    operations.push(Operation::new("ET", vec![]));
    Content { operations }
}

fn internal(e: impl std::fmt::Display) -> Error {
    Error::operation_failed(FailureKind::Internal, format!("failed to build PDF: {}", e))
}

/// Typeset `text` into a new PDF document
pub fn text_to_pdf(text: &str) -> Result<Vec<u8>> {
    if text.trim().is_empty() {
        return Err(Error::invalid_input("text is empty"));
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for lines in layout(text) {
        let content = page_content(&lines).encode().map_err(internal)?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut out = Vec::new();
    doc.save_to(&mut out).map_err(internal)?;
    Ok(out)
}
