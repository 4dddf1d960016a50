//! Plain-text page layout for the PDF writer.
//!
//! Layout is a pure function of the input text: the same text always yields
//! the same pages, the same lines on each page and the same bytes.
//!
//! Geometry (PostScript points):
//!
//! ```text
//!   ┌──────────── 595.2756 ────────────┐
//!   │            72 top margin         │
//!   │ 72 │ line 1  (baseline y0)       │
//!   │    │ line 2  (y0 - 15)           │
//!   │    │ ...                         │ 841.8898
//!   │    │ line 47 (y0 - 690)          │
//!   │            72 bottom margin      │
//!   └──────────────────────────────────┘
//! ```
//!
//! The cursor starts at `PAGE_HEIGHT - TOP_MARGIN`, drops by
//! `LINE_ADVANCE` after every drawn line, and a new page begins as soon as
//! it falls below `BOTTOM_MARGIN`. With these constants a page holds
//! 47 lines.

use crate::error::{DocShiftError, Result};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream, StringFormat};
use tracing::debug;

/// ISO A4 width.
pub const PAGE_WIDTH: f64 = 595.275_590_551_181_1;
/// ISO A4 height.
pub const PAGE_HEIGHT: f64 = 841.889_763_779_527_6;
pub const LEFT_MARGIN: f64 = 72.0;
pub const TOP_MARGIN: f64 = 72.0;
pub const BOTTOM_MARGIN: f64 = 72.0;
/// Maximum characters per rendered line.
pub const WRAP_WIDTH: usize = 100;
pub const LINE_ADVANCE: f64 = 15.0;
pub const FONT_SIZE: i64 = 12;
const TAB_SIZE: usize = 8;

/// Rendered lines that fit on one page.
pub fn lines_per_page() -> usize {
    ((PAGE_HEIGHT - TOP_MARGIN - BOTTOM_MARGIN) / LINE_ADVANCE).floor() as usize + 1
}

// ── Wrapping ─────────────────────────────────────────────────────────────

/// Greedy word wrap of a single source line.
///
/// Tabs expand to 8-column stops and other ASCII whitespace becomes a
/// space. Whitespace at a break is dropped, words longer than `width` are
/// split, and a line holding only whitespace wraps to nothing.
pub fn wrap(line: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let normalized = normalize_whitespace(line);

    // Chunks alternate between runs of spaces and runs of other characters.
    // Stored reversed so `pop` yields the next chunk.
    let mut chunks: Vec<Vec<char>> = split_chunks(&normalized);
    chunks.reverse();

    let mut lines: Vec<String> = Vec::new();
    while !chunks.is_empty() {
        let mut current: Vec<Vec<char>> = Vec::new();
        let mut current_len = 0usize;

        if !lines.is_empty() && chunks.last().is_some_and(|c| is_blank(c)) {
            chunks.pop();
        }

        while let Some(chunk) = chunks.last() {
            if current_len + chunk.len() > width {
                break;
            }
            current_len += chunk.len();
            if let Some(chunk) = chunks.pop() {
                current.push(chunk);
            }
        }

        // A word longer than the width fills whatever room is left. A line
        // that is already full ends here and the word starts the next one.
        let room = width - current_len;
        if let Some(chunk) = chunks.last_mut() {
            if chunk.len() > width && room > 0 {
                let tail = chunk.split_off(room);
                let head = std::mem::replace(chunk, tail);
                current_len += head.len();
                current.push(head);
            }
        }

        if current.last().is_some_and(|c| is_blank(c)) {
            current.pop();
        }

        if !current.is_empty() {
            lines.push(current.into_iter().flatten().collect());
        }
    }
    lines
}

fn is_blank(chunk: &[char]) -> bool {
    chunk.iter().all(|&c| c == ' ')
}

fn normalize_whitespace(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut column = 0usize;
    for c in line.chars() {
        match c {
            '\t' => {
                let pad = TAB_SIZE - (column % TAB_SIZE);
                out.extend(std::iter::repeat(' ').take(pad));
                column += pad;
            }
            '\n' | '\r' => {
                out.push(' ');
                column = 0;
            }
            '\u{0B}' | '\u{0C}' => {
                out.push(' ');
                column += 1;
            }
            other => {
                out.push(other);
                column += 1;
            }
        }
    }
    out
}

fn split_chunks(s: &str) -> Vec<Vec<char>> {
    let mut chunks: Vec<Vec<char>> = Vec::new();
    for c in s.chars() {
        let space = c == ' ';
        match chunks.last_mut() {
            Some(last) if (last[0] == ' ') == space => last.push(c),
            _ => chunks.push(vec![c]),
        }
    }
    chunks
}

// ── Pagination ───────────────────────────────────────────────────────────

/// Split `text` into pages of rendered lines.
///
/// Always returns at least one page; empty text yields one blank page.
pub fn paginate(text: &str) -> Vec<Vec<String>> {
    let top = PAGE_HEIGHT - TOP_MARGIN;
    let mut pages: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut y = top;

    for source_line in text.split('\n') {
        for line in wrap(source_line, WRAP_WIDTH) {
            current.push(line);
            y -= LINE_ADVANCE;
            if y < BOTTOM_MARGIN {
                pages.push(std::mem::take(&mut current));
                y = top;
            }
        }
    }

    if !current.is_empty() || pages.is_empty() {
        pages.push(current);
    }
    pages
}

// ── PDF construction ─────────────────────────────────────────────────────

/// Lay `text` out as an A4 Helvetica PDF and serialise it.
pub fn render_text_pdf(text: &str) -> Result<Vec<u8>> {
    let pages = paginate(text);
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

    let media_box = vec![
        Object::Integer(0),
        Object::Integer(0),
        Object::Real(PAGE_WIDTH as f32),
        Object::Real(PAGE_HEIGHT as f32),
    ];

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for lines in &pages {
        let content = page_content(lines)
            .encode()
            .map_err(|e| DocShiftError::encoding("pdf", e))?;
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => media_box.clone(),
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| DocShiftError::encoding("pdf", e))?;
    debug!(pages = pages.len(), bytes = bytes.len(), "laid out text PDF");
    Ok(bytes)
}

fn page_content(lines: &[String]) -> Content {
    let top = PAGE_HEIGHT - TOP_MARGIN;
    let mut operations = Vec::with_capacity(lines.len() * 5);
    for (i, line) in lines.iter().enumerate() {
        let y = top - LINE_ADVANCE * i as f64;
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new("Tf", vec!["F1".into(), FONT_SIZE.into()]));
        operations.push(Operation::new(
            "Td",
            vec![Object::Real(LEFT_MARGIN as f32), Object::Real(y as f32)],
        ));
        operations.push(Operation::new(
            "Tj",
            vec![Object::String(to_win_ansi(line), StringFormat::Literal)],
        ));
        operations.push(Operation::new("ET", vec![]));
    }
    Content { operations }
}

/// Encode for the standard Helvetica font. Characters outside
/// WinAnsiEncoding become `?`.
pub(crate) fn to_win_ansi(s: &str) -> Vec<u8> {
    s.chars().map(win_ansi_byte).collect()
}

fn win_ansi_byte(c: char) -> u8 {
    let code = c as u32;
    match code {
        0x20..=0x7E | 0xA0..=0xFF => code as u8,
        _ => match c {
            '€' => 0x80,
            '‚' => 0x82,
            'ƒ' => 0x83,
            '„' => 0x84,
            '…' => 0x85,
            '†' => 0x86,
            '‡' => 0x87,
            'ˆ' => 0x88,
            '‰' => 0x89,
            'Š' => 0x8A,
            '‹' => 0x8B,
            'Œ' => 0x8C,
            'Ž' => 0x8E,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '˜' => 0x98,
            '™' => 0x99,
            'š' => 0x9A,
            '›' => 0x9B,
            'œ' => 0x9C,
            'ž' => 0x9E,
            'Ÿ' => 0x9F,
            _ => b'?',
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forty_seven_lines_per_page() {
        assert_eq!(lines_per_page(), 47);
    }

    #[test]
    fn hundred_chars_is_one_line() {
        assert_eq!(wrap(&"a".repeat(100), 100).len(), 1);
        let two = wrap(&"a".repeat(101), 100);
        assert_eq!(two.len(), 2);
        assert_eq!(two[0].len(), 100);
        assert_eq!(two[1], "a");
    }

    #[test]
    fn words_wrap_at_spaces() {
        let line = format!("{} {}", "a".repeat(60), "b".repeat(60));
        let out = wrap(&line, 100);
        assert_eq!(out, vec!["a".repeat(60), "b".repeat(60)]);
    }

    #[test]
    fn long_word_fills_rest_of_line() {
        let line = format!("ab {}", "x".repeat(200));
        let out = wrap(&line, 100);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].chars().count(), 100);
        assert!(out[0].starts_with("ab x"));
    }

    #[test]
    fn long_word_after_full_line_starts_fresh() {
        let line = format!("{} {}", "a".repeat(99), "b".repeat(200));
        let out = wrap(&line, 100);
        let lengths: Vec<usize> = out.iter().map(|l| l.chars().count()).collect();
        assert_eq!(lengths, vec![99, 100, 100]);
        assert!(out.iter().all(|l| l.chars().count() <= 100));

        let exact = format!("{} {}", "a".repeat(100), "b".repeat(150));
        let lengths: Vec<usize> = wrap(&exact, 100).iter().map(|l| l.chars().count()).collect();
        assert_eq!(lengths, vec![100, 100, 50]);
    }

    #[test]
    fn blank_lines_render_nothing() {
        assert!(wrap("", 100).is_empty());
        assert!(wrap("   \t  ", 100).is_empty());
    }

    #[test]
    fn leading_indent_kept_on_first_line() {
        assert_eq!(wrap("  hello  world", 100), vec!["  hello  world"]);
    }

    #[test]
    fn tabs_expand_to_stops() {
        assert_eq!(wrap("a\tb", 100), vec!["a       b"]);
    }

    #[test]
    fn empty_text_is_one_blank_page() {
        let pages = paginate("");
        assert_eq!(pages.len(), 1);
        assert!(pages[0].is_empty());
    }

    #[test]
    fn overflow_adds_exactly_one_page() {
        let full = vec!["line"; 47].join("\n");
        assert_eq!(paginate(&full).len(), 1);
        let over = vec!["line"; 48].join("\n");
        let pages = paginate(&over);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].len(), 1);
        let two_full = vec!["line"; 94].join("\n");
        assert_eq!(paginate(&two_full).len(), 2);
    }

    #[test]
    fn blank_source_lines_take_no_space() {
        let text = vec!["x", "", "  ", "y"].join("\n");
        assert_eq!(paginate(&text), vec![vec!["x".to_string(), "y".to_string()]]);
    }

    #[test]
    fn layout_is_deterministic() {
        let text = "The quick brown fox\n".repeat(120);
        let a = render_text_pdf(&text).unwrap();
        let b = render_text_pdf(&text).unwrap();
        assert_eq!(a, b);
        let doc = Document::load_mem(&a).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
    }

    #[test]
    fn win_ansi_mapping() {
        assert_eq!(to_win_ansi("A€é"), vec![b'A', 0x80, 0xE9]);
        assert_eq!(to_win_ansi("漢"), vec![b'?']);
    }
}
