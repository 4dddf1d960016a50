//! DOCX paragraph text, read straight from the OOXML package.
//!
//! Only paragraphs that are direct children of `w:body` are collected, in
//! document order. Table cells, text boxes, headers, footers and comments
//! are not body paragraphs and are skipped. Inside a paragraph, run text
//! (`w:t`) is concatenated; `w:tab` becomes `\t` and `w:br`/`w:cr` become
//! `\n`.

use crate::error::{DocShiftError, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::Read;
use std::path::Path;
use tracing::debug;

const MAIN_PART: &str = "word/document.xml";

/// Body paragraphs of the DOCX at `path`.
pub fn paragraphs(path: &Path) -> Result<Vec<String>> {
    let file = std::fs::File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => DocShiftError::NotFound {
            path: path.to_path_buf(),
        },
        _ => DocShiftError::corrupt(path, e),
    })?;

    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| DocShiftError::corrupt(path, format!("not a DOCX package: {e}")))?;

    let mut xml = Vec::new();
    archive
        .by_name(MAIN_PART)
        .map_err(|e| DocShiftError::corrupt(path, format!("missing {MAIN_PART}: {e}")))?
        .read_to_end(&mut xml)
        .map_err(|e| DocShiftError::corrupt(path, e))?;

    let paragraphs = body_paragraphs(&xml).map_err(|detail| DocShiftError::corrupt(path, detail))?;
    debug!(paragraphs = paragraphs.len(), "read DOCX body");
    Ok(paragraphs)
}

/// Walk `word/document.xml` and collect body-level paragraph text.
fn body_paragraphs(xml: &[u8]) -> std::result::Result<Vec<String>, String> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();

    let mut depth = 0usize;
    let mut body_depth: Option<usize> = None;
    let mut paragraph_depth: Option<usize> = None;
    let mut run_depth = 0usize;
    let mut in_text = false;

    let mut current = String::new();
    let mut out = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| format!("XML error at byte {}: {e}", reader.buffer_position()))?;

        match event {
            Event::Start(e) => {
                depth += 1;
                match e.name().as_ref() {
                    b"w:body" if body_depth.is_none() => body_depth = Some(depth),
                    b"w:p" if paragraph_depth.is_none() && is_body_child(body_depth, depth) => {
                        paragraph_depth = Some(depth);
                        current.clear();
                    }
                    b"w:r" if paragraph_depth.is_some() => run_depth += 1,
                    b"w:t" if run_depth == 1 => in_text = true,
                    _ => {}
                }
            }
            Event::Empty(e) => {
                let child_depth = depth + 1;
                match e.name().as_ref() {
                    b"w:p" if paragraph_depth.is_none() && is_body_child(body_depth, child_depth) => {
                        out.push(String::new());
                    }
                    b"w:tab" if run_depth == 1 => current.push('\t'),
                    b"w:br" | b"w:cr" if run_depth == 1 => current.push('\n'),
                    _ => {}
                }
            }
            Event::Text(t) if in_text => {
                let text = t.unescape().map_err(|e| format!("bad text: {e}"))?;
                current.push_str(&text);
            }
            Event::CData(t) if in_text => {
                current.push_str(&String::from_utf8_lossy(&t));
            }
            Event::End(e) => {
                match e.name().as_ref() {
                    b"w:t" => in_text = false,
                    b"w:r" if paragraph_depth.is_some() => run_depth = run_depth.saturating_sub(1),
                    b"w:p" if paragraph_depth == Some(depth) => {
                        out.push(std::mem::take(&mut current));
                        paragraph_depth = None;
                        run_depth = 0;
                    }
                    b"w:body" if body_depth == Some(depth) => body_depth = None,
                    _ => {}
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}

fn is_body_child(body_depth: Option<usize>, depth: usize) -> bool {
    body_depth.is_some_and(|b| depth == b + 1)
}
