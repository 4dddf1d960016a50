//! Structural PDF inspection without rendering.
//!
//! A page carries an embedded raster image when either
//!
//! * its effective `/Resources` (own, or inherited from an ancestor
//!   `/Pages` node) reach an XObject with `/Subtype /Image`, directly or
//!   through nested `/Form` XObjects, or
//! * its content stream contains an inline image (`BI … ID … EI`).

use crate::error::Result;
use crate::output::{input_size, DocumentSummary};
use crate::pipeline::repack;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

/// Guards against malformed `/Parent` chains.
const MAX_TREE_DEPTH: usize = 64;

/// True as soon as one page carries an embedded raster image.
pub fn has_embedded_images(doc: &Document) -> bool {
    doc.get_pages()
        .values()
        .any(|&page_id| page_has_images(doc, page_id))
}

/// 1-indexed numbers of the pages that carry embedded images.
pub fn image_pages(doc: &Document) -> Vec<usize> {
    doc.get_pages()
        .iter()
        .filter(|(_, &id)| page_has_images(doc, id))
        .map(|(&n, _)| n as usize)
        .collect()
}

pub(crate) fn page_has_images(doc: &Document, page_id: ObjectId) -> bool {
    let mut visited = HashSet::new();
    if let Some(resources) = effective_resources(doc, page_id) {
        if resources_have_images(doc, resources, &mut visited) {
            return true;
        }
    }
    match doc.get_page_content(page_id) {
        Ok(content) => has_inline_image(&content),
        Err(e) => {
            debug!(?page_id, "unreadable page content: {e}");
            false
        }
    }
}

/// Summarise the PDF at `path`.
pub(crate) fn summarize(path: &Path) -> Result<DocumentSummary> {
    let file_bytes = input_size(path)?;
    let doc = repack::load(path)?;
    Ok(DocumentSummary {
        page_count: doc.get_pages().len(),
        pdf_version: doc.version.clone(),
        is_encrypted: doc.is_encrypted(),
        file_bytes,
        image_pages: image_pages(&doc),
    })
}

// ── Resource walking ─────────────────────────────────────────────────────

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, obj)? {
        Object::Dictionary(d) => Some(d),
        Object::Stream(s) => Some(&s.dict),
        _ => None,
    }
}

/// The page's own `/Resources`, else the nearest ancestor's.
fn effective_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(res) = node.get(b"Resources") {
            return resolve_dict(doc, res);
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn is_name(obj: Option<&Object>, name: &[u8]) -> bool {
    matches!(obj, Some(Object::Name(n)) if n.as_slice() == name)
}

fn resources_have_images(
    doc: &Document,
    resources: &Dictionary,
    visited: &mut HashSet<ObjectId>,
) -> bool {
    let Some(xobjects) = resources
        .get(b"XObject")
        .ok()
        .and_then(|x| resolve_dict(doc, x))
    else {
        return false;
    };

    for (_, entry) in xobjects.iter() {
        if let Object::Reference(id) = entry {
            if !visited.insert(*id) {
                continue;
            }
        }
        let Some(Object::Stream(stream)) = resolve(doc, entry) else {
            continue;
        };
        let subtype = stream.dict.get(b"Subtype").ok();
        if is_name(subtype, b"Image") {
            return true;
        }
        if is_name(subtype, b"Form") {
            let nested = stream
                .dict
                .get(b"Resources")
                .ok()
                .and_then(|r| resolve_dict(doc, r));
            if let Some(nested) = nested {
                if resources_have_images(doc, nested, visited) {
                    return true;
                }
            }
            if let Ok(content) = stream.decompressed_content() {
                if has_inline_image(&content) {
                    return true;
                }
            }
        }
    }
    false
}

// ── Inline images ────────────────────────────────────────────────────────

fn is_pdf_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | b'\x0C' | b'\0')
}

fn is_delimiter(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

/// True when `content` has a `BI` operator followed by `ID`.
///
/// Literal strings, hex strings and comments are skipped so text that
/// merely spells "BI" does not count.
pub(crate) fn has_inline_image(content: &[u8]) -> bool {
    let mut i = 0;
    let mut saw_begin = false;
    while i < content.len() {
        let b = content[i];
        if is_pdf_whitespace(b) {
            i += 1;
            continue;
        }
        match b {
            b'(' => i = skip_literal_string(content, i),
            b'%' => {
                while i < content.len() && content[i] != b'\n' && content[i] != b'\r' {
                    i += 1;
                }
            }
            b'<' if content.get(i + 1) != Some(&b'<') => {
                while i < content.len() && content[i] != b'>' {
                    i += 1;
                }
                i += 1;
            }
            _ if is_delimiter(b) => i += 1,
            _ => {
                let start = i;
                while i < content.len()
                    && !is_pdf_whitespace(content[i])
                    && !is_delimiter(content[i])
                {
                    i += 1;
                }
                match &content[start..i] {
                    b"BI" => saw_begin = true,
                    b"ID" if saw_begin => return true,
                    _ => {}
                }
            }
        }
    }
    false
}

fn skip_literal_string(content: &[u8], open: usize) -> usize {
    let mut depth = 0usize;
    let mut i = open;
    while i < content.len() {
        match content[i] {
            b'\\' => i += 1,
            b'(' => depth += 1,
            b')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i + 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    i
}
