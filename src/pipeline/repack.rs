//! Lossless structural rewrite of a PDF.
//!
//! Unreferenced objects are dropped, the remaining objects are renumbered
//! densely and every stream without a filter is Flate-compressed. Pages,
//! their sizes and their text content are untouched.

use crate::error::{DocShiftError, Result};
use crate::output::input_size;
use lopdf::Document;
use std::path::Path;
use tracing::{debug, info};

/// Load a PDF. A missing file is `NotFound`; anything lopdf rejects is
/// `CorruptInput`.
pub(crate) fn load(path: &Path) -> Result<Document> {
    input_size(path)?;
    Document::load(path).map_err(|e| DocShiftError::corrupt(path, format!("not a readable PDF: {e}")))
}

/// The finishing step applied before every PDF this crate saves.
pub(crate) fn finish(doc: &mut Document) {
    let pruned = doc.prune_objects();
    doc.renumber_objects();
    doc.compress();
    debug!(pruned = pruned.len(), objects = doc.objects.len(), "finished document");
}

pub(crate) fn save(doc: &mut Document) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| DocShiftError::encoding("pdf", e))?;
    Ok(bytes)
}

/// Repack an already loaded document in memory. Returns the page count and
/// the saved bytes.
pub(crate) fn repack(mut doc: Document) -> Result<(usize, Vec<u8>)> {
    let pages = doc.get_pages().len();
    finish(&mut doc);
    let bytes = save(&mut doc)?;
    info!(pages, bytes = bytes.len(), "repacked");
    Ok((pages, bytes))
}
