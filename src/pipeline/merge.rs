//! Page-level deep copy between lopdf documents.
//!
//! Every object reachable from a page is copied into the target exactly
//! once per source document: shared fonts and images stay shared, and
//! reference cycles (annotations pointing back at their page) terminate.
//! `/Parent` is not followed; inheritable page attributes are copied onto
//! the page itself so nothing is lost when it is re-parented.

use crate::error::{DocShiftError, Result};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];
const MAX_TREE_DEPTH: usize = 64;

/// Accumulates pages from several documents into one.
pub(crate) struct PageCollector {
    target: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
}

impl PageCollector {
    pub(crate) fn new() -> Self {
        let mut target = Document::with_version("1.5");
        let pages_id = target.new_object_id();
        Self {
            target,
            pages_id,
            kids: Vec::new(),
        }
    }

    /// Append every page of `source`, in page order. `origin` names the
    /// source in errors.
    pub(crate) fn append(&mut self, source: &Document, origin: &Path) -> Result<usize> {
        let mut copied: HashMap<ObjectId, ObjectId> = HashMap::new();
        let pages = source.get_pages();
        for (&number, &page_id) in &pages {
            let new_id = self.copy_page(source, page_id, &mut copied).map_err(|detail| {
                DocShiftError::corrupt(origin, format!("page {number}: {detail}"))
            })?;
            self.kids.push(Object::Reference(new_id));
        }
        debug!(pages = pages.len(), source = %origin.display(), "appended");
        Ok(pages.len())
    }

    pub(crate) fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Close the page tree and hand back the document.
    pub(crate) fn into_document(mut self) -> Document {
        let count = self.kids.len() as i64;
        self.target.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.target.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.target.trailer.set("Root", catalog_id);
        self.target
    }

    fn copy_page(
        &mut self,
        source: &Document,
        page_id: ObjectId,
        copied: &mut HashMap<ObjectId, ObjectId>,
    ) -> std::result::Result<ObjectId, String> {
        let page = source
            .get_dictionary(page_id)
            .map_err(|e| format!("unreadable page object: {e}"))?;

        let new_id = self.target.new_object_id();
        copied.insert(page_id, new_id);

        let mut dict = Dictionary::new();
        for (key, value) in page.iter() {
            if key.as_slice() == b"Parent" {
                continue;
            }
            dict.set(key.clone(), self.copy_object(source, value, copied));
        }
        for key in INHERITABLE {
            if !dict.has(key) {
                if let Some(value) = inherited(source, page, key) {
                    dict.set(key.to_vec(), self.copy_object(source, value, copied));
                }
            }
        }
        dict.set("Parent", Object::Reference(self.pages_id));

        self.target.objects.insert(new_id, Object::Dictionary(dict));
        Ok(new_id)
    }

    fn copy_object(
        &mut self,
        source: &Document,
        object: &Object,
        copied: &mut HashMap<ObjectId, ObjectId>,
    ) -> Object {
        match object {
            Object::Reference(id) => {
                if let Some(&done) = copied.get(id) {
                    return Object::Reference(done);
                }
                let Ok(referenced) = source.get_object(*id) else {
                    warn!(?id, "dangling reference replaced with null");
                    return Object::Null;
                };
                let new_id = self.target.new_object_id();
                copied.insert(*id, new_id);
                let clone = self.copy_object(source, referenced, copied);
                self.target.objects.insert(new_id, clone);
                Object::Reference(new_id)
            }
            Object::Dictionary(dict) => Object::Dictionary(self.copy_dict(source, dict, copied)),
            Object::Array(items) => Object::Array(
                items
                    .iter()
                    .map(|item| self.copy_object(source, item, copied))
                    .collect(),
            ),
            Object::Stream(stream) => {
                let dict = self.copy_dict(source, &stream.dict, copied);
                Object::Stream(Stream::new(dict, stream.content.clone()))
            }
            other => other.clone(),
        }
    }

    fn copy_dict(
        &mut self,
        source: &Document,
        dict: &Dictionary,
        copied: &mut HashMap<ObjectId, ObjectId>,
    ) -> Dictionary {
        let mut out = Dictionary::new();
        for (key, value) in dict.iter() {
            if key.as_slice() == b"Parent" {
                continue;
            }
            out.set(key.clone(), self.copy_object(source, value, copied));
        }
        out
    }
}

/// Walk `/Parent` links from `page` looking for `key`.
fn inherited<'a>(source: &'a Document, page: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    let mut node = page;
    for _ in 0..MAX_TREE_DEPTH {
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = source.get_dictionary(parent).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value);
        }
    }
    None
}
