//! Build PDFs whose every page is a single full-page image.
//!
//! Used by the rasterising compressor (JPEG pages) and the image assembler
//! (lossless pages). Each page's MediaBox equals the image's pixel size, so
//! one pixel maps to one point.

use crate::error::{DocShiftError, Result};
use crate::pipeline::repack;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};

/// Encoded samples for one page image.
pub(crate) enum PageImageData {
    /// Baseline JPEG, embedded as-is with `/DCTDecode`.
    Jpeg(Vec<u8>),
    /// 8-bit interleaved RGB, Flate-compressed when the document is saved.
    Rgb(Vec<u8>),
}

pub(crate) struct PageImage {
    pub width: u32,
    pub height: u32,
    pub data: PageImageData,
}

impl PageImage {
    fn xobject(self) -> Stream {
        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => self.width as i64,
            "Height" => self.height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8i64,
        };
        match self.data {
            PageImageData::Jpeg(bytes) => {
                dict.set("Filter", "DCTDecode");
                Stream::new(dict, bytes).with_compression(false)
            }
            PageImageData::Rgb(samples) => Stream::new(dict, samples),
        }
    }
}

/// Assemble `images` into a document, one page each, in slice order.
pub(crate) fn image_document(images: Vec<PageImage>) -> Result<Document> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(images.len());

    for image in images {
        let (w, h) = (image.width as i64, image.height as i64);
        let image_id = doc.add_object(image.xobject());

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![w.into(), 0i64.into(), 0i64.into(), h.into(), 0i64.into(), 0i64.into()],
                ),
                Operation::new("Do", vec!["Im0".into()]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            Dictionary::new(),
            content
                .encode()
                .map_err(|e| DocShiftError::encoding("pdf", e))?,
        ));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0i64.into(), 0i64.into(), w.into(), h.into()],
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
            "Contents" => content_id,
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
    Ok(doc)
}

/// Assemble, finish and serialise.
pub(crate) fn image_pdf_bytes(images: Vec<PageImage>) -> Result<Vec<u8>> {
    let mut doc = image_document(images)?;
    repack::finish(&mut doc);
    repack::save(&mut doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_page_per_image_sized_to_pixels() {
        let images = vec![
            PageImage {
                width: 4,
                height: 2,
                data: PageImageData::Rgb(vec![255; 4 * 2 * 3]),
            },
            PageImage {
                width: 3,
                height: 5,
                data: PageImageData::Rgb(vec![0; 3 * 5 * 3]),
            },
        ];
        let bytes = image_pdf_bytes(images).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 2);

        let second = doc.get_dictionary(pages[&2]).unwrap();
        let media_box = second.get(b"MediaBox").unwrap().as_array().unwrap();
        assert_eq!(media_box[2].as_i64().unwrap(), 3);
        assert_eq!(media_box[3].as_i64().unwrap(), 5);
    }
}
