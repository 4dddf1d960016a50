//! Format tags and the capability tables that govern dispatch.
//!
//! The input set, output set and image set are each declared once here.
//! Extractor, encoder and image assembler call [`Format::require_input`],
//! [`Format::require_output`] or [`Format::require_image`] before doing any
//! work, so an out-of-set tag always fails with
//! [`DocShiftError::UnsupportedFormat`].

use crate::error::{DocShiftError, FormatDirection};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Every file kind docshift knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Pdf,
    Docx,
    Txt,
    Odt,
    Rtf,
    Md,
    Html,
    Epub,
    Png,
    Jpeg,
}

/// Formats a document may be extracted from.
pub const INPUT_FORMATS: &[Format] = &[
    Format::Pdf,
    Format::Docx,
    Format::Txt,
    Format::Odt,
    Format::Rtf,
    Format::Md,
    Format::Html,
    Format::Epub,
];

/// Formats a document may be encoded to.
pub const OUTPUT_FORMATS: &[Format] = &[
    Format::Txt,
    Format::Pdf,
    Format::Docx,
    Format::Odt,
    Format::Rtf,
    Format::Md,
    Format::Html,
    Format::Epub,
];

/// Formats accepted by the image-to-PDF path.
pub const IMAGE_FORMATS: &[Format] = &[Format::Png, Format::Jpeg];

impl Format {
    /// Canonical lowercase extension.
    pub fn extension(self) -> &'static str {
        match self {
            Format::Pdf => "pdf",
            Format::Docx => "docx",
            Format::Txt => "txt",
            Format::Odt => "odt",
            Format::Rtf => "rtf",
            Format::Md => "md",
            Format::Html => "html",
            Format::Epub => "epub",
            Format::Png => "png",
            Format::Jpeg => "jpg",
        }
    }

    /// Parse a filename extension or format name.
    ///
    /// Case-insensitive; a leading dot is ignored.
    pub fn from_extension(ext: &str) -> Option<Format> {
        let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
        let format = match ext.as_str() {
            "pdf" => Format::Pdf,
            "docx" => Format::Docx,
            "txt" | "text" => Format::Txt,
            "odt" => Format::Odt,
            "rtf" => Format::Rtf,
            "md" | "markdown" => Format::Md,
            "html" | "htm" => Format::Html,
            "epub" => Format::Epub,
            "png" => Format::Png,
            "jpg" | "jpeg" => Format::Jpeg,
            _ => return None,
        };
        Some(format)
    }

    /// Derive the format from a path's extension.
    pub fn from_path(path: &Path) -> Option<Format> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Format::from_extension)
    }

    pub fn is_input(self) -> bool {
        INPUT_FORMATS.contains(&self)
    }

    pub fn is_output(self) -> bool {
        OUTPUT_FORMATS.contains(&self)
    }

    pub fn is_image(self) -> bool {
        IMAGE_FORMATS.contains(&self)
    }

    /// Reject `self` unless it is in the input set.
    pub fn require_input(self) -> Result<Format, DocShiftError> {
        require(self, FormatDirection::Input)
    }

    /// Reject `self` unless it is in the output set.
    pub fn require_output(self) -> Result<Format, DocShiftError> {
        require(self, FormatDirection::Output)
    }

    /// Reject `self` unless it is in the image set.
    pub fn require_image(self) -> Result<Format, DocShiftError> {
        require(self, FormatDirection::Image)
    }

    /// The error returned when `self` is offered for `direction` but does
    /// not belong to its set.
    pub(crate) fn rejected(self, direction: FormatDirection) -> DocShiftError {
        unsupported(self.extension(), direction)
    }

    /// Parse `tag` and check it against the set for `direction`.
    pub fn parse_for(tag: &str, direction: FormatDirection) -> Result<Format, DocShiftError> {
        match Format::from_extension(tag) {
            Some(f) => require(f, direction),
            None => Err(unsupported(tag, direction)),
        }
    }

    /// pandoc reader name, for formats pandoc reads on our behalf.
    pub(crate) fn pandoc_reader(self) -> Option<&'static str> {
        match self {
            Format::Docx => Some("docx"),
            Format::Odt => Some("odt"),
            Format::Rtf => Some("rtf"),
            Format::Md => Some("markdown"),
            Format::Html => Some("html"),
            Format::Epub => Some("epub"),
            Format::Pdf | Format::Txt | Format::Png | Format::Jpeg => None,
        }
    }

    /// pandoc writer name, for formats pandoc writes on our behalf.
    pub(crate) fn pandoc_writer(self) -> Option<&'static str> {
        match self {
            Format::Docx => Some("docx"),
            Format::Odt => Some("odt"),
            Format::Rtf => Some("rtf"),
            Format::Md => Some("markdown"),
            Format::Html => Some("html"),
            Format::Epub => Some("epub"),
            Format::Pdf | Format::Txt | Format::Png | Format::Jpeg => None,
        }
    }
}

fn set_for(direction: FormatDirection) -> &'static [Format] {
    match direction {
        FormatDirection::Input => INPUT_FORMATS,
        FormatDirection::Output => OUTPUT_FORMATS,
        FormatDirection::Image => IMAGE_FORMATS,
    }
}

fn require(format: Format, direction: FormatDirection) -> Result<Format, DocShiftError> {
    if set_for(direction).contains(&format) {
        Ok(format)
    } else {
        Err(unsupported(format.extension(), direction))
    }
}

fn unsupported(tag: &str, direction: FormatDirection) -> DocShiftError {
    DocShiftError::UnsupportedFormat {
        format: tag.to_string(),
        direction,
        supported: list(set_for(direction)),
    }
}

/// Comma-separated extensions, for messages and `docshift formats`.
pub fn list(formats: &[Format]) -> String {
    formats
        .iter()
        .map(|f| f.extension())
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for Format {
    type Err = DocShiftError;

    /// Parses any known tag without checking direction.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Format::from_extension(s).ok_or_else(|| DocShiftError::UnsupportedFormat {
            format: s.to_string(),
            direction: FormatDirection::Input,
            supported: list(INPUT_FORMATS),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn aliases_resolve() {
        assert_eq!(Format::from_extension("HTM"), Some(Format::Html));
        assert_eq!(Format::from_extension(".Markdown"), Some(Format::Md));
        assert_eq!(Format::from_extension("jpeg"), Some(Format::Jpeg));
        assert_eq!(Format::from_extension("xlsx"), None);
    }

    #[test]
    fn document_sets_are_closed() {
        for f in INPUT_FORMATS {
            assert!(!f.is_image());
        }
        assert!(!Format::Png.is_input());
        assert!(!Format::Jpeg.is_output());
        assert_eq!(INPUT_FORMATS.len(), 8);
        assert_eq!(OUTPUT_FORMATS.len(), 8);
    }

    #[test]
    fn image_tags_are_not_document_inputs() {
        let err = Format::Png.require_input().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
        assert!(Format::Png.require_image().is_ok());
    }

    #[test]
    fn unknown_tag_is_unsupported_for_every_direction() {
        for dir in [FormatDirection::Input, FormatDirection::Output, FormatDirection::Image] {
            let err = Format::parse_for("bogus", dir).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
        }
    }

    #[test]
    fn from_path_uses_extension() {
        assert_eq!(Format::from_path(Path::new("/a/b/report.DOCX")), Some(Format::Docx));
        assert_eq!(Format::from_path(Path::new("/a/b/noext")), None);
    }

    #[test]
    fn pandoc_names_cover_delegated_formats() {
        for f in OUTPUT_FORMATS {
            let native = matches!(f, Format::Txt | Format::Pdf);
            assert_eq!(f.pandoc_writer().is_none(), native, "{f}");
        }
        assert!(Format::Pdf.pandoc_reader().is_none());
        assert!(Format::Txt.pandoc_reader().is_none());
    }
}
