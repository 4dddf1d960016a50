//! Source document → [`TextModel`].
//!
//! | format | how |
//! |--------|-----|
//! | pdf | pdfium page text, one part per page |
//! | docx | body paragraphs read straight from `word/document.xml` |
//! | txt | read as UTF-8, invalid sequences replaced |
//! | odt, rtf, md, html, epub | `pandoc --to=plain` |
//!
//! The source file is only ever opened for reading.

use crate::config::EngineConfig;
use crate::error::{DocShiftError, FormatDirection, Result};
use crate::format::Format;
use crate::output::input_size;
use crate::pipeline::{docx, pandoc, render};
use crate::text::TextModel;
use std::path::Path;
use tracing::{debug, info};

/// Extract the text of `path`, read as `format`.
pub async fn extract(config: &EngineConfig, path: &Path, format: Format) -> Result<TextModel> {
    format.require_input()?;
    input_size(path)?;

    let text = match format {
        Format::Pdf => {
            let pages = render::page_texts(config, path).await?;
            debug!(pages = pages.len(), "pdf text extracted");
            TextModel::from_parts(pages)
        }
        Format::Docx => {
            let owned = path.to_path_buf();
            let paragraphs = tokio::task::spawn_blocking(move || docx::paragraphs(&owned))
                .await
                .map_err(|e| DocShiftError::Internal(format!("docx task panicked: {e}")))??;
            debug!(paragraphs = paragraphs.len(), "docx text extracted");
            TextModel::from_parts(paragraphs)
        }
        Format::Txt => {
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|e| DocShiftError::corrupt(path, e))?;
            TextModel::new(String::from_utf8_lossy(&bytes).into_owned())
        }
        Format::Odt | Format::Rtf | Format::Md | Format::Html | Format::Epub => {
            let reader = format
                .pandoc_reader()
                .ok_or_else(|| format.rejected(FormatDirection::Input))?;
            TextModel::new(pandoc::to_plain(config, path, reader).await?)
        }
        Format::Png | Format::Jpeg => return Err(format.rejected(FormatDirection::Input)),
    };

    info!(format = %format, chars = text.char_count(), "extracted");
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EngineConfig {
        EngineConfig::builder()
            .allow_provisioning(false)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn txt_is_read_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "line one\nline two\n").unwrap();

        let text = extract(&config(), &path, Format::Txt).await.unwrap();
        assert_eq!(text.as_str(), "line one\nline two\n");
        assert!(path.exists());
    }

    #[tokio::test]
    async fn invalid_utf8_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latin1.txt");
        std::fs::write(&path, b"caf\xe9").unwrap();

        let text = extract(&config(), &path, Format::Txt).await.unwrap();
        assert_eq!(text.as_str(), "caf\u{FFFD}");
    }

    #[tokio::test]
    async fn images_are_not_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        std::fs::write(&path, b"\x89PNG").unwrap();

        let err = extract(&config(), &path, Format::Png).await.unwrap_err();
        assert!(matches!(err, DocShiftError::UnsupportedFormat { .. }));
    }

    #[tokio::test]
    async fn missing_source_is_not_found() {
        let err = extract(&config(), Path::new("/no/such/file.txt"), Format::Txt)
            .await
            .unwrap_err();
        assert!(matches!(err, DocShiftError::NotFound { .. }));
    }

    #[tokio::test]
    async fn docx_with_wrong_content_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.docx");
        std::fs::write(&path, "plain text pretending").unwrap();

        let err = extract(&config(), &path, Format::Docx).await.unwrap_err();
        assert!(matches!(err, DocShiftError::CorruptInput { .. }));
    }
}
