//! [`TextModel`] → target document.
//!
//! `txt` is the text itself, `pdf` goes through the built-in layout engine,
//! everything else is written by pandoc from the markdown intermediate.
//! Output is always staged next to the destination and renamed into place
//! on success.

use crate::config::EngineConfig;
use crate::error::{DocShiftError, FormatDirection, Result};
use crate::format::Format;
use crate::output::{write_atomic_async, StagedOutput};
use crate::pipeline::{layout, pandoc};
use crate::text::TextModel;
use std::path::Path;
use tracing::info;

/// Encode `text` as `format` into the file at `dest`. Returns the size of
/// the written file.
pub async fn encode(
    config: &EngineConfig,
    text: &TextModel,
    format: Format,
    dest: &Path,
) -> Result<u64> {
    format.require_output()?;

    let written = match format {
        Format::Txt => {
            write_atomic_async(dest.to_path_buf(), text.as_str().as_bytes().to_vec()).await?
        }
        Format::Pdf => {
            let owned = text.as_str().to_owned();
            let bytes = tokio::task::spawn_blocking(move || layout::render_text_pdf(&owned))
                .await
                .map_err(|e| DocShiftError::Internal(format!("layout task panicked: {e}")))??;
            write_atomic_async(dest.to_path_buf(), bytes).await?
        }
        Format::Docx | Format::Odt | Format::Rtf | Format::Md | Format::Html | Format::Epub => {
            let writer = format
                .pandoc_writer()
                .ok_or_else(|| format.rejected(FormatDirection::Output))?;
            let staged = StagedOutput::new(dest)?;
            pandoc::from_plain(config, text.as_str(), writer, staged.path(), &title_for(dest))
                .await?;
            staged.commit()?
        }
        Format::Png | Format::Jpeg => return Err(format.rejected(FormatDirection::Output)),
    };

    info!(format = %format, bytes = written, dest = %dest.display(), "encoded");
    Ok(written)
}

/// Encode `text` as `format` and return the bytes instead of writing a file.
pub async fn encode_to_bytes(
    config: &EngineConfig,
    text: &TextModel,
    format: Format,
) -> Result<Vec<u8>> {
    format.require_output()?;
    match format {
        Format::Txt => Ok(text.as_str().as_bytes().to_vec()),
        Format::Pdf => layout::render_text_pdf(text.as_str()),
        _ => {
            let dir = tempfile::tempdir()
                .map_err(|e| DocShiftError::Internal(format!("tempdir: {e}")))?;
            let dest = dir.path().join(format!("document.{}", format.extension()));
            encode(config, text, format, &dest).await?;
            tokio::fs::read(&dest)
                .await
                .map_err(|e| DocShiftError::Internal(format!("reading encoded output: {e}")))
        }
    }
}

fn title_for(dest: &Path) -> String {
    dest.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string())
}
