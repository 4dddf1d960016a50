//! PDFium-backed stages: page text extraction and page rasterisation.
//!
//! `pdfium-render` wraps the PDFium C++ library, which keeps thread-local
//! state and must not be driven from async tasks. Everything here runs
//! inside `tokio::task::spawn_blocking`. Rasterised pages leave the
//! blocking thread through a bounded channel so encoding can start before
//! the last page is rendered.

use crate::config::{CompressionPreset, EngineConfig};
use crate::error::{DocShiftError, Result};
use crate::progress::ProgressCallback;
use image::RgbImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// One rendered page. `index` is 0-based and travels with the pixels so
/// out-of-order encoding can be put back in order.
pub(crate) struct RasterPage {
    pub index: usize,
    pub total: usize,
    pub image: RgbImage,
}

/// Bind PDFium according to `config`. Blocking: may download the library.
pub(crate) fn bind(config: &EngineConfig) -> Result<Pdfium> {
    let cache = config.tool_cache();
    let pdfium = tool_auto::bind_pdfium(
        config.pdfium_path.as_deref(),
        &cache,
        config.allow_provisioning,
    )?;
    Ok(pdfium)
}

fn open<'a>(pdfium: &'a Pdfium, path: &Path) -> Result<PdfDocument<'a>> {
    pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| DocShiftError::corrupt(path, format!("{e:?}")))
}

/// Text of every page, in page order.
pub(crate) async fn page_texts(config: &EngineConfig, path: &Path) -> Result<Vec<String>> {
    let config = config.clone();
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || page_texts_blocking(&config, &path))
        .await
        .map_err(|e| DocShiftError::Internal(format!("text task panicked: {e}")))?
}

fn page_texts_blocking(config: &EngineConfig, path: &Path) -> Result<Vec<String>> {
    let pdfium = bind(config)?;
    let document = open(&pdfium, path)?;

    let mut texts = Vec::new();
    for (idx, page) in document.pages().iter().enumerate() {
        let text = page
            .text()
            .map_err(|e| DocShiftError::corrupt(path, format!("page {}: {e:?}", idx + 1)))?;
        texts.push(text.all());
    }
    debug!(pages = texts.len(), "extracted PDF text");
    Ok(texts)
}

/// Start rendering every page of `path` at the preset's matrix.
///
/// Pages arrive on the returned receiver in page order. The join handle
/// resolves to the page count, or to the first failure. Dropping the
/// receiver stops rendering after the current page.
pub(crate) fn spawn_render(
    config: &EngineConfig,
    path: &Path,
    preset: &CompressionPreset,
    buffer: usize,
) -> (
    mpsc::Receiver<RasterPage>,
    tokio::task::JoinHandle<Result<usize>>,
) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    let config = config.clone();
    let path: PathBuf = path.to_path_buf();
    let factor = preset.render_factor();
    let handle = tokio::task::spawn_blocking(move || {
        let progress = config.progress_callback.clone();
        render_blocking(&config, &path, factor, &tx, progress.as_ref())
    });
    (rx, handle)
}

fn render_blocking(
    config: &EngineConfig,
    path: &Path,
    factor: f32,
    tx: &mpsc::Sender<RasterPage>,
    progress: Option<&ProgressCallback>,
) -> Result<usize> {
    let pdfium = bind(config)?;
    let document = open(&pdfium, path)?;
    let pages = document.pages();
    let total = pages.len() as usize;
    info!(pages = total, factor, "rasterising");

    if let Some(cb) = progress {
        cb.on_compression_start(total);
    }

    let render_config = PdfRenderConfig::new().scale_page_by_factor(factor);

    for (index, page) in pages.iter().enumerate() {
        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            DocShiftError::corrupt(path, format!("page {} failed to render: {e:?}", index + 1))
        })?;
        let image = bitmap.as_image().to_rgb8();
        debug!(
            page = index + 1,
            width = image.width(),
            height = image.height(),
            "rendered"
        );

        if let Some(cb) = progress {
            cb.on_page_rendered(index + 1, total);
        }

        if tx.blocking_send(RasterPage { index, total, image }).is_err() {
            debug!("render consumer dropped, stopping");
            break;
        }
    }

    Ok(total)
}
