//! PDF compression and inspection entry points.
//!
//! ```text
//! resolve preset ──▶ load + inspect ──┬─ embedded images ──▶ rasterize
//!   (unknown → moderate)              └─ text only ────────▶ repack
//! ```
//!
//! Rasterising a text-only PDF would make it larger and throw away its
//! text layer, so only documents that already carry raster images are
//! rendered. The image check is done fresh for every request. A rasterised
//! result that is not smaller than the input is discarded in favour of the
//! lossless repack.

use crate::config::{CompressionPreset, EngineConfig};
use crate::error::{DocShiftError, Result};
use crate::output::{
    input_size, write_atomic_async, CompressionReport, CompressionStrategy, DocumentSummary,
};
use crate::pipeline::{inspect, raster, repack};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs compression requests under one [`EngineConfig`].
#[derive(Debug, Clone, Default)]
pub struct Compressor {
    config: EngineConfig,
}

impl Compressor {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Compress `input` into `output` using the preset named `preset_id`.
    ///
    /// An unrecognised identifier is treated as `moderate`; it never fails.
    pub async fn compress(
        &self,
        input: &Path,
        output: &Path,
        preset_id: &str,
    ) -> Result<CompressionReport> {
        let preset = CompressionPreset::resolve(preset_id);
        self.compress_with_preset(input, output, &preset).await
    }

    /// Compress `input` into `output` with an explicit preset.
    ///
    /// # Errors
    /// - `NotFound` when `input` does not exist
    /// - `CorruptInput` when it is not a readable PDF, or a page fails to
    ///   render (no output is written)
    /// - `ExternalToolMissing` when rasterising and PDFium cannot be bound
    pub async fn compress_with_preset(
        &self,
        input: &Path,
        output: &Path,
        preset: &CompressionPreset,
    ) -> Result<CompressionReport> {
        let start = Instant::now();
        info!(
            "Compressing {} with preset '{}' ({} dpi, q{}, ×{})",
            input.display(),
            preset.id,
            preset.dpi,
            preset.jpeg_quality,
            preset.scale
        );

        // ── Step 1: Load and inspect ─────────────────────────────────────
        let input_bytes = input_size(input)?;
        let owned = input.to_path_buf();
        let (doc, has_images) = tokio::task::spawn_blocking(move || {
            let doc = repack::load(&owned)?;
            let has_images = inspect::has_embedded_images(&doc);
            Ok::<_, DocShiftError>((doc, has_images))
        })
        .await
        .map_err(|e| DocShiftError::Internal(format!("inspect task panicked: {e}")))??;
        debug!(has_images, "inspection done");

        // ── Step 2: Rasterise or repack ──────────────────────────────────
        let (strategy, page_count, bytes) = if has_images {
            let (pages, rendered) = raster::rasterize(&self.config, input, preset).await?;
            if (rendered.len() as u64) < input_bytes {
                (CompressionStrategy::Rasterized, pages, rendered)
            } else {
                warn!(
                    rendered = rendered.len(),
                    input_bytes,
                    "rasterised output is not smaller than the input, repacking instead"
                );
                let (pages, bytes) = repack_blocking(doc).await?;
                (CompressionStrategy::Repacked, pages, bytes)
            }
        } else {
            if let Some(cb) = &self.config.progress_callback {
                cb.on_compression_start(doc.get_pages().len());
            }
            let (pages, bytes) = repack_blocking(doc).await?;
            (CompressionStrategy::Repacked, pages, bytes)
        };

        // ── Step 3: Write and report ─────────────────────────────────────
        let output_bytes = write_atomic_async(output.to_path_buf(), bytes).await?;
        let report = CompressionReport {
            preset: preset.id.clone(),
            strategy,
            page_count,
            input_bytes,
            output_bytes,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            "Compressed {} pages ({}): {} → {} bytes in {}ms",
            report.page_count,
            report.strategy,
            report.input_bytes,
            report.output_bytes,
            report.duration_ms
        );

        if let Some(cb) = &self.config.progress_callback {
            cb.on_compression_complete(&report);
        }
        Ok(report)
    }
}

async fn repack_blocking(doc: lopdf::Document) -> Result<(usize, Vec<u8>)> {
    tokio::task::spawn_blocking(move || repack::repack(doc))
        .await
        .map_err(|e| DocShiftError::Internal(format!("repack task panicked: {e}")))?
}

/// Summarise a PDF without rendering it.
pub async fn inspect(path: impl AsRef<Path>) -> Result<DocumentSummary> {
    let path = path.as_ref().to_path_buf();
    tokio::task::spawn_blocking(move || inspect::summarize(&path))
        .await
        .map_err(|e| DocShiftError::Internal(format!("inspect task panicked: {e}")))?
}
