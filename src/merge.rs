//! PDF merge entry point.

use crate::config::EngineConfig;
use crate::error::{DocShiftError, Result};
use crate::output::{write_atomic, AssemblyReport};
use crate::pipeline::merge::PageCollector;
use crate::pipeline::repack;
use futures::stream::{self, StreamExt, TryStreamExt};
use lopdf::Document;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Concatenates PDFs page by page.
#[derive(Debug, Clone, Default)]
pub struct Merger {
    config: EngineConfig,
}

impl Merger {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Write the pages of every file in `inputs`, in order, to `output`.
    ///
    /// Inputs are parsed concurrently, up to `raster_concurrency` at a time,
    /// and every one is loaded before anything is written. One unreadable
    /// file fails the whole merge with `CorruptInput` naming it.
    pub async fn merge(&self, inputs: &[PathBuf], output: &Path) -> Result<AssemblyReport> {
        let start = Instant::now();
        if inputs.is_empty() {
            return Err(DocShiftError::InvalidInput(
                "at least one PDF is required to merge".to_string(),
            ));
        }
        info!("Merging {} PDFs into {}", inputs.len(), output.display());

        // ── Step 1: Load every input, in order ───────────────────────────
        let concurrency = self.config.raster_concurrency.max(1);
        let sources: Vec<(PathBuf, Document)> = stream::iter(inputs.iter().cloned())
            .map(|path| async move {
                tokio::task::spawn_blocking(move || {
                    let doc = repack::load(&path)?;
                    if doc.is_encrypted() {
                        warn!(path = %path.display(), "merging an encrypted PDF");
                    }
                    Ok::<_, DocShiftError>((path, doc))
                })
                .await
                .map_err(|e| DocShiftError::Internal(format!("load task panicked: {e}")))?
            })
            .buffered(concurrency)
            .try_collect()
            .await?;
        debug!(inputs = sources.len(), concurrency, "inputs loaded");

        // ── Step 2: Copy pages and write ─────────────────────────────────
        let dest = output.to_path_buf();
        let (page_count, output_bytes) = tokio::task::spawn_blocking(move || {
            let mut collector = PageCollector::new();
            for (path, doc) in &sources {
                collector.append(doc, path)?;
            }
            let page_count = collector.page_count();
            let mut merged = collector.into_document();
            repack::finish(&mut merged);
            let bytes = repack::save(&mut merged)?;
            let written = write_atomic(&dest, &bytes)?;
            Ok::<_, DocShiftError>((page_count, written))
        })
        .await
        .map_err(|e| DocShiftError::Internal(format!("merge task panicked: {e}")))??;

        let report = AssemblyReport {
            inputs: inputs.len(),
            page_count,
            output_path: output.to_path_buf(),
            output_bytes,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            "Merged {} pages ({} bytes) in {}ms",
            report.page_count, report.output_bytes, report.duration_ms
        );
        Ok(report)
    }
}
