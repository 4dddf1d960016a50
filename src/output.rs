//! Reports returned to callers, and the atomic output writer.
//!
//! Every operation produces exactly one artifact. Bytes are staged in a
//! temporary file inside the destination directory and renamed into place,
//! so a failed operation never leaves a partial file behind.

use crate::error::{DocShiftError, Result};
use crate::format::Format;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Outcome of one document conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionReport {
    pub input_format: Format,
    pub output_format: Format,
    pub output_path: PathBuf,
    /// Characters in the intermediate text.
    pub text_chars: usize,
    pub output_bytes: u64,
    pub duration_ms: u64,
}

/// Which path the compressor took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionStrategy {
    /// Pages were rendered and re-encoded as JPEG.
    Rasterized,
    /// Lossless structural rewrite only.
    Repacked,
}

impl std::fmt::Display for CompressionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            CompressionStrategy::Rasterized => "rasterized",
            CompressionStrategy::Repacked => "repacked",
        })
    }
}

/// Outcome of one compression request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionReport {
    /// Identifier of the preset actually applied (after fallback).
    pub preset: String,
    pub strategy: CompressionStrategy,
    pub page_count: usize,
    pub input_bytes: u64,
    pub output_bytes: u64,
    pub duration_ms: u64,
}

impl CompressionReport {
    /// `output_bytes / input_bytes`; below 1.0 means the file shrank.
    pub fn ratio(&self) -> f64 {
        if self.input_bytes == 0 {
            return 1.0;
        }
        self.output_bytes as f64 / self.input_bytes as f64
    }
}

/// Structural facts about a PDF, gathered without rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub page_count: usize,
    pub pdf_version: String,
    pub is_encrypted: bool,
    pub file_bytes: u64,
    /// 1-indexed pages that carry at least one embedded raster image.
    pub image_pages: Vec<usize>,
}

impl DocumentSummary {
    pub fn has_images(&self) -> bool {
        !self.image_pages.is_empty()
    }
}

/// Outcome of an image-to-PDF or merge request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyReport {
    pub inputs: usize,
    pub page_count: usize,
    pub output_path: PathBuf,
    pub output_bytes: u64,
    pub duration_ms: u64,
}

// ── Atomic writes ────────────────────────────────────────────────────────

/// A temporary file in the same directory as `dest`, ready to be persisted
/// over it. Dropping it without calling [`StagedOutput::commit`] deletes it.
pub(crate) struct StagedOutput {
    tmp: NamedTempFile,
    dest: PathBuf,
}

impl StagedOutput {
    pub(crate) fn new(dest: &Path) -> Result<Self> {
        let dir = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| DocShiftError::write_failed(dest, e))?;
        let tmp = tempfile::Builder::new()
            .prefix(".docshift-")
            .suffix(".part")
            .tempfile_in(&dir)
            .map_err(|e| DocShiftError::write_failed(dest, e))?;
        Ok(Self {
            tmp,
            dest: dest.to_path_buf(),
        })
    }

    /// Path of the staging file, for tools that write by path.
    pub(crate) fn path(&self) -> &Path {
        self.tmp.path()
    }

    pub(crate) fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.tmp
            .write_all(bytes)
            .and_then(|_| self.tmp.flush())
            .map_err(|e| DocShiftError::write_failed(&self.dest, e))
    }

    /// Rename the staging file onto the destination. Returns the final size.
    pub(crate) fn commit(self) -> Result<u64> {
        let dest = self.dest;
        self.tmp
            .persist(&dest)
            .map_err(|e| DocShiftError::write_failed(&dest, e.error))?;
        std::fs::metadata(&dest)
            .map(|m| m.len())
            .map_err(|e| DocShiftError::write_failed(&dest, e))
    }
}

/// Write `bytes` to `dest` atomically. Returns the number of bytes written.
pub(crate) fn write_atomic(dest: &Path, bytes: &[u8]) -> Result<u64> {
    let mut staged = StagedOutput::new(dest)?;
    staged.write_all(bytes)?;
    staged.commit()
}

/// Async wrapper around [`write_atomic`] that owns its buffer.
pub(crate) async fn write_atomic_async(dest: PathBuf, bytes: Vec<u8>) -> Result<u64> {
    tokio::task::spawn_blocking(move || write_atomic(&dest, &bytes))
        .await
        .map_err(|e| DocShiftError::Internal(format!("write task panicked: {e}")))?
}

/// Size of an existing input file; a missing file is `NotFound`.
pub(crate) fn input_size(path: &Path) -> Result<u64> {
    match std::fs::metadata(path) {
        Ok(m) if m.is_file() => Ok(m.len()),
        Ok(_) => Err(DocShiftError::InvalidInput(format!(
            "'{}' is not a regular file",
            path.display()
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(DocShiftError::NotFound {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(DocShiftError::corrupt(path, e)),
    }
}
