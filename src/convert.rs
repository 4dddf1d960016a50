//! Document conversion entry points.
//!
//! A conversion is always two steps joined by a [`TextModel`]: extract the
//! source into text, then encode the text into the target format. Both
//! format tags are checked against the capability tables before any tool is
//! started, so an unsupported pair fails without side effects.

use crate::config::EngineConfig;
use crate::error::{DocShiftError, Result};
use crate::format::Format;
use crate::output::ConversionReport;
use crate::pipeline::{encode, extract};
use crate::text::TextModel;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Runs conversions under one [`EngineConfig`].
///
/// Cheap to clone; holds no per-request state.
#[derive(Debug, Clone, Default)]
pub struct Converter {
    config: EngineConfig,
}

impl Converter {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Extract `input`, read as `format`, into text.
    ///
    /// # Errors
    /// - `UnsupportedFormat` when `format` is not an input format
    /// - `NotFound` when `input` does not exist
    /// - `CorruptInput` when the bytes do not parse as `format`
    /// - `ExternalToolMissing` when pandoc is needed and cannot be run
    pub async fn extract(&self, input: &Path, format: Format) -> Result<TextModel> {
        extract::extract(&self.config, input, format).await
    }

    /// Encode `text` as `format` into `output`. Returns the file size.
    pub async fn encode(&self, text: &TextModel, format: Format, output: &Path) -> Result<u64> {
        encode::encode(&self.config, text, format, output).await
    }

    /// Encode `text` as `format` in memory.
    pub async fn encode_to_bytes(&self, text: &TextModel, format: Format) -> Result<Vec<u8>> {
        encode::encode_to_bytes(&self.config, text, format).await
    }

    /// Convert `input` (read as `input_format`) into `output` (written as
    /// `output_format`).
    ///
    /// Exactly one file is produced. On error nothing is left at `output`
    /// and the source is untouched.
    pub async fn convert(
        &self,
        input: &Path,
        input_format: Format,
        output: &Path,
        output_format: Format,
    ) -> Result<ConversionReport> {
        let start = Instant::now();
        info!(
            "Converting {} ({}) → {} ({})",
            input.display(),
            input_format,
            output.display(),
            output_format
        );

        // ── Step 1: Check the pair ───────────────────────────────────────
        input_format.require_input()?;
        output_format.require_output()?;

        // ── Step 2: Extract ──────────────────────────────────────────────
        let text = self.extract(input, input_format).await?;
        debug!(chars = text.char_count(), "intermediate text ready");

        // ── Step 3: Encode ───────────────────────────────────────────────
        let output_bytes = self.encode(&text, output_format, output).await?;

        let report = ConversionReport {
            input_format,
            output_format,
            output_path: output.to_path_buf(),
            text_chars: text.char_count(),
            output_bytes,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            "Converted in {}ms ({} chars, {} bytes)",
            report.duration_ms, report.text_chars, report.output_bytes
        );
        Ok(report)
    }

    /// Convert `input` and return the encoded bytes instead of writing them.
    pub async fn convert_to_bytes(
        &self,
        input: &Path,
        input_format: Format,
        output_format: Format,
    ) -> Result<Vec<u8>> {
        input_format.require_input()?;
        output_format.require_output()?;
        let text = self.extract(input, input_format).await?;
        self.encode_to_bytes(&text, output_format).await
    }
}

/// Synchronous wrapper around [`Converter::convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    config: &EngineConfig,
    input: &Path,
    input_format: Format,
    output: &Path,
    output_format: Format,
) -> Result<ConversionReport> {
    tokio::runtime::Runtime::new()
        .map_err(|e| DocShiftError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(Converter::new(config.clone()).convert(input, input_format, output, output_format))
}
