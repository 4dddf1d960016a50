//! # docshift
//!
//! Convert documents between PDF, DOCX, ODT, RTF, Markdown, HTML, EPUB and
//! plain text, and shrink PDFs under a quality preset.
//!
//! ## Pipelines
//!
//! ```text
//! Conversion
//!  ├─ 1. Extract  pdf (pdfium) / docx (zip + XML) / txt / others (pandoc)
//!  ├─ 2. Text     one TextModel, newline-separated
//!  └─ 3. Encode   txt / pdf (built-in A4 layout) / others (pandoc)
//!
//! Compression
//!  ├─ 1. Preset   low / moderate / high (unknown ids → moderate)
//!  ├─ 2. Inspect  does any page carry an embedded raster image?
//!  ├─ 3a. yes →   render (pdfium) → JPEG (concurrent) → one image per page
//!  └─ 3b. no  →   lossless repack (prune, renumber, deflate)
//! ```
//!
//! Two more operations share the PDF plumbing: [`ImageAssembler`] turns
//! PNG/JPEG files into a PDF, and [`Merger`] concatenates PDFs.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docshift::{Compressor, Converter, EngineConfig, Format};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::default();
//!
//!     let report = Converter::new(config.clone())
//!         .convert(Path::new("notes.docx"), Format::Docx, Path::new("notes.pdf"), Format::Pdf)
//!         .await?;
//!     eprintln!("{} chars → {} bytes", report.text_chars, report.output_bytes);
//!
//!     let report = Compressor::new(config)
//!         .compress(Path::new("scan.pdf"), Path::new("scan.small.pdf"), "high")
//!         .await?;
//!     eprintln!("{} ({:.0}% of original)", report.strategy, report.ratio() * 100.0);
//!     Ok(())
//! }
//! ```
//!
//! ## External tools
//!
//! PDF text extraction and rasterisation use the PDFium library; ODT, RTF,
//! Markdown, HTML and EPUB go through the `pandoc` binary. Both are looked
//! up locally first and downloaded into a per-user cache when missing,
//! unless [`EngineConfigBuilder::allow_provisioning`] is turned off.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docshift` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! docshift = { version = "0.2", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod compress;
pub mod config;
pub mod convert;
pub mod error;
pub mod format;
pub mod images;
pub mod merge;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod text;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use compress::{inspect, Compressor};
pub use config::{CompressionPreset, EngineConfig, EngineConfigBuilder};
pub use convert::{convert_sync, Converter};
pub use error::{DocShiftError, ErrorKind, FormatDirection};
pub use format::{Format, IMAGE_FORMATS, INPUT_FORMATS, OUTPUT_FORMATS};
pub use images::ImageAssembler;
pub use merge::Merger;
pub use output::{
    AssemblyReport, CompressionReport, CompressionStrategy, ConversionReport, DocumentSummary,
};
pub use progress::{CompressionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use text::TextModel;
