//! Error types for the docshift library.
//!
//! Every failure surfaces as one [`DocShiftError`]. Four variants form the
//! core taxonomy callers are expected to branch on:
//!
//! * [`DocShiftError::UnsupportedFormat`]: the format tag is outside the
//!   declared input or output set. Always a client error; never retried.
//! * [`DocShiftError::ExternalToolMissing`]: pandoc or PDFium could not be
//!   found, even after the single provisioning attempt.
//! * [`DocShiftError::CorruptInput`]: the source could not be parsed or
//!   rendered.
//! * [`DocShiftError::EncodingFailure`]: writing the target format failed
//!   partway; the partial artifact has already been discarded.
//!
//! [`DocShiftError::kind`] maps every variant onto a stable [`ErrorKind`]
//! whose snake_case name is the structured failure reason shown to users.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the docshift library.
#[derive(Debug, Error)]
pub enum DocShiftError {
    // ── Taxonomy ──────────────────────────────────────────────────────────
    /// A format tag outside the accepted set for this direction.
    #[error("Unsupported {direction} format '{format}'\nSupported: {supported}")]
    UnsupportedFormat {
        format: String,
        direction: FormatDirection,
        supported: String,
    },

    /// The delegated converter or rendering engine is unavailable.
    #[error(
        "External tool '{tool}' is not available: {detail}\n\
Install it, point docshift at an existing copy, or allow the automatic download."
    )]
    ExternalToolMissing { tool: String, detail: String },

    /// The source exists but cannot be parsed.
    #[error("Cannot read '{path}': {detail}")]
    CorruptInput { path: PathBuf, detail: String },

    /// Serialising the target format failed.
    #[error("Failed to encode {format}: {detail}")]
    EncodingFailure { format: String, detail: String },

    // ── Input / output ────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    NotFound { path: PathBuf },

    /// The request itself is malformed (e.g. no images to assemble).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Could not create, write or move the output file into place.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Which side of a conversion a format tag was offered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatDirection {
    Input,
    Output,
    Image,
}

impl fmt::Display for FormatDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FormatDirection::Input => "input",
            FormatDirection::Output => "output",
            FormatDirection::Image => "image",
        })
    }
}

/// Machine-readable failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnsupportedFormat,
    ExternalToolMissing,
    CorruptInput,
    EncodingFailure,
    Io,
    InvalidInput,
    InvalidConfig,
    Internal,
}

impl ErrorKind {
    /// Stable snake_case identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::UnsupportedFormat => "unsupported_format",
            ErrorKind::ExternalToolMissing => "external_tool_missing",
            ErrorKind::CorruptInput => "corrupt_input",
            ErrorKind::EncodingFailure => "encoding_failure",
            ErrorKind::Io => "io",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::InvalidConfig => "invalid_config",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DocShiftError {
    /// The failure category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DocShiftError::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            DocShiftError::ExternalToolMissing { .. } => ErrorKind::ExternalToolMissing,
            DocShiftError::CorruptInput { .. } => ErrorKind::CorruptInput,
            DocShiftError::EncodingFailure { .. } => ErrorKind::EncodingFailure,
            DocShiftError::NotFound { .. } | DocShiftError::OutputWriteFailed { .. } => {
                ErrorKind::Io
            }
            DocShiftError::InvalidInput(_) => ErrorKind::InvalidInput,
            DocShiftError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            DocShiftError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, detail: impl fmt::Display) -> Self {
        DocShiftError::CorruptInput {
            path: path.into(),
            detail: detail.to_string(),
        }
    }

    pub(crate) fn encoding(format: impl fmt::Display, detail: impl fmt::Display) -> Self {
        DocShiftError::EncodingFailure {
            format: format.to_string(),
            detail: detail.to_string(),
        }
    }

    pub(crate) fn write_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DocShiftError::OutputWriteFailed {
            path: path.into(),
            source,
        }
    }
}

impl From<tool_auto::ToolAutoError> for DocShiftError {
    fn from(e: tool_auto::ToolAutoError) -> Self {
        use tool_auto::ToolAutoError as E;
        let tool = match &e {
            E::UnsupportedPlatform { tool, .. }
            | E::NotInstalled { tool }
            | E::CacheDir { tool, .. }
            | E::Download { tool, .. }
            | E::Extract { tool, .. } => tool.name(),
            E::Bind { .. } => tool_auto::Tool::Pdfium.name(),
        };
        DocShiftError::ExternalToolMissing {
            tool: tool.to_string(),
            detail: e.to_string(),
        }
    }
}

/// Shorthand used throughout the crate.
pub type Result<T, E = DocShiftError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_format_display() {
        let e = DocShiftError::UnsupportedFormat {
            format: "xlsx".into(),
            direction: FormatDirection::Input,
            supported: "pdf, docx".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("input format 'xlsx'"), "got: {msg}");
        assert!(msg.contains("pdf, docx"));
        assert_eq!(e.kind(), ErrorKind::UnsupportedFormat);
    }

    #[test]
    fn kind_names_are_snake_case() {
        assert_eq!(ErrorKind::ExternalToolMissing.as_str(), "external_tool_missing");
        let json = serde_json::to_string(&ErrorKind::CorruptInput).unwrap();
        assert_eq!(json, "\"corrupt_input\"");
    }

    #[test]
    fn io_variants_share_a_kind() {
        let nf = DocShiftError::NotFound {
            path: "/nope".into(),
        };
        let wf = DocShiftError::write_failed(
            "/out",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(nf.kind(), ErrorKind::Io);
        assert_eq!(wf.kind(), ErrorKind::Io);
    }

    #[test]
    fn tool_errors_become_tool_missing() {
        let e: DocShiftError = tool_auto::ToolAutoError::NotInstalled {
            tool: tool_auto::Tool::Pandoc,
        }
        .into();
        assert_eq!(e.kind(), ErrorKind::ExternalToolMissing);
        assert!(e.to_string().contains("pandoc"));
    }

    #[test]
    fn failed_download_names_the_tool() {
        let e: DocShiftError = tool_auto::ToolAutoError::Download {
            tool: tool_auto::Tool::Pdfium,
            reason: "GET https://example.invalid/pdfium-linux-x64.tgz: blocked".into(),
        }
        .into();
        match e {
            DocShiftError::ExternalToolMissing { tool, detail } => {
                assert_eq!(tool, "pdfium");
                assert!(detail.contains("blocked"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
