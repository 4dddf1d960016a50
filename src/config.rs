//! Engine configuration and compression presets.
//!
//! Every operation is driven by an explicit [`EngineConfig`] passed to the
//! component at construction; there is no process-global state. Build one
//! with [`EngineConfig::builder()`] or take [`EngineConfig::default()`].

use crate::error::DocShiftError;
use crate::progress::{CompressionProgressCallback, ProgressCallback};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tool_auto::ToolCache;
use tracing::warn;

/// Configuration shared by the converter, compressor, image assembler and
/// merger.
///
/// # Example
/// ```rust
/// use docshift::EngineConfig;
///
/// let config = EngineConfig::builder()
///     .raster_concurrency(4)
///     .allow_provisioning(false)
///     .build()
///     .unwrap();
/// assert_eq!(config.raster_concurrency, 4);
/// ```
#[derive(Clone)]
pub struct EngineConfig {
    /// Explicit pandoc binary. When `None`, the tool cache and then `PATH`
    /// are searched.
    pub pandoc_path: Option<PathBuf>,

    /// Explicit PDFium shared library. When `None`, resolution falls back to
    /// the tool cache, the system library, then a download.
    pub pdfium_path: Option<PathBuf>,

    /// Where provisioned tools live. Default: the platform cache directory
    /// (`~/.cache/docshift` on Linux).
    pub tool_cache_dir: Option<PathBuf>,

    /// Permit the single download-and-retry recovery step when a tool is
    /// missing. Default: true.
    pub allow_provisioning: bool,

    /// Maximum number of pages JPEG-encoded at once while rasterizing.
    /// Default: available parallelism.
    pub raster_concurrency: usize,

    /// Receives per-page compression events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pandoc_path: None,
            pdfium_path: None,
            tool_cache_dir: None,
            allow_provisioning: true,
            raster_concurrency: default_concurrency(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("pandoc_path", &self.pandoc_path)
            .field("pdfium_path", &self.pdfium_path)
            .field("tool_cache_dir", &self.tool_cache_dir)
            .field("allow_provisioning", &self.allow_provisioning)
            .field("raster_concurrency", &self.raster_concurrency)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn CompressionProgressCallback>"),
            )
            .finish()
    }
}

impl EngineConfig {
    /// Create a new builder for `EngineConfig`.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder {
            config: Self::default(),
        }
    }

    /// The tool cache this configuration points at.
    pub fn tool_cache(&self) -> ToolCache {
        match &self.tool_cache_dir {
            Some(dir) => ToolCache::new(dir),
            None => ToolCache::default_location(),
        }
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Builder for [`EngineConfig`].
#[derive(Debug)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn pandoc_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pandoc_path = Some(path.into());
        self
    }

    pub fn pdfium_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_path = Some(path.into());
        self
    }

    pub fn tool_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.tool_cache_dir = Some(dir.into());
        self
    }

    pub fn allow_provisioning(mut self, v: bool) -> Self {
        self.config.allow_provisioning = v;
        self
    }

    pub fn raster_concurrency(mut self, n: usize) -> Self {
        self.config.raster_concurrency = n.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn CompressionProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<EngineConfig, DocShiftError> {
        let c = &self.config;
        if c.raster_concurrency == 0 {
            return Err(DocShiftError::InvalidConfig(
                "raster concurrency must be at least 1".into(),
            ));
        }
        if let Some(p) = &c.pandoc_path {
            if p.as_os_str().is_empty() {
                return Err(DocShiftError::InvalidConfig(
                    "pandoc path must not be empty".into(),
                ));
            }
        }
        if let Some(p) = &c.pdfium_path {
            if p.as_os_str().is_empty() {
                return Err(DocShiftError::InvalidConfig(
                    "pdfium path must not be empty".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

// ── Compression presets ──────────────────────────────────────────────────

/// Lowest and highest raster DPI a preset may use.
pub const MIN_DPI: u32 = 36;
pub const MAX_DPI: u32 = 600;

/// Parameters for the rasterizing compressor.
///
/// Builtins trade size against fidelity monotonically: moving from `low` to
/// `high` lowers DPI, scale and JPEG quality together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionPreset {
    pub id: String,
    pub dpi: u32,
    /// JPEG quality, 1–100.
    pub jpeg_quality: u8,
    /// Page scale factor applied on top of DPI, in (0, 1].
    pub scale: f32,
}

impl CompressionPreset {
    pub const LOW: &'static str = "low";
    pub const MODERATE: &'static str = "moderate";
    pub const HIGH: &'static str = "high";

    /// Builtin identifiers, least to most aggressive.
    pub const BUILTIN_IDS: [&'static str; 3] = [Self::LOW, Self::MODERATE, Self::HIGH];

    pub fn low() -> Self {
        Self::builtin(Self::LOW, 150, 80, 1.0)
    }

    pub fn moderate() -> Self {
        Self::builtin(Self::MODERATE, 120, 60, 0.85)
    }

    pub fn high() -> Self {
        Self::builtin(Self::HIGH, 90, 40, 0.7)
    }

    fn builtin(id: &str, dpi: u32, jpeg_quality: u8, scale: f32) -> Self {
        Self {
            id: id.to_string(),
            dpi,
            jpeg_quality,
            scale,
        }
    }

    /// Look up a builtin preset by identifier (case-insensitive).
    pub fn builtin_by_id(id: &str) -> Option<Self> {
        match id.trim().to_ascii_lowercase().as_str() {
            Self::LOW => Some(Self::low()),
            Self::MODERATE => Some(Self::moderate()),
            Self::HIGH => Some(Self::high()),
            _ => None,
        }
    }

    /// Resolve a preset identifier. Unknown identifiers fall back to
    /// `moderate`; this never fails.
    pub fn resolve(id: &str) -> Self {
        Self::builtin_by_id(id).unwrap_or_else(|| {
            warn!(preset = id, "unknown compression preset, using moderate");
            Self::moderate()
        })
    }

    /// A caller-defined preset. Quality is clamped to 1–100; DPI and scale
    /// outside their ranges are rejected.
    pub fn custom(
        id: impl Into<String>,
        dpi: u32,
        jpeg_quality: u8,
        scale: f32,
    ) -> Result<Self, DocShiftError> {
        if !(MIN_DPI..=MAX_DPI).contains(&dpi) {
            return Err(DocShiftError::InvalidConfig(format!(
                "preset DPI must be {MIN_DPI}–{MAX_DPI}, got {dpi}"
            )));
        }
        if !(scale > 0.0 && scale <= 1.0) {
            return Err(DocShiftError::InvalidConfig(format!(
                "preset scale must be in (0, 1], got {scale}"
            )));
        }
        Ok(Self {
            id: id.into(),
            dpi,
            jpeg_quality: jpeg_quality.clamp(1, 100),
            scale,
        })
    }

    /// Render matrix factor: points to pixels.
    pub fn render_factor(&self) -> f32 {
        (self.dpi as f32 / 72.0) * self.scale
    }
}

impl Default for CompressionPreset {
    fn default() -> Self {
        Self::moderate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let c = EngineConfig::builder().build().unwrap();
        assert!(c.allow_provisioning);
        assert!(c.raster_concurrency >= 1);
        assert!(c.pandoc_path.is_none());
    }

    #[test]
    fn builder_clamps_concurrency() {
        let c = EngineConfig::builder().raster_concurrency(0).build().unwrap();
        assert_eq!(c.raster_concurrency, 1);
    }

    #[test]
    fn empty_tool_path_is_rejected() {
        let err = EngineConfig::builder().pandoc_path("").build().unwrap_err();
        assert!(matches!(err, DocShiftError::InvalidConfig(_)));
    }

    #[test]
    fn explicit_cache_dir_is_used() {
        let c = EngineConfig::builder()
            .tool_cache_dir("/tmp/docshift-cache")
            .build()
            .unwrap();
        assert_eq!(c.tool_cache().root(), std::path::Path::new("/tmp/docshift-cache"));
    }

    #[test]
    fn builtins_are_monotonic() {
        let (l, m, h) = (
            CompressionPreset::low(),
            CompressionPreset::moderate(),
            CompressionPreset::high(),
        );
        assert!(l.dpi > m.dpi && m.dpi > h.dpi);
        assert!(l.jpeg_quality > m.jpeg_quality && m.jpeg_quality > h.jpeg_quality);
        assert!(l.scale > m.scale && m.scale > h.scale);
    }

    #[test]
    fn unknown_preset_resolves_to_moderate() {
        assert_eq!(CompressionPreset::resolve("bogus-preset"), CompressionPreset::moderate());
        assert_eq!(CompressionPreset::resolve(""), CompressionPreset::moderate());
        assert_eq!(CompressionPreset::resolve("HIGH"), CompressionPreset::high());
    }

    #[test]
    fn custom_preset_validation() {
        let p = CompressionPreset::custom("mine", 200, 0, 0.5).unwrap();
        assert_eq!(p.jpeg_quality, 1);
        assert!(CompressionPreset::custom("x", 10, 50, 0.5).is_err());
        assert!(CompressionPreset::custom("x", 100, 50, 0.0).is_err());
        assert!(CompressionPreset::custom("x", 100, 50, 1.5).is_err());
    }

    #[test]
    fn render_factor() {
        let p = CompressionPreset::low();
        assert!((p.render_factor() - 150.0 / 72.0).abs() < 1e-6);
    }
}
