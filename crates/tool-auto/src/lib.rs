//! # tool-auto
//!
//! Locate, download and cache the external tools `docshift` delegates to:
//!
//! * **pandoc**: the general-purpose document converter used for ODT, RTF,
//!   Markdown, HTML, EPUB and DOCX output.
//! * **PDFium**: the rendering engine bound through `pdfium-render`.
//!
//! ## How it works
//!
//! On a call to [`ToolCache::ensure`]:
//!
//! 1. Checks `{cache}/{tool}-{VERSION}/` for the platform binary.
//! 2. If absent, takes the per-tool install lock and checks again (another
//!    thread may have finished the download while we waited).
//! 3. Downloads the release archive for the current platform.
//! 4. Extracts the single binary into a temporary file next to its final
//!    location, marks it executable, and renames it into place.
//!
//! The rename is the only step that makes the binary visible, so a reader can
//! never observe (or execute) a partially written file.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tool_auto::{Tool, ToolCache};
//!
//! let cache = ToolCache::default_location();
//! let pandoc = cache.ensure(Tool::Pandoc, None).expect("pandoc unavailable");
//! println!("pandoc at {}", pandoc.display());
//! ```
//!
//! ## Platform support
//!
//! | OS      | Arch    | pandoc asset                    | PDFium asset            |
//! |---------|---------|---------------------------------|-------------------------|
//! | macOS   | arm64   | `pandoc-{V}-arm64-macOS.zip`    | `pdfium-mac-arm64.tgz`  |
//! | macOS   | x86_64  | `pandoc-{V}-x86_64-macOS.zip`   | `pdfium-mac-x64.tgz`    |
//! | Linux   | x86_64  | `pandoc-{V}-linux-amd64.tar.gz` | `pdfium-linux-x64.tgz`  |
//! | Linux   | aarch64 | `pandoc-{V}-linux-arm64.tar.gz` | `pdfium-linux-arm64.tgz`|
//! | Windows | x86_64  | `pandoc-{V}-windows-x86_64.zip` | `pdfium-win-x64.tgz`    |

use std::fmt;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use pdfium_render::prelude::Pdfium;
use thiserror::Error;
use tracing::{debug, info, warn};

// ── Public constants ─────────────────────────────────────────────────────────

/// The pdfium-binaries release tag used for downloads.
pub const PDFIUM_VERSION: &str = "7690";

/// The pandoc release used for downloads.
pub const PANDOC_VERSION: &str = "3.6.4";

const PDFIUM_BASE_URL: &str = "https://github.com/bblanchon/pdfium-binaries/releases/download";
const PANDOC_BASE_URL: &str = "https://github.com/jgm/pandoc/releases/download";

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by tool-auto operations.
#[derive(Error, Debug)]
pub enum ToolAutoError {
    /// The current OS/architecture combination has no published binary.
    #[error("No {tool} binary is published for {os}/{arch}")]
    UnsupportedPlatform {
        tool: Tool,
        os: String,
        arch: String,
    },

    /// The tool is not installed and downloading was not permitted.
    #[error("{tool} is not installed and automatic download is disabled")]
    NotInstalled { tool: Tool },

    /// Could not create or write inside the local cache directory.
    #[error("Cache directory error while installing {tool}: {source}")]
    CacheDir {
        tool: Tool,
        #[source]
        source: std::io::Error,
    },

    /// Network download failed.
    #[error("Download of {tool} failed: {reason}")]
    Download { tool: Tool, reason: String },

    /// gzip/tar/zip extraction failed.
    #[error("Extracting {tool} failed: {reason}")]
    Extract { tool: Tool, reason: String },

    /// `pdfium-render` could not load the library.
    #[error("Failed to bind PDFium from '{path}': {reason}")]
    Bind { path: PathBuf, reason: String },
}

// ── Tools ────────────────────────────────────────────────────────────────────

/// An external tool that can be provisioned on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    /// The pandoc command-line converter.
    Pandoc,
    /// The PDFium shared library.
    Pdfium,
}

impl Tool {
    /// Short lowercase name, used for cache directory names.
    pub fn name(self) -> &'static str {
        match self {
            Tool::Pandoc => "pandoc",
            Tool::Pdfium => "pdfium",
        }
    }

    /// Release version downloaded for this tool.
    pub fn version(self) -> &'static str {
        match self {
            Tool::Pandoc => PANDOC_VERSION,
            Tool::Pdfium => PDFIUM_VERSION,
        }
    }

    fn install_lock(self) -> &'static Mutex<()> {
        static PANDOC_LOCK: Mutex<()> = Mutex::new(());
        static PDFIUM_LOCK: Mutex<()> = Mutex::new(());
        match self {
            Tool::Pandoc => &PANDOC_LOCK,
            Tool::Pdfium => &PDFIUM_LOCK,
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Internal: platform metadata ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveKind {
    TarGz,
    Zip,
}

struct PlatformAsset {
    tool: Tool,
    /// Asset filename in the GitHub release.
    archive_name: String,
    archive_kind: ArchiveKind,
    /// Trailing path components of the binary inside the archive.
    member_suffix: &'static str,
    /// Filename to write on disk.
    file_name: &'static str,
}

fn detect_platform(tool: Tool) -> Result<PlatformAsset, ToolAutoError> {
    platform_asset(tool, std::env::consts::OS, std::env::consts::ARCH)
}

fn platform_asset(tool: Tool, os: &str, arch: &str) -> Result<PlatformAsset, ToolAutoError> {
    let unsupported = || ToolAutoError::UnsupportedPlatform {
        tool,
        os: os.to_string(),
        arch: arch.to_string(),
    };

    match tool {
        Tool::Pdfium => {
            let (archive, member, file_name) = match (os, arch) {
                ("macos", "aarch64") => ("pdfium-mac-arm64.tgz", "lib/libpdfium.dylib", "libpdfium.dylib"),
                ("macos", "x86_64") => ("pdfium-mac-x64.tgz", "lib/libpdfium.dylib", "libpdfium.dylib"),
                ("linux", "x86_64") => ("pdfium-linux-x64.tgz", "lib/libpdfium.so", "libpdfium.so"),
                ("linux", "aarch64") => ("pdfium-linux-arm64.tgz", "lib/libpdfium.so", "libpdfium.so"),
                ("windows", "x86_64") => ("pdfium-win-x64.tgz", "bin/pdfium.dll", "pdfium.dll"),
                ("windows", "aarch64") => ("pdfium-win-arm64.tgz", "bin/pdfium.dll", "pdfium.dll"),
                _ => return Err(unsupported()),
            };
            Ok(PlatformAsset {
                tool,
                archive_name: archive.to_string(),
                archive_kind: ArchiveKind::TarGz,
                member_suffix: member,
                file_name,
            })
        }
        Tool::Pandoc => {
            let v = PANDOC_VERSION;
            let (archive, kind, member, file_name) = match (os, arch) {
                ("linux", "x86_64") => (
                    format!("pandoc-{v}-linux-amd64.tar.gz"),
                    ArchiveKind::TarGz,
                    "bin/pandoc",
                    "pandoc",
                ),
                ("linux", "aarch64") => (
                    format!("pandoc-{v}-linux-arm64.tar.gz"),
                    ArchiveKind::TarGz,
                    "bin/pandoc",
                    "pandoc",
                ),
                ("macos", "aarch64") => (
                    format!("pandoc-{v}-arm64-macOS.zip"),
                    ArchiveKind::Zip,
                    "bin/pandoc",
                    "pandoc",
                ),
                ("macos", "x86_64") => (
                    format!("pandoc-{v}-x86_64-macOS.zip"),
                    ArchiveKind::Zip,
                    "bin/pandoc",
                    "pandoc",
                ),
                ("windows", "x86_64") => (
                    format!("pandoc-{v}-windows-x86_64.zip"),
                    ArchiveKind::Zip,
                    "pandoc.exe",
                    "pandoc.exe",
                ),
                _ => return Err(unsupported()),
            };
            Ok(PlatformAsset {
                tool,
                archive_name: archive,
                archive_kind: kind,
                member_suffix: member,
                file_name,
            })
        }
    }
}

fn download_url(tool: Tool, asset: &PlatformAsset) -> String {
    match tool {
        Tool::Pdfium => format!(
            "{}/chromium%2F{}/{}",
            PDFIUM_BASE_URL, PDFIUM_VERSION, asset.archive_name
        ),
        Tool::Pandoc => format!(
            "{}/{}/{}",
            PANDOC_BASE_URL, PANDOC_VERSION, asset.archive_name
        ),
    }
}

// ── Cache ────────────────────────────────────────────────────────────────────

/// A directory holding provisioned tool binaries, one subdirectory per
/// tool and version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCache {
    root: PathBuf,
}

impl ToolCache {
    /// Use `root` as the cache directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The platform cache directory:
    /// - **macOS**: `~/Library/Caches/docshift/`
    /// - **Linux**: `~/.cache/docshift/`
    /// - **Windows**: `%LOCALAPPDATA%\docshift\`
    pub fn default_location() -> Self {
        let base = dirs::cache_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
            .unwrap_or_else(std::env::temp_dir);
        Self::new(base.join("docshift"))
    }

    /// The cache root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Per-version directory for `tool`.
    pub fn tool_dir(&self, tool: Tool) -> PathBuf {
        self.root.join(format!("{}-{}", tool.name(), tool.version()))
    }

    /// Returns the on-disk path to `tool`, or `None` if not cached.
    pub fn cached_path(&self, tool: Tool) -> Option<PathBuf> {
        let asset = detect_platform(tool).ok()?;
        let p = self.tool_dir(tool).join(asset.file_name);
        p.is_file().then_some(p)
    }

    /// Returns `true` if `tool` is already cached (no network access needed).
    pub fn is_cached(&self, tool: Tool) -> bool {
        self.cached_path(tool).is_some()
    }

    /// Ensures `tool` is present in the cache, downloading it if required.
    ///
    /// `on_progress` receives `(bytes_downloaded, total_size_option)` during
    /// the download. Pass `None` to suppress progress callbacks.
    ///
    /// # Thread safety
    ///
    /// Concurrent callers for the same tool are serialised on a process-wide
    /// lock; at most one download runs and the others reuse its result.
    pub fn ensure(
        &self,
        tool: Tool,
        on_progress: Option<&dyn Fn(u64, Option<u64>)>,
    ) -> Result<PathBuf, ToolAutoError> {
        if let Some(path) = self.cached_path(tool) {
            return Ok(path);
        }

        let _guard = tool
            .install_lock()
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Another caller may have installed it while we waited.
        if let Some(path) = self.cached_path(tool) {
            debug!(%tool, "installed by a concurrent caller");
            return Ok(path);
        }

        let asset = detect_platform(tool)?;
        let dir = self.tool_dir(tool);
        std::fs::create_dir_all(&dir)
            .map_err(|source| ToolAutoError::CacheDir { tool, source })?;

        let url = download_url(tool, &asset);
        info!(%tool, %url, "downloading");
        let archive = download_bytes(tool, &url, on_progress)?;

        let dest = dir.join(asset.file_name);
        install_member(&archive, &asset, &dest)?;
        info!(%tool, path = %dest.display(), "installed");

        Ok(dest)
    }
}

impl Default for ToolCache {
    fn default() -> Self {
        Self::default_location()
    }
}

// ── PDFium binding ───────────────────────────────────────────────────────────

/// Binds to PDFium, trying in order: `explicit`, the cache, the system
/// library, and (when `allow_download` is set) a fresh download.
pub fn bind_pdfium(
    explicit: Option<&Path>,
    cache: &ToolCache,
    allow_download: bool,
) -> Result<Pdfium, ToolAutoError> {
    if let Some(path) = explicit {
        return bind_pdfium_from_path(path);
    }

    if let Some(path) = cache.cached_path(Tool::Pdfium) {
        return bind_pdfium_from_path(&path);
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => return Ok(Pdfium::new(bindings)),
        Err(e) => debug!("no system pdfium: {e}"),
    }

    if !allow_download {
        return Err(ToolAutoError::NotInstalled { tool: Tool::Pdfium });
    }

    let path = cache.ensure(Tool::Pdfium, None)?;
    bind_pdfium_from_path(&path)
}

/// Binds to a PDFium library at an explicit `path`.
///
/// Does not interact with the download / cache layer.
pub fn bind_pdfium_from_path(path: &Path) -> Result<Pdfium, ToolAutoError> {
    Pdfium::bind_to_library(path)
        .map(Pdfium::new)
        .map_err(|e| ToolAutoError::Bind {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

// ── Internal helpers ─────────────────────────────────────────────────────────

/// Streams a URL into a `Vec<u8>`, calling `on_progress` every 64 KiB.
fn download_bytes(
    tool: Tool,
    url: &str,
    on_progress: Option<&dyn Fn(u64, Option<u64>)>,
) -> Result<Vec<u8>, ToolAutoError> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("tool-auto/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| ToolAutoError::Download {
            tool,
            reason: e.to_string(),
        })?;

    let response = client
        .get(url)
        .send()
        .map_err(|e| ToolAutoError::Download {
            tool,
            reason: format!("GET {url}: {e}"),
        })?;

    if !response.status().is_success() {
        return Err(ToolAutoError::Download {
            tool,
            reason: format!("HTTP {} for {url}", response.status()),
        });
    }

    let total = response.content_length();
    let capacity = total.unwrap_or(35 * 1024 * 1024) as usize;
    let mut buf = Vec::with_capacity(capacity);

    let mut stream = response;
    let mut chunk = vec![0u8; 64 * 1024];
    let mut downloaded: u64 = 0;

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                downloaded += n as u64;
                if let Some(cb) = on_progress {
                    cb(downloaded, total);
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(ToolAutoError::Download {
                    tool,
                    reason: format!("Read error: {e}"),
                });
            }
        }
    }

    Ok(buf)
}

/// Extracts the asset's binary from `archive` and atomically installs it at
/// `dest`.
fn install_member(archive: &[u8], asset: &PlatformAsset, dest: &Path) -> Result<(), ToolAutoError> {
    let tool = asset.tool;
    let extract = |reason: String| ToolAutoError::Extract { tool, reason };
    let cache_dir = |source: std::io::Error| ToolAutoError::CacheDir { tool, source };

    let dir = dest
        .parent()
        .ok_or_else(|| extract(format!("no parent for {}", dest.display())))?;
    let mut staged = tempfile::NamedTempFile::new_in(dir).map_err(cache_dir)?;

    let found = match asset.archive_kind {
        ArchiveKind::TarGz => copy_tar_member(archive, asset.member_suffix, staged.as_file_mut()),
        ArchiveKind::Zip => copy_zip_member(archive, asset.member_suffix, staged.as_file_mut()),
    }
    .map_err(extract)?;
    if !found {
        return Err(extract(format!(
            "'{}' not found in {}",
            asset.member_suffix, asset.archive_name
        )));
    }

    staged.as_file_mut().flush().map_err(cache_dir)?;
    make_executable(staged.path()).map_err(cache_dir)?;

    // A concurrent process may have won the race; its file is equally valid.
    if let Err(e) = staged.persist(dest) {
        if dest.is_file() {
            warn!(path = %dest.display(), "already installed by another process");
            return Ok(());
        }
        return Err(cache_dir(e.error));
    }
    Ok(())
}

fn copy_tar_member(
    archive_bytes: &[u8],
    suffix: &str,
    out: &mut std::fs::File,
) -> Result<bool, String> {
    use flate2::read::GzDecoder;
    use tar::Archive;

    let mut archive = Archive::new(GzDecoder::new(archive_bytes));
    let entries = archive.entries().map_err(|e| e.to_string())?;

    for entry in entries {
        let mut entry = entry.map_err(|e| e.to_string())?;
        let is_match = entry.path().map_err(|e| e.to_string())?.ends_with(suffix);
        if is_match {
            std::io::copy(&mut entry, out).map_err(|e| format!("Unpack failed: {e}"))?;
            return Ok(true);
        }
    }
    Ok(false)
}

fn copy_zip_member(
    archive_bytes: &[u8],
    suffix: &str,
    out: &mut std::fs::File,
) -> Result<bool, String> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(archive_bytes))
        .map_err(|e| e.to_string())?;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i).map_err(|e| e.to_string())?;
        let is_match = file
            .enclosed_name()
            .is_some_and(|name| name.ends_with(suffix));
        if is_match {
            std::io::copy(&mut file, out).map_err(|e| format!("Unpack failed: {e}"))?;
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
