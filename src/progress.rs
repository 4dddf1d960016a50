//! Progress-callback trait for per-page compression events.
//!
//! Inject an [`Arc<dyn CompressionProgressCallback>`] via
//! [`crate::config::EngineConfigBuilder::progress_callback`] to receive
//! events while the rasterizer works through a document. The CLI forwards
//! them to an `indicatif` progress bar.
//!
//! # Example
//!
//! ```rust
//! use docshift::{CompressionProgressCallback, EngineConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     encoded: AtomicUsize,
//! }
//!
//! impl CompressionProgressCallback for CountingCallback {
//!     fn on_page_encoded(&self, page_num: usize, total_pages: usize, jpeg_bytes: usize) {
//!         self.encoded.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("page {page_num}/{total_pages}: {jpeg_bytes} bytes");
//!     }
//! }
//!
//! let config = EngineConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { encoded: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::output::CompressionReport;
use std::sync::Arc;

/// Called by the compression pipeline as it processes each page.
///
/// All methods have default no-op implementations. Encoding runs on several
/// blocking threads at once, so `on_page_encoded` may be called concurrently
/// and out of page order.
pub trait CompressionProgressCallback: Send + Sync {
    /// Called once, before the first page is rendered. Repacking reports
    /// the page count too.
    fn on_compression_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// A page has been rendered to pixels. `page_num` is 1-indexed.
    fn on_page_rendered(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// A page has been JPEG-encoded. `page_num` is 1-indexed.
    fn on_page_encoded(&self, page_num: usize, total_pages: usize, jpeg_bytes: usize) {
        let _ = (page_num, total_pages, jpeg_bytes);
    }

    /// Called once the output file is in place.
    fn on_compression_complete(&self, report: &CompressionReport) {
        let _ = report;
    }
}

/// The default when no callback is configured.
pub struct NoopProgressCallback;

impl CompressionProgressCallback for NoopProgressCallback {}

/// Type stored in [`crate::config::EngineConfig`].
pub type ProgressCallback = Arc<dyn CompressionProgressCallback>;
