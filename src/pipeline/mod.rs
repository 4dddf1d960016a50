//! Pipeline stages for conversion and compression.
//!
//! Each submodule implements exactly one transformation step. The public
//! orchestrators in [`crate::convert`], [`crate::compress`],
//! [`crate::images`] and [`crate::merge`] wire them together.
//!
//! ## Data Flow
//!
//! ```text
//! conversion:   extract ──▶ TextModel ──▶ encode
//!               (pdfium / docx / pandoc)   (layout / pandoc)
//!
//! compression:  inspect ──┬─ images ──▶ render ──▶ raster ──▶ pages
//!                         └─ none ────▶ repack
//! ```
//!
//! 1. [`extract`] dispatches on the input format; [`docx`], [`pandoc`] and
//!    [`render`] do the reading
//! 2. [`encode`] dispatches on the output format; [`layout`] paginates PDF
//!    text, [`pandoc`] writes everything else
//! 3. [`inspect`] finds embedded raster images without rendering
//! 4. [`render`] rasterises pages on a blocking thread because pdfium is not
//!    async-safe; [`raster`] JPEG-encodes them concurrently
//! 5. [`pages`] builds one-image-per-page documents; [`repack`] holds the
//!    finishing step every saved PDF goes through
//! 6. [`merge`] deep-copies pages between documents

pub mod docx;
pub mod encode;
pub mod extract;
pub mod inspect;
pub mod layout;
pub(crate) mod merge;
pub(crate) mod pages;
pub mod pandoc;
pub(crate) mod raster;
pub(crate) mod render;
pub(crate) mod repack;
