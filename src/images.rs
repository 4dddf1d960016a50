//! Image-to-PDF assembly.
//!
//! One page per image, in input order, each page sized to the image's
//! pixel dimensions. Pixels are embedded losslessly (Flate); images with an
//! alpha channel are composited onto white first.

use crate::config::EngineConfig;
use crate::error::{DocShiftError, FormatDirection, Result};
use crate::format::Format;
use crate::output::{write_atomic, AssemblyReport};
use crate::pipeline::pages::{image_pdf_bytes, PageImage, PageImageData};
use futures::stream::{self, StreamExt, TryStreamExt};
use image::{DynamicImage, ImageFormat, RgbImage};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Builds PDFs from PNG and JPEG files.
///
/// Images are decoded in parallel, up to `raster_concurrency` at a time.
#[derive(Debug, Clone, Default)]
pub struct ImageAssembler {
    config: EngineConfig,
}

impl ImageAssembler {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Write a PDF with one page per entry of `images` to `output`.
    ///
    /// # Errors
    /// - `InvalidInput` when `images` is empty
    /// - `UnsupportedFormat` when an extension is not `png`, `jpg` or `jpeg`
    /// - `NotFound` when a file is missing
    /// - `CorruptInput` when a file does not decode as its extension says
    pub async fn images_to_pdf(
        &self,
        images: &[PathBuf],
        output: &Path,
    ) -> Result<AssemblyReport> {
        let start = Instant::now();
        if images.is_empty() {
            return Err(DocShiftError::InvalidInput(
                "at least one image is required".to_string(),
            ));
        }
        info!("Assembling {} images into {}", images.len(), output.display());

        // Check every extension before decoding anything.
        let declared = images
            .iter()
            .map(|path| declared_format(path).map(|f| (path.clone(), f)))
            .collect::<Result<Vec<_>>>()?;

        // `buffered` keeps input order while decoding ahead.
        let pages: Vec<PageImage> = stream::iter(declared)
            .map(|(path, format)| async move {
                tokio::task::spawn_blocking(move || load_page(&path, format))
                    .await
                    .map_err(|e| DocShiftError::Internal(format!("decode task panicked: {e}")))?
            })
            .buffered(self.config.raster_concurrency.max(1))
            .try_collect()
            .await?;
        let page_count = pages.len();

        let dest = output.to_path_buf();
        let output_bytes = tokio::task::spawn_blocking(move || {
            let bytes = image_pdf_bytes(pages)?;
            write_atomic(&dest, &bytes)
        })
        .await
        .map_err(|e| DocShiftError::Internal(format!("assembly task panicked: {e}")))??;

        let report = AssemblyReport {
            inputs: images.len(),
            page_count,
            output_path: output.to_path_buf(),
            output_bytes,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            "Wrote {} pages ({} bytes) in {}ms",
            report.page_count, report.output_bytes, report.duration_ms
        );
        Ok(report)
    }
}

fn declared_format(path: &Path) -> Result<Format> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    Format::parse_for(&ext, FormatDirection::Image)
}

fn load_page(path: &Path, format: Format) -> Result<PageImage> {
    crate::output::input_size(path)?;
    let bytes = std::fs::read(path).map_err(|e| DocShiftError::corrupt(path, e))?;
    let image_format = match format {
        Format::Jpeg => ImageFormat::Jpeg,
        _ => ImageFormat::Png,
    };
    let decoded = image::load_from_memory_with_format(&bytes, image_format)
        .map_err(|e| DocShiftError::corrupt(path, format!("not a valid {format} image: {e}")))?;

    let rgb = flatten_onto_white(decoded);
    let (width, height) = rgb.dimensions();
    debug!(path = %path.display(), width, height, "image decoded");
    Ok(PageImage {
        width,
        height,
        data: PageImageData::Rgb(rgb.into_raw()),
    })
}

/// Composite any alpha channel over a white background.
fn flatten_onto_white(image: DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    RgbImage::from_fn(width, height, |x, y| {
        let image::Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
        let blend = |c: u8| -> u8 {
            let c = c as u32;
            let a = a as u32;
            ((c * a + 255 * (255 - a) + 127) / 255) as u8
        };
        image::Rgb([blend(r), blend(g), blend(b)])
    })
}
