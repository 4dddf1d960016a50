//! Rasterising compression: render → JPEG → one image per page.
//!
//! ```text
//! render thread ──RasterPage{index}──▶ bounded channel ──▶ JPEG encode
//!   (pdfium, sequential)                                  (blocking pool,
//!                                                          raster_concurrency)
//!                          sort by index ◀── buffer_unordered
//! ```
//!
//! Any failure, on any page, aborts the document. The assembled PDF is
//! returned in memory; the caller decides whether it is worth writing.

use crate::config::{CompressionPreset, EngineConfig};
use crate::error::{DocShiftError, Result};
use crate::pipeline::pages::{image_pdf_bytes, PageImage, PageImageData};
use crate::pipeline::render::{spawn_render, RasterPage};
use futures::stream::{StreamExt, TryStreamExt};
use image::RgbImage;
use std::path::Path;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

/// An encoded page on its way to reassembly.
struct EncodedPage {
    index: usize,
    image: PageImage,
}

/// Encode one RGB buffer as an optimised baseline JPEG.
pub(crate) fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let (width, height) = image.dimensions();
    let (w, h) = match (u16::try_from(width), u16::try_from(height)) {
        (Ok(w), Ok(h)) => (w, h),
        _ => {
            return Err(DocShiftError::encoding(
                "jpeg",
                format!("{width}x{height} exceeds the JPEG size limit"),
            ))
        }
    };

    let mut bytes = Vec::new();
    let mut encoder = jpeg_encoder::Encoder::new(&mut bytes, quality.clamp(1, 100));
    encoder.set_optimized_huffman_tables(true);
    encoder
        .encode(image.as_raw(), w, h, jpeg_encoder::ColorType::Rgb)
        .map_err(|e| DocShiftError::encoding("jpeg", e))?;
    Ok(bytes)
}

/// Rasterise every page of `input` under `preset`. Returns the page count
/// and the assembled PDF.
pub(crate) async fn rasterize(
    config: &EngineConfig,
    input: &Path,
    preset: &CompressionPreset,
) -> Result<(usize, Vec<u8>)> {
    let concurrency = config.raster_concurrency.max(1);
    let quality = preset.jpeg_quality;
    let progress = config.progress_callback.clone();

    // ── Step 1: Render and encode concurrently ───────────────────────────
    let (rx, render) = spawn_render(config, input, preset, concurrency);

    let encoded: Result<Vec<EncodedPage>> = ReceiverStream::new(rx)
        .map(|page: RasterPage| {
            let progress = progress.clone();
            async move {
                let RasterPage { index, total, image } = page;
                let (width, height) = image.dimensions();
                let jpeg = tokio::task::spawn_blocking(move || encode_jpeg(&image, quality))
                    .await
                    .map_err(|e| DocShiftError::Internal(format!("encode task panicked: {e}")))??;
                debug!(page = index + 1, bytes = jpeg.len(), "encoded");
                if let Some(cb) = &progress {
                    cb.on_page_encoded(index + 1, total, jpeg.len());
                }
                Ok::<_, DocShiftError>(EncodedPage {
                    index,
                    image: PageImage {
                        width,
                        height,
                        data: PageImageData::Jpeg(jpeg),
                    },
                })
            }
        })
        .buffer_unordered(concurrency)
        .try_collect()
        .await;

    // The render result wins: an encode failure only stops the renderer.
    let total = render
        .await
        .map_err(|e| DocShiftError::Internal(format!("render task panicked: {e}")))??;
    let mut encoded = encoded?;

    if encoded.len() != total {
        return Err(DocShiftError::Internal(format!(
            "rendered {} of {total} pages",
            encoded.len()
        )));
    }

    // ── Step 2: Reassemble in page order ─────────────────────────────────
    encoded.sort_by_key(|p| p.index);
    let pages: Vec<PageImage> = encoded.into_iter().map(|p| p.image).collect();

    let bytes = tokio::task::spawn_blocking(move || image_pdf_bytes(pages))
        .await
        .map_err(|e| DocShiftError::Internal(format!("assembly task panicked: {e}")))??;

    info!(pages = total, bytes = bytes.len(), "rasterised");
    Ok((total, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn jpeg_has_markers() {
        let img = RgbImage::from_pixel(16, 8, Rgb([200, 10, 10]));
        let jpeg = encode_jpeg(&img, 60).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 8));
    }

    #[test]
    fn lower_quality_is_smaller() {
        let mut img = RgbImage::new(64, 64);
        for (x, y, p) in img.enumerate_pixels_mut() {
            *p = Rgb([(x * 4) as u8, (y * 4) as u8, ((x ^ y) * 4) as u8]);
        }
        let high = encode_jpeg(&img, 95).unwrap();
        let low = encode_jpeg(&img, 20).unwrap();
        assert!(low.len() < high.len());
    }
}
