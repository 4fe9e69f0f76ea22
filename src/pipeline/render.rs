//! Image rendering: rasterise embedded image objects and whole pages.
//!
//! Two operating modes feed the extractor:
//!
//! * **Embedded mode** — decode a single image object, trying extraction
//!   strategies in order and stopping at the first that succeeds. The
//!   processed form (filters and colour-space transforms applied) is
//!   preferred; the raw stream is the fallback for objects pdfium cannot
//!   re-process.
//! * **Full-page mode** — rasterise the whole page, at a higher scale for
//!   scanned pages where the raster *is* the content.
//!
//! Every render passes a content check before it becomes an
//! [`crate::document::ExtractedImage`]: sampled pixels must show enough
//! non-white coverage, so blank decoder output and empty page regions are
//! discarded instead of being sent to the model. Forced scans skip the
//! check — the scan-all-pages policy promises exactly one scan per page,
//! blank or not.
//!
//! All pdfium calls here run inside the extractor's `spawn_blocking` scope;
//! pdfium is not async-safe and must stay off the Tokio worker threads.

use image::RgbaImage;
use pdfium_render::prelude::*;

/// Render scale for full-page scans of scanned (image-dominated) pages.
pub const FULL_PAGE_SCALE_SCANNED: f32 = 2.0;

/// Render scale for full-page scans of ordinary pages.
pub const FULL_PAGE_SCALE_NORMAL: f32 = 1.5;

/// Embedded images narrower or shorter than this are rejected outright.
pub const MIN_IMAGE_DIMENSION: u32 = 5;

/// A sampled pixel is "non-white" when every colour channel is below this.
const NON_WHITE_CHANNEL_MAX: u8 = 245;

/// A sampled pixel must be at least this opaque to count as content.
const MIN_ALPHA: u8 = 10;

/// Fraction of sampled pixels that must be non-white for a normal render.
const CONTENT_FRACTION: f64 = 0.002;

/// Below this size in both dimensions the absolute-count rule applies.
const SMALL_IMAGE_DIMENSION: u32 = 30;

/// Non-white samples a small image needs to pass the content check.
const SMALL_IMAGE_MIN_SAMPLES: usize = 5;

/// Pixel sampling stride for the content check.
const SAMPLE_STRIDE: usize = 4;

/// Whether an embedded image's dimensions clear the minimum-size gate.
pub fn passes_size_gate(width: u32, height: u32) -> bool {
    width >= MIN_IMAGE_DIMENSION && height >= MIN_IMAGE_DIMENSION
}

/// Content check: does this raster contain anything worth analysing?
///
/// Samples every [`SAMPLE_STRIDE`]th pixel. A pixel counts as content when
/// all colour channels sit below [`NON_WHITE_CHANNEL_MAX`] and it is not
/// nearly transparent. Normal renders need more than [`CONTENT_FRACTION`] of
/// samples to be content; images smaller than [`SMALL_IMAGE_DIMENSION`]
/// square need only [`SMALL_IMAGE_MIN_SAMPLES`] absolute hits.
pub fn has_visible_content(raster: &RgbaImage) -> bool {
    if raster.width() == 0 || raster.height() == 0 {
        return false;
    }

    let mut sampled = 0usize;
    let mut non_white = 0usize;
    for pixel in raster.pixels().step_by(SAMPLE_STRIDE) {
        sampled += 1;
        let [r, g, b, a] = pixel.0;
        if a > MIN_ALPHA
            && r < NON_WHITE_CHANNEL_MAX
            && g < NON_WHITE_CHANNEL_MAX
            && b < NON_WHITE_CHANNEL_MAX
        {
            non_white += 1;
        }
    }

    if raster.width() < SMALL_IMAGE_DIMENSION && raster.height() < SMALL_IMAGE_DIMENSION {
        non_white >= SMALL_IMAGE_MIN_SAMPLES
    } else {
        non_white as f64 / sampled as f64 > CONTENT_FRACTION
    }
}

/// Decode an embedded image object, trying strategies in order.
///
/// Returns the reason string of the last failed strategy when all fail; the
/// caller records it as a skipped object.
pub fn render_embedded(
    object: &PdfPageImageObject,
    document: &PdfDocument,
) -> Result<RgbaImage, String> {
    // Strategy 1: processed bitmap — filters, decode arrays, and colour
    // space transforms applied.
    match object.get_processed_image(document) {
        Ok(img) => return Ok(img.to_rgba8()),
        Err(e) => {
            tracing::debug!("processed-image strategy failed: {e:?}");
        }
    }

    // Strategy 2: raw bitmap straight from the stream.
    object
        .get_raw_image()
        .map(|img| img.to_rgba8())
        .map_err(|e| format!("all extraction strategies failed: {e:?}"))
}

/// Rasterise an entire page.
pub fn render_page(page: &PdfPage, is_scanned: bool) -> Result<RgbaImage, String> {
    let scale = if is_scanned {
        FULL_PAGE_SCALE_SCANNED
    } else {
        FULL_PAGE_SCALE_NORMAL
    };
    let config = PdfRenderConfig::new().scale_page_by_factor(scale);
    let bitmap = page
        .render_with_config(&config)
        .map_err(|e| format!("page rasterisation failed: {e:?}"))?;
    Ok(bitmap.as_image().to_rgba8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(width: u32, height: u32, pixel: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba(pixel))
    }

    #[test]
    fn size_gate_rejects_tiny_images() {
        assert!(!passes_size_gate(4, 100));
        assert!(!passes_size_gate(100, 4));
        assert!(passes_size_gate(5, 5));
    }

    #[test]
    fn white_raster_has_no_content() {
        assert!(!has_visible_content(&solid(100, 100, [255, 255, 255, 255])));
    }

    #[test]
    fn transparent_raster_has_no_content() {
        assert!(!has_visible_content(&solid(100, 100, [0, 0, 0, 0])));
    }

    #[test]
    fn dark_raster_has_content() {
        assert!(has_visible_content(&solid(100, 100, [20, 20, 20, 255])));
    }

    #[test]
    fn near_white_raster_is_still_blank() {
        // 250 > the 245 channel threshold in every channel.
        assert!(!has_visible_content(&solid(100, 100, [250, 250, 250, 255])));
    }

    #[test]
    fn sparse_content_above_fraction_passes() {
        let mut img = solid(100, 100, [255, 255, 255, 255]);
        // Paint one full row dark: 100 of 10_000 pixels = 1% >> 0.2%.
        for x in 0..100 {
            img.put_pixel(x, 50, Rgba([0, 0, 0, 255]));
        }
        assert!(has_visible_content(&img));
    }

    #[test]
    fn small_image_needs_five_samples() {
        let mut img = solid(20, 20, [255, 255, 255, 255]);
        // 400 pixels, stride 4 → samples land on every 4th index; paint a
        // dark block large enough to hit at least 5 samples.
        for x in 0..20 {
            for y in 0..4 {
                img.put_pixel(x, y, Rgba([0, 0, 0, 255]));
            }
        }
        assert!(has_visible_content(&img));

        // A single dark pixel is below the absolute floor.
        let mut nearly_blank = solid(20, 20, [255, 255, 255, 255]);
        nearly_blank.put_pixel(0, 0, Rgba([0, 0, 0, 255]));
        assert!(!has_visible_content(&nearly_blank));
    }
}
