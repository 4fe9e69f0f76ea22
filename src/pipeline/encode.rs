//! Image encoding: raster pixels → base64 PNG wrapped in `ImageData`.
//!
//! VLM APIs (OpenAI, Anthropic, Gemini) accept images as base64 data-URIs
//! embedded in the JSON request body. PNG is chosen over JPEG because it is
//! lossless — text crispness matters far more than file size when the model
//! must transcribe scanned content. `detail: "high"` instructs GPT-4-class
//! models to use the full image tile budget; without it fine print is lost.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::RgbaImage;
use std::io::Cursor;
use tracing::debug;

/// Encode an extracted raster as a base64 PNG ready for the model API.
pub fn encode_raster(raster: &RgbaImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(raster.clone())
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded image → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn encode_small_image() {
        let img = RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255]));
        let data = encode_raster(&img).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        assert!(!data.data.is_empty());
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(&decoded[1..4], b"PNG");
    }
}
