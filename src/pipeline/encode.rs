//! Image encoding: `RgbaImage` → GIF bytes.
//!
//! GIF is limited to a 256-colour palette, so the RGBA raster is quantised
//! by the encoder. Input is already flattened onto an opaque background;
//! chromatograms are line art and survive the quantisation without visible
//! banding.

use image::codecs::gif::GifEncoder;
use image::{ExtendedColorType, RgbaImage};
use tracing::debug;

/// NeuQuant sampling factor: 1 is the slowest and most exact, 30 the fastest.
const QUANTISE_SPEED: i32 = 10;

/// Encode a raster as a single-frame GIF.
pub fn encode_gif(img: &RgbaImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    {
        // The trailer is written when the encoder is dropped.
        let mut encoder = GifEncoder::new_with_speed(&mut buf, QUANTISE_SPEED);
        encoder.encode(
            img.as_raw(),
            img.width(),
            img.height(),
            ExtendedColorType::Rgba8,
        )?;
    }

    debug!(
        "Encoded {}x{} image → {} bytes GIF",
        img.width(),
        img.height(),
        buf.len()
    );
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn encode_small_image() {
        let img = RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255]));
        let data = encode_gif(&img).expect("encode should succeed");
        assert!(data.starts_with(b"GIF8"), "missing GIF signature");

        let decoded = image::load_from_memory_with_format(&data, image::ImageFormat::Gif)
            .expect("valid gif");
        assert_eq!((decoded.width(), decoded.height()), (10, 10));
    }
}
