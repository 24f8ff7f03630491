//! Width normalisation: downscale anything wider than the configured maximum.

use image::{imageops, RgbaImage};
use tracing::debug;

/// Height after scaling a `width`×`height` image to exactly `max_width` wide.
pub fn scaled_height(width: u32, height: u32, max_width: u32) -> u32 {
    let ratio = max_width as f64 / width as f64;
    ((height as f64 * ratio).round() as u32).max(1)
}

/// Scale `img` uniformly so its width equals `max_width` when it is wider.
///
/// Images at or below the limit are returned untouched; this never upscales.
pub fn fit_width(img: RgbaImage, max_width: u32) -> RgbaImage {
    let (width, height) = img.dimensions();
    if width <= max_width {
        return img;
    }

    let new_height = scaled_height(width, height, max_width);
    debug!("Resizing {width}x{height} → {max_width}x{new_height}");
    imageops::resize(&img, max_width, new_height, imageops::FilterType::Lanczos3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn wide_image_is_scaled_to_max_width() {
        let img = RgbaImage::from_pixel(3200, 90, Rgba([0, 0, 0, 255]));
        let out = fit_width(img, 1600);
        assert_eq!(out.dimensions(), (1600, 45));
    }

    #[test]
    fn aspect_ratio_is_preserved_with_rounding() {
        assert_eq!(scaled_height(2083, 1041, 1600), 800);
        assert_eq!(scaled_height(1601, 3, 1600), 3);
        assert_eq!(scaled_height(100_000, 1, 1600), 1);
    }

    #[test]
    fn image_at_limit_is_untouched() {
        let img = RgbaImage::from_pixel(1600, 7, Rgba([9, 9, 9, 255]));
        let out = fit_width(img.clone(), 1600);
        assert_eq!(out, img);
    }

    #[test]
    fn narrow_image_is_not_upscaled() {
        let img = RgbaImage::from_pixel(300, 200, Rgba([9, 9, 9, 255]));
        assert_eq!(fit_width(img, 1600).dimensions(), (300, 200));
    }
}
