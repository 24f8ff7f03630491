//! SVG rasterisation: parse with usvg, render with resvg, trim, then
//! flatten onto an opaque background.
//!
//! ## Why render so dense?
//!
//! Chromatogram SVGs are mostly hairlines and small labels. Rendering at the
//! document's nominal 96 DPI and then scaling would blur them; rendering at
//! a high density and downscaling later (see [`super::resize`]) keeps the
//! strokes crisp in the final GIF.
//!
//! ## Why cap the raster?
//!
//! At 1000 DPI a poster-sized SVG would need tens of gigapixels. The longest
//! side is capped at `max_dimension`; the effective density drops for such
//! documents instead of the allocation failing.

use crate::error::ConvertError;
use image::{imageops, Rgba, RgbaImage};
use resvg::tiny_skia;
use std::sync::Arc;
use tracing::debug;

/// CSS pixels per inch; usvg reports document sizes in these units.
pub const SVG_BASE_DPI: f32 = 96.0;

/// Parse `bytes` as SVG and rasterise it at `density` DPI.
///
/// The returned image is straight (non-premultiplied) RGBA with a
/// transparent background.
pub fn rasterize_svg(
    bytes: &[u8],
    density: f32,
    max_dimension: u32,
    fontdb: &Arc<usvg::fontdb::Database>,
) -> Result<RgbaImage, ConvertError> {
    let mut opts = usvg::Options::default();
    opts.fontdb = Arc::clone(fontdb);

    let tree =
        usvg::Tree::from_data(bytes, &opts).map_err(|e| ConvertError::Decode(e.to_string()))?;

    let size = tree.size();
    let (base_w, base_h) = (size.width(), size.height());
    if !base_w.is_finite() || !base_h.is_finite() || base_w <= 0.0 || base_h <= 0.0 {
        return Err(ConvertError::Decode(format!(
            "svg has invalid size {base_w}x{base_h}"
        )));
    }

    let scale = effective_scale(base_w, base_h, density, max_dimension);
    let width = ((base_w * scale).ceil() as u32).max(1);
    let height = ((base_h * scale).ceil() as u32).max(1);

    let mut pixmap = tiny_skia::Pixmap::new(width, height).ok_or_else(|| {
        ConvertError::Transform(format!("failed to allocate {width}x{height} pixmap"))
    })?;
    resvg::render(
        &tree,
        tiny_skia::Transform::from_scale(scale, scale),
        &mut pixmap.as_mut(),
    );
    debug!("Rasterised SVG {base_w}x{base_h} @ {scale:.2}x → {width}x{height} px");

    // tiny-skia stores premultiplied alpha; GIF encoding wants it straight.
    let mut rgba = Vec::with_capacity(width as usize * height as usize * 4);
    for px in pixmap.pixels() {
        let c = px.demultiply();
        rgba.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }

    RgbaImage::from_raw(width, height, rgba)
        .ok_or_else(|| ConvertError::Transform("pixmap size mismatch".into()))
}

/// Scale factor for rendering a `base_w`×`base_h` document at `density`,
/// reduced if needed so neither side exceeds `max_dimension`.
pub fn effective_scale(base_w: f32, base_h: f32, density: f32, max_dimension: u32) -> f32 {
    let wanted = density / SVG_BASE_DPI;
    let longest = base_w.max(base_h);
    let cap = max_dimension as f32 / longest;
    if wanted > cap {
        debug!("Density {density} DPI exceeds {max_dimension}px cap; using {cap:.2}x");
        cap
    } else {
        wanted
    }
}

/// Remove fully transparent margins and re-page the result to origin (0,0).
///
/// An image with no visible pixel at all trims down to a single transparent
/// pixel rather than to nothing.
pub fn trim_transparent(img: &RgbaImage) -> RgbaImage {
    let Some((x0, y0, x1, y1)) = opaque_bounds(img) else {
        return RgbaImage::new(1, 1);
    };

    if (x0, y0, x1, y1) == (0, 0, img.width() - 1, img.height() - 1) {
        return img.clone();
    }

    // `crop_imm(..).to_image()` copies into a fresh buffer, which drops the
    // offset: the trimmed image starts at (0,0).
    imageops::crop_imm(img, x0, y0, x1 - x0 + 1, y1 - y0 + 1).to_image()
}

/// Composite `img` over an opaque `background`; every output pixel has
/// alpha 255.
///
/// GIF keeps only fully transparent or fully opaque pixels, so partial alpha
/// from anti-aliasing must be resolved here rather than by the encoder.
pub fn flatten_onto(img: &RgbaImage, background: [u8; 3]) -> RgbaImage {
    let mut out = RgbaImage::new(img.width(), img.height());
    for (src, dst) in img.pixels().zip(out.pixels_mut()) {
        let alpha = u32::from(src[3]);
        let blend = |c: u8, bg: u8| {
            ((u32::from(c) * alpha + u32::from(bg) * (255 - alpha) + 127) / 255) as u8
        };
        *dst = Rgba([
            blend(src[0], background[0]),
            blend(src[1], background[1]),
            blend(src[2], background[2]),
            255,
        ]);
    }
    out
}

/// Inclusive bounding box of all pixels with non-zero alpha.
fn opaque_bounds(img: &RgbaImage) -> Option<(u32, u32, u32, u32)> {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, px) in img.enumerate_pixels() {
        if px[3] == 0 {
            continue;
        }
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }
    bounds
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fontdb() -> Arc<usvg::fontdb::Database> {
        Arc::new(usvg::fontdb::Database::new())
    }

    #[test]
    fn trim_removes_transparent_margin() {
        let mut img = RgbaImage::new(20, 10);
        for x in 5..9 {
            for y in 2..5 {
                img.put_pixel(x, y, Rgba([0, 0, 0, 255]));
            }
        }
        let trimmed = trim_transparent(&img);
        assert_eq!(trimmed.dimensions(), (4, 3));
        assert_eq!(trimmed.get_pixel(0, 0), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn trim_keeps_full_bleed_image() {
        let img = RgbaImage::from_pixel(6, 4, Rgba([1, 2, 3, 255]));
        assert_eq!(trim_transparent(&img).dimensions(), (6, 4));
    }

    #[test]
    fn trim_blank_image_to_single_pixel() {
        let img = RgbaImage::new(30, 30);
        assert_eq!(trim_transparent(&img).dimensions(), (1, 1));
    }

    #[test]
    fn flatten_blends_partial_alpha_against_background() {
        let mut img = RgbaImage::new(3, 1);
        img.put_pixel(0, 0, Rgba([0, 0, 0, 128]));
        img.put_pixel(1, 0, Rgba([0, 0, 0, 0]));
        img.put_pixel(2, 0, Rgba([200, 10, 20, 255]));

        let flat = flatten_onto(&img, [255, 255, 255]);
        assert_eq!(flat.get_pixel(0, 0), &Rgba([127, 127, 127, 255]));
        assert_eq!(flat.get_pixel(1, 0), &Rgba([255, 255, 255, 255]));
        assert_eq!(flat.get_pixel(2, 0), &Rgba([200, 10, 20, 255]));

        let on_black = flatten_onto(&img, [0, 0, 0]);
        assert_eq!(on_black.get_pixel(1, 0), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn effective_scale_follows_density() {
        let s = effective_scale(100.0, 50.0, 192.0, 16_384);
        assert!((s - 2.0).abs() < 1e-6);
    }

    #[test]
    fn effective_scale_is_capped() {
        // 1000 DPI on a 4000px-wide document would be ~41 700px.
        let s = effective_scale(4000.0, 1000.0, 1000.0, 16_384);
        assert!((4000.0 * s - 16_384.0).abs() < 1.0);
    }

    #[test]
    fn rasterize_simple_svg() {
        let svg = br#"<svg xmlns="http://www.w3.org/2000/svg" width="40" height="20">
            <rect x="10" y="5" width="20" height="10" fill="red"/>
        </svg>"#;
        let img = rasterize_svg(svg, 192.0, 16_384, &fontdb()).expect("rasterize");
        assert_eq!(img.dimensions(), (80, 40));

        // The rect covers (20..60, 10..30) after 2x scaling.
        assert_eq!(img.get_pixel(40, 20)[3], 255);
        assert_eq!(img.get_pixel(2, 2)[3], 0);

        let trimmed = trim_transparent(&img);
        assert_eq!(trimmed.dimensions(), (40, 20));
    }

    #[test]
    fn rasterize_rejects_garbage() {
        let err = rasterize_svg(b"definitely not xml", 96.0, 16_384, &fontdb()).unwrap_err();
        assert!(matches!(err, ConvertError::Decode(_)), "got: {err:?}");
    }
}
