//! The raster converter seam: SVG bytes in, GIF bytes out.
//!
//! [`RasterConverter`] is what a [`super::task::ConversionTask`] calls
//! between download and persist. The built-in [`SvgToGifConverter`] chains
//! the stages of this module's siblings:
//!
//! ```text
//! render::rasterize_svg ──▶ render::trim_transparent ──▶ render::flatten_onto ──▶ resize::fit_width ──▶ encode::encode_gif
//! (density DPI)            (trim + re-page)             (opaque background)    (≤ max_width)          (GIF bytes)
//! ```
//!
//! Callers can inject their own implementation through
//! [`crate::config::BatchConfigBuilder::converter`].

use super::{encode, render, resize};
use crate::config::BatchConfig;
use crate::error::ConvertError;
use std::sync::Arc;

/// A converted raster ready to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterOutput {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Turns one source document into an encoded raster.
///
/// Conversions are CPU-bound and are always called from
/// `tokio::task::spawn_blocking`, never from an async worker thread.
pub trait RasterConverter: Send + Sync {
    fn convert(&self, source: &[u8]) -> Result<RasterOutput, ConvertError>;
}

/// SVG → trimmed, width-capped GIF.
pub struct SvgToGifConverter {
    density: f32,
    max_width: u32,
    max_raster_dimension: u32,
    background: [u8; 3],
    fontdb: Arc<usvg::fontdb::Database>,
}

impl SvgToGifConverter {
    /// Build a converter with the system fonts loaded for `<text>` elements.
    pub fn new(density: f32, max_width: u32, max_raster_dimension: u32) -> Self {
        let mut fontdb = usvg::fontdb::Database::new();
        fontdb.load_system_fonts();
        Self::with_fontdb(density, max_width, max_raster_dimension, Arc::new(fontdb))
    }

    /// Build a converter that resolves text against `fontdb`.
    pub fn with_fontdb(
        density: f32,
        max_width: u32,
        max_raster_dimension: u32,
        fontdb: Arc<usvg::fontdb::Database>,
    ) -> Self {
        Self {
            density,
            max_width,
            max_raster_dimension,
            background: [255, 255, 255],
            fontdb,
        }
    }

    /// Flatten onto `rgb` instead of white.
    pub fn with_background(mut self, rgb: [u8; 3]) -> Self {
        self.background = rgb;
        self
    }

    pub fn from_config(config: &BatchConfig) -> Self {
        Self::new(
            config.density,
            config.max_width,
            config.max_raster_dimension,
        )
        .with_background(config.background)
    }
}

impl RasterConverter for SvgToGifConverter {
    fn convert(&self, source: &[u8]) -> Result<RasterOutput, ConvertError> {
        let raster = render::rasterize_svg(
            source,
            self.density,
            self.max_raster_dimension,
            &self.fontdb,
        )?;
        let trimmed = render::trim_transparent(&raster);
        drop(raster);
        let flat = render::flatten_onto(&trimmed, self.background);
        drop(trimmed);

        let fitted = resize::fit_width(flat, self.max_width);
        let bytes =
            encode::encode_gif(&fitted).map_err(|e| ConvertError::Encode(e.to_string()))?;

        Ok(RasterOutput {
            bytes,
            width: fitted.width(),
            height: fitted.height(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn converter(density: f32, max_width: u32) -> SvgToGifConverter {
        SvgToGifConverter::with_fontdb(
            density,
            max_width,
            16_384,
            Arc::new(usvg::fontdb::Database::new()),
        )
    }

    const WIDE_SVG: &[u8] = br#"<svg xmlns="http://www.w3.org/2000/svg" width="120" height="40">
        <rect x="0" y="0" width="120" height="40" fill="navy"/>
    </svg>"#;

    #[test]
    fn wide_render_is_capped_to_max_width() {
        // 120x40 at 192 DPI is 240x80; capped to 200 keeps the 3:1 ratio.
        let out = converter(192.0, 200).convert(WIDE_SVG).expect("convert");
        assert_eq!((out.width, out.height), (200, 67));

        let gif = image::load_from_memory_with_format(&out.bytes, image::ImageFormat::Gif)
            .expect("valid gif");
        assert_eq!((gif.width(), gif.height()), (200, 67));
    }

    #[test]
    fn narrow_render_is_not_resized() {
        let out = converter(96.0, 1600).convert(WIDE_SVG).expect("convert");
        assert_eq!((out.width, out.height), (120, 40));
    }

    #[test]
    fn margins_are_trimmed_before_resize() {
        let svg = br#"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100">
            <rect x="25" y="40" width="50" height="10" fill="black"/>
        </svg>"#;
        let out = converter(96.0, 1600).convert(svg).expect("convert");
        assert_eq!((out.width, out.height), (50, 10));
    }

    #[test]
    fn default_density_is_scaled_down_to_max_width() {
        let defaults = BatchConfig::default();
        let svg = br#"<svg xmlns="http://www.w3.org/2000/svg" width="200" height="80">
            <rect x="0" y="0" width="200" height="80" fill="navy"/>
        </svg>"#;
        // 1000 DPI renders 2084x834 before fitting to 1600 wide.
        let out = converter(defaults.density, defaults.max_width)
            .convert(svg)
            .expect("convert");
        assert_eq!((out.width, out.height), (1600, 640));
    }

    #[test]
    fn raster_cap_applies_through_convert() {
        let svg = br#"<svg xmlns="http://www.w3.org/2000/svg" width="200" height="80">
            <rect x="0" y="0" width="200" height="80" fill="navy"/>
        </svg>"#;
        let capped = SvgToGifConverter::with_fontdb(
            1000.0,
            1600,
            1000,
            Arc::new(usvg::fontdb::Database::new()),
        );
        let out = capped.convert(svg).expect("convert");
        assert_eq!((out.width, out.height), (1000, 400));
    }

    #[test]
    fn anti_aliased_fringe_stays_light() {
        let svg = br#"<svg xmlns="http://www.w3.org/2000/svg" width="120" height="40">
            <path d="M2,2 L118,38" stroke="black" stroke-width="0.5" fill="none"/>
            <path d="M2,38 L118,2" stroke="black" stroke-width="0.5" fill="none"/>
        </svg>"#;
        let fontdb = Arc::new(usvg::fontdb::Database::new());
        let raw = render::trim_transparent(
            &render::rasterize_svg(svg, 192.0, 16_384, &fontdb).expect("rasterize"),
        );
        let strong = raw.pixels().filter(|p| p[3] >= 128).count();
        let touched = raw.pixels().filter(|p| p[3] > 0).count();
        assert!(strong > 0 && touched > strong, "{strong} / {touched}");

        let out = converter(192.0, 1600).convert(svg).expect("convert");
        let gif = image::load_from_memory_with_format(&out.bytes, image::ImageFormat::Gif)
            .expect("valid gif")
            .to_rgba8();
        assert_eq!(gif.dimensions(), raw.dimensions());
        assert!(gif.pixels().all(|p| p[3] == 255), "gif must be opaque");

        let dark = gif
            .pixels()
            .filter(|p| (u32::from(p[0]) + u32::from(p[1]) + u32::from(p[2])) / 3 < 128)
            .count();
        assert!(dark < touched, "fringe rendered solid: {dark} of {touched}");
        assert!(dark <= strong + strong / 10 + 4, "{dark} dark vs {strong} strong");
    }

    #[test]
    fn background_colour_fills_transparent_area() {
        let svg = br#"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100">
            <rect x="0" y="0" width="10" height="10" fill="black"/>
            <rect x="90" y="90" width="10" height="10" fill="black"/>
        </svg>"#;
        let out = converter(96.0, 1600)
            .with_background([255, 0, 0])
            .convert(svg)
            .expect("convert");
        let gif = image::load_from_memory_with_format(&out.bytes, image::ImageFormat::Gif)
            .expect("valid gif")
            .to_rgba8();
        let centre = gif.get_pixel(50, 50);
        assert!(centre[0] > 200 && centre[1] < 60 && centre[2] < 60, "got {centre:?}");
        assert_eq!(centre[3], 255);
    }

    #[test]
    fn invalid_svg_is_a_decode_error() {
        let err = converter(96.0, 1600)
            .convert(b"<svg><unclosed")
            .unwrap_err();
        assert!(matches!(err, ConvertError::Decode(_)), "got: {err:?}");
    }
}
