//! Configuration types for a batch conversion run.
//!
//! All run behaviour is controlled through [`BatchConfig`], built via its
//! [`BatchConfigBuilder`]. Keeping every knob in one struct makes it trivial
//! to share the config across the worker pool and to log exactly what a run
//! was asked to do.
//!
//! The object-store connection is configured separately through
//! [`crate::store::StoreConfig`] because library callers may bring their own
//! [`crate::store::ObjectStore`] instead.

use crate::error::BatchError;
use crate::pipeline::converter::RasterConverter;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for one batch run.
///
/// # Example
/// ```rust
/// use svg2gif_batch::BatchConfig;
///
/// let config = BatchConfig::builder()
///     .output_dir("/tmp/gifs")
///     .concurrency(8)
///     .max_width(1200)
///     .build()
///     .unwrap();
/// assert_eq!(config.concurrency, 8);
/// ```
#[derive(Clone)]
pub struct BatchConfig {
    /// Directory converted files are written into. Default: current directory.
    ///
    /// The derived output name (which may contain `/`) is joined onto it, and
    /// missing parent directories are created.
    pub output_dir: PathBuf,

    /// Only list objects whose key starts with this prefix. Default: `""`.
    pub prefix: String,

    /// Objects requested per listing call. Default: 100.
    pub page_size: usize,

    /// Maximum number of conversions in flight across the whole run. Default: 4.
    ///
    /// Every conversion holds its downloaded SVG, a high-density raster and
    /// the encoded GIF in memory at once, so this is also the memory bound.
    pub concurrency: usize,

    /// Extension an object key must end with to be converted. Default: `.svg`.
    ///
    /// Matched case-sensitively.
    pub source_extension: String,

    /// Extension substituted for `source_extension` in the output name. Default: `.gif`.
    pub target_extension: String,

    /// Objects of this size or smaller are skipped. Default: 1024 bytes.
    ///
    /// Placeholder and empty SVGs exported by the instrument software are
    /// well below 1 KiB.
    pub min_size_bytes: u64,

    /// Widest output allowed, in pixels. Default: 1600.
    ///
    /// Wider rasters are scaled down uniformly so their width matches exactly.
    pub max_width: u32,

    /// Rasterisation density in DPI. Range: 1–4800. Default: 1000.
    ///
    /// SVG user units are 1/96 inch, so the default renders at roughly 10.4×
    /// the document's nominal size before trimming and downscaling.
    pub density: f32,

    /// Longest raster side allowed before downscaling, in pixels. Default: 16384.
    ///
    /// Caps the effective density for very large documents so a single item
    /// cannot allocate gigabytes of pixels.
    pub max_raster_dimension: u32,

    /// Opaque colour the transparent SVG canvas is flattened onto, as RGB.
    /// Default: white.
    ///
    /// GIF has no partial transparency, so anti-aliased edges are blended
    /// against this colour before encoding.
    pub background: [u8; 3],

    /// Upload each converted file back to the store next to its source. Default: false.
    pub upload_results: bool,

    /// Pre-constructed converter. Takes precedence over the built-in SVG→GIF one.
    pub converter: Option<Arc<dyn RasterConverter>>,

    /// Receives per-page and per-item events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            prefix: String::new(),
            page_size: 100,
            concurrency: 4,
            source_extension: ".svg".to_string(),
            target_extension: ".gif".to_string(),
            min_size_bytes: 1024,
            max_width: 1600,
            density: 1000.0,
            max_raster_dimension: 16_384,
            background: [255, 255, 255],
            upload_results: false,
            converter: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for BatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchConfig")
            .field("output_dir", &self.output_dir)
            .field("prefix", &self.prefix)
            .field("page_size", &self.page_size)
            .field("concurrency", &self.concurrency)
            .field("source_extension", &self.source_extension)
            .field("target_extension", &self.target_extension)
            .field("min_size_bytes", &self.min_size_bytes)
            .field("max_width", &self.max_width)
            .field("density", &self.density)
            .field("max_raster_dimension", &self.max_raster_dimension)
            .field("background", &self.background)
            .field("upload_results", &self.upload_results)
            .field(
                "converter",
                &self.converter.as_ref().map(|_| "<dyn RasterConverter>"),
            )
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl BatchConfig {
    /// Create a new builder for `BatchConfig`.
    pub fn builder() -> BatchConfigBuilder {
        BatchConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`BatchConfig`].
#[derive(Debug)]
pub struct BatchConfigBuilder {
    config: BatchConfig,
}

impl BatchConfigBuilder {
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.prefix = prefix.into();
        self
    }

    pub fn page_size(mut self, n: usize) -> Self {
        self.config.page_size = n;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn source_extension(mut self, ext: impl Into<String>) -> Self {
        self.config.source_extension = ext.into();
        self
    }

    pub fn target_extension(mut self, ext: impl Into<String>) -> Self {
        self.config.target_extension = ext.into();
        self
    }

    pub fn min_size_bytes(mut self, n: u64) -> Self {
        self.config.min_size_bytes = n;
        self
    }

    pub fn max_width(mut self, px: u32) -> Self {
        self.config.max_width = px;
        self
    }

    pub fn density(mut self, dpi: f32) -> Self {
        self.config.density = dpi.clamp(1.0, 4800.0);
        self
    }

    pub fn max_raster_dimension(mut self, px: u32) -> Self {
        self.config.max_raster_dimension = px.max(1);
        self
    }

    pub fn background(mut self, rgb: [u8; 3]) -> Self {
        self.config.background = rgb;
        self
    }

    pub fn upload_results(mut self, v: bool) -> Self {
        self.config.upload_results = v;
        self
    }

    pub fn converter(mut self, converter: Arc<dyn RasterConverter>) -> Self {
        self.config.converter = Some(converter);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BatchConfig, BatchError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(BatchError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.page_size == 0 {
            return Err(BatchError::InvalidConfig("Page size must be ≥ 1".into()));
        }
        if c.max_width == 0 {
            return Err(BatchError::InvalidConfig("Max width must be ≥ 1".into()));
        }
        for (name, ext) in [
            ("Source", &c.source_extension),
            ("Target", &c.target_extension),
        ] {
            if ext.len() < 2 || !ext.starts_with('.') {
                return Err(BatchError::InvalidConfig(format!(
                    "{name} extension must look like '.ext', got '{ext}'"
                )));
            }
        }
        if c.source_extension == c.target_extension {
            return Err(BatchError::InvalidConfig(format!(
                "Source and target extensions are both '{}'; outputs would overwrite inputs",
                c.source_extension
            )));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_production_settings() {
        let c = BatchConfig::default();
        assert_eq!(c.page_size, 100);
        assert_eq!(c.concurrency, 4);
        assert_eq!(c.source_extension, ".svg");
        assert_eq!(c.target_extension, ".gif");
        assert_eq!(c.min_size_bytes, 1024);
        assert_eq!(c.max_width, 1600);
        assert_eq!(c.density, 1000.0);
        assert_eq!(c.background, [255, 255, 255]);
        assert!(!c.upload_results);
    }

    #[test]
    fn zero_concurrency_rejected() {
        let err = BatchConfig::builder().concurrency(0).build().unwrap_err();
        assert!(err.to_string().contains("Concurrency"), "got: {err}");
    }

    #[test]
    fn zero_page_size_rejected() {
        assert!(BatchConfig::builder().page_size(0).build().is_err());
    }

    #[test]
    fn extension_without_dot_rejected() {
        let err = BatchConfig::builder()
            .source_extension("svg")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("'.ext'"), "got: {err}");
    }

    #[test]
    fn identical_extensions_rejected() {
        assert!(BatchConfig::builder()
            .target_extension(".svg")
            .build()
            .is_err());
    }

    #[test]
    fn density_is_clamped() {
        let c = BatchConfig::builder().density(100_000.0).build().unwrap();
        assert_eq!(c.density, 4800.0);
        let c = BatchConfig::builder().density(0.0).build().unwrap();
        assert_eq!(c.density, 1.0);
    }
}
