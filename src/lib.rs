//! # svg2gif-batch
//!
//! Convert every SVG in a cloud object container into a trimmed,
//! width-capped GIF, page by page, with bounded concurrency.
//!
//! ## Why this crate?
//!
//! Containers of instrument charts grow to hundreds of thousands of SVGs.
//! Listing them all up front wastes memory, and converting them one at a
//! time wastes hours. This crate walks the listing in pages, converts each
//! page with at most K tasks in flight, and finishes a page completely before
//! asking for the next one. A broken SVG is logged and counted; it never
//! stops the batch.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Container
//!  │
//!  ├─ 1. List     one page of descriptors + continuation token
//!  ├─ 2. Filter   `.svg` objects larger than the size threshold
//!  ├─ 3. Dispatch one task per candidate, K permits (page barrier)
//!  ├─ 4. Convert  resvg rasterise → trim → flatten → resize → GIF (spawn_blocking)
//!  ├─ 5. Persist  atomic write to the output directory (+ optional upload)
//!  └─ 6. Advance  follow the token until a page carries none
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use svg2gif_batch::{convert_from_store_config, BatchConfig, StoreConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = StoreConfig::azure(std::env::var("SVG2GIF_CONNECTION_STRING")?);
//!     let config = BatchConfig::builder()
//!         .output_dir("./gifs")
//!         .concurrency(4)
//!         .build()?;
//!     let output = convert_from_store_config(&store, &config).await?;
//!     eprintln!("{} converted, {} failed", output.stats.converted, output.stats.failed);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `svg2gif` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! svg2gif-batch = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{BatchConfig, BatchConfigBuilder};
pub use convert::{convert_container, convert_from_store_config, convert_sync};
pub use error::{BatchError, ConvertError, ItemError, StoreError};
pub use output::{BatchOutput, BatchStats, ConversionResult, ConvertedItem, ItemFailure};
pub use pipeline::converter::{RasterConverter, RasterOutput, SvgToGifConverter};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use store::{
    ContinuationToken, MemoryStore, ObjectDescriptor, ObjectStore, OpendalStore, Page,
    StoreConfig, DEFAULT_CONTAINER,
};
