//! Progress-callback trait for per-page and per-item batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::BatchConfigBuilder::progress_callback`] to receive
//! events as the pipeline walks the container. Every event carries the item
//! identity, so a sink can forward failures to a report, a metrics counter or
//! a terminal progress bar without parsing log output.
//!
//! # Example
//!
//! ```rust
//! use svg2gif_batch::{BatchConfig, BatchProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct Dots {
//!     done: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for Dots {
//!     fn on_item_complete(&self, _key: &str, _output_name: &str, _bytes: usize) {
//!         self.done.fetch_add(1, Ordering::SeqCst);
//!         eprint!(".");
//!     }
//! }
//!
//! let config = BatchConfig::builder()
//!     .progress_callback(Arc::new(Dots { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::output::BatchStats;
use std::sync::Arc;

/// Called by the pipeline as it lists pages and converts items.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
///
/// # Thread safety
///
/// The item events are raised from worker tasks, up to `concurrency` of them
/// at once and from different threads. Implementations must protect shared
/// mutable state (e.g. `Mutex`, `AtomicUsize`).
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before the first listing call.
    fn on_batch_start(&self) {}

    /// Called after a page has been listed and filtered, before dispatch.
    ///
    /// # Arguments
    /// * `page_num`   — 1-indexed page number
    /// * `listed`     — objects returned by the listing call
    /// * `candidates` — objects that passed the candidate filter
    fn on_page_start(&self, page_num: usize, listed: usize, candidates: usize) {
        let _ = (page_num, listed, candidates);
    }

    /// Called when a conversion task holds its permit and starts downloading.
    fn on_item_start(&self, key: &str) {
        let _ = key;
    }

    /// Called when an item has been converted and persisted.
    ///
    /// # Arguments
    /// * `key`         — source object key
    /// * `output_name` — derived name the GIF was written under
    /// * `bytes`       — size of the encoded GIF
    fn on_item_complete(&self, key: &str, output_name: &str, bytes: usize) {
        let _ = (key, output_name, bytes);
    }

    /// Called when an item failed at any stage.
    fn on_item_error(&self, key: &str, error: &str) {
        let _ = (key, error);
    }

    /// Called after every item of a page has resolved.
    fn on_page_complete(&self, page_num: usize, converted: usize, failed: usize) {
        let _ = (page_num, converted, failed);
    }

    /// Called once after the last page.
    fn on_batch_complete(&self, stats: &BatchStats) {
        let _ = stats;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::BatchConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
