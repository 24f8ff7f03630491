//! Batch entry points: wire cursor, filter, pool and task together.
//!
//! [`convert_container`] is the primary API. It takes any
//! [`ObjectStore`] so tests and embedders can bring their own;
//! [`convert_from_store_config`] builds the OpenDAL-backed store first.
//!
//! Only fatal errors (listing, setup) are returned as `Err`. Per-item
//! failures are logged, reported to the progress callback and summarised in
//! the returned [`BatchOutput`].

use crate::config::BatchConfig;
use crate::error::BatchError;
use crate::output::BatchOutput;
use crate::pipeline::converter::{RasterConverter, SvgToGifConverter};
use crate::pipeline::cursor::BatchCursor;
use crate::pipeline::filter::CandidateFilter;
use crate::pipeline::pool::ConversionWorkerPool;
use crate::pipeline::task::ConversionTask;
use crate::store::{ObjectStore, OpendalStore, StoreConfig};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info};

/// Convert every eligible object in `store`.
///
/// # Returns
/// `Ok(BatchOutput)` once the listing is exhausted, even if some items
/// failed (check `output.stats.failed` or call
/// [`BatchOutput::into_result`]).
///
/// # Errors
/// Returns `Err(BatchError)` only for fatal errors:
/// - the output directory cannot be created
/// - a listing call fails
pub async fn convert_container(
    store: Arc<dyn ObjectStore>,
    config: &BatchConfig,
) -> Result<BatchOutput, BatchError> {
    let total_start = Instant::now();
    info!(
        output_dir = %config.output_dir.display(),
        prefix = %config.prefix,
        concurrency = config.concurrency,
        page_size = config.page_size,
        "Starting batch conversion"
    );

    // ── Step 1: Prepare output directory ─────────────────────────────────
    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .map_err(|e| BatchError::OutputDirFailed {
            path: config.output_dir.clone(),
            source: e,
        })?;

    // ── Step 2: Build the pipeline ───────────────────────────────────────
    let converter = resolve_converter(config).await?;
    let filter = CandidateFilter::from_config(config);
    let task = ConversionTask::new(Arc::clone(&store), converter, Arc::new(config.clone()));
    let pool = ConversionWorkerPool::new(task, config.concurrency);
    let output = Mutex::new(BatchOutput::default());

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start();
    }

    // ── Step 3: Walk the listing, one page at a time ─────────────────────
    let mut cursor = BatchCursor::new(store, config.prefix.clone(), config.page_size);
    let (pool, filter, output_ref) = (&pool, &filter, &output);
    cursor
        .run(move |page_num, page| async move {
            let listed = page.len();
            let candidates = filter.select(&page.objects);
            let skipped = listed - candidates.len();
            drop(page);

            debug!(page = page_num, listed, candidates = candidates.len(), "Dispatching page");
            if let Some(ref cb) = config.progress_callback {
                cb.on_page_start(page_num, listed, candidates.len());
            }

            let results = pool.process_page(candidates).await;

            let converted = results.iter().filter(|r| r.is_success()).count();
            let failed = results.len() - converted;
            info!(page = page_num, converted, failed, skipped, "Page complete");
            if let Some(ref cb) = config.progress_callback {
                cb.on_page_complete(page_num, converted, failed);
            }

            output_ref
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .record_page(listed, skipped, &results);
        })
        .await?;

    // ── Step 4: Summarise ────────────────────────────────────────────────
    let mut output = output.into_inner().unwrap_or_else(|e| e.into_inner());
    output.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        pages = output.stats.pages,
        candidates = output.stats.candidates,
        converted = output.stats.converted,
        failed = output.stats.failed,
        skipped = output.stats.skipped,
        duration_ms = output.stats.total_duration_ms,
        "Batch conversion complete"
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(&output.stats);
    }

    Ok(output)
}

/// Build the store described by `store_config` and convert its contents.
pub async fn convert_from_store_config(
    store_config: &StoreConfig,
    config: &BatchConfig,
) -> Result<BatchOutput, BatchError> {
    let store = OpendalStore::new(store_config)?;
    convert_container(Arc::new(store), config).await
}

/// Synchronous wrapper around [`convert_from_store_config`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    store_config: &StoreConfig,
    config: &BatchConfig,
) -> Result<BatchOutput, BatchError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| BatchError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert_from_store_config(store_config, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Use the caller's converter if one was configured, otherwise build the
/// SVG→GIF one.
///
/// Loading system fonts scans the font directories, so it runs on the
/// blocking pool.
async fn resolve_converter(config: &BatchConfig) -> Result<Arc<dyn RasterConverter>, BatchError> {
    if let Some(ref converter) = config.converter {
        return Ok(Arc::clone(converter));
    }

    let (density, max_width, max_dim, background) = (
        config.density,
        config.max_width,
        config.max_raster_dimension,
        config.background,
    );
    let converter = tokio::task::spawn_blocking(move || {
        SvgToGifConverter::new(density, max_width, max_dim).with_background(background)
    })
    .await
    .map_err(|e| BatchError::Internal(format!("Font loading task panicked: {}", e)))?;

    Ok(Arc::new(converter))
}
