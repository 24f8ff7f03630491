//! Bounded-concurrency executor for one page of candidates.
//!
//! ## One semaphore per run
//!
//! The pool owns a single `Arc<Semaphore>` with `concurrency` permits,
//! created once and reused for every page. A permit is acquired *before* a
//! task is spawned and moved into it, so it is released exactly once when
//! the task's future is dropped: on success, on failure and on panic.
//!
//! ## Page barrier
//!
//! [`ConversionWorkerPool::process_page`] dispatches every candidate of the
//! page (waiting for permits as needed), then joins all spawned tasks before
//! returning. Items within a page run in whatever order permits free up;
//! nothing from the next page starts until this page has fully resolved.

use super::filter::CandidateItem;
use super::task::ConversionTask;
use crate::error::ItemError;
use crate::output::ConversionResult;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error};

/// Runs [`ConversionTask`]s with at most `concurrency` in flight.
pub struct ConversionWorkerPool {
    task: Arc<ConversionTask>,
    semaphore: Arc<Semaphore>,
    concurrency: usize,
}

impl ConversionWorkerPool {
    pub fn new(task: ConversionTask, concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            task: Arc::new(task),
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Tasks currently holding a permit.
    pub fn in_flight(&self) -> usize {
        self.concurrency - self.semaphore.available_permits()
    }

    /// Convert every candidate of a page and wait for all of them.
    ///
    /// Results come back in dispatch order, one per candidate.
    pub async fn process_page(&self, candidates: Vec<CandidateItem>) -> Vec<ConversionResult> {
        let total = candidates.len();
        let mut keys = Vec::with_capacity(total);
        let mut handles = Vec::with_capacity(total);

        for candidate in candidates {
            // The semaphore is never closed, so acquisition only fails if
            // that invariant is broken.
            let permit = match Arc::clone(&self.semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!(key = candidate.key(), error = %e, "Permit pool closed");
                    break;
                }
            };

            keys.push(candidate.key().to_string());
            let task = Arc::clone(&self.task);
            handles.push(tokio::spawn(async move {
                let result = task.execute(candidate).await;
                drop(permit);
                result
            }));
        }
        debug!(dispatched = handles.len(), total, "Page dispatched");

        let joined = join_all(handles).await;

        joined
            .into_iter()
            .zip(keys)
            .map(|(joined, key)| match joined {
                Ok(result) => result,
                Err(e) => {
                    error!(key = %key, error = %e, "Conversion task panicked");
                    let error = ItemError::Panicked {
                        key: key.clone(),
                        detail: e.to_string(),
                    };
                    if let Some(cb) = self.task.progress_callback() {
                        cb.on_item_error(&key, &error.to_string());
                    }
                    ConversionResult {
                        output_name: self.task.output_name(&key),
                        source_key: key,
                        outcome: Err(error),
                    }
                }
            })
            .collect()
    }
}
