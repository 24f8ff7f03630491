//! Pagination loop over a container listing.
//!
//! The cursor owns the continuation token. It lists one page, hands it to
//! the caller's page processor and waits for that to finish before asking
//! the store for the next page, so pages never overlap. The loop ends after
//! the first page that carries no token.
//!
//! A listing failure ends the run: without the page there is no token, and
//! without the token there is no way to know what remains.

use crate::error::BatchError;
use crate::store::{ContinuationToken, ObjectStore, Page};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

/// Counters returned by [`BatchCursor::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CursorStats {
    pub pages: usize,
    pub objects: usize,
}

/// Walks a paginated listing, one page at a time.
pub struct BatchCursor {
    store: Arc<dyn ObjectStore>,
    prefix: String,
    page_size: usize,
    token: Option<ContinuationToken>,
    finished: bool,
    stats: CursorStats,
}

impl BatchCursor {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: impl Into<String>, page_size: usize) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            page_size: page_size.max(1),
            token: None,
            finished: false,
            stats: CursorStats::default(),
        }
    }

    /// Fetch the next page, or `None` once the terminal page has been served.
    pub async fn next_page(&mut self) -> Result<Option<Page>, BatchError> {
        if self.finished {
            return Ok(None);
        }

        let page = self
            .store
            .list_page(&self.prefix, self.token.as_ref(), self.page_size)
            .await
            .map_err(|source| BatchError::Listing {
                token: self.token.as_ref().map(|t| t.to_string()),
                source,
            })?;

        if let (Some(prev), Some(next)) = (&self.token, &page.next_token) {
            if prev == next {
                return Err(BatchError::RepeatedToken {
                    token: next.to_string(),
                });
            }
        }

        self.stats.pages += 1;
        self.stats.objects += page.len();
        debug!(
            page = self.stats.pages,
            objects = page.len(),
            more = !page.is_last(),
            "Fetched page"
        );

        self.token = page.next_token.clone();
        self.finished = self.token.is_none();
        Ok(Some(page))
    }

    /// Drive the whole listing through `process_page`.
    ///
    /// `process_page` receives the 1-indexed page number and the page; the
    /// next listing call is only issued once its future has completed.
    pub async fn run<F, Fut>(&mut self, mut process_page: F) -> Result<CursorStats, BatchError>
    where
        F: FnMut(usize, Page) -> Fut,
        Fut: Future<Output = ()>,
    {
        while let Some(page) = self.next_page().await? {
            process_page(self.stats.pages, page).await;
        }

        info!(
            pages = self.stats.pages,
            objects = self.stats.objects,
            "Listing exhausted"
        );
        Ok(self.stats)
    }

    pub fn stats(&self) -> CursorStats {
        self.stats
    }
}
