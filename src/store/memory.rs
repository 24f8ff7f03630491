//! In-memory object store.

use super::{ContinuationToken, ObjectDescriptor, ObjectStore, Page};
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Entry {
    Object(Vec<u8>),
    Directory,
}

/// A `BTreeMap`-backed [`ObjectStore`].
///
/// Pages are served in key order with the same last-key token scheme as
/// [`super::OpendalStore`]. Downloads can be slowed down or made to fail per
/// key, which is what the pipeline tests use to exercise concurrency and
/// failure isolation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Entry>>,
    failing: Mutex<HashSet<String>>,
    download_delay: Duration,
    list_calls: AtomicUsize,
    downloads: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every download.
    pub fn with_download_delay(mut self, delay: Duration) -> Self {
        self.download_delay = delay;
        self
    }

    /// Store an object, replacing any previous content.
    pub fn insert(&self, key: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.entries().insert(key.into(), Entry::Object(bytes.into()));
    }

    /// Store a virtual directory marker.
    pub fn insert_directory(&self, key: impl Into<String>) {
        self.entries().insert(key.into(), Entry::Directory);
    }

    /// Make every download of `key` fail with a backend error.
    pub fn fail_downloads_for(&self, key: impl Into<String>) {
        self.failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.into());
    }

    /// Content of an object, if present.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        match self.entries().get(key) {
            Some(Entry::Object(bytes)) => Some(bytes.clone()),
            _ => None,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries().contains_key(key)
    }

    /// Number of `list_page` calls served so far.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of `download` calls served so far, failed ones included.
    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_page(
        &self,
        prefix: &str,
        token: Option<&ContinuationToken>,
        page_size: usize,
    ) -> Result<Page, StoreError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let lower = match token {
            Some(t) => Bound::Excluded(t.as_str().to_string()),
            None => Bound::Unbounded,
        };

        let objects: Vec<ObjectDescriptor> = self
            .entries()
            .range((lower, Bound::Unbounded))
            .filter(|(key, _)| key.starts_with(prefix))
            .take(page_size.saturating_add(1))
            .map(|(key, entry)| match entry {
                Entry::Object(bytes) => ObjectDescriptor::object(key.clone(), bytes.len() as u64),
                Entry::Directory => ObjectDescriptor::directory(key.clone()),
            })
            .collect();

        Ok(Page::from_lookahead(objects, page_size))
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        if !self.download_delay.is_zero() {
            tokio::time::sleep(self.download_delay).await;
        }

        let failing = self
            .failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(key);
        if failing {
            return Err(StoreError::Backend(format!("injected failure for '{key}'")));
        }

        self.get(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn upload(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        self.insert(key, bytes);
        Ok(())
    }
}
