//! Object-store gateway: paginated listing, download and upload.
//!
//! The pipeline only needs three primitives from the store, captured by the
//! [`ObjectStore`] trait. Two implementations ship with the crate:
//!
//! * [`OpendalStore`] — Azure Blob (or a local directory) through OpenDAL.
//! * [`MemoryStore`]  — a `BTreeMap` in memory, for tests and embedding.
//!
//! ## Continuation tokens
//!
//! Both implementations use the last key of a page as the token for the
//! next one. [`MemoryStore`] pages in lexicographic key order;
//! [`OpendalStore`] pages in the backend's listing order (lexicographic for
//! Azure Blob) by keeping one backend lister open across calls. A page that
//! comes back shorter than the requested size carries no token and ends the
//! listing.
//! Callers must treat the token as opaque.

mod backend;
mod memory;

pub use backend::{OpendalStore, StoreConfig, DEFAULT_CONTAINER};
pub use memory::MemoryStore;

use crate::error::StoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a listed entry is a real object or a virtual directory marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectKind {
    Object,
    Directory,
}

/// One entry of a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectDescriptor {
    /// Full key of the object inside the container, e.g. `charts/run-1.svg`.
    pub key: String,
    /// Size of the object in bytes (0 for directories).
    pub content_length: u64,
    pub kind: ObjectKind,
}

impl ObjectDescriptor {
    pub fn object(key: impl Into<String>, content_length: u64) -> Self {
        Self {
            key: key.into(),
            content_length,
            kind: ObjectKind::Object,
        }
    }

    pub fn directory(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            content_length: 0,
            kind: ObjectKind::Directory,
        }
    }

    pub fn is_object(&self) -> bool {
        self.kind == ObjectKind::Object
    }
}

/// Opaque cursor returned by a listing call when more pages remain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The result of one listing call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub objects: Vec<ObjectDescriptor>,
    /// `None` marks the last page.
    pub next_token: Option<ContinuationToken>,
}

impl Page {
    pub fn new(objects: Vec<ObjectDescriptor>, next_token: Option<ContinuationToken>) -> Self {
        Self {
            objects,
            next_token,
        }
    }

    /// Build a page from up to `page_size + 1` sorted descriptors.
    ///
    /// The extra descriptor, when present, only proves that another page
    /// exists; it is dropped and the page's last key becomes the token.
    pub(crate) fn from_lookahead(mut objects: Vec<ObjectDescriptor>, page_size: usize) -> Self {
        if objects.len() > page_size {
            objects.truncate(page_size);
            let next_token = objects
                .last()
                .map(|last| ContinuationToken::new(last.key.clone()));
            Self::new(objects, next_token)
        } else {
            Self::new(objects, None)
        }
    }

    pub fn is_last(&self) -> bool {
        self.next_token.is_none()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// The three store capabilities the batch pipeline relies on.
///
/// Implementations must be `Send + Sync`: the store is shared through an
/// `Arc` by every conversion task running on the worker pool.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List one page of objects below `prefix`, recursively.
    ///
    /// `token` is `None` for the first page and the previous page's
    /// `next_token` afterwards.
    async fn list_page(
        &self,
        prefix: &str,
        token: Option<&ContinuationToken>,
        page_size: usize,
    ) -> Result<Page, StoreError>;

    /// Download an object fully into memory.
    async fn download(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Upload `bytes` as a new object under `key`, replacing any existing one.
    async fn upload(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn objects(n: usize) -> Vec<ObjectDescriptor> {
        (0..n)
            .map(|i| ObjectDescriptor::object(format!("k{i:02}.svg"), 2048))
            .collect()
    }

    #[test]
    fn lookahead_with_extra_entry_yields_token() {
        let page = Page::from_lookahead(objects(4), 3);
        assert_eq!(page.len(), 3);
        assert_eq!(page.next_token, Some(ContinuationToken::new("k02.svg")));
        assert!(!page.is_last());
    }

    #[test]
    fn lookahead_exact_size_is_last_page() {
        let page = Page::from_lookahead(objects(3), 3);
        assert_eq!(page.len(), 3);
        assert!(page.is_last());
    }

    #[test]
    fn lookahead_empty_is_last_page() {
        let page = Page::from_lookahead(Vec::new(), 10);
        assert!(page.is_empty());
        assert!(page.is_last());
    }
}
