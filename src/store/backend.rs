//! OpenDAL-backed object store.

use super::{ContinuationToken, ObjectDescriptor, ObjectStore, Page};
use crate::error::{BatchError, StoreError};
use async_trait::async_trait;
use futures::TryStreamExt;
use opendal::{services, Entry, Lister, Operator};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Container the converter was originally deployed against.
pub const DEFAULT_CONTAINER: &str = "chromatograms";

/// Where the source objects live.
#[derive(Clone)]
pub enum StoreConfig {
    /// An Azure Blob Storage container addressed by a connection string.
    AzureBlob {
        connection_string: String,
        container: String,
    },
    /// A local directory, listed and read like a container.
    Fs { root: PathBuf },
}

impl StoreConfig {
    /// Azure Blob config for the default container.
    pub fn azure(connection_string: impl Into<String>) -> Self {
        StoreConfig::AzureBlob {
            connection_string: connection_string.into(),
            container: DEFAULT_CONTAINER.to_string(),
        }
    }
}

// The connection string carries the account key; keep it out of logs.
impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreConfig::AzureBlob { container, .. } => f
                .debug_struct("AzureBlob")
                .field("connection_string", &"<redacted>")
                .field("container", container)
                .finish(),
            StoreConfig::Fs { root } => f.debug_struct("Fs").field("root", root).finish(),
        }
    }
}

/// A listing in progress: the live lister plus the entry read ahead of the
/// last page handed out.
struct ActiveListing {
    prefix: String,
    /// Token handed out with the previous page; the next call must present it.
    resume_token: Option<String>,
    lister: Lister,
    lookahead: Option<Entry>,
}

/// [`ObjectStore`] over an OpenDAL [`Operator`].
///
/// ## Paging
///
/// One OpenDAL [`Lister`] is kept open between `list_page` calls, so the
/// backend's own continuation (Azure's `NextMarker`) drives the walk and
/// every blob is listed exactly once. The lister is reused when the caller
/// presents the token this store handed out last; any other token opens a
/// new lister and skips forward to the token's key.
pub struct OpendalStore {
    operator: Operator,
    listing: Mutex<Option<ActiveListing>>,
    listers_opened: AtomicUsize,
}

impl fmt::Debug for OpendalStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpendalStore")
            .field("operator", &self.operator)
            .field("listers_opened", &self.listers_opened())
            .finish()
    }
}

impl OpendalStore {
    /// Build the operator for `config`.
    pub fn new(config: &StoreConfig) -> Result<Self, BatchError> {
        let operator = match config {
            StoreConfig::AzureBlob {
                connection_string,
                container,
            } => {
                let builder = services::Azblob::from_connection_string(connection_string)
                    .map_err(|e| BatchError::StoreInit(e.to_string()))?
                    .container(container);
                Operator::new(builder)
                    .map(|op| op.finish())
                    .map_err(|e| BatchError::StoreInit(e.to_string()))?
            }
            StoreConfig::Fs { root } => {
                let root = root.to_string_lossy();
                let builder = services::Fs::default().root(&root);
                Operator::new(builder)
                    .map(|op| op.finish())
                    .map_err(|e| BatchError::StoreInit(e.to_string()))?
            }
        };

        info!(store = ?config, "Object store initialised");
        Ok(Self::from_operator(operator))
    }

    /// Wrap an operator built elsewhere.
    pub fn from_operator(operator: Operator) -> Self {
        Self {
            operator,
            listing: Mutex::new(None),
            listers_opened: AtomicUsize::new(0),
        }
    }

    /// Number of backend listings started so far.
    pub fn listers_opened(&self) -> usize {
        self.listers_opened.load(Ordering::SeqCst)
    }

    /// Start a recursive listing under `prefix`, positioned after `token`.
    async fn open_listing(
        &self,
        prefix: &str,
        token: Option<&ContinuationToken>,
    ) -> Result<ActiveListing, StoreError> {
        self.listers_opened.fetch_add(1, Ordering::SeqCst);
        let path = if prefix.is_empty() { "/" } else { prefix };
        let mut lister = self.operator.lister_with(path).recursive(true).await?;

        if let Some(token) = token {
            debug!(path, token = token.as_str(), "Resuming listing from token");
            loop {
                match lister.try_next().await? {
                    Some(entry) if entry.path() == token.as_str() => break,
                    Some(_) => continue,
                    None => {
                        return Err(StoreError::Backend(format!(
                            "continuation token '{token}' is not in the listing of '{path}'"
                        )))
                    }
                }
            }
        }

        Ok(ActiveListing {
            prefix: prefix.to_string(),
            resume_token: token.map(|t| t.as_str().to_string()),
            lister,
            lookahead: None,
        })
    }

    /// Turn a listing entry into a descriptor, filling in the size when the
    /// backend's lister does not report it.
    async fn describe(&self, entry: Entry) -> Result<ObjectDescriptor, StoreError> {
        let meta = entry.metadata();
        if meta.is_dir() {
            return Ok(ObjectDescriptor::directory(entry.path()));
        }

        let mut content_length = meta.content_length();
        if content_length == 0 {
            content_length = self.operator.stat(entry.path()).await?.content_length();
        }
        Ok(ObjectDescriptor::object(entry.path(), content_length))
    }
}

#[async_trait]
impl ObjectStore for OpendalStore {
    async fn list_page(
        &self,
        prefix: &str,
        token: Option<&ContinuationToken>,
        page_size: usize,
    ) -> Result<Page, StoreError> {
        let page_size = page_size.max(1);
        let mut slot = self.listing.lock().await;

        let resumable = slot.as_ref().is_some_and(|active| {
            active.prefix == prefix
                && active.resume_token.as_deref() == token.map(ContinuationToken::as_str)
        });
        let mut active = match slot.take() {
            Some(active) if resumable => active,
            _ => self.open_listing(prefix, token).await?,
        };

        // Read one entry past the page to learn whether another page exists.
        let mut entries: Vec<Entry> = active.lookahead.take().into_iter().collect();
        while entries.len() <= page_size {
            match active.lister.try_next().await? {
                Some(entry) => entries.push(entry),
                None => break,
            }
        }
        let more = entries.len() > page_size;
        if more {
            active.lookahead = entries.pop();
        }

        let mut objects = Vec::with_capacity(entries.len());
        for entry in entries {
            objects.push(self.describe(entry).await?);
        }

        let next_token = if more {
            objects
                .last()
                .map(|last| ContinuationToken::new(last.key.clone()))
        } else {
            None
        };
        if let Some(ref next) = next_token {
            active.resume_token = Some(next.as_str().to_string());
            *slot = Some(active);
        }

        let page = Page::new(objects, next_token);
        debug!(
            prefix,
            objects = page.len(),
            last = page.is_last(),
            "Listed page"
        );
        Ok(page)
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        debug!(key, "Downloading object");
        let data = self.operator.read(key).await?.to_vec();
        debug!(key, size = data.len(), "Download complete");
        Ok(data)
    }

    async fn upload(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        debug!(key, size = bytes.len(), "Uploading object");
        self.operator.write(key, bytes).await?;
        Ok(())
    }
}
