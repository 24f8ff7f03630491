//! Error types for the svg2gif-batch library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`BatchError`] — **Fatal**: the run cannot proceed at all (listing the
//!   container failed, the store could not be initialised, the configuration
//!   is invalid). Returned as `Err(BatchError)` from the top-level
//!   `convert_*` functions.
//!
//! * [`ItemError`] — **Non-fatal**: a single object failed (download glitch,
//!   malformed SVG, full disk) but the rest of the batch is fine. Stored
//!   inside [`crate::output::ConversionResult`] so one bad input never
//!   stops the batch.
//!
//! [`StoreError`] and [`ConvertError`] are the narrower errors raised by the
//! object-store gateway and the raster converter; the pipeline lifts them
//! into one of the two above depending on where they happen.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the svg2gif-batch library.
#[derive(Debug, Error)]
pub enum BatchError {
    // ── Listing errors ────────────────────────────────────────────────────
    /// A paginated listing call failed. The run cannot know what is left.
    #[error("Listing failed (continuation token: {}): {source}", .token.as_deref().unwrap_or("<start>"))]
    Listing {
        token: Option<String>,
        #[source]
        source: StoreError,
    },

    /// The store handed back the token it was just given; following it would
    /// loop forever.
    #[error("Listing returned the same continuation token twice: '{token}'")]
    RepeatedToken { token: String },

    // ── Setup errors ──────────────────────────────────────────────────────
    /// The object-store backend could not be built.
    #[error("Failed to initialise object store: {0}\nCheck the connection string and container name.")]
    StoreInit(String),

    /// The local output directory could not be created.
    #[error("Failed to create output directory '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Outcome errors ────────────────────────────────────────────────────
    /// Some items failed during the run.
    ///
    /// Returned by [`crate::output::BatchOutput::into_result`] when the
    /// caller wants to treat any item failure as an error.
    #[error("{failed}/{total} candidates failed during conversion")]
    PartialFailure {
        converted: usize,
        failed: usize,
        total: usize,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single candidate object.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum ItemError {
    /// The object could not be downloaded.
    #[error("{key}: download failed: {detail}")]
    Download { key: String, detail: String },

    /// The bytes are not a usable SVG document.
    #[error("{key}: SVG decode failed: {detail}")]
    Decode { key: String, detail: String },

    /// Rasterisation, trim or resize failed.
    #[error("{key}: transform failed: {detail}")]
    Transform { key: String, detail: String },

    /// GIF encoding failed.
    #[error("{key}: GIF encoding failed: {detail}")]
    Encode { key: String, detail: String },

    /// The converted file could not be written to the output directory.
    #[error("{key}: failed to write '{path}': {detail}")]
    Write {
        key: String,
        path: PathBuf,
        detail: String,
    },

    /// The converted file could not be uploaded back to the store.
    #[error("{key}: upload of '{target}' failed: {detail}")]
    Upload {
        key: String,
        target: String,
        detail: String,
    },

    /// The conversion task panicked or was aborted.
    #[error("{key}: conversion task panicked: {detail}")]
    Panicked { key: String, detail: String },
}

impl ItemError {
    /// Key of the source object this error belongs to.
    pub fn key(&self) -> &str {
        match self {
            ItemError::Download { key, .. }
            | ItemError::Decode { key, .. }
            | ItemError::Transform { key, .. }
            | ItemError::Encode { key, .. }
            | ItemError::Write { key, .. }
            | ItemError::Upload { key, .. }
            | ItemError::Panicked { key, .. } => key,
        }
    }

    /// Short stage label, used as a structured log field.
    pub fn stage(&self) -> &'static str {
        match self {
            ItemError::Download { .. } => "download",
            ItemError::Decode { .. } => "decode",
            ItemError::Transform { .. } => "transform",
            ItemError::Encode { .. } => "encode",
            ItemError::Write { .. } => "write",
            ItemError::Upload { .. } => "upload",
            ItemError::Panicked { .. } => "panic",
        }
    }
}

/// Errors raised by an [`crate::store::ObjectStore`] implementation.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The object does not exist.
    #[error("object not found: '{0}'")]
    NotFound(String),

    /// The backend does not support the requested operation.
    #[error("operation not supported by backend: {0}")]
    Unsupported(String),

    /// Any other backend failure (network, auth, throttling, …).
    #[error("{0}")]
    Backend(String),
}

impl From<opendal::Error> for StoreError {
    fn from(e: opendal::Error) -> Self {
        match e.kind() {
            opendal::ErrorKind::NotFound => StoreError::NotFound(e.to_string()),
            opendal::ErrorKind::Unsupported => StoreError::Unsupported(e.to_string()),
            _ => StoreError::Backend(e.to_string()),
        }
    }
}

/// Errors raised by a [`crate::pipeline::converter::RasterConverter`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConvertError {
    #[error("{0}")]
    Decode(String),

    #[error("{0}")]
    Transform(String),

    #[error("{0}")]
    Encode(String),
}

impl ConvertError {
    /// Attach the source key, turning this into a per-item error.
    pub fn for_item(self, key: &str) -> ItemError {
        let key = key.to_string();
        match self {
            ConvertError::Decode(detail) => ItemError::Decode { key, detail },
            ConvertError::Transform(detail) => ItemError::Transform { key, detail },
            ConvertError::Encode(detail) => ItemError::Encode { key, detail },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_failure_display() {
        let e = BatchError::PartialFailure {
            converted: 9,
            failed: 1,
            total: 10,
        };
        let msg = e.to_string();
        assert!(msg.contains("1/10"), "got: {msg}");
    }

    #[test]
    fn listing_display_without_token() {
        let e = BatchError::Listing {
            token: None,
            source: StoreError::Backend("403 Forbidden".into()),
        };
        let msg = e.to_string();
        assert!(msg.contains("<start>"), "got: {msg}");
        assert!(msg.contains("403 Forbidden"), "got: {msg}");
    }

    #[test]
    fn listing_display_with_token() {
        let e = BatchError::Listing {
            token: Some("charts/b.svg".into()),
            source: StoreError::Backend("timeout".into()),
        };
        assert!(e.to_string().contains("charts/b.svg"));
    }

    #[test]
    fn item_error_key_and_stage() {
        let e = ItemError::Write {
            key: "a.svg".into(),
            path: PathBuf::from("/out/a.gif"),
            detail: "disk full".into(),
        };
        assert_eq!(e.key(), "a.svg");
        assert_eq!(e.stage(), "write");
        assert!(e.to_string().contains("/out/a.gif"));
    }

    #[test]
    fn convert_error_for_item_keeps_detail() {
        let e = ConvertError::Decode("bad xml".into()).for_item("x/y.svg");
        assert_eq!(
            e,
            ItemError::Decode {
                key: "x/y.svg".into(),
                detail: "bad xml".into()
            }
        );
    }
}
