//! Result types: per-item outcomes and the run summary.

use crate::error::{BatchError, ItemError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A successfully converted item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertedItem {
    /// Where the GIF was written.
    pub local_path: PathBuf,
    /// Size of the encoded GIF.
    pub bytes: usize,
    pub width: u32,
    pub height: u32,
    /// Whether the GIF was also uploaded to the store.
    pub uploaded: bool,
    pub duration_ms: u64,
}

/// Outcome of one conversion task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub source_key: String,
    /// Derived output name (source extension replaced by the target one).
    pub output_name: String,
    pub outcome: Result<ConvertedItem, ItemError>,
}

impl ConversionResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn error(&self) -> Option<&ItemError> {
        self.outcome.as_ref().err()
    }
}

/// One failed item, as reported in the run summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub key: String,
    pub stage: String,
    pub message: String,
}

impl From<&ItemError> for ItemFailure {
    fn from(e: &ItemError) -> Self {
        Self {
            key: e.key().to_string(),
            stage: e.stage().to_string(),
            message: e.to_string(),
        }
    }
}

/// Counters for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchStats {
    /// Listing calls made.
    pub pages: usize,
    /// Entries returned by all listing calls, directories included.
    pub listed_objects: usize,
    /// Entries that passed the candidate filter.
    pub candidates: usize,
    /// Entries rejected by the candidate filter.
    pub skipped: usize,
    pub converted: usize,
    pub failed: usize,
    /// Total size of all GIFs written.
    pub bytes_written: u64,
    pub uploaded: usize,
    pub total_duration_ms: u64,
}

/// Everything a run produces besides the files themselves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchOutput {
    pub stats: BatchStats,
    /// Every failed item, in completion order within each page.
    pub failures: Vec<ItemFailure>,
}

impl BatchOutput {
    /// Treat any item failure as an error.
    pub fn into_result(self) -> Result<Self, BatchError> {
        if self.stats.failed == 0 {
            Ok(self)
        } else {
            Err(BatchError::PartialFailure {
                converted: self.stats.converted,
                failed: self.stats.failed,
                total: self.stats.candidates,
            })
        }
    }

    /// Fold one page's results into the totals.
    pub(crate) fn record_page(&mut self, listed: usize, skipped: usize, results: &[ConversionResult]) {
        self.stats.pages += 1;
        self.stats.listed_objects += listed;
        self.stats.skipped += skipped;
        self.stats.candidates += results.len();

        for result in results {
            match &result.outcome {
                Ok(item) => {
                    self.stats.converted += 1;
                    self.stats.bytes_written += item.bytes as u64;
                    if item.uploaded {
                        self.stats.uploaded += 1;
                    }
                }
                Err(e) => {
                    self.stats.failed += 1;
                    self.failures.push(ItemFailure::from(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(key: &str, bytes: usize, uploaded: bool) -> ConversionResult {
        ConversionResult {
            source_key: key.to_string(),
            output_name: key.replace(".svg", ".gif"),
            outcome: Ok(ConvertedItem {
                local_path: PathBuf::from(key.replace(".svg", ".gif")),
                bytes,
                width: 10,
                height: 10,
                uploaded,
                duration_ms: 1,
            }),
        }
    }

    fn failed(key: &str) -> ConversionResult {
        ConversionResult {
            source_key: key.to_string(),
            output_name: key.replace(".svg", ".gif"),
            outcome: Err(ItemError::Decode {
                key: key.to_string(),
                detail: "not xml".into(),
            }),
        }
    }

    #[test]
    fn record_page_accumulates() {
        let mut out = BatchOutput::default();
        out.record_page(5, 2, &[ok("a.svg", 100, false), failed("b.svg"), ok("c.svg", 50, true)]);
        out.record_page(1, 1, &[]);

        assert_eq!(out.stats.pages, 2);
        assert_eq!(out.stats.listed_objects, 6);
        assert_eq!(out.stats.skipped, 3);
        assert_eq!(out.stats.candidates, 3);
        assert_eq!(out.stats.converted, 2);
        assert_eq!(out.stats.failed, 1);
        assert_eq!(out.stats.bytes_written, 150);
        assert_eq!(out.stats.uploaded, 1);
        assert_eq!(out.failures.len(), 1);
        assert_eq!(out.failures[0].key, "b.svg");
        assert_eq!(out.failures[0].stage, "decode");
    }

    #[test]
    fn into_result_flags_partial_failure() {
        let mut out = BatchOutput::default();
        out.record_page(2, 0, &[ok("a.svg", 1, false), failed("b.svg")]);
        let err = out.into_result().unwrap_err();
        assert!(err.to_string().contains("1/2"), "got: {err}");
    }

    #[test]
    fn into_result_passes_clean_run() {
        let mut out = BatchOutput::default();
        out.record_page(1, 0, &[ok("a.svg", 1, false)]);
        assert!(out.into_result().is_ok());
    }

    #[test]
    fn stats_serialise_to_json() {
        let json = serde_json::to_string(&BatchStats::default()).unwrap();
        assert!(json.contains("\"converted\":0"));
    }
}
