//! Candidate selection: which listed objects are worth converting.

use crate::config::BatchConfig;
use crate::store::ObjectDescriptor;

/// A listed object that passed [`CandidateFilter::select`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateItem {
    descriptor: ObjectDescriptor,
}

impl CandidateItem {
    pub fn key(&self) -> &str {
        &self.descriptor.key
    }

    pub fn content_length(&self) -> u64 {
        self.descriptor.content_length
    }

    pub fn descriptor(&self) -> &ObjectDescriptor {
        &self.descriptor
    }
}

/// Pure predicate over listing entries.
///
/// An entry is a candidate iff it is a real object (not a directory marker),
/// its key ends with `source_extension` (case-sensitive) and it is strictly
/// larger than `min_size_bytes`.
#[derive(Debug, Clone)]
pub struct CandidateFilter {
    source_extension: String,
    min_size_bytes: u64,
}

impl CandidateFilter {
    pub fn new(source_extension: impl Into<String>, min_size_bytes: u64) -> Self {
        Self {
            source_extension: source_extension.into(),
            min_size_bytes,
        }
    }

    pub fn from_config(config: &BatchConfig) -> Self {
        Self::new(config.source_extension.clone(), config.min_size_bytes)
    }

    pub fn is_candidate(&self, descriptor: &ObjectDescriptor) -> bool {
        descriptor.is_object()
            && descriptor.key.ends_with(&self.source_extension)
            && descriptor.content_length > self.min_size_bytes
    }

    /// Keep the candidates of a page, in listing order.
    pub fn select(&self, objects: &[ObjectDescriptor]) -> Vec<CandidateItem> {
        objects
            .iter()
            .filter(|d| self.is_candidate(d))
            .map(|d| CandidateItem {
                descriptor: d.clone(),
            })
            .collect()
    }
}
