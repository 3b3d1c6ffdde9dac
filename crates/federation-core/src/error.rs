//! Typed failures surfaced by the federation index.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised when a federation index cannot be provided to a caller.
///
/// `NotFound` is the one condition that search callers are expected to
/// handle explicitly: the pipeline has not produced an index yet.
#[derive(Debug, Error)]
pub enum IndexError {
    /// No index file at the given path.
    #[error("federation index not found at {}", path.display())]
    NotFound { path: PathBuf },

    /// The file exists but could not be read.
    #[error("failed to read federation index {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not a valid federation index document.
    #[error("failed to parse federation index {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl IndexError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, IndexError::NotFound { .. })
    }
}
