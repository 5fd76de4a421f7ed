use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by the record store and its persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("malformed document for key '{key}': {source}")]
    Parse {
        key: String,
        source: serde_json::Error,
    },

    #[error("document for key '{key}' has version {found}, newest supported is {supported}")]
    UnsupportedVersion {
        key: String,
        found: u64,
        supported: u32,
    },

    #[error("serialising collection '{key}': {source}")]
    Serialize {
        key: String,
        source: serde_json::Error,
    },

    #[error("new incident is missing required field '{0}'")]
    MissingField(&'static str),

    #[error("'{0}' is not a recognised incident date/time")]
    InvalidDate(String),

    #[error("summary date '{0}' must be formatted as YYYY-MM-DD")]
    InvalidSummaryDate(String),

    #[error("expected LABEL=COUNT with a whole-number count, got '{0}'")]
    InvalidCount(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    /// Errors caused by the contents of a persisted document rather than the filesystem.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            StoreError::Parse { .. } | StoreError::UnsupportedVersion { .. }
        )
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
