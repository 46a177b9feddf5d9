//! Error types for yougile-sync
//!
//! This module provides the error taxonomy for the library:
//! - Request-level failures (rate limiting, HTTP status, network, decoding), which the
//!   retry layers absorb
//! - Structural failures (unreadable snapshot, missing header column, header mismatch),
//!   which abort the run
//! - Configuration errors with the offending key

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for yougile-sync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for yougile-sync
///
/// Each variant includes contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "api.board_id")
        key: Option<String>,
    },

    /// The server answered 429 Too Many Requests
    #[error("rate limited by {url}")]
    RateLimited {
        /// The URL that was rate limited
        url: String,
        /// Wait requested by the server via `Retry-After`, if any
        retry_after: Option<Duration>,
    },

    /// The server answered with a non-success status other than 429
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        /// The URL that failed
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// The response body could not be decoded into the expected shape
    #[error("failed to decode response from {url}: {message}")]
    Decode {
        /// The URL whose response could not be decoded
        url: String,
        /// Decoder message
        message: String,
    },

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Invalid URL built from the configured base URL
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV encoding or decoding error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The persisted snapshot is unusable
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// New rows cannot be merged with the persisted snapshot
    #[error("merge error: {0}")]
    Merge(#[from] MergeError),

    /// A bounded retry policy ran out of rounds
    #[error("gave up on {what} after {attempts} attempts")]
    RetriesExhausted {
        /// What was being fetched (URL or item description)
        what: String,
        /// How many attempts were made before giving up
        attempts: u32,
    },
}

/// Errors raised while reading or validating a persisted snapshot
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The file exists but holds no header row
    #[error("snapshot {path} contains no header row")]
    Empty {
        /// Path of the empty snapshot
        path: PathBuf,
    },

    /// The header lacks a required column
    #[error("snapshot header has no \"{column}\" column")]
    MissingColumn {
        /// The column that was expected
        column: String,
    },

    /// A data row does not have as many cells as the header
    #[error("row {line} has {found} cells, header has {expected}")]
    RaggedRow {
        /// 1-based row number, header being row 1
        line: usize,
        /// Header cell count
        expected: usize,
        /// Cell count of the offending row
        found: usize,
    },
}

/// Errors raised while combining new rows with an old snapshot
#[derive(Debug, Error)]
pub enum MergeError {
    /// Headers differ in content or order
    #[error("snapshot headers do not match: old {old:?}, new {new:?}")]
    HeaderMismatch {
        /// Header of the persisted snapshot
        old: Vec<String>,
        /// Header of the freshly projected rows
        new: Vec<String>,
    },

    /// The task identifier column is absent from the header
    #[error("header has no \"{column}\" column")]
    MissingColumn {
        /// The column that was expected
        column: String,
    },
}

impl Error {
    /// Build a configuration error for the given key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Machine-readable code for log output
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::RateLimited { .. } => "rate_limited",
            Error::HttpStatus { .. } => "http_status",
            Error::Decode { .. } => "decode_error",
            Error::Network(_) => "network_error",
            Error::InvalidUrl(_) => "invalid_url",
            Error::Serialization(_) => "serialization_error",
            Error::Io(_) => "io_error",
            Error::Csv(_) => "csv_error",
            Error::Snapshot(SnapshotError::Empty { .. }) => "snapshot_empty",
            Error::Snapshot(SnapshotError::MissingColumn { .. }) => "snapshot_missing_column",
            Error::Snapshot(SnapshotError::RaggedRow { .. }) => "snapshot_ragged_row",
            Error::Merge(MergeError::HeaderMismatch { .. }) => "header_mismatch",
            Error::Merge(MergeError::MissingColumn { .. }) => "merge_missing_column",
            Error::RetriesExhausted { .. } => "retries_exhausted",
        }
    }
}
