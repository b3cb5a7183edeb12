//! Error types for Pricewatch.
//!
//! Library crates use [`PricewatchError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Pricewatch operations.
#[derive(Debug, thiserror::Error)]
pub enum PricewatchError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network or parse failure while acquiring raw listings or a rate.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// The persistence layer is unreachable or refused the operation.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// No exchange rate from the staging table or the transient fetch result.
    #[error("no exchange rate available from store or transient source")]
    NoRateAvailable,

    /// Single-record enrichment failure. Absorbed by the transformer: the
    /// record is logged and dropped, the batch continues.
    #[error("enrichment failed for {title:?}: {message}")]
    Enrichment { title: String, message: String },

    /// Zero records survived enrichment from a non-empty input.
    #[error("empty result: none of the {input} scraped records survived enrichment")]
    EmptyResult { input: usize },

    /// Persistence failure during load. `rows_committed` is the number of
    /// rows durably applied before the failure (always 0 for the atomic
    /// replace path, possibly nonzero for the row-at-a-time upsert path).
    #[error("load error after {rows_committed} committed row(s): {message}")]
    Load {
        message: String,
        rows_committed: usize,
    },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PricewatchError>;

impl PricewatchError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a fetch error from any displayable message.
    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    /// Create a record-level enrichment error.
    pub fn enrichment(title: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Enrichment {
            title: title.into(),
            message: msg.into(),
        }
    }

    /// Create a load error with the number of rows committed before failure.
    pub fn load(msg: impl Into<String>, rows_committed: usize) -> Self {
        Self::Load {
            message: msg.into(),
            rows_committed,
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error aborts the whole node rather than a single record.
    pub fn is_node_fatal(&self) -> bool {
        !matches!(self, Self::Enrichment { .. })
    }
}
