//! Typed errors for the harvest library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so callers can tell
//! run-fatal failures apart from the per-candidate ones the dispatcher absorbs.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a whole harvest run.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// Link table could not be loaded
    #[error("link source unavailable: {0}")]
    Source(#[from] SourceError),

    /// Page layout selectors are invalid
    #[error("page layout error: {0}")]
    Layout(#[from] ParseError),

    /// Output table could not be written
    #[error("write failed: {0}")]
    Write(#[from] WriteError),

    /// Run was cancelled before every task finished
    #[error("harvest cancelled")]
    Cancelled,

    /// Result collector stopped unexpectedly
    #[error("collector failed: {0}")]
    Collector(String),
}

/// Errors loading the persisted name → link table.
#[derive(Debug, Error)]
pub enum SourceError {
    /// File could not be opened
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File has no header row
    #[error("{path} has no header row")]
    MissingHeader { path: PathBuf },

    /// CSV structure could not be decoded
    #[error("malformed table {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Errors fetching a single page.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Server answered with a non-2xx status
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    /// Request exceeded the client timeout
    #[error("timeout fetching {url}")]
    Timeout { url: String },

    /// Connection, TLS, redirect or body read failure
    #[error("transport error fetching {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Errors treating a document as HTML.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Response declared a content type that is not markup
    #[error("not an HTML document ({content_type}): {url}")]
    NotHtml { url: String, content_type: String },

    /// A layout selector failed to parse
    #[error("invalid selector `{selector}`: {reason}")]
    Selector { selector: String, reason: String },
}

/// Errors writing an output table.
#[derive(Debug, Error)]
pub enum WriteError {
    /// Destination (or its staging file) could not be created
    #[error("cannot create {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Flushing or moving the staged file failed
    #[error("failed writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV encoding failed
    #[error("failed encoding {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Errors ranking candidates against a preference vector.
#[derive(Debug, Error)]
pub enum RankingError {
    /// Table could not be read
    #[error("ranking source unavailable: {0}")]
    Source(#[from] SourceError),

    /// Preference count does not match the response columns
    #[error("expected {expected} preferences, got {actual}")]
    Shape { expected: usize, actual: usize },

    /// A response cell is not a number
    #[error("non-numeric response for {name} in column {column}: {value:?}")]
    NotNumeric {
        name: String,
        column: String,
        value: String,
    },
}

/// Result type alias for harvest runs.
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for page fetches.
pub type FetchResult<T> = std::result::Result<T, FetchError>;
