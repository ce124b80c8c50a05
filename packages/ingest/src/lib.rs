#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Dataset retrieval and load orchestration.
//!
//! Two entry points per dataset, both producing a
//! [`storemap_dataset_models::FeatureCollection`]:
//!
//! - [`loader::load_dataset`] fetches and normalizes a single whole-file
//!   CSV resource; transport/decode failures propagate to the caller with
//!   no partial result.
//! - [`loader::load_window`] fetches a pre-sharded dataset chunk by
//!   chunk, applies a bounding-box filter, and merges survivors.
//!   Individual shard failures are recorded and skipped, never fatal.

pub mod loader;
pub mod retry;
pub mod rows;
pub mod source;

pub use loader::{
    CancelToken, DEFAULT_SHARD_CONCURRENCY, LoadOptions, ShardOutcome, ShardResult, WindowSummary,
    WindowedLoad, load_dataset, load_window,
};

/// Errors that can occur while retrieving or decoding a dataset resource.
///
/// Row-level problems are never errors; they are counted in
/// [`storemap_dataset_models::NormalizeStats`] by the normalization layer.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server returned a non-retryable (or retry-exhausted) status.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// Requested URL.
        url: String,
        /// Response status code.
        status: reqwest::StatusCode,
    },

    /// I/O error (file read, gzip decode).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The resource decoded but was not usable (e.g. no header row).
    #[error("Parse error: {0}")]
    Parse(String),

    /// A windowed load was requested for a dataset with no shard config.
    #[error("dataset {0} is not sharded; use a whole-file load")]
    NotSharded(String),
}
