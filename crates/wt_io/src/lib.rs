//! crates/wt_io/src/lib.rs
//! File-facing half of the engine: everything else in the workspace is I/O-free.
//!
//! - `loader`: records and engine configuration from local JSON files
//! - `schema`: embedded Draft 2020-12 schemas for config and manifest
//! - `manifest`: run manifest (offline paths, explicit aggregation params)
//! - `source`: `JsonFileSource`, a file-backed `RecordSource`
//! - `canonical_json` / `hasher`: sorted-key bytes, SHA-256 digests, artifact IDs

#![forbid(unsafe_code)]

use thiserror::Error;

/// Unified error for wt_io.
#[derive(Debug, Error)]
pub enum IoError {
    /// Filesystem / path errors (open, create_dir_all, rename, fsync).
    #[error("io/path error: {0}")]
    Path(String),

    /// JSON parse or shape errors, with a JSON Pointer when one is known.
    #[error("json error at {pointer}: {msg}")]
    Json { pointer: String, msg: String },

    /// JSON Schema violations (first violation reported).
    #[error("schema error at {pointer}: {msg}")]
    Schema { pointer: String, msg: String },

    /// Input larger than the configured read limit.
    #[error("{path} exceeds {limit} bytes")]
    TooLarge { path: String, limit: u64 },

    /// Manifest shape, offline policy, or digest failures.
    #[error("manifest error: {0}")]
    Manifest(String),

    /// Configuration that parsed but failed domain validation.
    #[error("invalid configuration: {0}")]
    Config(#[from] wt_core::CoreError),
}

pub type IoResult<T> = Result<T, IoError>;

impl From<std::io::Error> for IoError {
    fn from(e: std::io::Error) -> Self {
        IoError::Path(e.to_string())
    }
}

impl From<serde_json::Error> for IoError {
    fn from(e: serde_json::Error) -> Self {
        // serde_json keeps line/column, not a pointer.
        IoError::Json { pointer: "/".to_string(), msg: e.to_string() }
    }
}

pub mod canonical_json;
pub mod hasher;
pub mod loader;
pub mod manifest;
pub mod schema;
pub mod source;

pub use loader::{load_config, load_records, LoadedRecords, SkippedItem};
pub use manifest::{load_and_resolve_manifest, Manifest, ResolvedManifest};
pub use source::JsonFileSource;
