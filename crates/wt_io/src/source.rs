//! File-backed record source.

use std::path::{Path, PathBuf};

use tracing::warn;

use wt_core::source::{FetchedRecords, RecordQuery, RecordSource, SourceError};
use wt_core::{Anomaly, RawWasteRecord};

use crate::loader::load_records;
use crate::IoError;

/// Reads the whole records file on every fetch. The query is not pushed down;
/// the engine applies its own filters after normalization.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSource for JsonFileSource {
    fn fetch(&self, query: &RecordQuery) -> Result<Vec<RawWasteRecord>, SourceError> {
        let batch = self.fetch_batch(query)?;
        if !batch.undecodable.is_empty() {
            warn!(path = %self.path.display(), dropped = batch.undecodable.len(),
                  "undecodable entries dropped; use fetch_batch to keep them");
        }
        Ok(batch.records)
    }

    /// Entries that fail to decode come back as `undecodable_record` anomalies.
    fn fetch_batch(&self, _query: &RecordQuery) -> Result<FetchedRecords, SourceError> {
        let loaded = match load_records(&self.path) {
            Ok(loaded) => loaded,
            Err(e @ (IoError::Json { .. } | IoError::TooLarge { .. })) => {
                return Err(SourceError::Malformed(format!("{}: {e}", self.path.display())));
            }
            Err(e) => {
                return Err(SourceError::Unavailable(format!("{}: {e}", self.path.display())));
            }
        };
        let undecodable = loaded
            .skipped
            .into_iter()
            .map(|s| Anomaly::undecodable(s.index, s.record_id, s.reason))
            .collect();
        Ok(FetchedRecords { records: loaded.records, undecodable })
    }
}
