//! Collaborator seam for record retrieval.
//!
//! The engine never performs I/O itself. A single bulk `fetch` precedes each
//! aggregation; retry/backoff, connection handling and caching belong to the
//! implementor. The query is a pushdown hint: implementors may return a
//! superset, the engine applies the authoritative filters again.

use thiserror::Error;

use crate::records::{Anomaly, RawWasteRecord, RecordStatus};

/// Bulk fetch filter.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordQuery {
    pub year: Option<i32>,
    pub campus: Option<String>,
    pub department: Option<String>,
    pub unit: Option<String>,
    /// `None` means every status.
    pub statuses: Option<Vec<RecordStatus>>,
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("record source unavailable: {0}")]
    Unavailable(String),
    #[error("record source returned malformed data: {0}")]
    Malformed(String),
}

/// One bulk fetch: decoded records plus an `undecodable_record` anomaly for
/// every entry the source read but could not turn into a record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FetchedRecords {
    pub records: Vec<RawWasteRecord>,
    pub undecodable: Vec<Anomaly>,
}

pub trait RecordSource {
    fn fetch(&self, query: &RecordQuery) -> Result<Vec<RawWasteRecord>, SourceError>;

    /// Sources that decode leniently override this to report what they could
    /// not decode; the default has nothing to report.
    fn fetch_batch(&self, query: &RecordQuery) -> Result<FetchedRecords, SourceError> {
        Ok(FetchedRecords { records: self.fetch(query)?, undecodable: Vec::new() })
    }
}

/// In-memory batches (tests, pre-fetched data) ignore the pushdown hint.
impl RecordSource for Vec<RawWasteRecord> {
    fn fetch(&self, _query: &RecordQuery) -> Result<Vec<RawWasteRecord>, SourceError> {
        Ok(self.clone())
    }
}

impl<S: RecordSource + ?Sized> RecordSource for &S {
    fn fetch(&self, query: &RecordQuery) -> Result<Vec<RawWasteRecord>, SourceError> {
        (**self).fetch(query)
    }

    fn fetch_batch(&self, query: &RecordQuery) -> Result<FetchedRecords, SourceError> {
        (**self).fetch_batch(query)
    }
}
