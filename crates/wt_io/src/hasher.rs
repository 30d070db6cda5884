//! Deterministic hashing and ID builders for canonical artifacts.
//!
//! - Canonical JSON hashing: sorted object keys, array order preserved.
//! - `AGG:<hex64>` identifies an aggregation document by its canonical bytes.
//! - `RUN:<rfc3339-utc>-<hex64>` identifies a run: timestamp plus a hash of the
//!   canonical run payload.
//! - Hex digests are lowercase.
//!
//! Use `sha256_canonical(..)` for JSON values/structs, `sha256_hex(..)` for raw bytes.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::canonical_json::to_canonical_bytes;
use crate::IoError;

/// SHA-256 over raw bytes.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// SHA-256 over canonical JSON bytes of any serializable value.
pub fn sha256_canonical<T: Serialize + ?Sized>(value: &T) -> Result<String, IoError> {
    Ok(sha256_hex(&to_canonical_bytes(value)?))
}

/// `AGG:<hex>` for an aggregation payload.
pub fn agg_id_from_canonical<T: Serialize + ?Sized>(value: &T) -> Result<String, IoError> {
    Ok(format!("AGG:{}", sha256_canonical(value)?))
}

/// Normalize an RFC3339 timestamp to UTC seconds with a trailing `Z`.
pub fn normalize_timestamp(ts: &str) -> Result<String, IoError> {
    let dt = DateTime::parse_from_rfc3339(ts.trim()).map_err(|e| IoError::Json {
        pointer: "/timestamp_utc".into(),
        msg: format!("{ts:?} is not RFC3339: {e}"),
    })?;
    Ok(dt.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// `RUN:<timestamp>-<hex>` for a run payload.
pub fn run_id_from_canonical<T: Serialize + ?Sized>(
    timestamp_utc: &str,
    run_value: &T,
) -> Result<String, IoError> {
    let ts = normalize_timestamp(timestamp_utc)?;
    Ok(format!("RUN:{ts}-{}", sha256_canonical(run_value)?))
}
