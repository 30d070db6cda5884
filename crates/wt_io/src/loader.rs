//! Loader: read local JSON artifacts (records, engine configuration).
//!
//! Records are read leniently. The file must be a JSON array of records or an
//! object with a `records` array; each element is decoded on its own, and an
//! element that cannot be decoded at all is skipped and reported rather than
//! failing the batch. The configuration is strict: schema, then core
//! validation, and any failure is fatal.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use wt_core::{EngineConfig, EngineConfigWire, RawWasteRecord};

use crate::{schema, IoError};

/// Read limit for records and config files.
pub const MAX_INPUT_BYTES: u64 = 64 * 1024 * 1024;

/// Element of a records file that could not be decoded into a record.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedItem {
    pub index: usize,
    /// The entry's `id`, when it holds a string or an integer.
    pub record_id: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedRecords {
    pub records: Vec<RawWasteRecord>,
    pub skipped: Vec<SkippedItem>,
}

/// Read a JSON file into a `Value`, enforcing `MAX_INPUT_BYTES`.
pub fn read_json_value_with_limits(path: &Path) -> Result<Value, IoError> {
    let f = File::open(path).map_err(|e| IoError::Path(format!("{} ({e})", path.display())))?;
    let mut buf = Vec::new();
    f.take(MAX_INPUT_BYTES + 1).read_to_end(&mut buf)?;
    if buf.len() as u64 > MAX_INPUT_BYTES {
        return Err(IoError::TooLarge { path: path.display().to_string(), limit: MAX_INPUT_BYTES });
    }
    serde_json::from_slice(&buf).map_err(|e| IoError::Json {
        pointer: "/".into(),
        msg: format!("{}: {e}", path.display()),
    })
}

pub fn load_records(path: &Path) -> Result<LoadedRecords, IoError> {
    let v = read_json_value_with_limits(path)?;
    let out = records_from_value(v)?;
    debug!(
        path = %path.display(),
        records = out.records.len(),
        skipped = out.skipped.len(),
        "loaded records"
    );
    Ok(out)
}

/// Decode a records document already in memory.
pub fn records_from_value(v: Value) -> Result<LoadedRecords, IoError> {
    let items = match v {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("records") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(IoError::Json {
                    pointer: "/records".into(),
                    msg: "expected an array of records".into(),
                })
            }
        },
        _ => {
            return Err(IoError::Json {
                pointer: "/".into(),
                msg: "expected an array of records or an object with `records`".into(),
            })
        }
    };

    let mut out = LoadedRecords::default();
    for (index, item) in items.into_iter().enumerate() {
        let record_id = match item.get("id") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) if n.is_i64() || n.is_u64() => Some(n.to_string()),
            _ => None,
        };
        match serde_json::from_value::<RawWasteRecord>(item) {
            Ok(r) => out.records.push(r),
            Err(e) => {
                warn!(index, record = ?record_id, error = %e, "skipping undecodable record");
                out.skipped.push(SkippedItem { index, record_id, reason: e.to_string() });
            }
        }
    }
    Ok(out)
}

/// Load and validate an engine configuration file.
pub fn load_config(path: &Path) -> Result<EngineConfig, IoError> {
    let v = read_json_value_with_limits(path)?;
    config_from_value(v)
}

pub fn config_from_value(v: Value) -> Result<EngineConfig, IoError> {
    schema::validate_value(schema::SchemaKind::Config, &v)?;
    let wire: EngineConfigWire = serde_json::from_value(v)?;
    Ok(EngineConfig::from_wire(wire)?)
}
