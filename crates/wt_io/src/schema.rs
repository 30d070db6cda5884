//! Embedded JSON Schemas (Draft 2020-12) for the engine configuration and the
//! run manifest. Records are not schema-checked: they are read leniently, one
//! item at a time, and the normalizer reports what it cannot use.

use serde_json::Value;

use crate::IoError;

const CONFIG_SCHEMA_JSON: &str = include_str!("../schemas/config.schema.json");
const MANIFEST_SCHEMA_JSON: &str = include_str!("../schemas/manifest.schema.json");

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchemaKind {
    Config,
    Manifest,
}

impl SchemaKind {
    fn source(self) -> &'static str {
        match self {
            SchemaKind::Config => CONFIG_SCHEMA_JSON,
            SchemaKind::Manifest => MANIFEST_SCHEMA_JSON,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SchemaKind::Config => "config.schema.json",
            SchemaKind::Manifest => "manifest.schema.json",
        }
    }
}

/// Validate `instance` against the embedded schema; reports the first violation.
#[cfg(feature = "schemaval")]
pub fn validate_value(kind: SchemaKind, instance: &Value) -> Result<(), IoError> {
    use jsonschema::{Draft, JSONSchema};

    let schema: Value = serde_json::from_str(kind.source()).map_err(|e| IoError::Schema {
        pointer: "/".into(),
        msg: format!("embedded {} is invalid: {e}", kind.name()),
    })?;
    let compiled = JSONSchema::options()
        .with_draft(Draft::Draft202012)
        .compile(&schema)
        .map_err(|e| IoError::Schema {
            pointer: "/".into(),
            msg: format!("{} failed to compile: {e}", kind.name()),
        })?;
    if let Err(mut errors) = compiled.validate(instance) {
        if let Some(err) = errors.next() {
            let ptr = err.instance_path.to_string();
            return Err(IoError::Schema {
                pointer: if ptr.is_empty() { "/".into() } else { ptr },
                msg: err.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(not(feature = "schemaval"))]
pub fn validate_value(kind: SchemaKind, _instance: &Value) -> Result<(), IoError> {
    tracing::debug!(schema = kind.name(), "schema validation disabled at build time");
    let _ = kind.source();
    Ok(())
}
