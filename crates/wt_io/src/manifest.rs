//! Run manifest: where the inputs live and which aggregation to compute.
//!
//! - Offline only: any path with a scheme (`://`, `http:`, `https:`) is rejected.
//! - Relative paths resolve against the manifest's own directory.
//! - Every semantic aggregation input (year, period field, scope, statuses) is
//!   explicit here and is turned into `AggregationParams` once, at load time.
//! - Optional `inputs_sha256` digests are checked over canonical JSON bytes.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use wt_core::{AggregationParams, PeriodField, RecordStatus, ScopeFilter, StatusFilter};

use crate::{canonical_json, hasher, schema, IoError};

/// Read limit for manifest files.
pub const MAX_MANIFEST_BYTES: u64 = 4 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Free-form label, not used in any artifact.
    #[serde(default)]
    pub id: Option<String>,
    pub records_path: String,
    #[serde(default)]
    pub config_path: Option<String>,

    pub year: i32,
    pub period_field: PeriodField,
    #[serde(default)]
    pub campus: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub statuses: Option<Vec<RecordStatus>>,
    #[serde(default)]
    pub include_all_statuses: bool,

    #[serde(default)]
    pub inputs_sha256: Option<InputDigests>,
}

/// Expected SHA-256 (lowercase hex) of the canonical JSON of each input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputDigests {
    #[serde(default)]
    pub records_path: Option<String>,
    #[serde(default)]
    pub config_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedManifest {
    pub records_path: PathBuf,
    pub config_path: Option<PathBuf>,
    pub params: AggregationParams,
    pub digests: Option<InputDigests>,
}

// ---------- helpers ----------

#[inline]
fn has_any_scheme(s: &str) -> bool {
    let s = s.trim();
    s.contains("://") || s.starts_with("http:") || s.starts_with("https:")
}

#[inline]
fn is_lower_hex_64(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

fn join_under(base: &Path, rel: &str) -> PathBuf {
    let p = Path::new(rel);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

fn offline_check(label: &str, path: &str) -> Result<(), IoError> {
    if path.trim().is_empty() {
        return Err(IoError::Manifest(format!("{label} must not be empty")));
    }
    if has_any_scheme(path) {
        return Err(IoError::Manifest(format!(
            "{label} must be a local file path (no URLs): {path}"
        )));
    }
    Ok(())
}

fn must_exist_file(label: &str, p: &Path) -> Result<(), IoError> {
    let md = fs::metadata(p)
        .map_err(|e| IoError::Path(format!("cannot access {label} {} ({e})", p.display())))?;
    if !md.is_file() {
        return Err(IoError::Path(format!("{label} is not a file: {}", p.display())));
    }
    Ok(())
}

// ---------- validation & resolution ----------

/// Shape and offline policy. No I/O.
pub fn validate_manifest(man: &Manifest) -> Result<(), IoError> {
    offline_check("records_path", &man.records_path)?;
    if let Some(c) = &man.config_path {
        offline_check("config_path", c)?;
    }
    if let Some(d) = &man.inputs_sha256 {
        for (label, h) in [("records_path", &d.records_path), ("config_path", &d.config_path)] {
            if let Some(h) = h {
                if !is_lower_hex_64(h) {
                    return Err(IoError::Manifest(format!("digest for {label} must be 64 lowercase hex")));
                }
            }
        }
        if d.config_path.is_some() && man.config_path.is_none() {
            return Err(IoError::Manifest("digest supplied for missing input: config_path".into()));
        }
    }
    params_of(man).map(|_| ())
}

/// Aggregation parameters carried by the manifest.
pub fn params_of(man: &Manifest) -> Result<AggregationParams, IoError> {
    let statuses = StatusFilter::from_inputs(man.statuses.as_deref(), man.include_all_statuses)?;
    let params = AggregationParams {
        year: man.year,
        period_field: man.period_field,
        scope: ScopeFilter {
            campus: man.campus.clone(),
            department: man.department.clone(),
            unit: man.unit.clone(),
        },
        statuses,
    };
    params.validate()?;
    Ok(params)
}

/// Resolve paths under `base_dir` and check that inputs exist and are files.
pub fn resolve_paths(base_dir: &Path, man: &Manifest) -> Result<ResolvedManifest, IoError> {
    let records_path = join_under(base_dir, &man.records_path);
    must_exist_file("records_path", &records_path)?;
    let config_path = match &man.config_path {
        Some(c) => {
            let p = join_under(base_dir, c);
            must_exist_file("config_path", &p)?;
            Some(p)
        }
        None => None,
    };
    Ok(ResolvedManifest {
        records_path,
        config_path,
        params: params_of(man)?,
        digests: man.inputs_sha256.clone(),
    })
}

/// Check supplied digests against the canonical JSON of each input file.
pub fn verify_digests(resolved: &ResolvedManifest) -> Result<(), IoError> {
    let Some(d) = &resolved.digests else { return Ok(()) };

    fn check_one(label: &str, path: &Path, expect_hex: &str) -> Result<(), IoError> {
        let v: Value = serde_json::from_slice(&fs::read(path)?)?;
        let got = hasher::sha256_hex(&canonical_json::to_canonical_json_bytes(&v)?);
        if got != expect_hex {
            return Err(IoError::Manifest(format!(
                "sha256 mismatch for {label}: expected={expect_hex} got={got}"
            )));
        }
        Ok(())
    }

    if let Some(hex) = &d.records_path {
        check_one("records_path", &resolved.records_path, hex)?;
    }
    match (&resolved.config_path, &d.config_path) {
        (Some(p), Some(hex)) => check_one("config_path", p, hex)?,
        (None, Some(_)) => {
            return Err(IoError::Manifest("digest supplied for missing input: config_path".into()))
        }
        _ => {}
    }
    Ok(())
}

// ---------- top-level ----------

/// Read and schema-check a manifest file without resolving its paths.
pub fn load_manifest(path: &Path) -> Result<Manifest, IoError> {
    let mut buf = Vec::new();
    fs::File::open(path)
        .map_err(|e| IoError::Path(format!("{} ({e})", path.display())))?
        .take(MAX_MANIFEST_BYTES + 1)
        .read_to_end(&mut buf)?;
    if buf.len() as u64 > MAX_MANIFEST_BYTES {
        return Err(IoError::TooLarge {
            path: path.display().to_string(),
            limit: MAX_MANIFEST_BYTES,
        });
    }
    let raw: Value = serde_json::from_slice(&buf)?;
    schema::validate_value(schema::SchemaKind::Manifest, &raw)?;
    Ok(serde_json::from_value(raw)?)
}

/// load → validate → resolve (under the manifest's directory) → verify digests.
pub fn load_and_resolve_manifest(path: &Path) -> Result<ResolvedManifest, IoError> {
    let man = load_manifest(path)?;
    validate_manifest(&man)?;
    let base = path.parent().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    let resolved = resolve_paths(&base, &man)?;
    verify_digests(&resolved)?;
    Ok(resolved)
}
