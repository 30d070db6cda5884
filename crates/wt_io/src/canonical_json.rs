//! Canonical JSON utilities
//! - Objects: keys sorted lexicographically (UTF-8 codepoint order)
//! - Arrays: order preserved (caller is responsible for stable ordering)
//! - Output: compact (no extra spaces, no trailing newline)
//! - Artifacts land atomically: a synced sibling temp file is renamed over the
//!   target, falling back to an in-place overwrite when rename is refused.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crate::IoError;

/// Canonical bytes of a JSON value.
pub fn to_canonical_json_bytes(v: &Value) -> Result<Vec<u8>, IoError> {
    let mut out = Vec::with_capacity(1024);
    write_canonical_value(v, &mut out)?;
    Ok(out)
}

/// Canonical bytes of any serializable value (goes through `serde_json::Value`).
pub fn to_canonical_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, IoError> {
    let v = serde_json::to_value(value)?;
    to_canonical_json_bytes(&v)
}

/// Serialize `value` canonically and write it to `path` atomically.
pub fn write_canonical_file<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), IoError> {
    let bytes = to_canonical_bytes(value)?;
    write_bytes_atomic(path, &bytes)?;
    Ok(())
}

/// Write raw bytes to `path` atomically (with safe cross-device fallback).
pub fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let staged = Staged::create(path, bytes)?;
    if fs::rename(&staged.0, path).is_err() {
        // Rename across devices fails; overwrite in place instead.
        let mut f = OpenOptions::new().write(true).create(true).truncate(true).open(path)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    let _ = sync_dir(dir);
    Ok(())
}

/// Synced sibling temp file; removed on drop unless it was renamed away.
struct Staged(PathBuf);

impl Staged {
    fn create(target: &Path, bytes: &[u8]) -> io::Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static SEQ: AtomicU64 = AtomicU64::new(0);

        let name = target.file_name().and_then(|s| s.to_str()).unwrap_or("artifact");
        let tmp = target.with_file_name(format!(
            ".{name}.{}-{}.partial",
            std::process::id(),
            SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        let staged = Staged(tmp);
        let mut f = OpenOptions::new().write(true).create_new(true).open(&staged.0)?;
        f.write_all(bytes)?;
        f.sync_all()?;
        Ok(staged)
    }
}

impl Drop for Staged {
    fn drop(&mut self) {
        if self.0.exists() {
            let _ = fs::remove_file(&self.0);
        }
    }
}

fn write_canonical_value(v: &Value, out: &mut Vec<u8>) -> Result<(), serde_json::Error> {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            out.push(b'{');
            for (n, key) in keys.into_iter().enumerate() {
                if n != 0 {
                    out.push(b',');
                }
                serde_json::to_writer(&mut *out, key)?;
                out.push(b':');
                write_canonical_value(&map[key.as_str()], out)?;
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (n, item) in items.iter().enumerate() {
                if n != 0 {
                    out.push(b',');
                }
                write_canonical_value(item, out)?;
            }
            out.push(b']');
        }
        // Scalars have exactly one compact spelling.
        scalar => serde_json::to_writer(&mut *out, scalar)?,
    }
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
