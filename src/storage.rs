//! Atomic JSON snapshots for the on-disk stores

use crate::error::{AtsGateError, Result};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Write `value` as pretty JSON next to `path`, fsync, then rename over it.
/// Readers see either the previous file or the complete new one.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let json = serde_json::to_vec_pretty(value)?;
    let mut temp_file = NamedTempFile::new_in(dir)?;
    temp_file.write_all(&json)?;
    temp_file.as_file().sync_all()?;
    temp_file
        .persist(path)
        .map_err(|e| AtsGateError::Storage(format!("Failed to persist {}: {}", path.display(), e.error)))?;
    Ok(())
}
