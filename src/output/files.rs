// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Snapshot file handling

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::Snapshot;
use crate::cli::OutputFormat;

/// Atomically write content to a file using tempfile + rename
///
/// Readers see either the previous file or the complete new one, never a
/// partial write.
fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    use tempfile::NamedTempFile;

    let temp_file = NamedTempFile::new_in(path.parent().unwrap_or_else(|| Path::new(".")))
        .context("Failed to create temp file")?;

    std::fs::write(temp_file.path(), content)
        .with_context(|| format!("Failed to write temp file {:?}", temp_file.path()))?;

    temp_file
        .persist(path)
        .with_context(|| format!("Failed to persist file to {:?}", path))?;

    Ok(())
}

/// Serialize and write a snapshot, creating parent directories as needed
///
/// Returns the number of bytes written.
pub fn save_snapshot(snapshot: &Snapshot<'_>, path: &Path, format: OutputFormat) -> Result<u64> {
    let data = snapshot.format(format)?;
    debug!(path = %path.display(), bytes = data.len(), "Writing snapshot");

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    atomic_write(path, data.as_bytes())
        .with_context(|| format!("Failed to write snapshot to {}", path.display()))?;

    let written = std::fs::metadata(path)
        .with_context(|| format!("Failed to verify snapshot file: {}", path.display()))?
        .len();
    Ok(written)
}

/// Insert a `-YYYYMMDD-HHMMSS` timestamp before the extension
///
/// `.yaml`/`.yml` extensions are kept; anything else gets `.json`.
pub fn timestamped_filename<Tz: TimeZone>(path: &Path, now: &DateTime<Tz>) -> PathBuf
where
    Tz::Offset: std::fmt::Display,
{
    let timestamp = now.format("%Y%m%d-%H%M%S");
    let (stem, ext) = match path.extension().and_then(|e| e.to_str()) {
        Some(ext @ ("yaml" | "yml" | "json")) => (
            path.file_stem().map(|s| s.to_string_lossy().into_owned()),
            ext.to_string(),
        ),
        _ => (
            path.file_name().map(|s| s.to_string_lossy().into_owned()),
            "json".to_string(),
        ),
    };
    let stem = stem.unwrap_or_else(|| "meshsync-snapshot".to_string());
    path.with_file_name(format!("{}-{}.{}", stem, timestamp, ext))
}

/// Human-readable size in binary units
pub fn format_size(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    const PREFIXES: &[char] = &['K', 'M', 'G', 'T', 'P', 'E'];

    if bytes < UNIT {
        return format!("{} B", bytes);
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    format!("{:.1} {}B", bytes as f64 / div as f64, PREFIXES[exp])
}
