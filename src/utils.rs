use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory {:?}", path))?;
    }
    Ok(())
}

/// Find the largest char boundary in `s` that is <= `max_bytes`.
/// Safe for slicing: `&s[..find_char_boundary(s, max_bytes)]` never panics.
pub fn find_char_boundary(s: &str, max_bytes: usize) -> usize {
    if max_bytes >= s.len() {
        return s.len();
    }
    let mut boundary = max_bytes;
    while boundary > 0 && !s.is_char_boundary(boundary) {
        boundary -= 1;
    }
    boundary
}

/// Local wall-clock time as shown next to chat bubbles.
pub fn display_time() -> String {
    Local::now().format("%H:%M").to_string()
}

/// Timestamped export filename: `<prefix>_YYYYMMDD_HHMMSS_mmm.json`.
pub fn export_filename(prefix: &str) -> String {
    format!("{}.json", export_stem(prefix))
}

fn export_stem(prefix: &str) -> String {
    format!("{}_{}", prefix, Local::now().format("%Y%m%d_%H%M%S_%3f"))
}

/// Serialize `value` as pretty JSON into `dir/<prefix>_<timestamp>.json`.
/// An existing file is never overwritten; a `_<n>` suffix is added instead.
pub fn write_json_export<T: Serialize>(dir: &Path, prefix: &str, value: &T) -> Result<PathBuf> {
    ensure_dir(dir)?;
    let json = serde_json::to_string_pretty(value).context("Failed to serialize export")?;

    let stem = export_stem(prefix);
    let mut attempt = 0u32;
    loop {
        let name = match attempt {
            0 => format!("{}.json", stem),
            n => format!("{}_{}.json", stem, n),
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(json.as_bytes())
                    .with_context(|| format!("Failed to write export {}", path.display()))?;
                return Ok(path);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to create export {}", path.display()))
            }
        }
    }
}
