//! Storage result types
//!
//! Defines result structures returned by storage operations.

use chrono::{DateTime, Local};
use std::fs::Metadata;
use std::path::PathBuf;
use std::time::SystemTime;

/// One entry of a directory listing
#[derive(Debug, Clone)]
pub struct ListEntry {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    pub permissions: u32,
    pub modified: Option<SystemTime>,
}

impl ListEntry {
    pub fn from_metadata(name: String, metadata: &Metadata) -> Self {
        Self {
            name,
            is_dir: metadata.is_dir(),
            size: if metadata.is_dir() { 0 } else { metadata.len() },
            permissions: permission_bits(metadata),
            modified: metadata.modified().ok(),
        }
    }

    /// `ls -l` style line, as expected by generic clients for `LIST`.
    pub fn to_list_line(&self) -> String {
        let kind = if self.is_dir { 'd' } else { '-' };
        let modified = self
            .modified
            .map(|time| DateTime::<Local>::from(time).format("%b %d %H:%M").to_string())
            .unwrap_or_else(|| "Jan 01 00:00".to_string());

        format!(
            "{}{} 1 ftp ftp {:>12} {} {}",
            kind,
            mode_string(self.permissions),
            self.size,
            modified,
            self.name
        )
    }
}

fn mode_string(bits: u32) -> String {
    let flags = [
        (0o400, 'r'),
        (0o200, 'w'),
        (0o100, 'x'),
        (0o040, 'r'),
        (0o020, 'w'),
        (0o010, 'x'),
        (0o004, 'r'),
        (0o002, 'w'),
        (0o001, 'x'),
    ];
    flags
        .iter()
        .map(|(mask, c)| if bits & mask != 0 { *c } else { '-' })
        .collect()
}

#[cfg(unix)]
fn permission_bits(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn permission_bits(metadata: &Metadata) -> u32 {
    let base = if metadata.is_dir() { 0o755 } else { 0o644 };
    if metadata.permissions().readonly() {
        base & !0o222
    } else {
        base
    }
}

/// Result of preparing an upload: final destination plus the temporary
/// sibling the data is written to first.
#[derive(Debug, Clone)]
pub struct StoreTarget {
    pub file_path: PathBuf,
    pub temp_path: PathBuf,
    pub virtual_path: String,
}
