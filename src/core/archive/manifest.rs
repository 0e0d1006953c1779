//! Backup manifest and part naming.

use crate::error::ArchiveError;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Current manifest schema version
pub const MANIFEST_VERSION: u32 = 1;

/// Fixed archive path of the metadata snapshot
pub const DATABASE_ENTRY: &str = "_database/arc_database.json";

/// Largest supported split; suffixes are two digits
pub const MAX_PARTS: usize = 99;

const MANIFEST_SUFFIX: &str = ".manifest.json";

/// Description of one completed backup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupManifest {
    pub version: u32,
    pub date: DateTime<Utc>,
    pub source_library_path: PathBuf,
    /// Uncompressed bytes of library files
    pub total_size: u64,
    pub files_count: usize,
    pub part_count: usize,
    /// File name of the (unsplit) archive
    pub archive_name: String,
    /// Part file names in concatenation order; empty when not split
    pub part_file_names: Vec<String>,
    /// xxh3-64 of the sealed archive, lowercase hex
    pub archive_checksum: String,
}

impl BackupManifest {
    /// Default manifest location next to an archive
    pub fn path_for(archive: &Path) -> PathBuf {
        let mut name = archive
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(MANIFEST_SUFFIX);
        archive.with_file_name(name)
    }

    /// Whether a path looks like a saved manifest
    pub fn is_manifest_path(path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.ends_with(MANIFEST_SUFFIX))
            .unwrap_or(false)
    }

    /// Write the manifest as pretty JSON
    pub fn save(&self, path: &Path) -> Result<(), ArchiveError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| ArchiveError::WriteFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        fs::write(path, json).map_err(|e| ArchiveError::WriteFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Read a manifest written by [`BackupManifest::save`]
    pub fn load(path: &Path) -> Result<Self, ArchiveError> {
        let corrupt = |reason: String| ArchiveError::Corrupt {
            path: path.to_path_buf(),
            reason,
        };
        let text = fs::read_to_string(path).map_err(|e| corrupt(e.to_string()))?;
        let manifest: Self =
            serde_json::from_str(&text).map_err(|e| corrupt(format!("invalid manifest: {}", e)))?;

        if manifest.version > MANIFEST_VERSION {
            return Err(corrupt(format!(
                "manifest version {} is newer than supported {}",
                manifest.version, MANIFEST_VERSION
            )));
        }
        Ok(manifest)
    }

    /// Files a reader needs, in order
    pub fn archive_files(&self) -> Vec<String> {
        if self.part_file_names.is_empty() {
            vec![self.archive_name.clone()]
        } else {
            self.part_file_names.clone()
        }
    }
}

/// `<archive>.partNN` for a 1-based sequence number
pub fn part_file_name(archive_name: &str, sequence: usize) -> String {
    format!("{}.part{:02}", archive_name, sequence)
}

/// Split a part file name into `(archive_name, sequence)`
pub fn parse_part_name(file_name: &str) -> Option<(String, usize)> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"^(?P<base>.+)\.part(?P<seq>\d{2})$").expect("part name pattern is valid")
    });

    let captures = pattern.captures(file_name)?;
    let sequence = captures["seq"].parse().ok()?;
    Some((captures["base"].to_string(), sequence))
}
