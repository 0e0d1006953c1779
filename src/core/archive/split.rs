//! Post-seal splitting of a finished archive into numbered parts.
//!
//! Splitting only ever runs on an archive whose writer has been finished
//! and flushed; the ZIP index lives at the end of the file and must be
//! whole before any byte range is cut from it.

use super::manifest::part_file_name;
use crate::error::ArchiveError;
use memmap2::Mmap;
use std::fs::{self, File};
use std::io::Write;
use std::ops::Range;
use std::path::{Path, PathBuf};
use xxhash_rust::xxh3::xxh3_64;

/// A finished archive mapped read-only
pub struct SealedArchive {
    path: PathBuf,
    // None for an empty file, which cannot be mapped on every platform
    map: Option<Mmap>,
}

impl SealedArchive {
    /// Map a finished archive
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        let fail = |reason: String| ArchiveError::WriteFailed {
            path: path.to_path_buf(),
            reason,
        };

        let file = File::open(path).map_err(|e| fail(e.to_string()))?;
        let len = file.metadata().map_err(|e| fail(e.to_string()))?.len();

        let map = if len == 0 {
            None
        } else {
            // SAFETY: read-only mapping of a file this process just finished
            // writing; it is not modified while mapped.
            Some(unsafe { Mmap::map(&file) }.map_err(|e| fail(e.to_string()))?)
        };

        Ok(Self {
            path: path.to_path_buf(),
            map,
        })
    }

    fn bytes(&self) -> &[u8] {
        self.map.as_deref().unwrap_or(&[])
    }

    /// Archive size in bytes
    pub fn len(&self) -> u64 {
        self.bytes().len() as u64
    }

    /// Whether the archive is empty
    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }

    /// xxh3-64 of the whole archive as lowercase hex
    pub fn checksum(&self) -> String {
        format!("{:016x}", xxh3_64(self.bytes()))
    }

    /// Write `part_count` contiguous parts next to the archive, then delete it.
    ///
    /// Returns the part file names in sequence order.
    pub fn split(self, part_count: usize) -> Result<Vec<String>, ArchiveError> {
        let fail = |path: &Path, reason: String| ArchiveError::WriteFailed {
            path: path.to_path_buf(),
            reason,
        };

        let archive_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| fail(&self.path, "archive has no file name".to_string()))?;

        let mut names = Vec::with_capacity(part_count);
        for (index, range) in part_ranges(self.len(), part_count).into_iter().enumerate() {
            let name = part_file_name(&archive_name, index + 1);
            let part_path = self.path.with_file_name(&name);

            let mut file = File::create(&part_path).map_err(|e| fail(&part_path, e.to_string()))?;
            file.write_all(&self.bytes()[range.start as usize..range.end as usize])
                .and_then(|_| file.sync_all())
                .map_err(|e| fail(&part_path, e.to_string()))?;

            tracing::debug!("Wrote archive part {}", part_path.display());
            names.push(name);
        }

        let Self { path, map } = self;
        drop(map);
        fs::remove_file(&path).map_err(|e| fail(&path, e.to_string()))?;

        Ok(names)
    }
}

/// Byte ranges for `count` parts of a `len`-byte file.
///
/// Every part gets `len / count` bytes; the last also takes the remainder.
pub fn part_ranges(len: u64, count: usize) -> Vec<Range<u64>> {
    let count = count.max(1) as u64;
    let base = len / count;

    (0..count)
        .map(|i| {
            let start = i * base;
            let end = if i + 1 == count { len } else { start + base };
            start..end
        })
        .collect()
}
