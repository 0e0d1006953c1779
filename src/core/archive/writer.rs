//! Streaming backup writer.

use super::manifest::{BackupManifest, DATABASE_ENTRY, MANIFEST_VERSION, MAX_PARTS};
use super::split::SealedArchive;
use crate::core::library::{ensure_accessible, relative_id, DATABASE_DIR_NAME, LOCK_FILE_NAME};
use crate::error::{ArchiveError, MediaStoreError};
use crate::events::{BackupEvent, BackupProgress, Event, EventSender};
use chrono::{DateTime, Datelike, Local, Timelike, Utc};
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// One directory or file destined for the archive
#[derive(Debug)]
struct ArchiveEntry {
    path: PathBuf,
    name: String,
    is_dir: bool,
    size: u64,
    modified: Option<SystemTime>,
}

/// Tracks streamed bytes and emits whole-percent progress
struct ProgressTracker<'a> {
    events: &'a EventSender,
    total_bytes: u64,
    bytes_processed: u64,
    last_percent: Option<u8>,
}

impl<'a> ProgressTracker<'a> {
    fn new(events: &'a EventSender, total_bytes: u64) -> Self {
        Self {
            events,
            total_bytes,
            bytes_processed: 0,
            last_percent: None,
        }
    }

    fn advance(&mut self, bytes: u64) {
        self.bytes_processed += bytes;

        // 100 is reserved for a finished backup
        let percent = if self.total_bytes == 0 {
            0
        } else {
            (self.bytes_processed.saturating_mul(100) / self.total_bytes).min(99) as u8
        };

        if self.last_percent.map_or(true, |last| percent > last) {
            self.emit(percent);
        }
    }

    fn finish(&mut self) {
        self.emit(100);
    }

    fn emit(&mut self, percent: u8) {
        self.last_percent = Some(percent);
        self.events.send(Event::Backup(BackupEvent::Progress(BackupProgress {
            percent,
            bytes_processed: self.bytes_processed,
            total_bytes: self.total_bytes,
        })));
    }
}

/// Writes a library root and a metadata snapshot into a ZIP archive
pub struct ArchiveWriter;

impl ArchiveWriter {
    /// Back up `root` with `metadata` into `destination`.
    ///
    /// With `part_count > 1` the sealed archive is split into
    /// `<destination>.part01..` and the unsplit file is removed.
    /// On failure a partially written archive may remain on disk.
    pub fn write(
        root: &Path,
        metadata: &[u8],
        destination: &Path,
        part_count: usize,
        events: &EventSender,
    ) -> Result<BackupManifest, MediaStoreError> {
        Self::run(root, metadata, destination, part_count, None, events)
    }

    /// Like [`ArchiveWriter::write`], also saving the manifest to
    /// `manifest_path`. Completion is only reported once the manifest is on disk.
    pub fn write_with_manifest(
        root: &Path,
        metadata: &[u8],
        destination: &Path,
        part_count: usize,
        manifest_path: &Path,
        events: &EventSender,
    ) -> Result<BackupManifest, MediaStoreError> {
        Self::run(
            root,
            metadata,
            destination,
            part_count,
            Some(manifest_path),
            events,
        )
    }

    fn run(
        root: &Path,
        metadata: &[u8],
        destination: &Path,
        part_count: usize,
        manifest_path: Option<&Path>,
        events: &EventSender,
    ) -> Result<BackupManifest, MediaStoreError> {
        if part_count == 0 || part_count > MAX_PARTS {
            return Err(ArchiveError::InvalidPartCount { value: part_count }.into());
        }

        ensure_accessible(root)?;

        let entries = Self::collect_entries(root, destination)?;
        let total_bytes: u64 = entries.iter().map(|e| e.size).sum();
        let files_count = entries.iter().filter(|e| !e.is_dir).count();

        tracing::info!(
            "Backing up {} ({} files, {} bytes) to {}",
            root.display(),
            files_count,
            total_bytes,
            destination.display()
        );

        events.send(Event::Backup(BackupEvent::Started {
            total_bytes,
            total_files: files_count,
        }));

        let mut progress = ProgressTracker::new(events, total_bytes);
        progress.advance(0);

        if let Err(e) = Self::stream(&entries, metadata, destination, &mut progress) {
            tracing::error!("Backup to {} failed: {}", destination.display(), e);
            return Err(e.into());
        }

        let sealed = SealedArchive::open(destination)?;
        let archive_checksum = sealed.checksum();
        let archive_name = destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let part_file_names = if part_count > 1 {
            events.send(Event::Backup(BackupEvent::Splitting { part_count }));
            sealed.split(part_count).inspect_err(|e| {
                tracing::error!("Splitting {} failed: {}", destination.display(), e);
            })?
        } else {
            drop(sealed);
            Vec::new()
        };

        let manifest = BackupManifest {
            version: MANIFEST_VERSION,
            date: Utc::now(),
            source_library_path: root.to_path_buf(),
            total_size: total_bytes,
            files_count,
            part_count,
            archive_name,
            part_file_names,
            archive_checksum,
        };

        if let Some(path) = manifest_path {
            manifest.save(path).inspect_err(|e| {
                tracing::error!("Saving manifest {} failed: {}", path.display(), e);
            })?;
        }

        progress.finish();
        events.send(Event::Backup(BackupEvent::Completed {
            archive_name: manifest.archive_name.clone(),
            part_count,
        }));

        tracing::info!(
            "Backup {} complete ({} part(s))",
            manifest.archive_name,
            part_count
        );

        Ok(manifest)
    }

    /// Walk the root in sorted order, skipping reserved top-level names and
    /// the archive being written when it lives inside the root.
    fn collect_entries(root: &Path, destination: &Path) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        let walk_error = |path: &Path, reason: String| ArchiveError::WriteFailed {
            path: path.to_path_buf(),
            reason,
        };

        let destination_name = destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let destination_dir = destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .and_then(|p| fs::canonicalize(p).ok());
        let canonical_root = fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());

        let is_own_output = |path: &Path| -> bool {
            let Some(dir) = destination_dir.as_deref() else {
                return false;
            };
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                return false;
            };
            path.parent() == Some(dir)
                && (name == destination_name || name.starts_with(&format!("{}.", destination_name)))
        };

        let mut entries = Vec::new();
        // Lock file and `_database` are reserved at the top level
        let walker = WalkDir::new(&canonical_root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                !(entry.depth() == 1
                    && (entry.file_name() == LOCK_FILE_NAME
                        || entry.file_name() == DATABASE_DIR_NAME))
            });

        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(root).to_path_buf();
                walk_error(&path, e.to_string())
            })?;
            let path = entry.path();

            if is_own_output(path) {
                continue;
            }

            let metadata = entry
                .metadata()
                .map_err(|e| walk_error(path, e.to_string()))?;
            let is_dir = metadata.is_dir();

            entries.push(ArchiveEntry {
                path: path.to_path_buf(),
                name: relative_id(&canonical_root, path),
                is_dir,
                size: if is_dir { 0 } else { metadata.len() },
                modified: metadata.modified().ok(),
            });
        }

        Ok(entries)
    }

    fn stream(
        entries: &[ArchiveEntry],
        metadata: &[u8],
        destination: &Path,
        progress: &mut ProgressTracker<'_>,
    ) -> Result<(), ArchiveError> {
        let fail = |reason: String| ArchiveError::WriteFailed {
            path: destination.to_path_buf(),
            reason,
        };

        let file = File::create(destination).map_err(|e| fail(e.to_string()))?;
        let mut zip = ZipWriter::new(BufWriter::new(file));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        zip.start_file(DATABASE_ENTRY, options)
            .map_err(|e| fail(e.to_string()))?;
        zip.write_all(metadata).map_err(|e| fail(e.to_string()))?;

        let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
        for entry in entries {
            let mut entry_options = options;
            if let Some(time) = entry.modified.and_then(zip_timestamp) {
                entry_options = entry_options.last_modified_time(time);
            }

            if entry.is_dir {
                zip.add_directory(entry.name.as_str(), entry_options)
                    .map_err(|e| fail(e.to_string()))?;
                continue;
            }

            zip.start_file(
                entry.name.as_str(),
                entry_options.large_file(entry.size > u32::MAX as u64),
            )
            .map_err(|e| fail(e.to_string()))?;

            let mut source = File::open(&entry.path).map_err(|e| ArchiveError::WriteFailed {
                path: entry.path.clone(),
                reason: e.to_string(),
            })?;

            loop {
                let read = source.read(&mut buffer).map_err(|e| ArchiveError::WriteFailed {
                    path: entry.path.clone(),
                    reason: e.to_string(),
                })?;
                if read == 0 {
                    break;
                }
                zip.write_all(&buffer[..read])
                    .map_err(|e| fail(e.to_string()))?;
                progress.advance(read as u64);
            }

            tracing::debug!("Archived {}", entry.name);
        }

        let mut writer = zip.finish().map_err(|e| fail(e.to_string()))?;
        writer.flush().map_err(|e| fail(e.to_string()))?;
        writer
            .get_ref()
            .sync_all()
            .map_err(|e| fail(e.to_string()))?;

        Ok(())
    }
}

/// Local wall-clock time in the DOS format ZIP stores
fn zip_timestamp(time: SystemTime) -> Option<zip::DateTime> {
    let local: DateTime<Local> = time.into();
    zip::DateTime::from_date_and_time(
        u16::try_from(local.year()).ok()?,
        local.month() as u8,
        local.day() as u8,
        local.hour() as u8,
        local.minute() as u8,
        local.second() as u8,
    )
    .ok()
}
