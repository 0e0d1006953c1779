//! # Store Module
//!
//! [`MediaStore`] is the single entry point an application drives. It owns
//! one library root and wires the organizer, thumbnail deriver, archive
//! writer/reader and duplicate scanner together.
//!
//! ## Writers
//! `ingest`, `backup` and `delete` hold the root's [`LibraryLock`] for their
//! duration; `restore` holds the lock of its target directory. A concurrent
//! writer gets `StorageError::Busy` instead of waiting.
//!
//! ## Events
//! Each long operation has a `*_with_events` variant that forwards progress
//! through an [`EventSender`]; the plain variants discard events.

use crate::config::StoreConfig;
use crate::core::archive::{ArchiveReader, ArchiveWriter, BackupManifest};
use crate::core::duplicates::{DuplicatePair, DuplicateScanner, PixelSource, ScanItem};
use crate::core::library::{
    ensure_accessible, is_reserved, list_media, LibraryLock, MediaItem, MediaKind,
};
use crate::core::organize::PathOrganizer;
use crate::core::thumbnail::{ThumbnailDeriver, ThumbnailOutcome};
use crate::error::{MediaStoreError, Result, StorageError};
use crate::events::{null_sender, Event, EventSender, IngestEvent};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Outcome of ingesting one file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResult {
    pub item: MediaItem,
    pub thumbnail: ThumbnailOutcome,
}

/// A library root and the operations on it
pub struct MediaStore {
    root: PathBuf,
    config: StoreConfig,
    deriver: ThumbnailDeriver,
}

impl MediaStore {
    /// Select a library root, creating it if needed
    pub fn open(root: impl Into<PathBuf>, config: StoreConfig) -> Result<Self> {
        let root = root.into();
        config.validate()?;

        fs::create_dir_all(&root).map_err(|e| StorageError::Unavailable {
            path: root.clone(),
            source: e,
        })?;
        ensure_accessible(&root)?;

        tracing::info!("Opened media library at {}", root.display());

        Ok(Self {
            deriver: ThumbnailDeriver::new(&config),
            root,
            config,
        })
    }

    /// The library root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Active configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Copy a file into the library and derive its thumbnail
    pub fn ingest(&self, source: &Path, id: Option<String>) -> Result<IngestResult> {
        self.ingest_with_events(source, id, &null_sender())
    }

    /// Ingest with event reporting.
    ///
    /// `id` is the caller's logical id; a UUID v4 is generated when absent.
    pub fn ingest_with_events(
        &self,
        source: &Path,
        id: Option<String>,
        events: &EventSender,
    ) -> Result<IngestResult> {
        if MediaKind::from_path(source).is_none() {
            return Err(MediaStoreError::UnsupportedMedia {
                path: source.to_path_buf(),
            });
        }

        let _lock = LibraryLock::acquire(&self.root)?;

        let destination = PathOrganizer::place(source, &self.root)?;
        events.send(Event::Ingest(IngestEvent::Placed {
            source: source.to_path_buf(),
            destination: destination.clone(),
        }));

        let thumbnail = self.deriver.derive(&destination, &self.root)?;
        events.send(Event::Ingest(match &thumbnail {
            ThumbnailOutcome::Derived(path) => IngestEvent::ThumbnailDerived { path: path.clone() },
            ThumbnailOutcome::Skipped { path, reason } => IngestEvent::ThumbnailSkipped {
                path: path.clone(),
                reason: reason.clone(),
            },
        }));

        let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let item = MediaItem::from_path(&destination, id)?.ok_or_else(|| {
            MediaStoreError::UnsupportedMedia {
                path: destination.clone(),
            }
        })?;

        tracing::info!("Ingested {} as {}", source.display(), destination.display());
        Ok(IngestResult { item, thumbnail })
    }

    /// Derive (or re-derive) the thumbnail for a file
    pub fn derive_thumbnail(&self, source: &Path) -> Result<ThumbnailOutcome> {
        Ok(self.deriver.derive(source, &self.root)?)
    }

    /// Back up the library and `metadata` into `destination`.
    ///
    /// The manifest is also saved as `<destination>.manifest.json`.
    pub fn backup(
        &self,
        destination: &Path,
        part_count: usize,
        metadata: &[u8],
    ) -> Result<BackupManifest> {
        self.backup_with_events(destination, part_count, metadata, &null_sender())
    }

    /// Back up with event reporting
    pub fn backup_with_events(
        &self,
        destination: &Path,
        part_count: usize,
        metadata: &[u8],
        events: &EventSender,
    ) -> Result<BackupManifest> {
        let _lock = LibraryLock::acquire(&self.root)?;

        Ok(ArchiveWriter::write_with_manifest(
            &self.root,
            metadata,
            destination,
            part_count,
            &BackupManifest::path_for(destination),
            events,
        )?)
    }

    /// Restore a backup into `target` and return its metadata snapshot.
    ///
    /// `input` may be the archive, any of its parts, or its manifest.
    pub fn restore(&self, input: &Path, target: &Path) -> Result<Vec<u8>> {
        self.restore_with_events(input, target, &null_sender())
    }

    /// Restore with event reporting
    pub fn restore_with_events(
        &self,
        input: &Path,
        target: &Path,
        events: &EventSender,
    ) -> Result<Vec<u8>> {
        let _lock = Self::lock_target(target)?;
        ArchiveReader::restore(input, target, events)
    }

    /// Restore from an explicit, ordered list of part files
    pub fn restore_parts(
        &self,
        parts: &[PathBuf],
        target: &Path,
        events: &EventSender,
    ) -> Result<Vec<u8>> {
        let _lock = Self::lock_target(target)?;
        ArchiveReader::restore_parts(parts, target, events)
    }

    fn lock_target(target: &Path) -> Result<LibraryLock> {
        fs::create_dir_all(target).map_err(|e| StorageError::Unavailable {
            path: target.to_path_buf(),
            source: e,
        })?;
        Ok(LibraryLock::acquire(target)?)
    }

    /// Find near-duplicate pairs on the scanner thread.
    ///
    /// Blocks until the scan finishes; `on_progress` sees every progress update.
    pub fn find_duplicates(
        &self,
        items: Vec<ScanItem>,
        threshold: u32,
        on_progress: impl FnMut(u8),
    ) -> Result<Vec<DuplicatePair>> {
        let scanner = DuplicateScanner::spawn(&self.config)?;
        scanner.start(items, threshold)?;
        Ok(scanner.wait(on_progress)?)
    }

    /// Every media item in the library, excluding the thumbnail cache
    pub fn list_items(&self) -> Result<Vec<MediaItem>> {
        Ok(list_media(&self.root)?)
    }

    /// Delete a library file and its thumbnail.
    ///
    /// The thumbnail is kept while another item with the same stem remains.
    pub fn delete(&self, path: &Path) -> Result<()> {
        let outside = || MediaStoreError::OutsideLibrary {
            path: path.to_path_buf(),
        };

        let canonical_root = fs::canonicalize(&self.root).map_err(|e| StorageError::Unavailable {
            path: self.root.clone(),
            source: e,
        })?;
        let canonical = fs::canonicalize(path).map_err(|_| outside())?;
        if !canonical.starts_with(&canonical_root)
            || is_reserved(&canonical_root, &canonical)
            || !canonical.is_file()
        {
            return Err(outside());
        }

        let _lock = LibraryLock::acquire(&self.root)?;

        fs::remove_file(&canonical).map_err(|e| StorageError::Unavailable {
            path: canonical.clone(),
            source: e,
        })?;

        // Thumbnails are keyed by stem, so another item may still use this one
        let thumbnail = ThumbnailDeriver::thumbnail_path(&canonical, &self.root);
        let shared = list_media(&self.root)?
            .iter()
            .any(|item| ThumbnailDeriver::thumbnail_path(&item.path, &self.root) == thumbnail);

        if shared {
            tracing::debug!("Keeping shared thumbnail {}", thumbnail.display());
        } else {
            match fs::remove_file(&thumbnail) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(StorageError::Unavailable {
                        path: thumbnail,
                        source: e,
                    }
                    .into())
                }
            }
        }

        tracing::info!("Deleted {}", canonical.display());
        Ok(())
    }

    /// Read image items into memory for a duplicate scan.
    ///
    /// Videos are skipped; the scanner only fingerprints still images.
    pub fn load_scan_items(&self, items: &[MediaItem]) -> Result<Vec<ScanItem>> {
        items
            .iter()
            .filter(|item| item.kind == MediaKind::Image)
            .map(|item| {
                let bytes = fs::read(&item.path).map_err(|e| StorageError::SourceUnreadable {
                    path: item.path.clone(),
                    source: e,
                })?;
                Ok(ScanItem {
                    id: item.id.clone(),
                    source: PixelSource::Encoded(bytes),
                })
            })
            .collect()
    }
}
