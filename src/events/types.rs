//! Event type definitions for progress reporting.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// All events emitted by the media store engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Ingestion events
    Ingest(IngestEvent),
    /// Backup (archive writing) events
    Backup(BackupEvent),
    /// Restore (archive reading) events
    Restore(RestoreEvent),
}

/// Events while ingesting files into the library
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IngestEvent {
    /// A file was copied into the library
    Placed { source: PathBuf, destination: PathBuf },
    /// A thumbnail was written for an ingested file
    ThumbnailDerived { path: PathBuf },
    /// No thumbnail could be derived; the caller shows a placeholder
    ThumbnailSkipped { path: PathBuf, reason: String },
}

/// Events while writing a backup archive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BackupEvent {
    /// The library walk finished and streaming is about to start
    Started { total_bytes: u64, total_files: usize },
    /// Streaming progress
    Progress(BackupProgress),
    /// The sealed archive is being split into parts
    Splitting { part_count: usize },
    /// Backup completed
    Completed { archive_name: String, part_count: usize },
}

/// Progress information while writing a backup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupProgress {
    /// Whole percent, monotonic, 100 only on success
    pub percent: u8,
    /// Uncompressed bytes streamed so far
    pub bytes_processed: u64,
    /// Uncompressed bytes in the library
    pub total_bytes: u64,
}

/// Events while restoring a backup archive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RestoreEvent {
    /// Parts are being concatenated before the archive is opened
    Reassembling { part_count: usize },
    /// Extraction started
    Started { total_entries: usize },
    /// An entry was extracted
    EntryRestored { completed: usize, total: usize },
    /// Restore completed
    Completed { files_restored: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_serializable() {
        let event = Event::Backup(BackupEvent::Progress(BackupProgress {
            percent: 42,
            bytes_processed: 420,
            total_bytes: 1000,
        }));

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: Event = serde_json::from_str(&json).unwrap();

        match deserialized {
            Event::Backup(BackupEvent::Progress(p)) => {
                assert_eq!(p.percent, 42);
                assert_eq!(p.total_bytes, 1000);
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn skipped_thumbnail_carries_reason() {
        let event = Event::Ingest(IngestEvent::ThumbnailSkipped {
            path: PathBuf::from("/lib/_cache/thumbs/clip_thumb.jpg"),
            reason: "ffmpeg not found".to_string(),
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("ffmpeg not found"));
    }
}
