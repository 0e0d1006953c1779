//! # Core Module
//!
//! The GUI-agnostic media store engine.
//!
//! ## Modules
//! - `library` - Library root layout, media items and the writer lock
//! - `organize` - Places ingested files into the dated tree
//! - `imaging` - Fast decoding and resizing shared by previews and fingerprints
//! - `thumbnail` - Derives bounded JPEG previews
//! - `archive` - Writes, splits and restores backup archives
//! - `duplicates` - Background near-duplicate scanner
//! - `store` - The `MediaStore` facade over all of the above

pub mod archive;
pub mod duplicates;
pub mod imaging;
pub mod library;
pub mod organize;
pub mod store;
pub mod thumbnail;

// Re-export commonly used types
pub use archive::{ArchiveReader, ArchiveWriter, BackupManifest};
pub use duplicates::{DuplicatePair, DuplicateScanner, PixelSource, ScanItem};
pub use library::{MediaItem, MediaKind};
pub use organize::PathOrganizer;
pub use store::{IngestResult, MediaStore};
pub use thumbnail::{ThumbnailDeriver, ThumbnailOutcome};
