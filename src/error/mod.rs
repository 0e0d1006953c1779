//! # Error Module
//!
//! User-facing error types for the media store engine.
//!
//! ## Design Principles
//! - **Never panic** on user data - return errors instead
//! - **Include context** - paths, file names, what went wrong
//! - **Stable taxonomy** - every error maps to an [`ErrorKind`] the UI can switch on
//! - **Recovery hints** - suggest how to fix when possible

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Top-level engine error
#[derive(Error, Debug)]
pub enum MediaStoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Duplicate scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported media file {path}. Only images and videos can be ingested.")]
    UnsupportedMedia { path: PathBuf },

    #[error("{path} is not a media file inside the library")]
    OutsideLibrary { path: PathBuf },
}

/// Errors touching the library root or another target directory
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage unavailable at {path}: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot read source file {path}: {source}")]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Library at {path} is in use by another operation. Wait for it to finish and try again.")]
    Busy { path: PathBuf },
}

/// Codec failures while deriving a preview.
///
/// These never leave the thumbnail deriver as errors; they are folded into
/// a skipped outcome, logged, and reported as
/// [`ErrorKind::ThumbnailDerivationFailed`] through `ThumbnailOutcome::report`.
#[derive(Error, Debug)]
pub enum ThumbnailError {
    #[error("Failed to decode image {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("Failed to extract a video frame from {path}: {reason}")]
    FrameExtraction { path: PathBuf, reason: String },

    #[error("Failed to encode thumbnail {path}: {reason}")]
    Encode { path: PathBuf, reason: String },
}

/// Errors raised while producing or reading a backup archive
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Failed to write backup archive {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },

    #[error("Backup archive {path} is corrupt or incomplete ({reason}). Please re-select the archive.")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Invalid part count: {value} (must be 1-99)")]
    InvalidPartCount { value: usize },
}

/// Errors raised by the duplicate scanner
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Duplicate scan failed: {0}")]
    Failed(String),

    #[error("Invalid threshold: {value} (must be 0-100)")]
    InvalidThreshold { value: u32 },

    #[error("Duplicate scanner worker is no longer running")]
    WorkerGone,
}

/// Stable error classification surfaced to the external caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    StorageUnavailable,
    LibraryBusy,
    /// Only ever reported on a skipped thumbnail, never returned as an error
    ThumbnailDerivationFailed,
    ArchiveWriteFailed,
    ArchiveCorrupt,
    ScanFailed,
    InvalidInput,
}

impl MediaStoreError {
    /// Classify this error for the UI layer
    pub fn kind(&self) -> ErrorKind {
        match self {
            MediaStoreError::Storage(StorageError::Busy { .. }) => ErrorKind::LibraryBusy,
            MediaStoreError::Storage(_) => ErrorKind::StorageUnavailable,
            MediaStoreError::Archive(ArchiveError::WriteFailed { .. }) => {
                ErrorKind::ArchiveWriteFailed
            }
            MediaStoreError::Archive(ArchiveError::Corrupt { .. }) => ErrorKind::ArchiveCorrupt,
            MediaStoreError::Archive(ArchiveError::InvalidPartCount { .. }) => {
                ErrorKind::InvalidInput
            }
            MediaStoreError::Scan(ScanError::InvalidThreshold { .. }) => ErrorKind::InvalidInput,
            MediaStoreError::Scan(_) => ErrorKind::ScanFailed,
            MediaStoreError::Config(_)
            | MediaStoreError::UnsupportedMedia { .. }
            | MediaStoreError::OutsideLibrary { .. } => ErrorKind::InvalidInput,
        }
    }
}

/// Error shape handed across the process boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&MediaStoreError> for ErrorReport {
    fn from(error: &MediaStoreError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, MediaStoreError>;
