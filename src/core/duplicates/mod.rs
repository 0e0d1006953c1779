//! # Duplicates Module
//!
//! Near-duplicate detection over owned pixel data, off the caller's thread.
//!
//! ## Protocol
//! The caller talks to a dedicated worker thread over two crossbeam channels:
//! - in: [`ScanCommand::Start`], [`ScanCommand::Cancel`]
//! - out: [`ScanMessage::Progress`], [`ScanMessage::Result`], [`ScanMessage::Error`]
//!
//! Progress runs 0-50 while fingerprinting and 50-100 while comparing.
//! A cancelled scan sends nothing further. A `Start` that arrives while a
//! scan is running replaces it.
//!
//! ## Similarity
//! | Similarity | Meaning                    |
//! |------------|----------------------------|
//! | 100        | Identical fingerprints     |
//! | 90+        | Default duplicate cut-off  |
//! | 0          | Every bit differs          |
//!
//! The worker never touches the file system; see
//! [`crate::core::store::MediaStore::load_scan_items`] for reading items from a library.

mod fingerprint;
mod worker;

pub use fingerprint::Fingerprint;
pub use worker::DuplicateScanner;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Pixels for one item, already in memory
#[derive(Debug, Clone)]
pub enum PixelSource {
    /// Encoded file bytes (JPEG, PNG, ...)
    Encoded(Vec<u8>),
    /// Already decoded pixels
    Bitmap(DynamicImage),
}

/// One image submitted for scanning
#[derive(Debug, Clone)]
pub struct ScanItem {
    pub id: String,
    pub source: PixelSource,
}

/// Two items whose fingerprints meet the threshold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicatePair {
    pub id_a: String,
    pub id_b: String,
    /// Rounded percentage of matching fingerprint bits
    pub similarity: u8,
}

/// Commands accepted by the worker
#[derive(Debug)]
pub enum ScanCommand {
    Start { items: Vec<ScanItem>, threshold: u8 },
    Cancel,
}

/// Messages emitted by the worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScanMessage {
    Progress { percent: u8 },
    Result { pairs: Vec<DuplicatePair> },
    Error { message: String },
}

/// How a scan ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Completed(Vec<DuplicatePair>),
    Cancelled,
}
