//! # Config Module
//!
//! Tunables for the engine, loadable from a JSON file.
//!
//! Every field has a default, so a partial file (or none at all) is valid.

use crate::error::MediaStoreError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Largest fingerprint grid; 64 gives 4096-bit fingerprints
pub const MAX_FINGERPRINT_SIZE: u32 = 64;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Longest edge of a derived thumbnail, in pixels
    pub thumbnail_max_edge: u32,
    /// JPEG quality for thumbnails (1-100)
    pub thumbnail_quality: u8,
    /// Where in a video the thumbnail frame is taken, in seconds
    pub video_frame_offset_secs: f64,
    /// Program used to extract video frames
    pub ffmpeg_program: String,
    /// Fingerprint grid size (8 gives 64-bit fingerprints)
    pub fingerprint_size: u32,
    /// Default similarity threshold for duplicate scans (0-100)
    pub duplicate_threshold: u32,
    /// Number of items fingerprinted per parallel batch
    pub fingerprint_chunk_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            thumbnail_max_edge: 512,
            thumbnail_quality: 80,
            video_frame_offset_secs: 1.0,
            ffmpeg_program: "ffmpeg".to_string(),
            fingerprint_size: 8,
            duplicate_threshold: 90,
            fingerprint_chunk_size: 32,
        }
    }
}

impl StoreConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Default location of the config file
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("media-store")
            .join("config.json")
    }

    /// Load configuration from a JSON file.
    ///
    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, MediaStoreError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let text = fs::read_to_string(path).map_err(|e| {
            MediaStoreError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config: Self = serde_json::from_str(&text).map_err(|e| {
            MediaStoreError::Config(format!("Invalid config {}: {}", path.display(), e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), MediaStoreError> {
        if self.thumbnail_max_edge == 0 || self.thumbnail_max_edge > u16::MAX as u32 {
            return Err(MediaStoreError::Config(format!(
                "thumbnail_max_edge must be 1-{}, got {}",
                u16::MAX,
                self.thumbnail_max_edge
            )));
        }
        if !(1..=100).contains(&self.thumbnail_quality) {
            return Err(MediaStoreError::Config(format!(
                "thumbnail_quality must be 1-100, got {}",
                self.thumbnail_quality
            )));
        }
        if self.duplicate_threshold > 100 {
            return Err(MediaStoreError::Config(format!(
                "duplicate_threshold must be 0-100, got {}",
                self.duplicate_threshold
            )));
        }
        if !(2..=MAX_FINGERPRINT_SIZE).contains(&self.fingerprint_size) {
            return Err(MediaStoreError::Config(format!(
                "fingerprint_size must be 2-{}, got {}",
                MAX_FINGERPRINT_SIZE, self.fingerprint_size
            )));
        }
        Ok(())
    }

    /// Set the thumbnail bound
    pub fn thumbnail_max_edge(mut self, edge: u32) -> Self {
        self.thumbnail_max_edge = edge;
        self
    }

    /// Set the ffmpeg program (name on PATH or absolute path)
    pub fn ffmpeg_program(mut self, program: impl Into<String>) -> Self {
        self.ffmpeg_program = program.into();
        self
    }

    /// Set the default duplicate threshold
    pub fn duplicate_threshold(mut self, threshold: u32) -> Self {
        self.duplicate_threshold = threshold;
        self
    }
}
