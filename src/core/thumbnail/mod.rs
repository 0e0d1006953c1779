//! # Thumbnail Module
//!
//! Derives bounded, progressive JPEG previews for library media.
//!
//! ## Rules
//! - Output lives at `<root>/_cache/thumbs/<stem>_thumb.jpg`
//! - Longer side is at most `thumbnail_max_edge` (512 by default)
//! - Aspect ratio is preserved and small images are never upscaled
//! - Videos use a single frame taken `video_frame_offset_secs` in
//!
//! Codec failures are not errors. The deriver logs them and reports
//! [`ThumbnailOutcome::Skipped`] with the path the thumbnail would have had,
//! so renderers can show a placeholder at that path.

mod video;

use crate::config::StoreConfig;
use crate::core::imaging::{decode_file, FastResizer};
use crate::core::library::{thumbs_dir, MediaKind};
use crate::error::{ErrorKind, ErrorReport, StorageError, ThumbnailError};
use image::DynamicImage;
use jpeg_encoder::{ColorType, Encoder};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Result of a derivation attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThumbnailOutcome {
    /// A thumbnail was written at this path
    Derived(PathBuf),
    /// No thumbnail exists at `path`; render a placeholder
    Skipped { path: PathBuf, reason: String },
}

impl ThumbnailOutcome {
    /// The thumbnail path, whether or not the file exists
    pub fn path(&self) -> &Path {
        match self {
            ThumbnailOutcome::Derived(path) => path,
            ThumbnailOutcome::Skipped { path, .. } => path,
        }
    }

    /// Whether a thumbnail file was produced
    pub fn is_derived(&self) -> bool {
        matches!(self, ThumbnailOutcome::Derived(_))
    }

    /// The absorbed failure behind a skipped thumbnail, for display
    pub fn report(&self) -> Option<ErrorReport> {
        match self {
            ThumbnailOutcome::Derived(_) => None,
            ThumbnailOutcome::Skipped { reason, .. } => Some(ErrorReport {
                kind: ErrorKind::ThumbnailDerivationFailed,
                message: reason.clone(),
            }),
        }
    }
}

/// Produces previews into the library's thumbnail cache
pub struct ThumbnailDeriver {
    max_edge: u32,
    quality: u8,
    frame_offset_secs: f64,
    ffmpeg_program: String,
}

impl ThumbnailDeriver {
    /// Create a deriver from the engine configuration
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            max_edge: config.thumbnail_max_edge,
            quality: config.thumbnail_quality,
            frame_offset_secs: config.video_frame_offset_secs,
            ffmpeg_program: config.ffmpeg_program.clone(),
        }
    }

    /// Thumbnail path for a source file, independent of its kind
    pub fn thumbnail_path(source: &Path, root: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "untitled".to_string());
        thumbs_dir(root).join(format!("{}_thumb.jpg", stem))
    }

    /// Derive a thumbnail for `source` inside `root`.
    ///
    /// Only an unusable cache directory is an error.
    pub fn derive(&self, source: &Path, root: &Path) -> Result<ThumbnailOutcome, StorageError> {
        let dir = thumbs_dir(root);
        fs::create_dir_all(&dir).map_err(|e| StorageError::Unavailable {
            path: dir.clone(),
            source: e,
        })?;

        let target = Self::thumbnail_path(source, root);

        let result = match MediaKind::from_path(source) {
            Some(MediaKind::Video) => video::extract_frame(
                &self.ffmpeg_program,
                source,
                self.frame_offset_secs,
            )
            .and_then(|frame| self.write_bounded(&frame, &target)),
            _ => decode_file(source).and_then(|image| self.write_bounded(&image, &target)),
        };

        match result {
            Ok(()) => {
                tracing::debug!("Derived thumbnail {}", target.display());
                Ok(ThumbnailOutcome::Derived(target))
            }
            Err(e) => {
                tracing::warn!("Thumbnail skipped for {}: {}", source.display(), e);
                Ok(ThumbnailOutcome::Skipped {
                    path: target,
                    reason: e.to_string(),
                })
            }
        }
    }

    fn write_bounded(&self, image: &DynamicImage, target: &Path) -> Result<(), ThumbnailError> {
        let (width, height) = bounded_dimensions(image.width(), image.height(), self.max_edge);

        let mut resizer = FastResizer::new();
        let rgb = resizer.resize_rgb(image, width, height)?;

        let encode_error = |reason: String| ThumbnailError::Encode {
            path: target.to_path_buf(),
            reason,
        };

        // The encoder takes 16-bit dimensions
        let (width, height) = match (u16::try_from(rgb.width()), u16::try_from(rgb.height())) {
            (Ok(w), Ok(h)) => (w, h),
            _ => {
                return Err(encode_error(format!(
                    "{}x{} exceeds JPEG limits",
                    rgb.width(),
                    rgb.height()
                )))
            }
        };

        let result = File::create(target)
            .map_err(|e| encode_error(e.to_string()))
            .and_then(|file| {
                let mut writer = BufWriter::new(file);
                let mut encoder = Encoder::new(&mut writer, self.quality);
                encoder.set_progressive(true);
                encoder
                    .encode(rgb.as_raw(), width, height, ColorType::Rgb)
                    .map_err(|e| encode_error(e.to_string()))?;
                writer.flush().map_err(|e| encode_error(e.to_string()))
            });

        if result.is_err() {
            let _ = fs::remove_file(target);
        }
        result
    }
}

/// Scale `(width, height)` so the longer side fits `max_edge`.
///
/// Never upscales; the shorter side is rounded and kept at least 1.
pub fn bounded_dimensions(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    let longer = width.max(height);
    if longer <= max_edge || longer == 0 {
        return (width, height);
    }

    let scale = |side: u32| -> u32 {
        let scaled = (side as u64 * max_edge as u64 + longer as u64 / 2) / longer as u64;
        (scaled as u32).max(1)
    };

    if width >= height {
        (max_edge, scale(height))
    } else {
        (scale(width), max_edge)
    }
}
