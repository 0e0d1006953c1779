//! Still-frame extraction via an external ffmpeg binary.

use crate::core::imaging::decode_file;
use crate::error::ThumbnailError;
use image::DynamicImage;
use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};

/// Grab one frame `offset_secs` into `source` and decode it.
///
/// Clips shorter than the offset produce an empty output, which is
/// reported as a failure like any other.
pub fn extract_frame(
    program: &str,
    source: &Path,
    offset_secs: f64,
) -> Result<DynamicImage, ThumbnailError> {
    let fail = |reason: String| ThumbnailError::FrameExtraction {
        path: source.to_path_buf(),
        reason,
    };

    let frame_file = tempfile::Builder::new()
        .prefix("media-store-frame-")
        .suffix(".png")
        .tempfile()
        .map_err(|e| fail(format!("Failed to create temp file: {}", e)))?;

    let output = Command::new(program)
        .args(["-hide_banner", "-loglevel", "error", "-ss"])
        .arg(format!("{:.3}", offset_secs))
        .arg("-i")
        .arg(source)
        .args(["-frames:v", "1", "-f", "image2", "-y"])
        .arg(frame_file.path())
        .stdin(Stdio::null())
        .output()
        .map_err(|e| fail(format!("Failed to run {}: {}", program, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(fail(format!("{} exited with {}: {}", program, output.status, stderr.trim())));
    }

    let written = fs::metadata(frame_file.path()).map(|m| m.len()).unwrap_or(0);
    if written == 0 {
        return Err(fail(format!("No frame at {:.3}s", offset_secs)));
    }

    decode_file(frame_file.path()).map_err(|e| fail(e.to_string()))
}
