//! # Library Module
//!
//! The on-disk library root and the media items it holds.
//!
//! ## Layout
//! ```text
//! <root>/
//!   2024/01/15/photo.jpg        ingested media, sharded by ingestion date
//!   _cache/thumbs/photo_thumb.jpg
//!   .media-store.lock           present while a writer holds the root
//!   _database/                  reserved for the backup metadata entry
//! ```

mod lock;

pub use lock::{LibraryLock, LOCK_FILE_NAME};

use crate::error::StorageError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Reserved top-level directory for derived data
pub const CACHE_DIR_NAME: &str = "_cache";

/// Thumbnail directory inside the cache
pub const THUMBS_DIR_NAME: &str = "thumbs";

/// Top-level name that backups use for the metadata snapshot
pub const DATABASE_DIR_NAME: &str = "_database";

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "bmp", "tiff", "tif", "heic", "heif",
];

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "wmv", "webm", "m4v", "3gp"];

/// Kind of media, derived from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Detect the kind from a path's extension (case-insensitive)
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Image)
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Video)
        } else {
            None
        }
    }
}

/// A media file living under the library root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    /// Opaque logical id
    pub id: String,
    /// Absolute path inside the library root
    pub path: PathBuf,
    /// Display name (the file name)
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Creation time, when the platform reports one
    pub created: Option<DateTime<Utc>>,
    /// Last modification time
    pub modified: DateTime<Utc>,
    /// Image or video
    pub kind: MediaKind,
}

impl MediaItem {
    /// Describe a file that already sits in the library.
    ///
    /// Returns `None` for files that are not recognised media.
    pub fn from_path(path: &Path, id: impl Into<String>) -> Result<Option<Self>, StorageError> {
        let Some(kind) = MediaKind::from_path(path) else {
            return Ok(None);
        };

        let metadata = fs::metadata(path).map_err(|e| StorageError::Unavailable {
            path: path.to_path_buf(),
            source: e,
        })?;

        let modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        let created = metadata.created().ok().map(DateTime::<Utc>::from);

        Ok(Some(Self {
            id: id.into(),
            path: path.to_path_buf(),
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            size: metadata.len(),
            created,
            modified,
            kind,
        }))
    }
}

/// Directory holding derived thumbnails
pub fn thumbs_dir(root: &Path) -> PathBuf {
    root.join(CACHE_DIR_NAME).join(THUMBS_DIR_NAME)
}

/// Whether a path belongs to engine-owned bookkeeping rather than media
pub fn is_reserved(root: &Path, path: &Path) -> bool {
    match path.strip_prefix(root) {
        Ok(relative) => relative
            .components()
            .next()
            .map(|first| {
                let first = first.as_os_str();
                first == CACHE_DIR_NAME
                    || first == LOCK_FILE_NAME
                    || first == DATABASE_DIR_NAME
            })
            .unwrap_or(false),
        Err(_) => false,
    }
}

/// Check that a library root exists and is a directory
pub fn ensure_accessible(root: &Path) -> Result<(), StorageError> {
    let metadata = fs::metadata(root).map_err(|e| StorageError::Unavailable {
        path: root.to_path_buf(),
        source: e,
    })?;

    if !metadata.is_dir() {
        return Err(StorageError::Unavailable {
            path: root.to_path_buf(),
            source: std::io::Error::other("not a directory"),
        });
    }

    // read_dir surfaces permission problems that metadata() does not
    fs::read_dir(root).map_err(|e| StorageError::Unavailable {
        path: root.to_path_buf(),
        source: e,
    })?;

    Ok(())
}

/// List every media item under the root, skipping the reserved cache.
///
/// Items are identified by their root-relative path with forward slashes.
pub fn list_media(root: &Path) -> Result<Vec<MediaItem>, StorageError> {
    ensure_accessible(root)?;

    let mut items = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_reserved(root, entry.path()));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable library entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let id = relative_id(root, entry.path());
        if let Some(item) = MediaItem::from_path(entry.path(), id)? {
            items.push(item);
        }
    }

    Ok(items)
}

/// Root-relative path rendered with `/` separators
pub fn relative_id(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn kind_detection_is_case_insensitive() {
        assert_eq!(MediaKind::from_path(Path::new("a.JPG")), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_path(Path::new("b.heic")), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_path(Path::new("c.MOV")), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_path(Path::new("notes.txt")), None);
        assert_eq!(MediaKind::from_path(Path::new("no_extension")), None);
    }

    #[test]
    fn cache_and_lock_are_reserved() {
        let root = Path::new("/lib");
        assert!(is_reserved(root, Path::new("/lib/_cache/thumbs/a_thumb.jpg")));
        assert!(is_reserved(root, Path::new("/lib/.media-store.lock")));
        assert!(is_reserved(root, Path::new("/lib/_database/arc_database.json")));
        assert!(!is_reserved(root, Path::new("/lib/2024/01/01/a.jpg")));
        assert!(!is_reserved(root, Path::new("/elsewhere/_cache/a.jpg")));
    }

    #[test]
    fn list_media_skips_cache_and_non_media() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("2024/01/01")).unwrap();
        fs::create_dir_all(thumbs_dir(root)).unwrap();
        fs::write(root.join("2024/01/01/a.jpg"), b"a").unwrap();
        fs::write(root.join("2024/01/01/b.mp4"), b"bb").unwrap();
        fs::write(root.join("2024/01/01/readme.txt"), b"x").unwrap();
        fs::write(thumbs_dir(root).join("a_thumb.jpg"), b"t").unwrap();

        let items = list_media(root).unwrap();
        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["2024/01/01/a.jpg", "2024/01/01/b.mp4"]);
        assert_eq!(items[1].kind, MediaKind::Video);
        assert_eq!(items[1].size, 2);
    }

    #[test]
    fn missing_root_is_unavailable() {
        let temp = TempDir::new().unwrap();
        let result = ensure_accessible(&temp.path().join("missing"));
        assert!(matches!(result, Err(StorageError::Unavailable { .. })));
    }

    #[test]
    fn file_is_not_a_valid_root() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file");
        fs::write(&file, b"x").unwrap();
        assert!(ensure_accessible(&file).is_err());
    }
}
