//! Advisory single-writer lock for a library root.
//!
//! Ingest, backup, delete and restore all take the lock for their duration.
//! The lock is a file created with `create_new`, so a second writer (in this
//! process or another) fails fast instead of racing.

use crate::error::StorageError;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Name of the lock file placed at the root
pub const LOCK_FILE_NAME: &str = ".media-store.lock";

/// Held while an operation writes into a root. Released on drop.
#[derive(Debug)]
pub struct LibraryLock {
    path: PathBuf,
}

impl LibraryLock {
    /// Acquire the lock for `root`.
    ///
    /// Fails with `StorageError::Busy` if another holder exists.
    pub fn acquire(root: &Path) -> Result<Self, StorageError> {
        let path = root.join(LOCK_FILE_NAME);

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StorageError::Busy {
                    path: root.to_path_buf(),
                });
            }
            Err(e) => {
                return Err(StorageError::Unavailable {
                    path: root.to_path_buf(),
                    source: e,
                });
            }
        };

        // Owner pid helps when diagnosing a stale lock by hand
        let _ = writeln!(file, "{}", std::process::id());

        tracing::debug!("Acquired library lock {}", path.display());
        Ok(Self { path })
    }

    /// Path of the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LibraryLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!("Failed to release library lock {}: {}", self.path.display(), e);
        }
    }
}
