//! Collision-free placement of ingested files.

use crate::error::StorageError;
use chrono::{Datelike, Local, NaiveDate};
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

/// Places files into the date-sharded library tree.
///
/// Single-writer: callers serialize placements on the same root
/// (the store does this with a `LibraryLock`).
pub struct PathOrganizer;

impl PathOrganizer {
    /// Copy `source` into today's folder under `root` and return the final path
    pub fn place(source: &Path, root: &Path) -> Result<PathBuf, StorageError> {
        Self::place_on(Local::now().date_naive(), source, root)
    }

    /// Copy `source` into the folder for `date` under `root`
    pub fn place_on(date: NaiveDate, source: &Path, root: &Path) -> Result<PathBuf, StorageError> {
        let file_name = source
            .file_name()
            .ok_or_else(|| StorageError::SourceUnreadable {
                path: source.to_path_buf(),
                source: io::Error::other("source path has no file name"),
            })?
            .to_os_string();

        let mut reader = File::open(source).map_err(|e| StorageError::SourceUnreadable {
            path: source.to_path_buf(),
            source: e,
        })?;

        let folder = root.join(Self::date_folder(date));
        fs::create_dir_all(&folder).map_err(|e| StorageError::Unavailable {
            path: folder.clone(),
            source: e,
        })?;

        let file_name = Path::new(&file_name);
        let mut counter = 0usize;
        loop {
            let candidate = folder.join(Self::suffixed_name(file_name, counter));

            // create_new never clobbers a file that appeared since the last probe
            let mut writer = match OpenOptions::new().write(true).create_new(true).open(&candidate) {
                Ok(writer) => writer,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    counter += 1;
                    continue;
                }
                Err(e) => {
                    return Err(StorageError::Unavailable {
                        path: candidate,
                        source: e,
                    })
                }
            };

            if let Err(e) = io::copy(&mut reader, &mut writer) {
                drop(writer);
                let _ = fs::remove_file(&candidate);
                return Err(StorageError::Unavailable {
                    path: candidate,
                    source: e,
                });
            }

            tracing::debug!("Placed {} at {}", source.display(), candidate.display());
            return Ok(candidate);
        }
    }

    /// Relative folder for a date, e.g. `2024/01/05`
    pub fn date_folder(date: NaiveDate) -> String {
        format!("{}/{:02}/{:02}", date.year(), date.month(), date.day())
    }

    /// `name.ext` for counter 0, `name_N.ext` otherwise
    fn suffixed_name(file_name: &Path, counter: usize) -> String {
        let full = file_name.to_string_lossy().into_owned();
        if counter == 0 {
            return full;
        }

        let stem = file_name
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or(full);
        match file_name.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{}_{}.{}", stem, counter, ext),
            None => format!("{}_{}", stem, counter),
        }
    }
}
