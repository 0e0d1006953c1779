//! Restoring a backup archive into a target directory.

use super::manifest::{parse_part_name, BackupManifest, DATABASE_ENTRY};
use crate::error::{ArchiveError, MediaStoreError, StorageError};
use crate::events::{Event, EventSender, RestoreEvent};
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use xxhash_rust::xxh3::Xxh3;
use zip::ZipArchive;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Files making up one logical archive, in concatenation order
#[derive(Debug)]
struct ArchiveSet {
    files: Vec<PathBuf>,
    expected_checksum: Option<String>,
}

/// Reads archives produced by [`super::ArchiveWriter`]
pub struct ArchiveReader;

impl ArchiveReader {
    /// Restore from an archive, any one of its parts, or its manifest.
    ///
    /// Returns the metadata snapshot stored with the backup.
    pub fn restore(
        input: &Path,
        target: &Path,
        events: &EventSender,
    ) -> Result<Vec<u8>, MediaStoreError> {
        let set = Self::resolve(input)?;
        Self::restore_set(input, set, target, events)
    }

    /// Restore from an explicit list of part files.
    ///
    /// The list must be `.part01`, `.part02`, ... of one archive, in order.
    pub fn restore_parts(
        parts: &[PathBuf],
        target: &Path,
        events: &EventSender,
    ) -> Result<Vec<u8>, MediaStoreError> {
        let first = parts.first().ok_or_else(|| ArchiveError::Corrupt {
            path: target.to_path_buf(),
            reason: "no archive parts given".to_string(),
        })?;

        let mut base_name: Option<String> = None;
        for (index, part) in parts.iter().enumerate() {
            let corrupt = |reason: String| ArchiveError::Corrupt {
                path: part.clone(),
                reason,
            };
            let name = part
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| corrupt("part has no file name".to_string()))?;
            let (base, sequence) =
                parse_part_name(name).ok_or_else(|| corrupt("not an archive part".to_string()))?;

            if sequence != index + 1 {
                return Err(corrupt(format!(
                    "parts out of order: expected part {:02}, found part {:02}",
                    index + 1,
                    sequence
                ))
                .into());
            }
            let expected = base_name.get_or_insert_with(|| base.clone());
            if *expected != base {
                return Err(corrupt(format!("part belongs to {}, not {}", base, expected)).into());
            }
        }

        let set = ArchiveSet {
            files: parts.to_vec(),
            expected_checksum: None,
        };
        Self::restore_set(first, set, target, events)
    }

    fn resolve(input: &Path) -> Result<ArchiveSet, ArchiveError> {
        let corrupt = |reason: String| ArchiveError::Corrupt {
            path: input.to_path_buf(),
            reason,
        };

        if BackupManifest::is_manifest_path(input) {
            return Self::from_manifest(input);
        }

        let file_name = input
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| corrupt("archive path has no file name".to_string()))?;

        if let Some((base, _)) = parse_part_name(file_name) {
            let archive = input.with_file_name(&base);
            let manifest = BackupManifest::path_for(&archive);
            if manifest.is_file() {
                return Self::from_manifest(&manifest);
            }
            return Self::discover_parts(input, &base);
        }

        if input.is_file() {
            return Ok(ArchiveSet {
                files: vec![input.to_path_buf()],
                expected_checksum: None,
            });
        }

        // The archive itself is gone once split; fall back to its manifest
        let manifest = BackupManifest::path_for(input);
        if manifest.is_file() {
            return Self::from_manifest(&manifest);
        }

        Err(corrupt("archive not found".to_string()))
    }

    fn from_manifest(path: &Path) -> Result<ArchiveSet, ArchiveError> {
        let manifest = BackupManifest::load(path)?;
        let dir = path.parent().unwrap_or_else(|| Path::new(""));

        let files: Vec<PathBuf> = manifest
            .archive_files()
            .iter()
            .map(|name| dir.join(name))
            .collect();

        if let Some(missing) = files.iter().find(|f| !f.is_file()) {
            return Err(ArchiveError::Corrupt {
                path: missing.clone(),
                reason: "archive file listed in manifest is missing".to_string(),
            });
        }

        Ok(ArchiveSet {
            files,
            expected_checksum: Some(manifest.archive_checksum),
        })
    }

    /// Find `<base>.partNN` siblings of `input` and order them numerically
    fn discover_parts(input: &Path, base: &str) -> Result<ArchiveSet, ArchiveError> {
        let corrupt = |reason: String| ArchiveError::Corrupt {
            path: input.to_path_buf(),
            reason,
        };
        let dir = input
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut parts: Vec<(usize, PathBuf)> = fs::read_dir(dir)
            .map_err(|e| corrupt(e.to_string()))?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_str()?.to_string();
                let (part_base, sequence) = parse_part_name(&name)?;
                (part_base == base).then(|| (sequence, entry.path()))
            })
            .collect();
        parts.sort_by_key(|(sequence, _)| *sequence);

        if parts.is_empty() {
            return Err(corrupt("archive part not found".to_string()));
        }
        for (index, (sequence, _)) in parts.iter().enumerate() {
            if *sequence != index + 1 {
                return Err(corrupt(format!("missing part {:02}", index + 1)));
            }
        }

        tracing::debug!("Discovered {} parts of {}", parts.len(), base);

        Ok(ArchiveSet {
            files: parts.into_iter().map(|(_, path)| path).collect(),
            expected_checksum: None,
        })
    }

    fn restore_set(
        input: &Path,
        set: ArchiveSet,
        target: &Path,
        events: &EventSender,
    ) -> Result<Vec<u8>, MediaStoreError> {
        tracing::info!(
            "Restoring {} ({} file(s)) into {}",
            input.display(),
            set.files.len(),
            target.display()
        );

        fs::create_dir_all(target).map_err(|e| StorageError::Unavailable {
            path: target.to_path_buf(),
            source: e,
        })?;

        let archive = Self::assemble(input, &set, events)?;
        let result = Self::extract(input, archive, target, events);

        if let Err(e) = &result {
            tracing::error!("Restore of {} failed: {}", input.display(), e);
        }
        result
    }

    /// Produce one seekable archive, concatenating parts when needed
    fn assemble(input: &Path, set: &ArchiveSet, events: &EventSender) -> Result<File, ArchiveError> {
        let corrupt = |path: &Path, reason: String| ArchiveError::Corrupt {
            path: path.to_path_buf(),
            reason,
        };

        if set.files.len() == 1 && set.expected_checksum.is_none() {
            let path = &set.files[0];
            return File::open(path).map_err(|e| corrupt(path, e.to_string()));
        }

        if set.files.len() > 1 {
            events.send(Event::Restore(RestoreEvent::Reassembling {
                part_count: set.files.len(),
            }));
        }

        let mut joined = tempfile::tempfile().map_err(|e| corrupt(input, e.to_string()))?;
        let mut hasher = Xxh3::new();
        let mut buffer = vec![0u8; COPY_BUFFER_SIZE];

        for path in &set.files {
            let mut part = File::open(path).map_err(|e| corrupt(path, e.to_string()))?;
            loop {
                let read = part
                    .read(&mut buffer)
                    .map_err(|e| corrupt(path, e.to_string()))?;
                if read == 0 {
                    break;
                }
                hasher.update(&buffer[..read]);
                joined
                    .write_all(&buffer[..read])
                    .map_err(|e| corrupt(input, e.to_string()))?;
            }
        }

        if let Some(expected) = &set.expected_checksum {
            let actual = format!("{:016x}", hasher.digest());
            if actual != *expected {
                return Err(corrupt(
                    input,
                    format!("checksum mismatch (expected {}, got {})", expected, actual),
                ));
            }
        }

        joined
            .seek(SeekFrom::Start(0))
            .map_err(|e| corrupt(input, e.to_string()))?;
        Ok(joined)
    }

    fn extract(
        input: &Path,
        archive: File,
        target: &Path,
        events: &EventSender,
    ) -> Result<Vec<u8>, MediaStoreError> {
        let corrupt = |reason: String| ArchiveError::Corrupt {
            path: input.to_path_buf(),
            reason,
        };
        let unavailable = |path: &Path, source: io::Error| StorageError::Unavailable {
            path: path.to_path_buf(),
            source,
        };

        let mut zip = ZipArchive::new(archive).map_err(|e| corrupt(e.to_string()))?;
        let total = zip.len();
        events.send(Event::Restore(RestoreEvent::Started {
            total_entries: total,
        }));

        let mut metadata = None;
        let mut files_restored = 0;
        let mut buffer = vec![0u8; COPY_BUFFER_SIZE];

        for index in 0..total {
            let mut entry = zip.by_index(index).map_err(|e| corrupt(e.to_string()))?;
            let name = entry.name().to_string();

            if name == DATABASE_ENTRY {
                let mut blob = Vec::new();
                entry
                    .read_to_end(&mut blob)
                    .map_err(|e| corrupt(format!("{}: {}", name, e)))?;
                metadata = Some(blob);
            } else {
                let relative = entry
                    .enclosed_name()
                    .ok_or_else(|| corrupt(format!("unsafe entry name {}", name)))?;
                let out_path = target.join(relative);

                if entry.is_dir() {
                    fs::create_dir_all(&out_path).map_err(|e| unavailable(&out_path, e))?;
                } else {
                    if let Some(parent) = out_path.parent() {
                        fs::create_dir_all(parent).map_err(|e| unavailable(parent, e))?;
                    }
                    let mut out = File::create(&out_path).map_err(|e| unavailable(&out_path, e))?;
                    loop {
                        let read = entry
                            .read(&mut buffer)
                            .map_err(|e| corrupt(format!("{}: {}", name, e)))?;
                        if read == 0 {
                            break;
                        }
                        out.write_all(&buffer[..read])
                            .map_err(|e| unavailable(&out_path, e))?;
                    }
                    files_restored += 1;
                    tracing::debug!("Restored {}", name);
                }
            }

            events.send(Event::Restore(RestoreEvent::EntryRestored {
                completed: index + 1,
                total,
            }));
        }

        let metadata =
            metadata.ok_or_else(|| corrupt(format!("missing {} entry", DATABASE_ENTRY)))?;

        events.send(Event::Restore(RestoreEvent::Completed { files_restored }));
        tracing::info!("Restored {} files from {}", files_restored, input.display());

        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::archive::ArchiveWriter;
    use crate::events::null_sender;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn library() -> TempDir {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("2024/01/01")).unwrap();
        let photo: Vec<u8> = (0..200_000u32).map(|i| (i * 7 % 251) as u8).collect();
        fs::write(temp.path().join("2024/01/01/photo.png"), photo).unwrap();
        fs::write(temp.path().join("2024/01/01/clip.mp4"), vec![9u8; 50_000]).unwrap();
        temp
    }

    fn is_corrupt(result: Result<Vec<u8>, MediaStoreError>) -> bool {
        matches!(result, Err(MediaStoreError::Archive(ArchiveError::Corrupt { .. })))
    }

    #[test]
    fn restores_unsplit_archive() {
        let lib = library();
        let out = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let dest = out.path().join("backup.zip");
        ArchiveWriter::write(lib.path(), br#"{"v":1}"#, &dest, 1, &null_sender()).unwrap();

        let blob = ArchiveReader::restore(&dest, target.path(), &null_sender()).unwrap();

        assert_eq!(blob, br#"{"v":1}"#);
        for name in ["2024/01/01/photo.png", "2024/01/01/clip.mp4"] {
            assert_eq!(
                fs::read(target.path().join(name)).unwrap(),
                fs::read(lib.path().join(name)).unwrap()
            );
        }
    }

    #[test]
    fn any_part_finds_its_siblings() {
        let lib = library();
        let out = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let dest = out.path().join("backup.zip");
        ArchiveWriter::write(lib.path(), b"{}", &dest, 3, &null_sender()).unwrap();

        let blob = ArchiveReader::restore(
            &out.path().join("backup.zip.part02"),
            target.path(),
            &null_sender(),
        )
        .unwrap();

        assert_eq!(blob, b"{}");
        assert!(target.path().join("2024/01/01/photo.png").exists());
    }

    #[test]
    fn explicit_parts_must_be_in_order() {
        let lib = library();
        let out = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let dest = out.path().join("backup.zip");
        let manifest = ArchiveWriter::write(lib.path(), b"{}", &dest, 2, &null_sender()).unwrap();

        let mut parts: Vec<PathBuf> = manifest
            .part_file_names
            .iter()
            .map(|n| out.path().join(n))
            .collect();
        parts.reverse();

        assert!(is_corrupt(ArchiveReader::restore_parts(
            &parts,
            target.path(),
            &null_sender()
        )));
    }

    #[test]
    fn reordered_manifest_fails_checksum() {
        let lib = library();
        let out = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let dest = out.path().join("backup.zip");
        let mut manifest =
            ArchiveWriter::write(lib.path(), b"{}", &dest, 2, &null_sender()).unwrap();

        manifest.part_file_names.swap(0, 1);
        let manifest_path = BackupManifest::path_for(&dest);
        manifest.save(&manifest_path).unwrap();

        assert!(is_corrupt(ArchiveReader::restore(
            &manifest_path,
            target.path(),
            &null_sender()
        )));
    }

    #[test]
    fn missing_middle_part_is_corrupt() {
        let lib = library();
        let out = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let dest = out.path().join("backup.zip");
        ArchiveWriter::write(lib.path(), b"{}", &dest, 3, &null_sender()).unwrap();
        fs::remove_file(out.path().join("backup.zip.part02")).unwrap();

        assert!(is_corrupt(ArchiveReader::restore(
            &out.path().join("backup.zip.part01"),
            target.path(),
            &null_sender()
        )));
    }

    #[test]
    fn garbage_is_corrupt() {
        let out = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let path = out.path().join("junk.zip");
        fs::write(&path, b"definitely not a zip file").unwrap();

        assert!(is_corrupt(ArchiveReader::restore(
            &path,
            target.path(),
            &null_sender()
        )));
    }

    #[test]
    fn archive_without_database_is_corrupt() {
        let out = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let path = out.path().join("foreign.zip");

        let mut zip = ZipWriter::new(File::create(&path).unwrap());
        zip.start_file("photo.png", SimpleFileOptions::default()).unwrap();
        zip.write_all(b"pixels").unwrap();
        zip.finish().unwrap();

        assert!(is_corrupt(ArchiveReader::restore(
            &path,
            target.path(),
            &null_sender()
        )));
    }

    #[test]
    fn escaping_entry_is_corrupt() {
        let out = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let path = out.path().join("evil.zip");

        let mut zip = ZipWriter::new(File::create(&path).unwrap());
        zip.start_file(DATABASE_ENTRY, SimpleFileOptions::default()).unwrap();
        zip.write_all(b"{}").unwrap();
        zip.start_file("../escaped.txt", SimpleFileOptions::default()).unwrap();
        zip.write_all(b"x").unwrap();
        zip.finish().unwrap();

        assert!(is_corrupt(ArchiveReader::restore(
            &path,
            target.path(),
            &null_sender()
        )));
    }

    #[test]
    fn missing_archive_is_corrupt() {
        let out = TempDir::new().unwrap();
        assert!(is_corrupt(ArchiveReader::restore(
            &out.path().join("nope.zip"),
            out.path(),
            &null_sender()
        )));
    }
}
