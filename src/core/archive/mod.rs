//! # Archive Module
//!
//! Portable backups of a library root plus its metadata snapshot.
//!
//! ## Format
//! A single ZIP (Deflate) whose first entry is `_database/arc_database.json`
//! holding the caller's metadata blob verbatim, followed by the library tree
//! with `/`-separated relative paths.
//!
//! ## Splitting
//! Large backups can be cut into `<archive>.part01`, `<archive>.part02`, ...
//! Splitting happens only after the archive is sealed, so concatenating the
//! parts in order yields the original file. The manifest records the part
//! names and an xxh3 checksum of the sealed archive.
//!
//! ## Restoring
//! [`ArchiveReader`] accepts the archive, any of its parts, its manifest,
//! or an explicit ordered part list.

mod manifest;
mod reader;
mod split;
mod writer;

pub use manifest::{
    parse_part_name, part_file_name, BackupManifest, DATABASE_ENTRY, MANIFEST_VERSION, MAX_PARTS,
};
pub use reader::ArchiveReader;
pub use split::{part_ranges, SealedArchive};
pub use writer::ArchiveWriter;
