//! File status queries.

use std::fs;
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::path::Path;

use oumanifest_core::{FileId, FileKind, Metadata, Mtime, ProbeError};

/// Query the status of `path`.
///
/// With `follow_symlink` the status of the link target is returned
/// (logical), otherwise that of the link itself (physical).
pub fn probe(path: &Path, follow_symlink: bool) -> Result<Metadata, ProbeError> {
    let metadata = if follow_symlink {
        fs::metadata(path)
    } else {
        fs::symlink_metadata(path)
    };

    metadata
        .map(|m| to_metadata(&m))
        .map_err(|e| ProbeError::from_io(path, e))
}

/// Convert std metadata into the manifest's view of it.
pub fn to_metadata(metadata: &fs::Metadata) -> Metadata {
    Metadata {
        kind: classify(&metadata.file_type()),
        size: metadata.len(),
        mtime: get_mtime(metadata),
        id: FileId::new(get_dev(metadata), get_ino(metadata)),
    }
}

fn classify(file_type: &fs::FileType) -> Option<FileKind> {
    if file_type.is_file() {
        Some(FileKind::Regular)
    } else if file_type.is_dir() {
        Some(FileKind::Directory)
    } else if file_type.is_symlink() {
        Some(FileKind::Symlink)
    } else if file_type.is_char_device() {
        Some(FileKind::CharDevice)
    } else if file_type.is_block_device() {
        Some(FileKind::BlockDevice)
    } else if file_type.is_fifo() {
        Some(FileKind::Fifo)
    } else {
        None
    }
}

/// Get the modification time from metadata.
fn get_mtime(metadata: &fs::Metadata) -> Mtime {
    Mtime::new(metadata.mtime() as u64, metadata.mtime_nsec())
}

/// Get the device ID from metadata.
fn get_dev(metadata: &fs::Metadata) -> u64 {
    metadata.dev()
}

/// Get the inode number from metadata.
fn get_ino(metadata: &fs::Metadata) -> u64 {
    metadata.ino()
}
