//! Manifest record and file metadata types.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::config::FieldSet;

/// Identity of a file on disk, used for directory loop detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileId {
    /// Device ID.
    pub device: u64,
    /// Inode number.
    pub inode: u64,
}

impl FileId {
    /// Create a new file identity.
    pub fn new(device: u64, inode: u64) -> Self {
        Self { device, inode }
    }
}

/// Modification time as stored in a manifest.
///
/// Seconds are kept as the raw two's-complement value of the platform's
/// `st_mtime`, so timestamps before the epoch survive a round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Mtime {
    /// Whole seconds since the epoch.
    pub seconds: u64,
    /// Nanosecond part.
    pub nanoseconds: i64,
}

impl Mtime {
    /// Create a modification time.
    pub fn new(seconds: u64, nanoseconds: i64) -> Self {
        Self {
            seconds,
            nanoseconds,
        }
    }
}

/// Kind of file a record describes.
///
/// The string forms are the manifest type tags (`file <tag>`).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    #[strum(to_string = "regular")]
    Regular,
    #[strum(to_string = "directory")]
    Directory,
    #[strum(to_string = "character")]
    #[serde(rename = "character")]
    CharDevice,
    #[strum(to_string = "block")]
    #[serde(rename = "block")]
    BlockDevice,
    #[strum(to_string = "symlink")]
    Symlink,
    #[strum(to_string = "fifo")]
    Fifo,
}

impl FileKind {
    /// Selection letter used by the `-t` option.
    pub fn letter(self) -> char {
        match self {
            FileKind::Regular => 'r',
            FileKind::Directory => 'd',
            FileKind::CharDevice => 'c',
            FileKind::BlockDevice => 'b',
            FileKind::Symlink => 'l',
            FileKind::Fifo => 'f',
        }
    }

    /// Look up a kind by its selection letter.
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'r' => Some(FileKind::Regular),
            'd' => Some(FileKind::Directory),
            'c' => Some(FileKind::CharDevice),
            'b' => Some(FileKind::BlockDevice),
            'l' => Some(FileKind::Symlink),
            'f' => Some(FileKind::Fifo),
            _ => None,
        }
    }

    /// Manifest type tag.
    pub fn tag(self) -> &'static str {
        self.into()
    }
}

/// Status of a file as reported by a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// File kind, `None` for kinds a manifest cannot describe (sockets).
    pub kind: Option<FileKind>,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time.
    pub mtime: Mtime,
    /// Device and inode identity.
    pub id: FileId,
}

impl Metadata {
    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind == Some(FileKind::Directory)
    }
}

/// One manifest entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Raw path bytes. Never contains NUL.
    pub path: Vec<u8>,

    /// File kind.
    pub kind: FileKind,

    /// Size in bytes, present when size tracking is enabled.
    pub size: Option<u64>,

    /// Modification time, present when mtime tracking is enabled.
    pub mtime: Option<Mtime>,
}

impl FileRecord {
    /// Create a record with no optional fields.
    pub fn new(path: impl Into<Vec<u8>>, kind: FileKind) -> Self {
        Self {
            path: path.into(),
            kind,
            size: None,
            mtime: None,
        }
    }

    /// Set the size field.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Set the mtime field.
    pub fn with_mtime(mut self, mtime: Mtime) -> Self {
        self.mtime = Some(mtime);
        self
    }

    /// Build a record from probed metadata, keeping only the enabled fields.
    ///
    /// Returns `None` when the metadata describes a kind with no manifest tag.
    pub fn from_metadata(path: &Path, metadata: &Metadata, fields: &FieldSet) -> Option<Self> {
        let kind = metadata.kind?;
        Some(Self {
            path: path_to_bytes(path),
            kind,
            size: fields.size.then_some(metadata.size),
            mtime: fields.mtime.then_some(metadata.mtime),
        })
    }

    /// Overwrite the tracked fields with current metadata.
    ///
    /// Fields the record already carries are refreshed, and fields enabled in
    /// `fields` are added. Returns `true` if anything changed.
    pub fn refresh(&mut self, metadata: &Metadata, fields: &FieldSet) -> bool {
        let before = self.clone();

        if let Some(kind) = metadata.kind {
            self.kind = kind;
        }
        if self.size.is_some() || fields.size {
            self.size = Some(metadata.size);
        }
        if self.mtime.is_some() || fields.mtime {
            self.mtime = Some(metadata.mtime);
        }

        *self != before
    }

    /// The record path as a filesystem path.
    pub fn to_path_buf(&self) -> PathBuf {
        bytes_to_path(&self.path)
    }

    /// Lossy, printable form of the path for diagnostics.
    pub fn display_path(&self) -> String {
        String::from_utf8_lossy(&self.path).into_owned()
    }
}

/// Raw bytes of a path.
#[cfg(unix)]
pub fn path_to_bytes(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(not(unix))]
pub fn path_to_bytes(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

/// Path from raw bytes.
#[cfg(unix)]
pub fn bytes_to_path(bytes: &[u8]) -> PathBuf {
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(std::ffi::OsStr::from_bytes(bytes))
}

#[cfg(not(unix))]
pub fn bytes_to_path(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_metadata(kind: Option<FileKind>) -> Metadata {
        Metadata {
            kind,
            size: 42,
            mtime: Mtime::new(1_700_000_000, 5),
            id: FileId::new(1, 2),
        }
    }

    #[test]
    fn test_kind_tags() {
        assert_eq!(FileKind::Regular.tag(), "regular");
        assert_eq!(FileKind::CharDevice.tag(), "character");
        assert_eq!(FileKind::BlockDevice.to_string(), "block");
        assert_eq!("fifo".parse::<FileKind>().unwrap(), FileKind::Fifo);
        assert!("socket".parse::<FileKind>().is_err());
    }

    #[test]
    fn test_kind_letters() {
        for letter in ['r', 'd', 'c', 'b', 'l', 'f'] {
            let kind = FileKind::from_letter(letter).unwrap();
            assert_eq!(kind.letter(), letter);
        }
        assert!(FileKind::from_letter('x').is_none());
    }

    #[test]
    fn test_from_metadata_respects_fields() {
        let meta = sample_metadata(Some(FileKind::Regular));
        let fields = FieldSet {
            size: true,
            mtime: false,
        };
        let record = FileRecord::from_metadata(Path::new("a/b"), &meta, &fields).unwrap();

        assert_eq!(record.path, b"a/b");
        assert_eq!(record.size, Some(42));
        assert!(record.mtime.is_none());
    }

    #[test]
    fn test_from_metadata_socket() {
        let meta = sample_metadata(None);
        assert!(FileRecord::from_metadata(Path::new("sock"), &meta, &FieldSet::default()).is_none());
    }

    #[test]
    fn test_refresh_keeps_existing_fields() {
        let mut record = FileRecord::new("a", FileKind::Regular).with_mtime(Mtime::new(1, 0));
        let meta = sample_metadata(Some(FileKind::Regular));

        assert!(record.refresh(&meta, &FieldSet::default()));
        assert_eq!(record.mtime, Some(Mtime::new(1_700_000_000, 5)));
        assert!(record.size.is_none());

        // Unchanged the second time
        assert!(!record.refresh(&meta, &FieldSet::default()));
    }
}
