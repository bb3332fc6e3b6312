//! Error types for manifest operations.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A failed file status query.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Path not found.
    #[error("{path}: No such file or directory")]
    NotFound { path: PathBuf },

    /// Permission denied for a path.
    #[error("{path}: Permission denied")]
    PermissionDenied { path: PathBuf },

    /// Any other I/O failure.
    #[error("{path}: {source}")]
    Other {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ProbeError {
    /// Classify an I/O error with path context.
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Other { path, source },
        }
    }

    /// Path the probe failed on.
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::NotFound { path } | Self::PermissionDenied { path } | Self::Other { path, .. } => {
                path
            }
        }
    }

    /// Check if the path does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Errors that can occur while creating or updating a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// A file status query failed.
    #[error(transparent)]
    Probe(#[from] ProbeError),

    /// A directory is its own ancestor.
    #[error("infinite directory loop: {path} is the same directory as {ancestor}")]
    InfiniteLoop { path: PathBuf, ancestor: PathBuf },

    /// The input manifest is not well formed.
    #[error("malformed manifest at line {line}: {message}")]
    Malformed { line: usize, message: String },

    /// The input manifest has a version this build cannot read.
    #[error("unsupported manifest version number {version}")]
    UnsupportedVersion { version: i64 },

    /// Reading the input or writing the output failed.
    #[error("failed to {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A path cannot be stored in a manifest.
    #[error("path cannot be recorded (embedded NUL byte): {path}")]
    InvalidPath { path: String },
}

impl ManifestError {
    /// Create an I/O error for a failed read or write.
    pub fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    /// Create a malformed-manifest error.
    pub fn malformed(line: usize, message: impl Into<String>) -> Self {
        Self::Malformed {
            line,
            message: message.into(),
        }
    }

    /// Only probe failures may be skipped; everything else ends the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Probe(_))
    }
}

/// Kind of non-fatal warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    /// Permission was denied.
    PermissionDenied,
    /// The path disappeared between listing and probing.
    NotFound,
    /// Error reading file metadata.
    MetadataError,
    /// Error opening or reading a directory.
    ReadError,
}

/// A probe failure that was skipped instead of ending the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanWarning {
    /// Path where the warning occurred.
    pub path: PathBuf,
    /// Human-readable message.
    pub message: String,
    /// Kind of warning.
    pub kind: WarningKind,
}

impl ScanWarning {
    /// Create a new warning.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
        }
    }

    /// Create a warning from a skipped probe failure.
    pub fn from_probe(error: &ProbeError) -> Self {
        let kind = match error {
            ProbeError::NotFound { .. } => WarningKind::NotFound,
            ProbeError::PermissionDenied { .. } => WarningKind::PermissionDenied,
            ProbeError::Other { .. } => WarningKind::MetadataError,
        };
        Self::new(error.path().clone(), error.to_string(), kind)
    }

    /// Create a warning for a directory that could not be read.
    pub fn read_error(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        let path = path.into();
        Self {
            message: format!("{}: {error}", path.display()),
            path,
            kind: WarningKind::ReadError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_error_classification() {
        let err = ProbeError::from_io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, ProbeError::PermissionDenied { .. }));

        let err = ProbeError::from_io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.is_not_found());
    }

    #[test]
    fn test_only_probe_errors_recoverable() {
        let probe: ManifestError = ProbeError::NotFound {
            path: PathBuf::from("x"),
        }
        .into();
        assert!(probe.is_recoverable());

        let lp = ManifestError::InfiniteLoop {
            path: PathBuf::from("a/b"),
            ancestor: PathBuf::from("a"),
        };
        assert!(!lp.is_recoverable());
        assert!(!ManifestError::malformed(3, "bad").is_recoverable());
    }

    #[test]
    fn test_warning_from_probe() {
        let err = ProbeError::PermissionDenied {
            path: PathBuf::from("/secret"),
        };
        let warning = ScanWarning::from_probe(&err);
        assert_eq!(warning.kind, WarningKind::PermissionDenied);
        assert!(warning.message.contains("Permission denied"));
    }
}
