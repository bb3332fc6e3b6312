//! Core types and codec for oumanifest.
//!
//! This crate provides the data structures shared by the walker and the
//! reconciliation engine: file records, probed metadata, configuration,
//! errors, and the manifest text codec.

pub mod codec;
mod config;
mod error;
mod record;

pub use codec::{MAGIC, ManifestReader, ManifestWriter, VERSION};
pub use config::{
    FieldSet, KindFilter, ManifestConfig, ManifestConfigBuilder, RemoveScope, UpdatePolicy,
};
pub use error::{ManifestError, ProbeError, ScanWarning, WarningKind};
pub use record::{FileId, FileKind, FileRecord, Metadata, Mtime, bytes_to_path, path_to_bytes};
