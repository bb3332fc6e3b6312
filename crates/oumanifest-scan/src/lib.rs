//! Filesystem traversal engine for oumanifest.
//!
//! This crate walks file hierarchies and writes new manifests.
//!
//! # Overview
//!
//! - **Probing** via [`probe`], with logical or physical symlink handling
//! - **Loop detection** via [`AncestorChain`], keyed by device and inode
//!   (unix only)
//! - **Lazy traversal** via [`HierarchyWalker`], an iterator driven by an
//!   explicit queue of pending directories
//! - **Create mode** via [`create_manifest`]
//!
//! # Example
//!
//! ```rust,no_run
//! use oumanifest_scan::{ManifestConfig, create_manifest};
//!
//! let config = ManifestConfig::new();
//! let summary = create_manifest(&["/path/to/tree"], &config, std::io::stdout().lock()).unwrap();
//!
//! eprintln!("{} records", summary.records);
//! ```
//!
//! # Walking without writing
//!
//! ```rust,no_run
//! use oumanifest_scan::{HierarchyWalker, ManifestConfig};
//!
//! let config = ManifestConfig::new();
//! for entry in HierarchyWalker::new(&["/path/to/tree"], &config) {
//!     let entry = entry.unwrap();
//!     println!("{} {:?}", entry.path.display(), entry.metadata.kind);
//! }
//! ```

#[cfg(not(unix))]
compile_error!("oumanifest-scan needs device and inode numbers and only builds on unix");

mod chain;
mod create;
mod probe;
mod progress;
mod walker;

pub use chain::AncestorChain;
pub use create::{CreateSummary, create_manifest};
pub use probe::{probe, to_metadata};
pub use progress::WalkProgress;
pub use walker::{HierarchyWalker, WalkEntry};

// Re-export core types for convenience
pub use oumanifest_core::{
    FileId, FileKind, FileRecord, ManifestConfig, ManifestError, Metadata, ProbeError,
    ScanWarning, WarningKind,
};
