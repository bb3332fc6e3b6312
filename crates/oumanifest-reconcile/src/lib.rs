//! Manifest update engine for oumanifest.
//!
//! Reads an existing manifest, compares it with a fresh walk of the named
//! roots, and writes the merged result.
//!
//! # Policies
//!
//! - **add** appends records for walked paths the manifest does not name
//! - **remove** drops records for paths under a named root that are gone
//! - **modified** refreshes the kind and the tracked fields of kept records
//!
//! # Example
//!
//! ```rust,no_run
//! use oumanifest_core::{ManifestConfig, UpdatePolicy};
//! use oumanifest_reconcile::update_manifest;
//!
//! let config = ManifestConfig::builder()
//!     .update(UpdatePolicy::from_letters("arm").unwrap())
//!     .build()
//!     .unwrap();
//!
//! let summary = update_manifest(
//!     &["/path/to/tree"],
//!     &config,
//!     std::io::stdin().lock(),
//!     std::io::stdout().lock(),
//! )
//! .unwrap();
//!
//! eprintln!("{} added, {} removed", summary.added, summary.removed);
//! ```

mod reconcile;
mod state;

pub use reconcile::{Disposition, Reconciler, UpdateSummary, update_manifest};
pub use state::ReconciliationState;
