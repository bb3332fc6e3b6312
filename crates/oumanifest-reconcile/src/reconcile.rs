//! Manifest update against the live filesystem.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use oumanifest_core::{
    FileRecord, ManifestConfig, ManifestError, ManifestReader, ManifestWriter, RemoveScope,
    ScanWarning, UpdatePolicy, bytes_to_path,
};
use oumanifest_scan::{HierarchyWalker, probe};

use crate::state::ReconciliationState;

/// Outcome of an update run.
#[derive(Debug, Clone, Default)]
pub struct UpdateSummary {
    /// Existing records written back (refreshed or not).
    pub retained: u64,
    /// Retained records whose metadata changed.
    pub refreshed: u64,
    /// Existing records dropped.
    pub removed: u64,
    /// New records appended.
    pub added: u64,
    /// Probe failures that were skipped.
    pub warnings: Vec<ScanWarning>,
}

/// What happens to one existing record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Write the record back, possibly with refreshed fields.
    Keep(FileRecord),
    /// Drop the record.
    Remove,
}

/// Merges an existing manifest with the current state of the caller's roots.
///
/// Existing records are processed in input order and always precede the
/// records appended for new paths, which follow walk discovery order. When a
/// path is both gone and eligible for removal, removal wins over refresh.
pub struct Reconciler<'a> {
    config: &'a ManifestConfig,
    policy: UpdatePolicy,
    roots: Vec<PathBuf>,
    cache: Option<ReconciliationState>,
    summary: UpdateSummary,
}

impl<'a> Reconciler<'a> {
    /// Prepare a reconciler, walking `roots` when `add` or `remove` is active.
    pub fn new<P: AsRef<Path>>(
        roots: &[P],
        config: &'a ManifestConfig,
    ) -> Result<Self, ManifestError> {
        let policy = config.update_policy();
        if policy.is_empty() {
            return Err(ManifestError::InvalidConfig {
                message: "update mode needs at least one of add, remove or modified".to_string(),
            });
        }

        let cache = if policy.add || policy.remove {
            Some(ReconciliationState::from_walk(HierarchyWalker::new(roots, config))?)
        } else {
            None
        };

        Ok(Self::with_state(roots, config, cache))
    }

    /// Prepare a reconciler over an already built cache.
    pub fn with_state<P: AsRef<Path>>(
        roots: &[P],
        config: &'a ManifestConfig,
        cache: Option<ReconciliationState>,
    ) -> Self {
        let warnings = cache
            .as_ref()
            .map(|c| c.warnings().to_vec())
            .unwrap_or_default();

        Self {
            config,
            policy: config.update_policy(),
            roots: roots.iter().map(|r| r.as_ref().to_path_buf()).collect(),
            cache,
            summary: UpdateSummary {
                warnings,
                ..UpdateSummary::default()
            },
        }
    }

    /// Check if a record path falls under one of the named roots.
    ///
    /// With no named roots the current directory was walked, so every
    /// record is eligible.
    pub fn in_removal_scope(&self, path: &Path) -> bool {
        if self.roots.is_empty() {
            return true;
        }
        self.roots.iter().any(|root| match self.config.remove_scope {
            RemoveScope::Exact => path == root,
            RemoveScope::Subtree => path.starts_with(root),
        })
    }

    /// Apply the active policies to one existing record.
    pub fn process(&mut self, mut record: FileRecord) -> Result<Disposition, ManifestError> {
        let path = bytes_to_path(&record.path);
        let removable = self.policy.remove && self.in_removal_scope(&path);
        let fresh = self
            .cache
            .as_ref()
            .and_then(|cache| cache.get(&record.path))
            .copied();

        if removable && fresh.is_none() {
            tracing::debug!(path = %path.display(), "dropping removed record");
            self.summary.removed += 1;
            return Ok(Disposition::Remove);
        }

        if self.policy.add {
            if let Some(cache) = self.cache.as_mut() {
                cache.claim(&record.path);
            }
        }

        if self.policy.modified {
            let current = match fresh {
                Some(metadata) => Ok(metadata),
                None => probe(&path, self.follows_links_for(&path)),
            };

            match current {
                Ok(metadata) => {
                    if record.refresh(&metadata, &self.config.fields) {
                        tracing::debug!(path = %path.display(), "refreshed record");
                        self.summary.refreshed += 1;
                    }
                }
                Err(err) if err.is_not_found() && removable => {
                    self.summary.removed += 1;
                    return Ok(Disposition::Remove);
                }
                // A vanished path outside the removal scope keeps its old record
                Err(err) if err.is_not_found() => {}
                Err(err) => {
                    if !self.config.verbose {
                        return Err(err.into());
                    }
                    tracing::warn!("{err}");
                    self.summary.warnings.push(ScanWarning::from_probe(&err));
                }
            }
        }

        self.summary.retained += 1;
        Ok(Disposition::Keep(record))
    }

    /// Records for cached paths no existing record claimed, in walk order.
    pub fn new_records(&self) -> Vec<FileRecord> {
        if !self.policy.add {
            return Vec::new();
        }
        let Some(cache) = self.cache.as_ref() else {
            return Vec::new();
        };

        cache
            .remaining()
            .filter(|(_, metadata)| {
                metadata
                    .kind
                    .is_some_and(|kind| self.config.kinds.contains(kind))
            })
            .filter_map(|(path, metadata)| {
                FileRecord::from_metadata(&bytes_to_path(path), metadata, &self.config.fields)
            })
            .collect()
    }

    /// Run the whole update: existing records first, then new ones.
    pub fn reconcile<R: BufRead, W: Write>(
        mut self,
        reader: ManifestReader<R>,
        out: W,
    ) -> Result<UpdateSummary, ManifestError> {
        let mut writer = ManifestWriter::begin(out)?;

        for record in reader {
            if let Disposition::Keep(record) = self.process(record?)? {
                writer.write_record(&record)?;
            }
        }

        for record in self.new_records() {
            writer.write_record(&record)?;
            self.summary.added += 1;
        }

        writer.finish()?;

        tracing::info!(
            retained = self.summary.retained,
            refreshed = self.summary.refreshed,
            removed = self.summary.removed,
            added = self.summary.added,
            "manifest updated"
        );

        Ok(self.summary)
    }

    /// Named roots follow the command-line link policy; everything else
    /// follows the all-links policy.
    fn follows_links_for(&self, path: &Path) -> bool {
        if self.roots.iter().any(|root| root == path) {
            self.config.follows_command_line_links()
        } else {
            self.config.follows_all_links()
        }
    }
}

/// Update the manifest read from `input` and write the result to `out`.
///
/// The input header is validated before the filesystem is walked. On error
/// the output is left partially written and must be discarded.
pub fn update_manifest<P, R, W>(
    roots: &[P],
    config: &ManifestConfig,
    input: R,
    out: W,
) -> Result<UpdateSummary, ManifestError>
where
    P: AsRef<Path>,
    R: BufRead,
    W: Write,
{
    let reader = ManifestReader::open(input)?;
    let reconciler = Reconciler::new(roots, config)?;
    reconciler.reconcile(reader, out)
}
