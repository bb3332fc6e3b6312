//! Cache of freshly walked entries.

use indexmap::IndexMap;

use oumanifest_core::{ManifestError, Metadata, ScanWarning, path_to_bytes};
use oumanifest_scan::HierarchyWalker;

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    metadata: Metadata,
    claimed: bool,
}

/// Current on-disk entries of an update run, keyed by record path.
///
/// Entries keep the order the walker discovered them in. Each manifest
/// record that names a cached path claims it; whatever is unclaimed once the
/// manifest is consumed is new.
#[derive(Debug, Default)]
pub struct ReconciliationState {
    entries: IndexMap<Vec<u8>, CacheEntry>,
    warnings: Vec<ScanWarning>,
}

impl ReconciliationState {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill the cache by draining a walker.
    pub fn from_walk(mut walker: HierarchyWalker<'_>) -> Result<Self, ManifestError> {
        let mut state = Self::new();
        for entry in walker.by_ref() {
            let entry = entry?;
            state.insert(path_to_bytes(&entry.path), entry.metadata);
        }
        state.warnings = walker.into_warnings();

        tracing::debug!(entries = state.len(), "hierarchy cache built");
        Ok(state)
    }

    /// Add an entry. A path already present keeps its first position.
    pub fn insert(&mut self, path: Vec<u8>, metadata: Metadata) {
        self.entries.entry(path).or_insert(CacheEntry {
            metadata,
            claimed: false,
        });
    }

    /// Current metadata of a path, claimed or not.
    pub fn get(&self, path: &[u8]) -> Option<&Metadata> {
        self.entries.get(path).map(|entry| &entry.metadata)
    }

    /// Mark a path as already present in the manifest.
    ///
    /// Returns `true` if the path was cached and not yet claimed.
    pub fn claim(&mut self, path: &[u8]) -> bool {
        match self.entries.get_mut(path) {
            Some(entry) if !entry.claimed => {
                entry.claimed = true;
                true
            }
            _ => false,
        }
    }

    /// Unclaimed entries in discovery order.
    pub fn remaining(&self) -> impl Iterator<Item = (&[u8], &Metadata)> {
        self.entries
            .iter()
            .filter(|(_, entry)| !entry.claimed)
            .map(|(path, entry)| (path.as_slice(), &entry.metadata))
    }

    /// Probe failures skipped while walking.
    pub fn warnings(&self) -> &[ScanWarning] {
        &self.warnings
    }

    /// Number of cached paths.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing was cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
