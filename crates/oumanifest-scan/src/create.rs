//! Manifest creation.

use std::io::Write;
use std::path::Path;

use oumanifest_core::{ManifestConfig, ManifestError, ManifestWriter, ScanWarning};

use crate::walker::HierarchyWalker;

/// Outcome of a create run.
#[derive(Debug, Clone, Default)]
pub struct CreateSummary {
    /// Records written.
    pub records: u64,
    /// Sum of recorded `size` fields.
    pub recorded_size: u64,
    /// Probe failures that were skipped.
    pub warnings: Vec<ScanWarning>,
}

/// Walk `roots` and write a new manifest to `out`.
///
/// On error the output is left partially written and must be discarded.
pub fn create_manifest<P, W>(
    roots: &[P],
    config: &ManifestConfig,
    out: W,
) -> Result<CreateSummary, ManifestError>
where
    P: AsRef<Path>,
    W: Write,
{
    let mut writer = ManifestWriter::begin(out)?;
    let mut walker = HierarchyWalker::new(roots, config);

    for entry in walker.by_ref() {
        let entry = entry?;
        writer.write_entry(&entry.path, &entry.metadata, config)?;
    }

    let progress = walker.progress();
    let summary = CreateSummary {
        records: writer.records_written(),
        recorded_size: writer.recorded_size(),
        warnings: walker.into_warnings(),
    };
    writer.finish()?;

    tracing::info!(
        records = summary.records,
        entries = progress.entries_yielded,
        skipped = progress.skipped,
        elapsed_ms = progress.elapsed.as_millis() as u64,
        "manifest created"
    );

    Ok(summary)
}
