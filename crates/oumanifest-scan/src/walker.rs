//! Queue-based hierarchy walker.

use std::collections::VecDeque;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use oumanifest_core::{ManifestConfig, ManifestError, Metadata, ProbeError, ScanWarning};

use crate::chain::AncestorChain;
use crate::probe::probe;
use crate::progress::{ProgressTracker, WalkProgress};

/// One probed filesystem entry.
#[derive(Debug, Clone)]
pub struct WalkEntry {
    /// Path as it will appear in the manifest.
    pub path: PathBuf,
    /// Probed status.
    pub metadata: Metadata,
    /// Distance from the traversal root (roots are 0).
    pub depth: usize,
}

impl WalkEntry {
    /// Check if this entry is a named traversal root.
    pub fn is_root(&self) -> bool {
        self.depth == 0
    }
}

/// Where a traversal starts.
#[derive(Debug, Clone)]
enum Root {
    /// A path named by the caller; recorded under the name as given.
    Named(PathBuf),
    /// The current directory; children are recorded as bare names.
    CurrentDir,
}

/// A directory discovered but not yet read.
#[derive(Debug)]
struct PendingDir {
    /// Path prefix for children, `None` for the current directory.
    prefix: Option<PathBuf>,
    chain: AncestorChain,
    depth: usize,
}

impl PendingDir {
    fn open_path(&self) -> &Path {
        self.prefix.as_deref().unwrap_or(Path::new("."))
    }
}

/// A directory being read. Dropping it closes the handle.
#[derive(Debug)]
struct OpenDir {
    dir: PendingDir,
    entries: fs::ReadDir,
}

impl OpenDir {
    fn child_path(&self, name: &OsStr) -> PathBuf {
        match &self.dir.prefix {
            Some(prefix) => prefix.join(name),
            None => PathBuf::from(name),
        }
    }
}

enum Step {
    Entry {
        path: PathBuf,
        chain: AncestorChain,
        depth: usize,
    },
    ReadFailed {
        path: PathBuf,
        error: std::io::Error,
    },
    DirectoryDone,
    Advance,
}

/// Lazily walks one or more roots, yielding every entry beneath them.
///
/// Subdirectories are queued and read after the current directory is
/// exhausted, so native stack usage does not grow with tree depth. At most
/// one directory handle is open at a time. A directory that is its own
/// ancestor ends the walk with [`ManifestError::InfiniteLoop`].
///
/// Probe failures below a root are skipped with a warning in verbose mode
/// and end the walk otherwise. A root that cannot be probed is always
/// reported and skipped.
///
/// Dropping the walker, or calling [`HierarchyWalker::abort`], closes the
/// open directory and releases every pending one.
pub struct HierarchyWalker<'a> {
    config: &'a ManifestConfig,
    roots: VecDeque<Root>,
    pending: VecDeque<PendingDir>,
    current: Option<OpenDir>,
    warnings: Vec<ScanWarning>,
    progress: ProgressTracker,
    finished: bool,
}

impl<'a> HierarchyWalker<'a> {
    /// Create a walker over `roots`, or over the current directory if empty.
    pub fn new<P: AsRef<Path>>(roots: &[P], config: &'a ManifestConfig) -> Self {
        let mut queue: VecDeque<Root> = roots
            .iter()
            .map(|root| Root::Named(root.as_ref().to_path_buf()))
            .collect();
        if queue.is_empty() {
            queue.push_back(Root::CurrentDir);
        }

        Self {
            config,
            roots: queue,
            pending: VecDeque::new(),
            current: None,
            warnings: Vec::new(),
            progress: ProgressTracker::new(),
            finished: false,
        }
    }

    /// Stop the walk, releasing every open and pending directory.
    pub fn abort(&mut self) {
        self.finished = true;
        self.current = None;
        self.pending.clear();
        self.roots.clear();
    }

    /// Probe failures skipped so far.
    pub fn warnings(&self) -> &[ScanWarning] {
        &self.warnings
    }

    /// Consume the walker, returning the skipped probe failures.
    pub fn into_warnings(self) -> Vec<ScanWarning> {
        self.warnings
    }

    /// Current progress counters.
    pub fn progress(&self) -> WalkProgress {
        self.progress.snapshot()
    }

    /// Number of directories queued but not yet read.
    pub fn pending_dirs(&self) -> usize {
        self.pending.len()
    }

    fn next_step(&mut self) -> Step {
        let Some(open) = self.current.as_mut() else {
            return Step::Advance;
        };

        match open.entries.next() {
            // read_dir never yields `.` or `..`
            Some(Ok(entry)) => Step::Entry {
                path: open.child_path(&entry.file_name()),
                chain: open.dir.chain.clone(),
                depth: open.dir.depth + 1,
            },
            Some(Err(error)) => Step::ReadFailed {
                path: open.dir.open_path().to_path_buf(),
                error,
            },
            None => Step::DirectoryDone,
        }
    }

    /// Probe a directory entry and queue it if it is a directory.
    fn visit(
        &mut self,
        path: PathBuf,
        chain: &AncestorChain,
        depth: usize,
    ) -> Result<Option<WalkEntry>, ManifestError> {
        let metadata = match probe(&path, self.config.follows_all_links()) {
            Ok(metadata) => metadata,
            Err(err) => {
                self.skip_probe(err)?;
                return Ok(None);
            }
        };

        if metadata.is_dir() {
            let chain = chain.push(&path, metadata.id)?;
            self.pending.push_back(PendingDir {
                prefix: Some(path.clone()),
                chain,
                depth,
            });
        }

        Ok(Some(WalkEntry {
            path,
            metadata,
            depth,
        }))
    }

    /// Open the next pending directory, or start the next root.
    fn advance(&mut self) -> Result<Option<WalkEntry>, ManifestError> {
        if let Some(dir) = self.pending.pop_front() {
            match fs::read_dir(dir.open_path()) {
                Ok(entries) => {
                    tracing::debug!(dir = %dir.open_path().display(), depth = dir.depth, "reading directory");
                    self.current = Some(OpenDir { dir, entries });
                }
                Err(error) => {
                    let path = dir.open_path().to_path_buf();
                    self.skip_unreadable(path, error)?;
                }
            }
            return Ok(None);
        }

        match self.roots.pop_front() {
            Some(root) => self.start_root(root),
            None => {
                self.finished = true;
                Ok(None)
            }
        }
    }

    fn start_root(&mut self, root: Root) -> Result<Option<WalkEntry>, ManifestError> {
        match root {
            Root::Named(path) => {
                let metadata = match probe(&path, self.config.follows_command_line_links()) {
                    Ok(metadata) => metadata,
                    Err(err) => {
                        tracing::warn!("{err}");
                        self.warnings.push(ScanWarning::from_probe(&err));
                        self.progress.record_skip();
                        return Ok(None);
                    }
                };

                if metadata.is_dir() {
                    self.pending.push_back(PendingDir {
                        prefix: Some(path.clone()),
                        chain: AncestorChain::root(&path, metadata.id),
                        depth: 0,
                    });
                }

                Ok(Some(WalkEntry {
                    path,
                    metadata,
                    depth: 0,
                }))
            }
            Root::CurrentDir => {
                let metadata = probe(Path::new("."), true)?;
                self.pending.push_back(PendingDir {
                    prefix: None,
                    chain: AncestorChain::root(".", metadata.id),
                    depth: 0,
                });
                Ok(None)
            }
        }
    }

    fn skip_probe(&mut self, err: ProbeError) -> Result<(), ManifestError> {
        if !self.config.verbose {
            return Err(err.into());
        }
        tracing::warn!("{err}");
        self.warnings.push(ScanWarning::from_probe(&err));
        self.progress.record_skip();
        Ok(())
    }

    fn skip_unreadable(&mut self, path: PathBuf, error: std::io::Error) -> Result<(), ManifestError> {
        if !self.config.verbose {
            return Err(ProbeError::from_io(path, error).into());
        }
        let warning = ScanWarning::read_error(path, &error);
        tracing::warn!("{}", warning.message);
        self.warnings.push(warning);
        self.progress.record_skip();
        Ok(())
    }
}

impl Iterator for HierarchyWalker<'_> {
    type Item = Result<WalkEntry, ManifestError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            let result = match self.next_step() {
                Step::Entry { path, chain, depth } => self.visit(path, &chain, depth),
                Step::ReadFailed { path, error } => {
                    self.current = None;
                    self.skip_unreadable(path, error).map(|()| None)
                }
                Step::DirectoryDone => {
                    // Closing the handle also pops this directory's chain node
                    self.current = None;
                    self.progress.record_dir();
                    Ok(None)
                }
                Step::Advance => self.advance(),
            };

            match result {
                Ok(Some(entry)) => {
                    self.progress.record_entry(&entry.path);
                    return Some(Ok(entry));
                }
                Ok(None) => continue,
                Err(err) => {
                    self.abort();
                    return Some(Err(err));
                }
            }
        }
        None
    }
}

impl std::iter::FusedIterator for HierarchyWalker<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn create_test_tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        // Create directory structure
        fs::create_dir(root.join("dir1")).unwrap();
        fs::create_dir(root.join("dir2")).unwrap();
        fs::create_dir(root.join("dir1/subdir")).unwrap();

        // Create files
        fs::write(root.join("file1.txt"), "hello").unwrap();
        fs::write(root.join("dir1/file2.txt"), "world world world").unwrap();
        fs::write(root.join("dir1/subdir/file3.txt"), "test").unwrap();
        fs::write(root.join("dir2/file4.txt"), "another file here").unwrap();

        temp
    }

    fn relative_paths(temp: &TempDir, config: &ManifestConfig) -> Vec<PathBuf> {
        HierarchyWalker::new(&[temp.path()], config)
            .map(|entry| {
                let entry = entry.unwrap();
                entry.path.strip_prefix(temp.path()).unwrap().to_path_buf()
            })
            .collect()
    }

    #[test]
    fn test_visits_everything_once() {
        let temp = create_test_tree();
        let config = ManifestConfig::new();

        let paths = relative_paths(&temp, &config);
        let unique: HashSet<_> = paths.iter().cloned().collect();

        assert_eq!(paths.len(), 8);
        assert_eq!(unique.len(), paths.len());
        assert_eq!(paths[0], PathBuf::new());
        assert!(unique.contains(Path::new("dir1/subdir/file3.txt")));
    }

    #[test]
    fn test_directory_contents_follow_their_level() {
        let temp = create_test_tree();
        let config = ManifestConfig::new();

        let paths = relative_paths(&temp, &config);
        let position = |p: &str| paths.iter().position(|x| x == Path::new(p)).unwrap();

        // Top-level entries come before anything inside a subdirectory
        assert!(position("file1.txt") < position("dir1/file2.txt"));
        assert!(position("dir2") < position("dir1/file2.txt"));
        // Both second-level directories are read before the third level
        assert!(position("dir2/file4.txt") < position("dir1/subdir/file3.txt"));
    }

    #[test]
    fn test_depth() {
        let temp = create_test_tree();
        let config = ManifestConfig::new();

        for entry in HierarchyWalker::new(&[temp.path()], &config) {
            let entry = entry.unwrap();
            let rel = entry.path.strip_prefix(temp.path()).unwrap();
            assert_eq!(entry.depth, rel.components().count());
        }
    }

    #[test]
    fn test_missing_root_is_skipped() {
        let temp = create_test_tree();
        let config = ManifestConfig::new();
        let missing = temp.path().join("nope");

        let mut walker = HierarchyWalker::new(&[missing, temp.path().join("file1.txt")], &config);
        let entries: Vec<_> = walker.by_ref().collect::<Result<_, _>>().unwrap();

        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_root());
        assert_eq!(walker.warnings().len(), 1);
    }

    #[test]
    fn test_abort_releases_state() {
        let temp = create_test_tree();
        let config = ManifestConfig::new();

        let mut walker = HierarchyWalker::new(&[temp.path()], &config);
        // Root plus its first few children, leaving directories queued
        for _ in 0..3 {
            walker.next().unwrap().unwrap();
        }
        walker.abort();

        assert_eq!(walker.pending_dirs(), 0);
        assert!(walker.next().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_loop_detected() {
        let temp = create_test_tree();
        std::os::unix::fs::symlink(temp.path(), temp.path().join("dir1/back")).unwrap();

        let config = ManifestConfig::builder()
            .follow_all_links(true)
            .build()
            .unwrap();

        let results: Vec<_> = HierarchyWalker::new(&[temp.path()], &config).collect();
        let last = results.last().unwrap();
        assert!(matches!(last, Err(ManifestError::InfiniteLoop { .. })));
        assert_eq!(results.iter().filter(|r| r.is_err()).count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_not_followed_physically() {
        let temp = create_test_tree();
        std::os::unix::fs::symlink(temp.path(), temp.path().join("dir1/back")).unwrap();

        let config = ManifestConfig::new();
        let paths = relative_paths(&temp, &config);

        assert!(paths.contains(&PathBuf::from("dir1/back")));
        assert_eq!(paths.len(), 9);
    }
}
