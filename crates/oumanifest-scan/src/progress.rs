//! Walk progress reporting.

use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Progress information during a walk.
#[derive(Debug, Clone)]
pub struct WalkProgress {
    /// Number of entries yielded so far.
    pub entries_yielded: u64,
    /// Number of directories fully read.
    pub dirs_read: u64,
    /// Number of probe failures skipped.
    pub skipped: u64,
    /// Path yielded at the most recent progress report.
    pub current_path: PathBuf,
    /// Time elapsed since the walk started.
    pub elapsed: Duration,
}

impl WalkProgress {
    /// Calculate walk rate in entries per second.
    pub fn entries_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.entries_yielded as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}

/// Internal progress tracker with timing.
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    start_time: Instant,
    entries_yielded: u64,
    dirs_read: u64,
    skipped: u64,
    current_path: PathBuf,
}

impl ProgressTracker {
    /// Entries between debug progress lines.
    const REPORT_INTERVAL: u64 = 1000;

    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            entries_yielded: 0,
            dirs_read: 0,
            skipped: 0,
            current_path: PathBuf::new(),
        }
    }

    pub fn record_entry(&mut self, path: &std::path::Path) {
        self.entries_yielded += 1;
        if self.entries_yielded % Self::REPORT_INTERVAL == 0 {
            self.current_path = path.to_path_buf();
            let snapshot = self.snapshot();
            tracing::debug!(
                entries = snapshot.entries_yielded,
                dirs = snapshot.dirs_read,
                rate = snapshot.entries_per_second(),
                path = %snapshot.current_path.display(),
                "walk progress"
            );
        }
    }

    pub fn record_dir(&mut self) {
        self.dirs_read += 1;
    }

    pub fn record_skip(&mut self) {
        self.skipped += 1;
    }

    pub fn snapshot(&self) -> WalkProgress {
        WalkProgress {
            entries_yielded: self.entries_yielded,
            dirs_read: self.dirs_read,
            skipped: self.skipped,
            current_path: self.current_path.clone(),
            elapsed: self.start_time.elapsed(),
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}
