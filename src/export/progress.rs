//! Progress tracking for export runs
//!
//! Long exports report how many entries have been encoded so far. Reports
//! go to the log and are throttled to one per interval.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tracing::info;

/// Progress tracker for an export run
pub struct ProgressTracker {
    /// Label used in log lines
    label: String,
    /// Number of entries processed so far
    processed: AtomicU64,
    /// Start time of the operation
    start_time: Instant,
    /// Minimum time between two reports
    interval: Duration,
    last_report: Mutex<Instant>,
}

impl ProgressTracker {
    /// Create a new progress tracker
    ///
    /// # Arguments
    /// * `label` - Name of the run shown in progress lines
    /// * `interval` - Minimum time between two progress lines
    ///
    /// # Returns
    /// * `Self` - New progress tracker instance
    pub fn new(label: impl Into<String>, interval: Duration) -> Self {
        let now = Instant::now();
        Self {
            label: label.into(),
            processed: AtomicU64::new(0),
            start_time: now,
            interval,
            last_report: Mutex::new(now),
        }
    }

    /// Update progress with new count
    ///
    /// # Arguments
    /// * `count` - Total number of entries processed so far
    pub fn update(&self, count: u64) {
        self.processed.store(count, Ordering::Relaxed);

        let Ok(mut last) = self.last_report.lock() else {
            return;
        };
        if last.elapsed() < self.interval {
            return;
        }
        *last = Instant::now();

        info!(
            "{}: {} entries ({:.0} entries/sec)",
            self.label,
            count,
            self.rate(count)
        );
    }

    /// Entries processed so far
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Log the final count
    pub fn finish(&self) {
        let count = self.processed();
        info!(
            "{}: encoded {} entries in {:.2}s",
            self.label,
            count,
            self.start_time.elapsed().as_secs_f64()
        );
    }

    fn rate(&self, count: u64) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            count as f64 / elapsed
        } else {
            0.0
        }
    }
}
