//! Run-wide progress counters

use stagecopy_types::TransferOutcome;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Counters shared by every worker of a run
#[derive(Debug)]
pub struct ProgressCounters {
    to_process: AtomicU64,
    attempted: AtomicU64,
    succeeded: AtomicU64,
    bytes_copied: AtomicU64,
    directories_created: AtomicU64,
    log_every: u64,
}

impl ProgressCounters {
    /// Create counters that log a progress line every `log_every` successes
    pub fn new(log_every: u64) -> Self {
        Self {
            to_process: AtomicU64::new(0),
            attempted: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            bytes_copied: AtomicU64::new(0),
            directories_created: AtomicU64::new(0),
            log_every: log_every.max(1),
        }
    }

    /// Record the size of the loaded batch
    pub fn set_to_process(&self, total: u64) {
        self.to_process.store(total, Ordering::SeqCst);
    }

    /// Count a copy attempt; returns the new total
    pub fn increment_attempted(&self) -> u64 {
        self.attempted.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Count a successful copy; returns the new total
    pub fn increment_succeeded(&self) -> u64 {
        let succeeded = self.succeeded.fetch_add(1, Ordering::SeqCst) + 1;
        if succeeded % self.log_every == 0 {
            info!(
                attempted = self.attempted(),
                succeeded,
                "File copy in progress: {} files attempted, {} files copied",
                self.attempted(),
                succeeded
            );
        }
        succeeded
    }

    /// Count a successful copy along with what it wrote
    pub fn record_success(&self, outcome: &TransferOutcome) {
        self.bytes_copied
            .fetch_add(outcome.bytes_copied, Ordering::Relaxed);
        if outcome.directory_created {
            self.directories_created.fetch_add(1, Ordering::Relaxed);
        }
        self.increment_succeeded();
    }

    /// Files in the loaded batch
    pub fn to_process(&self) -> u64 {
        self.to_process.load(Ordering::SeqCst)
    }

    /// Copy attempts started, including retries
    pub fn attempted(&self) -> u64 {
        self.attempted.load(Ordering::SeqCst)
    }

    /// Files copied successfully
    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::SeqCst)
    }

    /// Point-in-time view of every counter.
    ///
    /// `succeeded` is read before `attempted`, so the snapshot never shows
    /// more successes than attempts.
    pub fn snapshot(&self) -> ProgressSnapshot {
        let succeeded = self.succeeded();
        let attempted = self.attempted();
        ProgressSnapshot {
            to_process: self.to_process(),
            attempted,
            succeeded,
            bytes_copied: self.bytes_copied.load(Ordering::Relaxed),
            directories_created: self.directories_created.load(Ordering::Relaxed),
        }
    }
}

impl Default for ProgressCounters {
    fn default() -> Self {
        Self::new(500)
    }
}

/// Copy of the counters at one instant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ProgressSnapshot {
    /// Files in the loaded batch
    pub to_process: u64,
    /// Copy attempts started, including retries
    pub attempted: u64,
    /// Files copied successfully
    pub succeeded: u64,
    /// Bytes written by successful copies
    pub bytes_copied: u64,
    /// Destination directories created
    pub directories_created: u64,
}

impl ProgressSnapshot {
    /// Attempts that did not end in a successful copy
    pub fn failed_attempts(&self) -> u64 {
        self.attempted.saturating_sub(self.succeeded)
    }
}
