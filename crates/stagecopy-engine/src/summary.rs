//! Final run report

use crate::progress::ProgressSnapshot;
use crate::queue::DeadLetter;
use crate::task::TaskId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use stagecopy_types::{Category, Error, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Outcome of one batch run
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Wall time from load to pool shutdown
    pub elapsed: Duration,
    /// Number of workers in the pool
    pub workers: usize,
    /// Counters at shutdown
    pub progress: ProgressSnapshot,
    /// Tasks that exhausted their attempts
    pub dead_letters: Vec<DeadLetter>,
    /// Tasks still queued when the pool stopped
    pub pending: usize,
    /// Whether the detector observed drain before shutdown
    pub drained: bool,
}

impl RunSummary {
    /// Number of dead-lettered tasks
    pub fn dead_letter_count(&self) -> usize {
        self.dead_letters.len()
    }

    /// Every loaded task either succeeded or was dead-lettered
    pub fn is_complete(&self) -> bool {
        self.drained
            && self.pending == 0
            && self.progress.succeeded + self.dead_letter_count() as u64 == self.progress.to_process
    }

    /// Emit the end-of-run log lines
    pub fn log(&self) {
        info!(
            elapsed_ms = self.elapsed.as_millis() as u64,
            attempted = self.progress.attempted,
            succeeded = self.progress.succeeded,
            workers = self.workers,
            "Elapsed time: {} ms, {} files attempted, {} files copied, {} workers",
            self.elapsed.as_millis(),
            self.progress.attempted,
            self.progress.succeeded,
            self.workers
        );

        if !self.dead_letters.is_empty() {
            warn!("Unable to process {} files", self.dead_letter_count());
            for letter in &self.dead_letters {
                warn!(
                    task_id = %letter.task.id(),
                    attempts = letter.task.attempts(),
                    "Failed {}: {}",
                    letter.task.source().display(),
                    letter.reason()
                );
            }
        }
        if self.pending > 0 {
            warn!("{} files were still queued when workers stopped", self.pending);
        }
        if !self.drained {
            warn!("Run stopped before the work queue drained");
        }

        info!("Run finalized");
    }

    /// Write one JSON line per dead-lettered task to `path`.
    ///
    /// Returns the number of records written.
    pub fn write_dead_letter_report(&self, path: &Path) -> Result<usize> {
        let file = File::create(path).map_err(|e| Error::from_io_at(path, &e))?;
        let mut writer = BufWriter::new(file);

        for letter in &self.dead_letters {
            serde_json::to_writer(&mut writer, &DeadLetterRecord::from(letter))
                .map_err(|e| Error::other(format!("Failed to serialize dead letter: {}", e)))?;
            writer
                .write_all(b"\n")
                .map_err(|e| Error::from_io_at(path, &e))?;
        }
        writer.flush().map_err(|e| Error::from_io_at(path, &e))?;

        Ok(self.dead_letters.len())
    }
}

#[derive(Serialize)]
struct DeadLetterRecord<'a> {
    id: TaskId,
    category: Category,
    source: &'a Path,
    destination: &'a Path,
    attempts: u32,
    reason: &'a str,
    failed_at: DateTime<Utc>,
}

impl<'a> From<&'a DeadLetter> for DeadLetterRecord<'a> {
    fn from(letter: &'a DeadLetter) -> Self {
        Self {
            id: letter.task.id(),
            category: letter.task.category(),
            source: letter.task.source(),
            destination: letter.task.destination(),
            attempts: letter.task.attempts(),
            reason: letter.reason(),
            failed_at: letter.failed_at,
        }
    }
}
