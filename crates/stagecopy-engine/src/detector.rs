//! Batch completion detection

use crate::queue::WorkQueue;
use stagecopy_types::{DrainPolicy, Error, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Shortest interval between completion checks
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Detector state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// Work may remain
    Running,
    /// The drain criterion was observed
    Drained,
}

/// How the detector reached [`DetectorState::Drained`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// Number of checks performed, including the successful one
    pub checks: u64,
    /// Time spent waiting
    pub waited: Duration,
}

/// Watches the work queue until the batch is drained.
///
/// Checks run on a fixed interval and also whenever the queue reports that its
/// last in-flight task settled.
#[derive(Debug)]
pub struct CompletionDetector {
    queue: Arc<WorkQueue>,
    poll_interval: Duration,
    policy: DrainPolicy,
    state: DetectorState,
}

impl CompletionDetector {
    /// Create a detector in the running state.
    ///
    /// `poll_interval` is raised to [`MIN_POLL_INTERVAL`] when shorter.
    pub fn new(queue: Arc<WorkQueue>, poll_interval: Duration, policy: DrainPolicy) -> Self {
        Self {
            queue,
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
            policy,
            state: DetectorState::Running,
        }
    }

    /// Current state
    pub fn state(&self) -> DetectorState {
        self.state
    }

    /// Evaluate the drain criterion once. Drained is terminal.
    pub fn check(&mut self) -> DetectorState {
        if self.state == DetectorState::Running {
            let drained = match self.policy {
                DrainPolicy::Settled => self.queue.is_drained(),
                DrainPolicy::QueueEmpty => self.queue.is_empty(),
            };
            if drained {
                self.state = DetectorState::Drained;
            }
        }
        self.state
    }

    /// Wait until the batch drains.
    ///
    /// Fails with [`Error::Cancelled`] if `cancel` fires first.
    pub async fn wait_for_drain(&mut self, cancel: &CancellationToken) -> Result<DrainReport> {
        let started = Instant::now();
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut checks = 0;

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(Error::Cancelled),
                _ = interval.tick() => {}
                () = self.queue.settled() => {}
            }

            checks += 1;
            if self.check() == DetectorState::Drained {
                let waited = started.elapsed();
                info!("Work queue drained after {} ms", waited.as_millis());
                return Ok(DrainReport { checks, waited });
            }
            debug!(
                pending = self.queue.len(),
                in_flight = self.queue.in_flight(),
                "Work queue not drained yet"
            );
        }
    }
}
