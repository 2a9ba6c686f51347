//! Batch transfer engine

use crate::detector::{CompletionDetector, MIN_POLL_INTERVAL};
use crate::pool::WorkerPool;
use crate::progress::ProgressCounters;
use crate::queue::{DeadLetterStore, WorkQueue};
use crate::summary::RunSummary;
use crate::task::Task;
use crate::transfer::LocalTransfer;
use crate::worker::WorkerContext;
use stagecopy_config::Config;
use stagecopy_types::{DrainPolicy, FileTransfer, Result, RetryPolicy, WorkerCount};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Engine tuning
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of workers
    pub workers: WorkerCount,
    /// Attempt budget per task
    pub retry: RetryPolicy,
    /// Interval between completion checks
    pub poll_interval: Duration,
    /// Completion criterion
    pub drain_policy: DrainPolicy,
    /// Successful copies between progress log lines
    pub progress_log_every: u64,
}

impl EngineConfig {
    /// Create engine config from the application config
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            workers: config.transfer.workers,
            retry: config.transfer.retry_policy()?,
            poll_interval: config.transfer.poll_interval(),
            drain_policy: config.transfer.drain_policy,
            progress_log_every: config.transfer.progress_log_every,
        })
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: WorkerCount::default(),
            retry: RetryPolicy::default(),
            poll_interval: Duration::from_secs(3),
            drain_policy: DrainPolicy::default(),
            progress_log_every: 500,
        }
    }
}

/// Runs one batch: load, drain with a worker pool, stop, summarize.
///
/// The queue, dead-letter store and counters are created with the engine, so
/// callers can watch progress through [`TransferEngine::counters`] while
/// [`TransferEngine::run`] is awaited.
#[derive(Debug)]
pub struct TransferEngine {
    config: EngineConfig,
    ctx: WorkerContext,
}

impl TransferEngine {
    /// Create an engine that copies on the local filesystem
    pub fn new(config: EngineConfig) -> Self {
        Self::with_transfer(config, Arc::new(LocalTransfer))
    }

    /// Create an engine over a custom transfer implementation
    pub fn with_transfer(config: EngineConfig, transfer: Arc<dyn FileTransfer>) -> Self {
        let ctx = WorkerContext {
            queue: Arc::new(WorkQueue::new()),
            dead_letters: Arc::new(DeadLetterStore::new()),
            counters: Arc::new(ProgressCounters::new(config.progress_log_every)),
            transfer,
            retry: config.retry,
        };
        Self { config, ctx }
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Progress counters of this engine's run
    pub fn counters(&self) -> Arc<ProgressCounters> {
        Arc::clone(&self.ctx.counters)
    }

    /// Work queue of this engine's run
    pub fn queue(&self) -> Arc<WorkQueue> {
        Arc::clone(&self.ctx.queue)
    }

    /// Run `tasks` to completion
    pub async fn run(self, tasks: Vec<Task>) -> RunSummary {
        self.run_until(tasks, CancellationToken::new()).await
    }

    /// Run `tasks` until they drain or `cancel` fires.
    ///
    /// On cancellation workers finish the copy they are on and the summary
    /// reports `drained == false`.
    pub async fn run_until(self, tasks: Vec<Task>, cancel: CancellationToken) -> RunSummary {
        let started = Instant::now();

        let loaded = self.ctx.queue.enqueue_batch(tasks);
        self.ctx.counters.set_to_process(loaded as u64);
        info!("Loaded {} files into the work queue", loaded);

        let mut pool = WorkerPool::new(self.config.workers, self.ctx.clone());
        pool.start();

        let mut detector = CompletionDetector::new(
            Arc::clone(&self.ctx.queue),
            self.config.poll_interval,
            self.config.drain_policy,
        );
        let drained = match detector.wait_for_drain(&cancel).await {
            Ok(report) => {
                debug!(checks = report.checks, "Completion detected");
                true
            }
            Err(e) => {
                warn!("Run interrupted: {}", e);
                false
            }
        };

        let totals = pool.stop().await;
        debug!(
            requeued = totals.requeued,
            dead_lettered = totals.dead_lettered,
            "Workers joined"
        );

        let summary = RunSummary {
            elapsed: started.elapsed(),
            workers: pool.size(),
            progress: self.ctx.counters.snapshot(),
            dead_letters: self.ctx.dead_letters.snapshot(),
            pending: self.ctx.queue.len(),
            drained,
        };
        summary.log();
        summary
    }
}

/// Builder for [`TransferEngine`]
#[derive(Default)]
pub struct EngineBuilder {
    config: EngineConfig,
    transfer: Option<Arc<dyn FileTransfer>>,
}

impl EngineBuilder {
    /// Start from default engine settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from application config
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            config: EngineConfig::from_config(config)?,
            transfer: None,
        })
    }

    /// Set the worker count
    pub fn workers(mut self, workers: WorkerCount) -> Self {
        self.config.workers = workers;
        self
    }

    /// Set the retry policy
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    /// Set the completion check interval, at least [`MIN_POLL_INTERVAL`]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    /// Set the completion criterion
    pub fn drain_policy(mut self, policy: DrainPolicy) -> Self {
        self.config.drain_policy = policy;
        self
    }

    /// Use a custom transfer implementation
    pub fn transfer(mut self, transfer: Arc<dyn FileTransfer>) -> Self {
        self.transfer = Some(transfer);
        self
    }

    /// Build the engine
    pub fn build(self) -> TransferEngine {
        match self.transfer {
            Some(transfer) => TransferEngine::with_transfer(self.config, transfer),
            None => TransferEngine::new(self.config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::tests::ScriptedTransfer;
    use stagecopy_types::Category;

    fn engine(workers: usize) -> TransferEngine {
        EngineBuilder::new()
            .workers(WorkerCount::new(workers).unwrap())
            .poll_interval(Duration::from_millis(20))
            .transfer(Arc::new(ScriptedTransfer::default()))
            .build()
    }

    fn batch(ok: usize, failing: usize) -> Vec<Task> {
        let ok = (0..ok).map(|n| format!("ok-{n}.pdf"));
        let failing = (0..failing).map(|n| format!("fail-{n}.pdf"));
        ok.chain(failing)
            .map(|name| Task::new(Category::NcAgency, format!("/in/{name}"), format!("/out/{name}")))
            .collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_two_failing_of_ten_with_three_workers() {
        let summary = engine(3).run(batch(8, 2)).await;

        assert!(summary.drained);
        assert_eq!(summary.workers, 3);
        assert_eq!(summary.progress.to_process, 10);
        assert_eq!(summary.progress.succeeded, 8);
        assert_eq!(summary.progress.attempted, 8 + 2 * 3);
        assert_eq!(summary.dead_letter_count(), 2);
        assert!(summary.dead_letters.iter().all(|l| l.task.attempts() == 3));
        assert!(summary.is_complete());
    }

    #[tokio::test]
    async fn test_empty_batch_drains_immediately() {
        let summary = tokio::time::timeout(Duration::from_millis(500), engine(2).run(Vec::new()))
            .await
            .expect("empty run finishes within one poll interval");

        assert!(summary.drained);
        assert_eq!(summary.progress.attempted, 0);
        assert_eq!(summary.progress.succeeded, 0);
        assert!(summary.is_complete());
    }

    #[tokio::test]
    async fn test_cancelled_run_reports_not_drained() {
        let engine = EngineBuilder::new()
            .workers(WorkerCount::new(1).unwrap())
            .poll_interval(Duration::from_secs(60))
            .transfer(Arc::new(ScriptedTransfer::default()))
            .build();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = engine.run_until(batch(50, 0), cancel).await;
        assert!(!summary.drained);
        assert!(!summary.is_complete());
        assert_eq!(
            summary.progress.succeeded + summary.pending as u64,
            50
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_zero_poll_interval_still_runs() {
        let engine = EngineBuilder::new()
            .workers(WorkerCount::new(2).unwrap())
            .poll_interval(Duration::ZERO)
            .transfer(Arc::new(ScriptedTransfer::default()))
            .build();
        assert_eq!(engine.config().poll_interval, MIN_POLL_INTERVAL);

        let summary = tokio::time::timeout(Duration::from_secs(5), engine.run(batch(20, 0)))
            .await
            .expect("run completes");
        assert!(summary.is_complete());
        assert_eq!(summary.progress.succeeded, 20);
    }

    #[test]
    fn test_engine_config_from_app_config() {
        let mut config = Config::default();
        config.transfer.max_attempts = 5;
        config.transfer.poll_interval_ms = 100;

        let engine_config = EngineConfig::from_config(&config).unwrap();
        assert_eq!(engine_config.retry.max_attempts(), 5);
        assert_eq!(engine_config.poll_interval, Duration::from_millis(100));
    }
}
