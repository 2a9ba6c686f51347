//! Transfer worker and retry routing

use crate::progress::ProgressCounters;
use crate::queue::{DeadLetterStore, Lease, WorkQueue};
use crate::task::Task;
use futures::FutureExt;
use stagecopy_types::{FileTransfer, Result, RetryPolicy, TransferOutcome};
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Handles shared by every worker of a run
#[derive(Clone)]
pub struct WorkerContext {
    /// Pending tasks
    pub queue: Arc<WorkQueue>,
    /// Tasks that ran out of attempts
    pub dead_letters: Arc<DeadLetterStore>,
    /// Run-wide counters
    pub counters: Arc<ProgressCounters>,
    /// Filesystem operations
    pub transfer: Arc<dyn FileTransfer>,
    /// Attempt budget per task
    pub retry: RetryPolicy,
}

impl fmt::Debug for WorkerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerContext")
            .field("queue", &self.queue.len())
            .field("dead_letters", &self.dead_letters.len())
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// What happened to a task after one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Copied; the task is done
    Succeeded,
    /// Failed and put back on the queue
    Requeued,
    /// Failed for the last time and moved to the dead-letter store
    DeadLettered,
}

/// Per-worker tallies, reported when the worker exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Tasks copied
    pub succeeded: u64,
    /// Failed attempts that were retried
    pub requeued: u64,
    /// Tasks dead-lettered
    pub dead_lettered: u64,
}

impl WorkerStats {
    fn record(&mut self, disposition: Disposition) {
        match disposition {
            Disposition::Succeeded => self.succeeded += 1,
            Disposition::Requeued => self.requeued += 1,
            Disposition::DeadLettered => self.dead_lettered += 1,
        }
    }
}

/// One loop consuming tasks from the work queue
#[derive(Debug)]
pub struct Worker {
    id: usize,
    ctx: WorkerContext,
}

impl Worker {
    /// Create worker `id` over the shared handles
    pub fn new(id: usize, ctx: WorkerContext) -> Self {
        Self { id, ctx }
    }

    /// Worker number within its pool
    pub fn id(&self) -> usize {
        self.id
    }

    /// Process tasks until `cancel` fires.
    ///
    /// A copy that is already running when cancellation arrives completes and
    /// is routed normally; no new task is taken afterwards.
    pub async fn run(self, cancel: CancellationToken) -> WorkerStats {
        debug!(worker = self.id, "Worker started");
        let mut stats = WorkerStats::default();

        while let Some(lease) = self.ctx.queue.checkout(&cancel).await {
            stats.record(self.process(lease).await);
        }

        debug!(
            worker = self.id,
            succeeded = stats.succeeded,
            requeued = stats.requeued,
            dead_lettered = stats.dead_lettered,
            "Worker stopped"
        );
        stats
    }

    /// Attempt one leased task and route the result
    pub async fn process(&self, lease: Lease<'_>) -> Disposition {
        let attempt = AssertUnwindSafe(self.attempt(lease.task()))
            .catch_unwind()
            .await;

        match attempt {
            Ok(Ok(outcome)) => {
                self.ctx.counters.record_success(&outcome);
                debug!(
                    worker = self.id,
                    task_id = %lease.task().id(),
                    bytes = outcome.bytes_copied,
                    "Copied {}",
                    lease.task().destination().display()
                );
                Disposition::Succeeded
            }
            Ok(Err(error)) => self.route_failure(lease, &error.to_string()),
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                error!(
                    worker = self.id,
                    task_id = %lease.task().id(),
                    "Unexpected error while processing {}: {}",
                    lease.task().source().display(),
                    reason
                );
                self.route_failure(lease, &reason)
            }
        }
    }

    async fn attempt(&self, task: &Task) -> Result<TransferOutcome> {
        self.ctx.counters.increment_attempted();

        let directory_created = match task.destination_dir() {
            Some(dir) => self.ctx.transfer.ensure_directory(dir).await?,
            None => false,
        };
        let bytes_copied = self
            .ctx
            .transfer
            .copy_file(task.source(), task.destination())
            .await?;

        Ok(TransferOutcome {
            bytes_copied,
            directory_created,
        })
    }

    fn route_failure(&self, lease: Lease<'_>, reason: &str) -> Disposition {
        let next = lease.task().with_failure(reason);

        if self.ctx.retry.allows_retry(next.attempts()) {
            debug!(
                worker = self.id,
                task_id = %next.id(),
                attempt = next.attempts(),
                "Retrying {}: {}",
                next.source().display(),
                reason
            );
            lease.requeue(next);
            Disposition::Requeued
        } else {
            warn!(
                worker = self.id,
                task_id = %next.id(),
                attempt = next.attempts(),
                "Giving up on {}: {}",
                next.source().display(),
                reason
            );
            self.ctx.dead_letters.record(next);
            drop(lease);
            Disposition::DeadLettered
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::transfer::LocalTransfer;
    use async_trait::async_trait;
    use stagecopy_types::{Category, Error};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Succeeds for every source except those whose file name starts with
    /// `fail`, which error, or `panic`, which panic.
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedTransfer {
        pub(crate) copies: AtomicUsize,
    }

    #[async_trait]
    impl FileTransfer for ScriptedTransfer {
        async fn ensure_directory(&self, _dir: &Path) -> Result<bool> {
            Ok(false)
        }

        async fn copy_file(&self, source: &Path, _destination: &Path) -> Result<u64> {
            let name = source
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            if name.starts_with("panic") {
                panic!("scripted panic for {name}");
            }
            if name.starts_with("fail") {
                return Err(Error::transfer(source, "scripted failure"));
            }
            self.copies.fetch_add(1, Ordering::SeqCst);
            Ok(1)
        }
    }

    fn context(transfer: Arc<dyn FileTransfer>) -> WorkerContext {
        WorkerContext {
            queue: Arc::new(WorkQueue::new()),
            dead_letters: Arc::new(DeadLetterStore::new()),
            counters: Arc::new(ProgressCounters::default()),
            transfer,
            retry: RetryPolicy::default(),
        }
    }

    fn task(name: &str) -> Task {
        Task::new(Category::Srcn, format!("/in/{name}"), format!("/out/{name}"))
    }

    #[tokio::test]
    async fn test_failing_task_is_dead_lettered_after_three_attempts() {
        let ctx = context(Arc::new(ScriptedTransfer::default()));
        let worker = Worker::new(0, ctx.clone());
        ctx.queue.enqueue(task("fail.pdf"));

        let mut dispositions = Vec::new();
        while let Some(lease) = ctx.queue.try_checkout() {
            dispositions.push(worker.process(lease).await);
        }

        assert_eq!(
            dispositions,
            vec![
                Disposition::Requeued,
                Disposition::Requeued,
                Disposition::DeadLettered
            ]
        );
        let letters = ctx.dead_letters.snapshot();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].task.attempts(), 3);
        assert!(letters[0].reason().contains("scripted failure"));
        assert_eq!(ctx.counters.attempted(), 3);
        assert_eq!(ctx.counters.succeeded(), 0);
        assert!(ctx.queue.is_drained());
    }

    #[tokio::test]
    async fn test_panic_is_routed_as_failed_attempt() {
        let ctx = context(Arc::new(ScriptedTransfer::default()));
        let worker = Worker::new(0, ctx.clone());
        ctx.queue.enqueue(task("panic.pdf"));

        let lease = ctx.queue.try_checkout().unwrap();
        assert_eq!(worker.process(lease).await, Disposition::Requeued);

        let retried = ctx.queue.try_dequeue().unwrap();
        assert_eq!(retried.attempts(), 1);
        assert!(retried.last_error().unwrap().contains("scripted panic"));
        assert_eq!(ctx.queue.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_run_survives_panics_and_stops_on_cancel() {
        let transfer = Arc::new(ScriptedTransfer::default());
        let ctx = context(transfer.clone());
        ctx.queue
            .enqueue_batch([task("panic.pdf"), task("a.pdf"), task("b.pdf")]);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Worker::new(7, ctx.clone()).run(cancel.clone()));

        while !ctx.queue.is_drained() {
            tokio::task::yield_now().await;
        }
        cancel.cancel();
        let stats = handle.await.unwrap();

        assert_eq!(stats.succeeded, 2);
        assert_eq!(stats.requeued, 2);
        assert_eq!(stats.dead_lettered, 1);
        assert_eq!(transfer.copies.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancelled_worker_takes_no_task() {
        let ctx = context(Arc::new(ScriptedTransfer::default()));
        ctx.queue.enqueue(task("a.pdf"));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let stats = Worker::new(0, ctx.clone()).run(cancel).await;

        assert_eq!(stats, WorkerStats::default());
        assert_eq!(ctx.queue.len(), 1);
        assert_eq!(ctx.counters.attempted(), 0);
    }

    #[tokio::test]
    async fn test_destination_directory_created_once() {
        let temp_dir = TempDir::new().unwrap();
        let source_a = temp_dir.path().join("a.pdf");
        let source_b = temp_dir.path().join("b.pdf");
        std::fs::write(&source_a, b"alpha").unwrap();
        std::fs::write(&source_b, b"beta").unwrap();
        let out_dir = temp_dir.path().join("out").join("June");

        let ctx = context(Arc::new(LocalTransfer));
        let worker = Worker::new(0, ctx.clone());
        ctx.queue.enqueue_batch([
            Task::new(Category::NcBranch, &source_a, out_dir.join("a.pdf")),
            Task::new(Category::NcBranch, &source_b, out_dir.join("b.pdf")),
        ]);

        while let Some(lease) = ctx.queue.try_checkout() {
            assert_eq!(worker.process(lease).await, Disposition::Succeeded);
        }

        let snapshot = ctx.counters.snapshot();
        assert_eq!(snapshot.succeeded, 2);
        assert_eq!(snapshot.directories_created, 1);
        assert_eq!(snapshot.bytes_copied, 9);
        assert_eq!(std::fs::read(out_dir.join("b.pdf")).unwrap(), b"beta");
    }

    #[test]
    fn test_panic_message_extraction() {
        let boxed: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(boxed.as_ref()), "static message");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(boxed.as_ref()), "worker panicked");
    }
}
