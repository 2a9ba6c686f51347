//! Fixed-size worker pool

use crate::worker::{Worker, WorkerContext, WorkerStats};
use stagecopy_types::WorkerCount;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Owns N workers for the life of a batch
#[derive(Debug)]
pub struct WorkerPool {
    size: WorkerCount,
    ctx: WorkerContext,
    cancel: CancellationToken,
    workers: JoinSet<WorkerStats>,
    started: bool,
}

impl WorkerPool {
    /// Create a stopped pool of `size` workers over `ctx`
    pub fn new(size: WorkerCount, ctx: WorkerContext) -> Self {
        Self {
            size,
            ctx,
            cancel: CancellationToken::new(),
            workers: JoinSet::new(),
            started: false,
        }
    }

    /// Number of workers the pool runs
    pub fn size(&self) -> usize {
        self.size.get()
    }

    /// Whether workers were started and not yet stopped
    pub fn is_running(&self) -> bool {
        self.started && !self.cancel.is_cancelled()
    }

    /// Launch every worker. Calling it again while running does nothing.
    pub fn start(&mut self) {
        if self.started {
            debug!("Worker pool already started");
            return;
        }
        self.started = true;

        for id in 0..self.size.get() {
            let worker = Worker::new(id, self.ctx.clone());
            self.workers.spawn(worker.run(self.cancel.child_token()));
        }
        info!("Started {} workers", self.size);
    }

    /// Signal cancellation and wait until every worker has exited.
    ///
    /// Safe to call more than once; later calls return immediately.
    pub async fn stop(&mut self) -> WorkerStats {
        self.cancel.cancel();

        let mut total = WorkerStats::default();
        while let Some(joined) = self.workers.join_next().await {
            match joined {
                Ok(stats) => {
                    total.succeeded += stats.succeeded;
                    total.requeued += stats.requeued;
                    total.dead_lettered += stats.dead_lettered;
                }
                Err(e) => error!("Worker task failed: {}", e),
            }
        }

        debug!("Worker pool stopped");
        total
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Dropping the join set aborts workers; let them observe cancellation first.
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressCounters;
    use crate::queue::{DeadLetterStore, WorkQueue};
    use crate::task::Task;
    use crate::worker::tests::ScriptedTransfer;
    use stagecopy_types::{Category, RetryPolicy};
    use std::sync::Arc;
    use std::time::Duration;

    fn context() -> WorkerContext {
        WorkerContext {
            queue: Arc::new(WorkQueue::new()),
            dead_letters: Arc::new(DeadLetterStore::new()),
            counters: Arc::new(ProgressCounters::default()),
            transfer: Arc::new(ScriptedTransfer::default()),
            retry: RetryPolicy::default(),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_pool_drains_queue() {
        let ctx = context();
        ctx.queue.enqueue_batch((0..200).map(|n| {
            Task::new(Category::Srcn, format!("/in/{n}.pdf"), format!("/out/{n}.pdf"))
        }));

        let mut pool = WorkerPool::new(WorkerCount::new(4).unwrap(), ctx.clone());
        pool.start();
        assert!(pool.is_running());

        tokio::time::timeout(Duration::from_secs(5), async {
            while !ctx.queue.is_drained() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("queue drained");

        let stats = pool.stop().await;
        assert_eq!(stats.succeeded, 200);
        assert_eq!(ctx.counters.succeeded(), 200);
        assert!(!pool.is_running());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let mut pool = WorkerPool::new(WorkerCount::new(3).unwrap(), context());
        pool.start();
        pool.start();

        let first = pool.stop().await;
        let second = pool.stop().await;
        assert_eq!(first, WorkerStats::default());
        assert_eq!(second, WorkerStats::default());
    }

    #[tokio::test]
    async fn test_stop_without_start() {
        let mut pool = WorkerPool::new(WorkerCount::new(2).unwrap(), context());
        assert!(!pool.is_running());
        assert_eq!(pool.stop().await, WorkerStats::default());
    }

    #[tokio::test]
    async fn test_idle_workers_stop_promptly() {
        let ctx = context();
        let mut pool = WorkerPool::new(WorkerCount::new(8).unwrap(), ctx.clone());
        pool.start();
        tokio::time::sleep(Duration::from_millis(20)).await;

        tokio::time::timeout(Duration::from_secs(1), pool.stop())
            .await
            .expect("idle workers exit on cancel");
        assert_eq!(ctx.counters.attempted(), 0);
    }
}
