//! Shared queues for pending and failed work
//!
//! [`SharedQueue`] is a multi-producer, multi-consumer FIFO that never blocks
//! on `try_dequeue` and lets consumers suspend with [`SharedQueue::dequeue`]
//! until an item or cancellation arrives. [`WorkQueue`] adds in-flight
//! tracking on top of it so that "drained" can mean "nothing pending and
//! nothing being worked on". [`DeadLetterStore`] keeps tasks that ran out of
//! attempts.

use crate::task::Task;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Thread-safe FIFO queue
#[derive(Debug)]
pub struct SharedQueue<T> {
    items: Mutex<VecDeque<T>>,
    len: AtomicUsize,
    available: Notify,
}

impl<T> SharedQueue<T> {
    /// Create an empty queue
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            len: AtomicUsize::new(0),
            available: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        // Items are plain data; a panic while holding the lock cannot leave them torn.
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_items<R>(&self, f: impl FnOnce(&mut VecDeque<T>) -> R) -> R {
        let mut items = self.lock();
        let result = f(&mut items);
        self.len.store(items.len(), Ordering::Release);
        result
    }

    /// Append one item
    pub fn enqueue(&self, item: T) {
        self.with_items(|items| items.push_back(item));
        self.available.notify_one();
    }

    /// Append every item of `batch`, returning how many were added
    pub fn enqueue_batch<I: IntoIterator<Item = T>>(&self, batch: I) -> usize {
        let added = self.with_items(|items| {
            let before = items.len();
            items.extend(batch);
            items.len() - before
        });
        if added > 0 {
            self.available.notify_waiters();
        }
        added
    }

    /// Remove the oldest item, or return `None` immediately when empty
    pub fn try_dequeue(&self) -> Option<T> {
        self.with_items(VecDeque::pop_front)
    }

    /// Remove the oldest item, waiting for one to arrive.
    ///
    /// Returns `None` once `cancel` fires; an item is never taken after the
    /// token is observed as cancelled.
    pub async fn dequeue(&self, cancel: &CancellationToken) -> Option<T> {
        self.wait_for(cancel, VecDeque::pop_front).await
    }

    async fn wait_for<R>(
        &self,
        cancel: &CancellationToken,
        mut take: impl FnMut(&mut VecDeque<T>) -> Option<R>,
    ) -> Option<R> {
        loop {
            if cancel.is_cancelled() {
                return None;
            }

            // Register before looking so an enqueue between the check and the
            // await still wakes us.
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(item) = self.with_items(&mut take) {
                return Some(item);
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => return None,
                () = &mut notified => {}
            }
        }
    }

    /// Number of queued items, read without taking the lock
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    /// Whether the queue currently holds no items
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> SharedQueue<T> {
    /// Copy of the queued items in FIFO order
    pub fn snapshot(&self) -> Vec<T> {
        self.lock().iter().cloned().collect()
    }
}

impl<T> Default for SharedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Pending tasks plus the count of tasks currently held by workers
#[derive(Debug, Default)]
pub struct WorkQueue {
    pending: SharedQueue<Task>,
    in_flight: AtomicUsize,
    settled: Notify,
}

impl WorkQueue {
    /// Create an empty work queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one task
    pub fn enqueue(&self, task: Task) {
        self.pending.enqueue(task);
    }

    /// Add a batch of tasks, returning how many were added
    pub fn enqueue_batch<I: IntoIterator<Item = Task>>(&self, tasks: I) -> usize {
        self.pending.enqueue_batch(tasks)
    }

    /// Remove a task without tracking it as in flight
    pub fn try_dequeue(&self) -> Option<Task> {
        self.pending.try_dequeue()
    }

    /// Take a task and track it as in flight until the lease is dropped
    pub fn try_checkout(&self) -> Option<Lease<'_>> {
        self.pending
            .with_items(|items| self.take_tracked(items))
            .map(|task| Lease { queue: self, task })
    }

    /// Wait for a task and track it as in flight until the lease is dropped.
    ///
    /// Returns `None` once `cancel` fires.
    pub async fn checkout(&self, cancel: &CancellationToken) -> Option<Lease<'_>> {
        self.pending
            .wait_for(cancel, |items| self.take_tracked(items))
            .await
            .map(|task| Lease { queue: self, task })
    }

    fn take_tracked(&self, items: &mut VecDeque<Task>) -> Option<Task> {
        let task = items.pop_front()?;
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        Some(task)
    }

    fn release(&self) {
        if self.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 && self.is_empty() {
            self.settled.notify_one();
        }
    }

    /// Number of pending tasks
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no task is pending; tasks in flight are not considered
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of tasks currently leased to workers
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Whether nothing is pending and nothing is in flight
    pub fn is_drained(&self) -> bool {
        // Checked under the queue lock so a task cannot be between the two counts.
        self.pending
            .with_items(|items| items.is_empty() && self.in_flight() == 0)
    }

    /// Resolves after the last in-flight task settles with nothing pending
    pub async fn settled(&self) {
        self.settled.notified().await;
    }
}

/// A task held by one worker.
///
/// The task counts as in flight until the lease is dropped, which must happen
/// only after the task succeeded, was dead-lettered, or was re-enqueued.
#[derive(Debug)]
pub struct Lease<'a> {
    queue: &'a WorkQueue,
    task: Task,
}

impl Lease<'_> {
    /// The leased task
    pub fn task(&self) -> &Task {
        &self.task
    }

    /// Put `next` back on the queue, then release this lease
    pub fn requeue(self, next: Task) {
        self.queue.enqueue(next);
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        self.queue.release();
    }
}

/// A task that exhausted its attempts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetter {
    /// The task as of its final failed attempt
    pub task: Task,
    /// When the final attempt failed
    pub failed_at: DateTime<Utc>,
}

impl DeadLetter {
    /// Record `task` as failed now
    pub fn new(task: Task) -> Self {
        Self {
            task,
            failed_at: Utc::now(),
        }
    }

    /// Reason of the final failure
    pub fn reason(&self) -> &str {
        self.task.last_error().unwrap_or("unknown error")
    }
}

/// Append-only store of dead-lettered tasks
#[derive(Debug, Default)]
pub struct DeadLetterStore {
    letters: SharedQueue<DeadLetter>,
}

impl DeadLetterStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a task that will not be retried
    pub fn record(&self, task: Task) {
        self.letters.enqueue(DeadLetter::new(task));
    }

    /// Remove the oldest record
    pub fn try_dequeue(&self) -> Option<DeadLetter> {
        self.letters.try_dequeue()
    }

    /// Number of dead-lettered tasks
    pub fn len(&self) -> usize {
        self.letters.len()
    }

    /// Whether no task was dead-lettered
    pub fn is_empty(&self) -> bool {
        self.letters.is_empty()
    }

    /// Copy of every record in failure order
    pub fn snapshot(&self) -> Vec<DeadLetter> {
        self.letters.snapshot()
    }
}
