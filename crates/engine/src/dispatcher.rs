//! Deferred task queue for event firing.
//!
//! Listener invocations never run inside the call that triggered them.
//! `merge` and the registration helpers enqueue a task here; the owner of the
//! engine drains the queue with [`Dispatcher::run_pending`] once its own call
//! stack has unwound. Tasks run in FIFO order on the draining thread.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// Dispatcher metrics snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherStats {
    /// Number of tasks waiting in the queue.
    pub queue_depth: usize,
    /// Total number of tasks submitted since creation.
    pub tasks_submitted: u64,
    /// Total number of tasks completed since creation.
    pub tasks_completed: u64,
}

struct TaskEnvelope {
    sequence: u64,
    label: &'static str,
    work: Box<dyn FnOnce() + Send>,
}

/// A FIFO queue of deferred work, drained cooperatively by its owner.
pub struct Dispatcher {
    queue: Mutex<VecDeque<TaskEnvelope>>,
    sequence: AtomicU64,
    tasks_completed: AtomicU64,
}

impl Dispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            sequence: AtomicU64::new(0),
            tasks_completed: AtomicU64::new(0),
        }
    }

    /// Enqueue a task for the next drain.
    ///
    /// `label` only shows up in trace logs.
    pub fn submit(&self, label: &'static str, work: impl FnOnce() + Send + 'static) {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        trace!(target: "recordchain::dispatch", sequence, label, "Task queued");
        self.queue.lock().push_back(TaskEnvelope {
            sequence,
            label,
            work: Box::new(work),
        });
    }

    /// Run queued tasks until the queue is empty, returning how many ran.
    ///
    /// Tasks enqueued by a running task are picked up in the same drain.
    /// The queue lock is never held while a task runs, so tasks may submit
    /// freely. A panicking task propagates out of this call; tasks still
    /// queued behind it stay queued.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            let task = self.queue.lock().pop_front();
            let Some(task) = task else { break };
            let _guard = CompletionGuard {
                completed: &self.tasks_completed,
            };
            trace!(
                target: "recordchain::dispatch",
                sequence = task.sequence,
                label = task.label,
                "Running task"
            );
            (task.work)();
            ran += 1;
        }
        ran
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// `true` when nothing is queued.
    pub fn is_idle(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Return a snapshot of dispatcher metrics.
    pub fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            queue_depth: self.pending(),
            tasks_submitted: self.sequence.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("stats", &self.stats())
            .finish()
    }
}

/// Counts a task as completed on drop, so the totals stay right even if the
/// task panics.
struct CompletionGuard<'a> {
    completed: &'a AtomicU64,
}

impl<'a> Drop for CompletionGuard<'a> {
    fn drop(&mut self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }
}
