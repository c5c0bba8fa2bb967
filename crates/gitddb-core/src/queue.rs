//! Task queue: a single dedicated worker thread executing mutating
//! operations in strict FIFO order. Read-only operations bypass this queue
//! entirely and go straight through [`crate::reader`].
//!
//! The worker owns no repository state itself — `func` closures capture
//! whatever `GitRepo`/workdir handles they need, run the real work, and
//! deliver their own typed result to the caller (typically over a
//! caller-owned `std::sync::mpsc` channel). The queue only needs to know
//! whether a task succeeded, to drive [`Statistics`] and the
//! `beforeResolve`/`beforeReject` completion bookkeeping.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use ulid::Ulid;

use crate::error::GitDdbError;

/// What kind of operation a task performs, used to bucket completion counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskLabel {
    /// An unconditional insert-or-update.
    Put,
    /// An insert that fails if the id already exists.
    Insert,
    /// An update that fails if the id doesn't exist.
    Update,
    /// A delete.
    Delete,
    /// A push to a remote.
    Push,
    /// A full sync cycle (fetch, classify, resolve).
    Sync,
}

/// Per-task identifying metadata, visible to `enqueueCallback` and kept for
/// diagnostics/events.
#[derive(Clone, Debug)]
pub struct TaskMeta {
    /// What kind of operation this is.
    pub label: TaskLabel,
    /// Unique id for this task instance.
    pub task_id: Ulid,
    /// The collection this task operates on, if any.
    pub collection_path: Option<String>,
    /// The document's short id, if any.
    pub short_id: Option<String>,
    /// The document's short (file) name, if any.
    pub short_name: Option<String>,
}

impl TaskMeta {
    /// Construct metadata with a freshly minted task id.
    #[must_use]
    pub fn new(label: TaskLabel) -> Self {
        Self { label, task_id: Ulid::new(), collection_path: None, short_id: None, short_name: None }
    }
}

/// A unit of work submitted to the queue.
pub struct Task {
    /// The task's metadata.
    pub meta: TaskMeta,
    func: Box<dyn FnOnce() -> Result<(), GitDdbError> + Send>,
    cancel: Box<dyn FnOnce() + Send>,
    enqueue_callback: Option<Box<dyn FnOnce(&TaskMeta) + Send>>,
}

impl Task {
    /// Build a task. `func` performs the real work and delivers its result
    /// to the caller itself; `cancel` is invoked instead of `func` if the
    /// task is still queued when [`TaskQueue::stop`] runs.
    pub fn new(
        meta: TaskMeta,
        func: impl FnOnce() -> Result<(), GitDdbError> + Send + 'static,
        cancel: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self { meta, func: Box::new(func), cancel: Box::new(cancel), enqueue_callback: None }
    }

    /// Attach a callback invoked synchronously, on the caller's thread,
    /// the moment this task is enqueued (before `push`/`unshift` returns).
    #[must_use]
    pub fn with_enqueue_callback(mut self, callback: impl FnOnce(&TaskMeta) + Send + 'static) -> Self {
        self.enqueue_callback = Some(Box::new(callback));
        self
    }
}

/// Completed-task counts by label, plus cancellations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Statistics {
    /// Completed put tasks.
    pub put: u64,
    /// Completed insert tasks.
    pub insert: u64,
    /// Completed update tasks.
    pub update: u64,
    /// Completed delete tasks.
    pub delete: u64,
    /// Completed push tasks.
    pub push: u64,
    /// Completed sync tasks.
    pub sync: u64,
    /// Tasks cancelled before they ran.
    pub cancel: u64,
}

impl Statistics {
    fn record_completion(&mut self, label: TaskLabel) {
        match label {
            TaskLabel::Put => self.put += 1,
            TaskLabel::Insert => self.insert += 1,
            TaskLabel::Update => self.update += 1,
            TaskLabel::Delete => self.delete += 1,
            TaskLabel::Push => self.push += 1,
            TaskLabel::Sync => self.sync += 1,
        }
    }
}

struct Shared {
    queue: Mutex<VecDeque<Task>>,
    cond: Condvar,
    terminate: AtomicBool,
    stats: Mutex<Statistics>,
}

/// A running task queue with its dedicated worker thread.
pub struct TaskQueue {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl TaskQueue {
    /// Spawn the worker thread and return a handle to the queue.
    #[must_use]
    pub fn new() -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            cond: Condvar::new(),
            terminate: AtomicBool::new(false),
            stats: Mutex::new(Statistics::default()),
        });
        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::spawn(move || run_worker(&worker_shared));
        Self { shared, worker: Some(worker) }
    }

    /// Append a task to the tail of the queue, invoking its enqueue callback
    /// synchronously first.
    pub fn push(&self, mut task: Task) {
        if let Some(callback) = task.enqueue_callback.take() {
            callback(&task.meta);
        }
        let mut queue = self.shared.queue.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        queue.push_back(task);
        self.shared.cond.notify_one();
    }

    /// Insert a task at the head of the queue, ahead of everything already
    /// waiting (but never ahead of a task already running).
    pub fn unshift(&self, mut task: Task) {
        if let Some(callback) = task.enqueue_callback.take() {
            callback(&task.meta);
        }
        let mut queue = self.shared.queue.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        queue.push_front(task);
        self.shared.cond.notify_one();
    }

    /// Cancel every task still waiting (not yet started), then reset
    /// statistics: the drain's cancellation count is the only figure that
    /// survives, every completed-task counter goes back to zero. The worker
    /// thread itself keeps running and accepts new tasks afterward.
    pub fn stop(&self) {
        let mut queue = self.shared.queue.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let drained: Vec<Task> = queue.drain(..).collect();
        drop(queue);

        let cancelled = drained.len() as u64;
        for task in drained {
            (task.cancel)();
        }

        let mut stats = self.shared.stats.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *stats = Statistics { cancel: cancelled, ..Statistics::default() };
    }

    /// Snapshot of completed-task counts by label.
    #[must_use]
    pub fn current_statistics(&self) -> Statistics {
        *self.shared.stats.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Number of tasks still waiting (not yet started). Used by a timed
    /// `close` to poll for the queue going idle before forcing a drain.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.shared.queue.lock().unwrap_or_else(std::sync::PoisonError::into_inner).len()
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        self.shared.terminate.store(true, Ordering::SeqCst);
        self.shared.cond.notify_all();
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

fn run_worker(shared: &Arc<Shared>) {
    loop {
        let task = {
            let mut queue = shared.queue.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            loop {
                if let Some(task) = queue.pop_front() {
                    break Some(task);
                }
                if shared.terminate.load(Ordering::SeqCst) {
                    break None;
                }
                queue = shared.cond.wait(queue).unwrap_or_else(std::sync::PoisonError::into_inner);
            }
        };
        let Some(task) = task else { return };

        let label = task.meta.label;
        match (task.func)() {
            Ok(()) => {
                let mut stats = shared.stats.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                stats.record_completion(label);
            }
            Err(error) => {
                tracing::warn!(?error, task_id = %task.meta.task_id, "task failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn push_runs_tasks_in_fifo_order() {
        let queue = TaskQueue::new();
        let (tx, rx) = mpsc::channel();
        for i in 0..5 {
            let tx = tx.clone();
            let task = Task::new(TaskMeta::new(TaskLabel::Put), move || { tx.send(i).unwrap(); Ok(()) }, || {});
            queue.push(task);
        }
        drop(tx);
        let received: Vec<i32> = rx.iter().collect();
        assert_eq!(received, vec![0, 1, 2, 3, 4]);
        assert_eq!(queue.current_statistics().put, 5);
    }

    #[test]
    fn stop_cancels_queued_tasks_and_counts_them() {
        let queue = TaskQueue::new();
        // Block the worker on a long-running first task so the rest stay queued.
        let (block_tx, block_rx) = mpsc::channel::<()>();
        let first = Task::new(TaskMeta::new(TaskLabel::Put), move || { let _ = block_rx.recv(); Ok(()) }, || {});
        queue.push(first);

        let cancelled = Arc::new(Mutex::new(0u32));
        for _ in 0..3 {
            let cancelled = Arc::clone(&cancelled);
            let task = Task::new(
                TaskMeta::new(TaskLabel::Insert),
                || Ok(()),
                move || { *cancelled.lock().unwrap() += 1; },
            );
            queue.push(task);
        }
        queue.stop();
        assert_eq!(*cancelled.lock().unwrap(), 3);
        assert_eq!(queue.current_statistics().cancel, 3);

        block_tx.send(()).unwrap();
    }

    #[test]
    fn stop_resets_prior_completion_counts() {
        let queue = TaskQueue::new();
        let (tx, rx) = mpsc::channel();
        queue.push(Task::new(TaskMeta::new(TaskLabel::Put), move || { tx.send(()).unwrap(); Ok(()) }, || {}));
        rx.recv().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert_eq!(queue.current_statistics().put, 1);

        queue.stop();
        let stats = queue.current_statistics();
        assert_eq!(stats.put, 0);
        assert_eq!(stats.cancel, 0);
    }

    #[test]
    fn enqueue_callback_runs_synchronously_on_push() {
        let queue = TaskQueue::new();
        let seen = Arc::new(Mutex::new(false));
        let seen2 = Arc::clone(&seen);
        let task = Task::new(TaskMeta::new(TaskLabel::Sync), || Ok(()), || {})
            .with_enqueue_callback(move |_meta| { *seen2.lock().unwrap() = true; });
        queue.push(task);
        assert!(*seen.lock().unwrap());
    }

    #[test]
    fn failed_task_does_not_increment_completion_count() {
        let queue = TaskQueue::new();
        let (tx, rx) = mpsc::channel();
        let task = Task::new(TaskMeta::new(TaskLabel::Delete), move || { tx.send(()).unwrap(); Err(GitDdbError::DatabaseClosing) }, || {});
        queue.push(task);
        rx.recv().unwrap();
        // Give the worker a moment to finish bookkeeping after the send.
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert_eq!(queue.current_statistics().delete, 0);
    }
}
