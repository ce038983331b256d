//! Explicit cooperative task queue.
//!
//! Every store completion, event delivery and deferred observer runs as a
//! task on a [`TaskQueue`]. Nothing runs until the owner drains the queue,
//! so "the next turn" is always an observable point.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send>;

/// A shared FIFO of tasks.
///
/// Clones share the same queue. Tasks run without the queue locked, so a
/// running task may schedule more work; that work runs later in the same
/// [`flush`](Self::flush).
#[derive(Clone, Default)]
pub struct TaskQueue {
    tasks: Arc<Mutex<VecDeque<Task>>>,
}

impl TaskQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a task. It never runs inside this call.
    pub fn schedule(&self, task: impl FnOnce() + Send + 'static) {
        self.tasks.lock().push_back(Box::new(task));
    }

    /// Runs the oldest task, returning false if the queue was empty.
    pub fn run_next(&self) -> bool {
        let task = self.tasks.lock().pop_front();
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Runs tasks until the queue is empty and returns how many ran.
    pub fn flush(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        if ran > 0 {
            trace!(tasks = ran, "task queue flushed");
        }
        ran
    }

    /// Returns the number of queued tasks.
    pub fn pending(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Returns true if no task is queued.
    pub fn is_idle(&self) -> bool {
        self.tasks.lock().is_empty()
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn schedule_does_not_run_immediately() {
        let queue = TaskQueue::new();
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ran);
        queue.schedule(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(queue.pending(), 1);
        assert_eq!(queue.flush(), 1);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert!(queue.is_idle());
    }

    #[test]
    fn tasks_run_in_fifo_order() {
        let queue = TaskQueue::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = Arc::clone(&order);
            queue.schedule(move || order.lock().push(i));
        }
        queue.flush();
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn flush_drains_tasks_scheduled_while_running() {
        let queue = TaskQueue::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let inner_queue = queue.clone();
        let outer_order = Arc::clone(&order);
        queue.schedule(move || {
            outer_order.lock().push("outer");
            let nested_order = Arc::clone(&outer_order);
            inner_queue.schedule(move || nested_order.lock().push("nested"));
        });

        assert_eq!(queue.flush(), 2);
        assert_eq!(*order.lock(), vec!["outer", "nested"]);
    }

    #[test]
    fn run_next_on_empty_queue() {
        let queue = TaskQueue::new();
        assert!(!queue.run_next());
        assert_eq!(queue.flush(), 0);
    }
}
