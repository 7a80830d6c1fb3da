//! Notification Queue
//!
//! The queue keeps notification order consistent when a subscriber callback
//! changes another store while a notification pass is still running.
//!
//! # Protocol
//!
//! When a store processes a new value it calls every subscriber's
//! `invalidate` callback and enqueues a notify job for it. If the queue was
//! idle, that store owns the flush and drains jobs in FIFO order. Stores that
//! process a value during the flush only enqueue; the outer flush reaches
//! their jobs in order.
//!
//! # Implementation
//!
//! The queue is thread-local. Propagation is synchronous, so the only
//! coordination needed is between reentrant calls on the same stack.

use std::cell::RefCell;
use std::collections::VecDeque;

use tracing::trace;

/// A type-erased notify call waiting to run.
pub(crate) type Job = Box<dyn FnOnce()>;

thread_local! {
    static QUEUE: RefCell<QueueState> = RefCell::new(QueueState::default());
}

#[derive(Default)]
struct QueueState {
    jobs: VecDeque<Job>,
    draining: bool,
}

/// Handle to the current thread's notification queue.
pub(crate) struct NotifyQueue;

impl NotifyQueue {
    /// True when no flush is running and nothing is queued.
    pub(crate) fn is_idle() -> bool {
        QUEUE.with(|queue| {
            let queue = queue.borrow();
            !queue.draining && queue.jobs.is_empty()
        })
    }

    /// Append a job behind everything already queued.
    pub(crate) fn enqueue(job: Job) {
        QUEUE.with(|queue| queue.borrow_mut().jobs.push_back(job));
    }

    /// Drain the queue, running jobs in order until it is empty.
    ///
    /// Does nothing if a flush is already running further up the stack.
    pub(crate) fn flush() {
        let started = QUEUE.with(|queue| {
            let mut queue = queue.borrow_mut();
            if queue.draining {
                false
            } else {
                queue.draining = true;
                true
            }
        });
        if !started {
            return;
        }

        let _guard = DrainGuard;
        let mut ran = 0usize;

        // The borrow must be released before running the job: jobs enqueue.
        while let Some(job) = QUEUE.with(|queue| queue.borrow_mut().jobs.pop_front()) {
            job();
            ran += 1;
        }

        trace!(jobs = ran, "notification queue drained");
    }

    /// Number of queued jobs.
    #[cfg(test)]
    pub(crate) fn len() -> usize {
        QUEUE.with(|queue| queue.borrow().jobs.len())
    }
}

/// Ends a flush when dropped.
///
/// If a callback panicked, the remaining jobs are discarded so the next
/// top-level update on this thread starts from an idle queue.
struct DrainGuard;

impl Drop for DrainGuard {
    fn drop(&mut self) {
        QUEUE.with(|queue| {
            let mut queue = queue.borrow_mut();
            queue.draining = false;
            if std::thread::panicking() {
                queue.jobs.clear();
            }
        });
    }
}
