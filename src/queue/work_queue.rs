//! Blocking multi-producer/multi-consumer work queue
//!
//! Workers block on `pop` while the queue is empty but other workers still
//! hold items, because a failed item may come back. The queue is drained
//! when it is empty and nothing is in flight; every blocked worker then
//! receives `None`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

/// Run-scoped cancellation signal
///
/// Cancelling stops workers from taking new items; items already in flight
/// finish normally.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
struct QueueState<T> {
    items: VecDeque<T>,
    in_flight: usize,
}

/// FIFO queue shared by a pool of workers
#[derive(Debug)]
pub struct WorkQueue<T> {
    state: Mutex<QueueState<T>>,
    ready: Condvar,
}

impl<T> WorkQueue<T> {
    /// Create a queue seeded with `items` in order
    pub fn new(items: impl IntoIterator<Item = T>) -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: items.into_iter().collect(),
                in_flight: 0,
            }),
            ready: Condvar::new(),
        }
    }

    /// Take the next item, blocking until one is available
    ///
    /// Returns `None` once the queue is drained or `cancel` is set. A
    /// returned item counts as in flight until `task_done` is called.
    pub fn pop(&self, cancel: &CancelToken) -> Option<T> {
        let mut state = self.state.lock();
        loop {
            if cancel.is_cancelled() {
                return None;
            }
            if let Some(item) = state.items.pop_front() {
                state.in_flight += 1;
                return Some(item);
            }
            if state.in_flight == 0 {
                return None;
            }
            self.ready.wait(&mut state);
        }
    }

    /// Finish an in-flight item, optionally putting it back at the end
    pub fn task_done(&self, requeue: Option<T>) {
        let mut state = self.state.lock();
        if let Some(item) = requeue {
            state.items.push_back(item);
        }
        state.in_flight = state.in_flight.saturating_sub(1);
        drop(state);
        self.ready.notify_all();
    }

    /// Items waiting to be taken
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Whether the queue is empty with nothing in flight
    pub fn is_drained(&self) -> bool {
        let state = self.state.lock();
        state.items.is_empty() && state.in_flight == 0
    }
}
