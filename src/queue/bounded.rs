//! Fixed-capacity FIFO with blocking enqueue and dequeue.
//!
//! ## Design
//!
//! The items live in a `Mutex<VecDeque<T>>`. Two semaphores count the free
//! slots and the ready items, so waiting happens on the semaphores and never
//! while the mutex is held:
//!
//! ```text
//! enqueue:  acquire(slots) ──> push_back ──> add_permits(items)
//! dequeue:  acquire(items) ──> pop_front ──> add_permits(slots)
//! ```
//!
//! Tokio semaphores hand out permits in request order, so with a single
//! producer the dequeue order is exactly the enqueue order. With several
//! consumers each one takes the current head.
//!
//! Both `enqueue` and `dequeue` are cancel-safe: dropping the future before
//! it completes neither loses an item nor leaks a slot. That lets the
//! acceptor and the processors race them against the shutdown signal.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::Semaphore;

/// Errors returned by queue operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// A queue must be able to hold at least one item
    #[error("queue capacity must be at least 1")]
    ZeroCapacity,

    /// The queue was closed; the rejected item has been dropped
    #[error("queue is closed")]
    Closed,
}

/// A bounded first-in-first-out hand-off queue.
#[derive(Debug)]
pub struct JobQueue<T> {
    items: Mutex<VecDeque<T>>,
    /// Permits for free slots (producers wait here when full)
    slots: Semaphore,
    /// Permits for queued items (consumers wait here when empty)
    ready: Semaphore,
    capacity: usize,
}

impl<T> JobQueue<T> {
    /// Creates an empty queue that holds at most `capacity` items.
    pub fn new(capacity: usize) -> Result<Self, QueueError> {
        if capacity == 0 {
            return Err(QueueError::ZeroCapacity);
        }

        Ok(Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            slots: Semaphore::new(capacity),
            ready: Semaphore::new(0),
            capacity,
        })
    }

    /// Inserts `item` at the tail, waiting for a free slot if the queue is full.
    ///
    /// The item is never dropped because of a full queue. It is only dropped
    /// (and `QueueError::Closed` returned) if the queue gets closed first.
    pub async fn enqueue(&self, item: T) -> Result<(), QueueError> {
        let permit = self.slots.acquire().await.map_err(|_| QueueError::Closed)?;
        permit.forget();

        self.lock().push_back(item);
        self.ready.add_permits(1);
        Ok(())
    }

    /// Removes and returns the head, waiting until an item is available.
    ///
    /// Returns `None` once the queue has been closed. Items still queued at
    /// that point can be collected with [`JobQueue::drain`].
    pub async fn dequeue(&self) -> Option<T> {
        let permit = self.ready.acquire().await.ok()?;
        permit.forget();
        self.take_head()
    }

    /// Removes the head without waiting.
    pub fn try_dequeue(&self) -> Option<T> {
        let permit = self.ready.try_acquire().ok()?;
        permit.forget();
        self.take_head()
    }

    /// Closes the queue. Blocked and future `enqueue`/`dequeue` calls return
    /// immediately.
    pub fn close(&self) {
        self.slots.close();
        self.ready.close();
    }

    /// Returns true once [`JobQueue::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.ready.is_closed()
    }

    /// Takes every item left in a closed queue, head first.
    ///
    /// An open queue is left untouched and an empty `Vec` is returned, since
    /// a consumer may already hold the permit for an item.
    pub fn drain(&self) -> Vec<T> {
        if !self.is_closed() {
            return Vec::new();
        }
        self.lock().drain(..).collect()
    }

    /// Number of items currently queued.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn take_head(&self) -> Option<T> {
        let item = self.lock().pop_front();
        if item.is_some() {
            self.slots.add_permits(1);
        }
        item
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
