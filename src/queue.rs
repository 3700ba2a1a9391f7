//! Bounded FIFO handoff between pipeline stages.
//!
//! A queue is created as a ([`QueueSender`], [`QueueReceiver`]) pair. The sender is the owner: it
//! is not `Clone`, and the queue closes when the sender is closed or dropped, so a queue can be
//! closed at most once. Pushing blocks while the queue is full and, only while blocked, observes a
//! [`CancelToken`]; popping blocks while the queue is empty and returns `None` once it is closed
//! and drained.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use crate::foundation::cancel::CancelToken;

// `CancelToken` wakes its own sleepers only, so a push blocked on a full queue re-checks the
// token on this cadence. A cancelled push returns at most this long after `cancel()`.
const CANCEL_POLL: Duration = Duration::from_millis(25);

/// Why a push did not enqueue its item. The item is handed back.
#[derive(Debug, PartialEq, Eq)]
pub enum PushError<T> {
    /// The cancellation token fired while waiting for room.
    Cancelled(T),
    /// The receiving half is gone; nobody will ever read this item.
    Disconnected(T),
}

impl<T> PushError<T> {
    pub fn into_inner(self) -> T {
        match self {
            Self::Cancelled(v) | Self::Disconnected(v) => v,
        }
    }
}

#[derive(Debug)]
struct State<T> {
    items: VecDeque<T>,
    closed: bool,
    receiver_alive: bool,
}

#[derive(Debug)]
struct Shared<T> {
    capacity: usize,
    state: Mutex<State<T>>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Create a bounded queue holding at most `capacity` items (minimum 1).
pub fn bounded<T>(capacity: usize) -> (QueueSender<T>, QueueReceiver<T>) {
    let capacity = capacity.max(1);
    let shared = Arc::new(Shared {
        capacity,
        state: Mutex::new(State {
            items: VecDeque::with_capacity(capacity),
            closed: false,
            receiver_alive: true,
        }),
        not_empty: Condvar::new(),
        not_full: Condvar::new(),
    });
    (
        QueueSender {
            shared: shared.clone(),
        },
        QueueReceiver { shared },
    )
}

/// Producing half. Closing (explicitly or by drop) happens exactly once.
#[derive(Debug)]
pub struct QueueSender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> QueueSender<T> {
    /// Enqueue `item`, blocking while the queue is full.
    ///
    /// A queue with room always accepts the item, even after `cancel` fired. Only a push that is
    /// waiting for room returns [`PushError::Cancelled`], at most 25 ms after the cancel.
    pub fn push(&self, item: T, cancel: &CancelToken) -> Result<(), PushError<T>> {
        let mut st = self.shared.lock();
        loop {
            if !st.receiver_alive {
                return Err(PushError::Disconnected(item));
            }
            if st.items.len() < self.shared.capacity {
                st.items.push_back(item);
                drop(st);
                self.shared.not_empty.notify_one();
                return Ok(());
            }
            // Cancellation only ends a push that is waiting for room.
            if cancel.is_cancelled() {
                return Err(PushError::Cancelled(item));
            }
            st = self
                .shared
                .not_full
                .wait_timeout(st, CANCEL_POLL)
                .unwrap_or_else(|e| e.into_inner())
                .0;
        }
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn len(&self) -> usize {
        self.shared.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Signal that no more items will arrive. Items already queued stay readable.
    pub fn close(self) {
        drop(self);
    }
}

impl<T> Drop for QueueSender<T> {
    fn drop(&mut self) {
        let mut st = self.shared.lock();
        st.closed = true;
        drop(st);
        self.shared.not_empty.notify_all();
    }
}

/// Consuming half.
#[derive(Debug)]
pub struct QueueReceiver<T> {
    shared: Arc<Shared<T>>,
}

impl<T> QueueReceiver<T> {
    /// Dequeue the oldest item, blocking while the queue is empty and still open.
    ///
    /// Returns `None` once the queue is closed and fully drained.
    pub fn pop(&self) -> Option<T> {
        let mut st = self.shared.lock();
        loop {
            if let Some(item) = st.items.pop_front() {
                drop(st);
                self.shared.not_full.notify_one();
                return Some(item);
            }
            if st.closed {
                return None;
            }
            st = self
                .shared
                .not_empty
                .wait(st)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Non-blocking variant of [`pop`](Self::pop). `None` means "nothing right now".
    pub fn try_pop(&self) -> Option<T> {
        let item = self.shared.lock().items.pop_front();
        if item.is_some() {
            self.shared.not_full.notify_one();
        }
        item
    }

    /// `true` once the sender closed and every item was consumed.
    pub fn is_finished(&self) -> bool {
        let st = self.shared.lock();
        st.closed && st.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.shared.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Drop for QueueReceiver<T> {
    fn drop(&mut self) {
        let mut st = self.shared.lock();
        st.receiver_alive = false;
        st.items.clear();
        drop(st);
        self.shared.not_full.notify_all();
    }
}

#[cfg(test)]
#[path = "../tests/unit/queue.rs"]
mod tests;
