//! Blocking FIFO hand-off between the event source and the consumer loop.
//!
//! [`HandoffQueue::push`] never blocks: the queue is unbounded so the
//! filesystem notification thread is never held up by slow dispatch.
//! [`HandoffQueue::pop`] blocks until an item arrives or the supplied
//! [`CancellationToken`] fires. Cancellation is checked before an item is
//! taken, so a cancelled consumer never receives further work.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;

/// Upper bound on how long a blocked `pop` goes without rechecking
/// cancellation.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Cooperative cancellation flag shared between the controller and the
/// consumer loop.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once [`CancellationToken::cancel`] has been called on
    /// any clone of this token.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Result of a blocking dequeue.
#[derive(Debug, PartialEq, Eq)]
pub enum Pop<T> {
    /// The next item in FIFO order.
    Item(T),
    /// Cancellation was observed, or the queue was closed while empty.
    Cancelled,
}

/// Returned when pushing into a queue that has been closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("hand-off queue is closed")]
pub struct QueueClosed;

#[derive(Debug)]
struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Unbounded, thread-safe FIFO with a blocking, cancellation-aware pop.
#[derive(Debug)]
pub struct HandoffQueue<T> {
    state: Mutex<QueueState<T>>,
    available: Condvar,
}

impl<T> Default for HandoffQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HandoffQueue<T> {
    /// Creates an empty, open queue.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Appends an item without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`QueueClosed`] once [`HandoffQueue::close`] has been called;
    /// the item is dropped.
    pub fn push(&self, item: T) -> Result<(), QueueClosed> {
        let mut state = self.lock();
        if state.closed {
            return Err(QueueClosed);
        }
        state.items.push_back(item);
        drop(state);
        self.available.notify_one();
        Ok(())
    }

    /// Blocks until an item is available or cancellation is observed.
    #[must_use]
    pub fn pop(&self, cancel: &CancellationToken) -> Pop<T> {
        let mut state = self.lock();
        loop {
            if cancel.is_cancelled() {
                return Pop::Cancelled;
            }
            if let Some(item) = state.items.pop_front() {
                return Pop::Item(item);
            }
            if state.closed {
                return Pop::Cancelled;
            }
            state = self
                .available
                .wait_timeout(state, CANCEL_POLL_INTERVAL)
                .map_or_else(|poisoned| poisoned.into_inner().0, |(guard, _)| guard);
        }
    }

    /// Rejects further pushes and wakes every blocked consumer.
    pub fn close(&self) {
        self.lock().closed = true;
        self.available.notify_all();
    }

    /// Removes and returns every queued item in FIFO order.
    #[must_use]
    pub fn drain(&self) -> Vec<T> {
        self.lock().items.drain(..).collect()
    }

    /// Number of queued items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// Returns `true` when nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// Returns `true` once the queue has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    // Every mutation leaves the state consistent, so a poisoned lock is safe
    // to reuse.
    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::thread;
    use std::time::Instant;

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::single(1)]
    #[case::several(5)]
    #[case::many(250)]
    fn pops_in_push_order(#[case] count: usize) {
        let queue = HandoffQueue::new();
        let token = CancellationToken::new();
        for index in 0..count {
            queue.push(index).expect("queue open");
        }

        let popped: Vec<usize> = (0..count)
            .map(|_| match queue.pop(&token) {
                Pop::Item(item) => item,
                Pop::Cancelled => panic!("queue unexpectedly cancelled"),
            })
            .collect();

        assert_eq!(popped, (0..count).collect::<Vec<_>>());
        assert!(queue.is_empty());
    }

    #[test]
    fn preserves_order_across_threads() {
        let queue = Arc::new(HandoffQueue::new());
        let token = CancellationToken::new();
        let producer_queue = Arc::clone(&queue);
        let producer = thread::spawn(move || {
            for index in 0..500_u32 {
                producer_queue.push(index).expect("queue open");
            }
        });

        let mut received = Vec::new();
        while received.len() < 500 {
            if let Pop::Item(item) = queue.pop(&token) {
                received.push(item);
            }
        }
        producer.join().expect("producer thread");

        assert_eq!(received, (0..500).collect::<Vec<_>>());
    }

    #[test]
    fn blocked_pop_wakes_on_push() {
        let queue = Arc::new(HandoffQueue::new());
        let consumer_queue = Arc::clone(&queue);
        let (sender, receiver) = mpsc::channel();
        let consumer = thread::spawn(move || {
            let token = CancellationToken::new();
            sender
                .send(consumer_queue.pop(&token))
                .expect("report pop result");
        });

        queue.push("ratehistory.xml").expect("queue open");

        let popped = receiver
            .recv_timeout(Duration::from_secs(5))
            .expect("consumer should wake");
        assert_eq!(popped, Pop::Item("ratehistory.xml"));
        consumer.join().expect("consumer thread");
    }

    #[test]
    fn blocked_pop_observes_cancellation() {
        let queue = Arc::new(HandoffQueue::<u8>::new());
        let token = CancellationToken::new();
        let consumer_queue = Arc::clone(&queue);
        let consumer_token = token.clone();
        let consumer = thread::spawn(move || consumer_queue.pop(&consumer_token));

        let started = Instant::now();
        token.cancel();

        assert_eq!(consumer.join().expect("consumer thread"), Pop::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn cancellation_wins_over_queued_items() {
        let queue = HandoffQueue::new();
        let token = CancellationToken::new();
        queue.push(1).expect("queue open");
        token.cancel();

        assert_eq!(queue.pop(&token), Pop::Cancelled);
        assert_eq!(queue.len(), 1, "item stays queued for draining");
    }

    #[test]
    fn close_rejects_pushes_and_releases_consumers() {
        let queue = HandoffQueue::new();
        queue.close();

        assert_eq!(queue.push(7), Err(QueueClosed));
        assert!(queue.is_closed());
        assert_eq!(queue.pop(&CancellationToken::new()), Pop::Cancelled);
    }

    #[test]
    fn drain_returns_remaining_items_in_order() {
        let queue = HandoffQueue::new();
        for item in ["a", "b", "c"] {
            queue.push(item).expect("queue open");
        }
        queue.close();

        assert_eq!(queue.drain(), vec!["a", "b", "c"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn token_clones_share_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
