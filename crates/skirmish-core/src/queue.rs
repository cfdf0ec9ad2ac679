//! Thread-safe FIFO with blocking pop.
//!
//! [`BlockingQueue`] is the hand-off point between producers (the battle
//! engine, or a task re-queueing itself) and the worker threads of a
//! [`WorkerPool`](crate::pool::WorkerPool).
//!
//! # Invariants
//!
//! - Every operation mutates state inside a single `Mutex` region.
//! - Items are delivered in FIFO order, each to exactly one consumer.
//! - Waiters re-check the predicate after every wake, so spurious wakeups
//!   and notifications racing with another consumer are harmless.
//!
//! # Closing
//!
//! [`BlockingQueue::close`] is the pool's stop signal. A closed queue keeps
//! handing out whatever it still holds and only then reports exhaustion
//! (`pop` returns `None`), which is what gives the pool its drain-on-shutdown
//! behaviour.
//!
//! # Example
//!
//! ```
//! use skirmish_core::queue::BlockingQueue;
//!
//! let queue = BlockingQueue::new();
//! queue.push(1).unwrap();
//! queue.push(2).unwrap();
//! queue.close();
//!
//! assert_eq!(queue.pop(), Some(1));
//! assert_eq!(queue.pop(), Some(2));
//! assert_eq!(queue.pop(), None);
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::error::{BattleError, Result};

/// State guarded by the queue's mutex.
struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Multi-producer, multi-consumer FIFO whose `pop` blocks until work arrives.
pub struct BlockingQueue<T> {
    state: Mutex<QueueState<T>>,
    available: Condvar,
}

impl<T> BlockingQueue<T> {
    /// Creates an empty, open queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Locks the state. Queue operations never panic while holding the lock,
    /// so a poisoned mutex still guards a consistent `VecDeque`.
    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueues an item and wakes at most one waiting consumer.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::PoolShutDown`] if the queue has been closed;
    /// the item is dropped.
    pub fn push(&self, item: T) -> Result<()> {
        {
            let mut state = self.lock();
            if state.closed {
                return Err(BattleError::PoolShutDown);
            }
            state.items.push_back(item);
        }
        self.available.notify_one();
        Ok(())
    }

    /// Removes and returns the oldest item, blocking while the queue is empty.
    ///
    /// Returns `None` only when the queue is closed *and* drained.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                return Some(item);
            }
            if state.closed {
                return None;
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Removes and returns the oldest item without blocking.
    pub fn try_pop(&self) -> Option<T> {
        self.lock().items.pop_front()
    }

    /// Closes the queue and wakes every waiting consumer.
    ///
    /// Closing is idempotent. Items already queued remain available to `pop`.
    pub fn close(&self) {
        self.lock().closed = true;
        self.available.notify_all();
    }

    /// Returns true once [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Best-effort snapshot of emptiness. Not a synchronization primitive.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// Best-effort snapshot of the number of queued items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }
}

impl<T> Default for BlockingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for BlockingQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("BlockingQueue")
            .field("len", &state.items.len())
            .field("closed", &state.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    mod fifo_tests {
        use super::*;

        #[test]
        fn pop_returns_items_in_push_order() {
            let queue = BlockingQueue::new();
            for i in 0..5 {
                queue.push(i).unwrap();
            }
            let drained: Vec<_> = (0..5).filter_map(|_| queue.try_pop()).collect();
            assert_eq!(drained, vec![0, 1, 2, 3, 4]);
        }

        #[test]
        fn len_and_is_empty_track_contents() {
            let queue = BlockingQueue::new();
            assert!(queue.is_empty());
            queue.push("a").unwrap();
            queue.push("b").unwrap();
            assert_eq!(queue.len(), 2);
            queue.try_pop();
            queue.try_pop();
            assert!(queue.is_empty());
        }

        #[test]
        fn try_pop_on_empty_queue_returns_none() {
            let queue: BlockingQueue<u8> = BlockingQueue::new();
            assert_eq!(queue.try_pop(), None);
        }
    }

    mod close_tests {
        use super::*;

        #[test]
        fn push_after_close_is_rejected() {
            let queue = BlockingQueue::new();
            queue.close();
            assert!(matches!(queue.push(7), Err(BattleError::PoolShutDown)));
            assert!(queue.is_empty());
        }

        #[test]
        fn closed_queue_drains_before_reporting_exhaustion() {
            let queue = BlockingQueue::new();
            queue.push(1).unwrap();
            queue.close();
            assert!(queue.is_closed());
            assert_eq!(queue.pop(), Some(1));
            assert_eq!(queue.pop(), None);
        }

        #[test]
        fn close_wakes_blocked_consumers() {
            let queue: Arc<BlockingQueue<u32>> = Arc::new(BlockingQueue::new());
            let waiters: Vec<_> = (0..3)
                .map(|_| {
                    let queue = Arc::clone(&queue);
                    thread::spawn(move || queue.pop())
                })
                .collect();

            thread::sleep(Duration::from_millis(20));
            queue.close();

            for waiter in waiters {
                assert_eq!(waiter.join().unwrap(), None);
            }
        }
    }

    mod concurrency_tests {
        use super::*;
        use std::collections::HashSet;

        #[test]
        fn blocked_pop_receives_later_push() {
            let queue = Arc::new(BlockingQueue::new());
            let consumer = {
                let queue = Arc::clone(&queue);
                thread::spawn(move || queue.pop())
            };
            thread::sleep(Duration::from_millis(20));
            queue.push(42).unwrap();
            assert_eq!(consumer.join().unwrap(), Some(42));
        }

        #[test]
        fn every_item_is_delivered_exactly_once() {
            let queue = Arc::new(BlockingQueue::new());
            let consumers: Vec<_> = (0..4)
                .map(|_| {
                    let queue = Arc::clone(&queue);
                    thread::spawn(move || {
                        let mut seen = Vec::new();
                        while let Some(item) = queue.pop() {
                            seen.push(item);
                        }
                        seen
                    })
                })
                .collect();

            let producers: Vec<_> = (0..4)
                .map(|p| {
                    let queue = Arc::clone(&queue);
                    thread::spawn(move || {
                        for i in 0..250 {
                            queue.push(p * 1000 + i).unwrap();
                        }
                    })
                })
                .collect();
            for producer in producers {
                producer.join().unwrap();
            }
            queue.close();

            let mut all = Vec::new();
            for consumer in consumers {
                all.extend(consumer.join().unwrap());
            }
            let unique: HashSet<_> = all.iter().copied().collect();
            assert_eq!(all.len(), 1000);
            assert_eq!(unique.len(), 1000);
        }
    }
}
