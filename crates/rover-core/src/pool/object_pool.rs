//! Capacity-bounded pool of reusable [`Message`] instances.
//!
//! # Why a pool? (for beginners)
//!
//! Sensor data arrives continuously, often hundreds of frames per second.
//! Allocating a fresh message for each frame and freeing it once the
//! controller is done works, but it churns the allocator and places no limit
//! on how much memory a slow consumer can pin.
//!
//! The pool fixes both: it creates messages lazily, up to `max`, and from
//! then on only recycles them.  When all `max` instances are out, the next
//! [`MessagePool::obtain`] waits until a holder gives one back.  A consumer
//! that falls behind therefore stalls the producer instead of growing memory,
//! which is the system's only form of backpressure.
//!
//! # Ownership
//!
//! `obtain` moves a [`Message`] out of the pool and `giveback` moves it back
//! in, so a message is always in exactly one place: in the pool, or with the
//! single holder that obtained it.  The compiler enforces that a holder
//! cannot keep using a message after giving it back.
//!
//! # Locking
//!
//! The created-count and the free list live behind one `Mutex`; a `Condvar`
//! wakes waiters when a message is returned.  This is the only lock in the
//! crate.  Poisoning is recovered rather than propagated: the guarded state
//! is a counter and a `Vec`, both valid after any panic.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::protocol::message::Message;

/// Mutable pool state, guarded by [`MessagePool::state`].
#[derive(Debug)]
struct PoolState {
    /// Number of messages ever created.  Never exceeds `max`.
    created: usize,
    /// Messages given back and not yet handed out again.
    free: Vec<Message>,
}

/// Capacity-bounded pool of reusable messages.
#[derive(Debug)]
pub struct MessagePool {
    max: usize,
    state: Mutex<PoolState>,
    returned: Condvar,
}

impl MessagePool {
    /// Creates a pool that will never hold more than `max` messages.
    ///
    /// # Panics
    ///
    /// Panics if `max` is 0: such a pool could never hand out a message and
    /// the first `obtain` would wait forever.
    pub fn new(max: usize) -> Self {
        assert!(max > 0, "a message pool needs room for at least one message");
        Self {
            max,
            state: Mutex::new(PoolState {
                created: 0,
                free: Vec::with_capacity(max),
            }),
            returned: Condvar::new(),
        }
    }

    /// Maximum number of messages this pool will ever create.
    pub fn max(&self) -> usize {
        self.max
    }

    /// Number of messages created so far.
    pub fn created(&self) -> usize {
        self.lock().created
    }

    /// Number of created messages currently sitting in the pool.
    pub fn available(&self) -> usize {
        self.lock().free.len()
    }

    /// Number of messages currently held outside the pool.
    pub fn in_flight(&self) -> usize {
        let state = self.lock();
        state.created - state.free.len()
    }

    /// Returns an empty message, waiting as long as necessary.
    ///
    /// Prefers a recycled message; creates a new one while fewer than `max`
    /// exist; otherwise blocks until another holder calls
    /// [`MessagePool::giveback`].  Spurious wakeups are absorbed.
    pub fn obtain(&self) -> Message {
        let mut state = self.lock();
        loop {
            if let Some(message) = self.take_or_create(&mut state) {
                return message;
            }
            debug!(max = self.max, "message pool exhausted, waiting for a return");
            state = self
                .returned
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`MessagePool::obtain`] but gives up after `timeout`.
    pub fn obtain_timeout(&self, timeout: Duration) -> Option<Message> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            if let Some(message) = self.take_or_create(&mut state) {
                return Some(message);
            }
            let remaining = deadline.checked_duration_since(Instant::now())?;
            let (guard, _) = self
                .returned
                .wait_timeout(state, remaining)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }
    }

    /// Returns a message only if one is available without waiting.
    pub fn try_obtain(&self) -> Option<Message> {
        let mut state = self.lock();
        self.take_or_create(&mut state)
    }

    /// Returns `message` to the pool and wakes one waiter.  Never blocks on
    /// anything but the pool lock.
    pub fn giveback(&self, message: Message) {
        trace!(instance = message.instance_id(), "message returned to pool");
        let mut state = self.lock();
        state.free.push(message);
        drop(state);
        self.returned.notify_one();
    }

    fn take_or_create(&self, state: &mut PoolState) -> Option<Message> {
        if let Some(mut message) = state.free.pop() {
            message.reset();
            return Some(message);
        }
        if state.created < self.max {
            let id = state.created as u64;
            state.created += 1;
            debug!(created = state.created, max = self.max, "allocated new pooled message");
            return Some(Message::with_instance_id(id));
        }
        None
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_obtain_creates_lazily_up_to_max() {
        // Arrange
        let pool = MessagePool::new(3);
        assert_eq!(pool.created(), 0);

        // Act
        let a = pool.obtain();
        let b = pool.obtain();

        // Assert
        assert_eq!(pool.created(), 2);
        assert_eq!(pool.in_flight(), 2);
        assert_ne!(a.instance_id(), b.instance_id());
    }

    #[test]
    fn test_obtain_prefers_recycled_message() {
        // Arrange
        let pool = MessagePool::new(3);
        let first = pool.obtain();
        let id = first.instance_id();
        pool.giveback(first);

        // Act
        let again = pool.obtain();

        // Assert – no second allocation happened
        assert_eq!(again.instance_id(), id);
        assert_eq!(pool.created(), 1);
    }

    #[test]
    fn test_recycled_message_is_reset() {
        // Arrange
        let pool = MessagePool::new(1);
        let mut m = pool.obtain();
        m.kind = 4;
        m.subindex = 1;
        m.sequence = 9;
        m.text.push_str("$PRSO401,0");
        m.push_value(0).unwrap();
        pool.giveback(m);

        // Act
        let fresh = pool.obtain();

        // Assert
        assert_eq!(fresh.kind, 0);
        assert_eq!(fresh.subindex, 0);
        assert_eq!(fresh.sequence, 0);
        assert!(fresh.text.is_empty());
        assert!(fresh.values().is_empty());
        assert!(fresh.timestamp.is_none());
    }

    #[test]
    fn test_try_obtain_returns_none_when_exhausted() {
        let pool = MessagePool::new(1);
        let held = pool.obtain();

        assert!(pool.try_obtain().is_none());

        pool.giveback(held);
        assert!(pool.try_obtain().is_some());
    }

    #[test]
    fn test_obtain_timeout_expires_when_exhausted() {
        // Arrange
        let pool = MessagePool::new(1);
        let _held = pool.obtain();

        // Act
        let start = Instant::now();
        let result = pool.obtain_timeout(Duration::from_millis(50));

        // Assert
        assert!(result.is_none());
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert_eq!(pool.created(), 1);
    }

    #[test]
    fn test_obtain_blocks_until_giveback_then_reuses_instance() {
        // Arrange
        let pool = Arc::new(MessagePool::new(1));
        let held = pool.obtain();
        let held_id = held.instance_id();
        let (tx, rx) = mpsc::channel();

        // Act – a second obtain on another thread must wait
        let waiter = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                let m = pool.obtain();
                tx.send(m.instance_id()).unwrap();
                m
            })
        };

        // Assert – nothing arrives while the only message is held
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

        pool.giveback(held);
        let got = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("waiter must wake after giveback");
        assert_eq!(got, held_id, "the recycled instance must be handed over");
        assert_eq!(pool.created(), 1);
        waiter.join().expect("waiter panicked");
    }

    #[test]
    fn test_created_never_exceeds_max_under_contention() {
        // Arrange
        let max = 4;
        let pool = Arc::new(MessagePool::new(max));

        // Act – many threads obtain and give back repeatedly
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    let mut peak = 0;
                    for _ in 0..200 {
                        let m = pool.obtain();
                        peak = peak.max(pool.in_flight());
                        pool.giveback(m);
                    }
                    peak
                })
            })
            .collect();
        let peaks: Vec<usize> = handles
            .into_iter()
            .map(|h| h.join().expect("worker panicked"))
            .collect();

        // Assert
        assert!(pool.created() <= max);
        assert!(peaks.iter().all(|&p| p <= max));
        assert_eq!(pool.in_flight(), 0);
        assert_eq!(pool.available(), pool.created());
    }

    #[test]
    #[should_panic(expected = "at least one message")]
    fn test_zero_capacity_pool_is_rejected() {
        let _ = MessagePool::new(0);
    }
}
