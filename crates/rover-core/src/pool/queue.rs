//! FIFO of pooled messages passed between threads.
//!
//! A [`PoolQueue`] pairs one [`MessagePool`] with one unbounded FIFO.  A
//! producer obtains a scratch message, fills it, and [`PoolQueue::send`]s it;
//! the consumer [`PoolQueue::read`]s or [`PoolQueue::poll`]s it and, once
//! finished, gives it back.  The FIFO itself never blocks a sender: its
//! length is bounded by the pool, because only `max` messages exist.
//!
//! The FIFO is a `crossbeam_channel` unbounded channel, which supports a
//! blocking receive on one thread concurrent with sends on others without
//! any extra locking.  The queue owns both ends, so the channel can never
//! become disconnected while the queue is alive.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::debug;

use crate::pool::object_pool::MessagePool;
use crate::protocol::message::Message;

/// What [`PoolQueue::send`] does with messages still waiting in the FIFO.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SendPolicy {
    /// Append to the tail; every message is delivered in order.
    #[default]
    Fifo,
    /// Before appending, return every undelivered message to the pool, so
    /// only the freshest message is ever waiting.  A consumer that cannot
    /// keep up sees the latest reading instead of a backlog.  Meant for
    /// debugging; messages dropped this way are never delivered.
    KeepLatest,
}

/// A FIFO of messages drawn from, and returned to, a bounded pool.
#[derive(Debug)]
pub struct PoolQueue {
    name: &'static str,
    pool: MessagePool,
    policy: SendPolicy,
    tx: Sender<Message>,
    rx: Receiver<Message>,
}

impl PoolQueue {
    /// Creates a FIFO-ordered queue whose pool holds at most `max` messages.
    ///
    /// # Panics
    ///
    /// Panics if `max` is 0 (see [`MessagePool::new`]).
    pub fn new(name: &'static str, max: usize) -> Self {
        Self::with_policy(name, max, SendPolicy::Fifo)
    }

    /// Creates a queue with an explicit [`SendPolicy`].
    pub fn with_policy(name: &'static str, max: usize, policy: SendPolicy) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            name,
            pool: MessagePool::new(max),
            policy,
            tx,
            rx,
        }
    }

    /// Name used in log output.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn policy(&self) -> SendPolicy {
        self.policy
    }

    /// The backing pool, for capacity and occupancy queries.
    pub fn pool(&self) -> &MessagePool {
        &self.pool
    }

    /// Obtains an empty message from the pool, blocking while it is
    /// exhausted.
    pub fn obtain(&self) -> Message {
        self.pool.obtain()
    }

    /// Obtains an empty message, giving up after `timeout`.
    pub fn obtain_timeout(&self, timeout: Duration) -> Option<Message> {
        self.pool.obtain_timeout(timeout)
    }

    /// Obtains an empty message only if one is free right now.
    pub fn try_obtain(&self) -> Option<Message> {
        self.pool.try_obtain()
    }

    /// Returns a message to the pool.
    pub fn giveback(&self, message: Message) {
        self.pool.giveback(message);
    }

    /// Enqueues `message` at the tail.  Never blocks.
    pub fn send(&self, message: Message) {
        if self.policy == SendPolicy::KeepLatest {
            for stale in self.rx.try_iter() {
                debug!(
                    queue = self.name,
                    sequence = stale.sequence,
                    "discarding undelivered message: {}",
                    stale.text
                );
                self.pool.giveback(stale);
            }
        }
        // The receiver lives as long as `self`, so the send cannot fail.
        let _ = self.tx.send(message);
    }

    /// Removes the head message, waiting until one is available.
    pub fn read(&self) -> Message {
        // Both channel ends live in `self`, so `recv` can only return a
        // message.
        self.rx
            .recv()
            .expect("pool queue owns its sender; channel cannot disconnect")
    }

    /// Removes the head message, waiting at most `timeout`.
    pub fn read_timeout(&self, timeout: Duration) -> Option<Message> {
        match self.rx.recv_timeout(timeout) {
            Ok(message) => Some(message),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Removes the head message if there is one, without waiting.
    pub fn poll(&self) -> Option<Message> {
        self.rx.try_recv().ok()
    }

    /// Gives back every message still waiting in the FIFO and returns how
    /// many there were.  Used at shutdown, once the consumer has stopped, so a
    /// producer blocked on an exhausted pool can make progress.
    pub fn recycle_pending(&self) -> usize {
        let mut recycled = 0;
        for message in self.rx.try_iter() {
            self.pool.giveback(message);
            recycled += 1;
        }
        if recycled > 0 {
            debug!(queue = self.name, recycled, "recycled undelivered messages");
        }
        recycled
    }

    /// Number of messages waiting to be read.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
