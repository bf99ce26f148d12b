//! Thread-safe sequence counter for inbound message numbering.
//!
//! The device protocol carries no sequence numbers of its own, so the parser
//! stamps each message it delivers.  Consumers can use the number to confirm
//! that the queue handed them messages in arrival order and that none were
//! lost between the parser and their `read()`.
//!
//! # Thread safety
//!
//! The counter uses `AtomicU64` internally, so it can be shared between a
//! parser thread and a diagnostics thread that calls [`SequenceCounter::current`]
//! without a lock.

use std::sync::atomic::{AtomicU64, Ordering};

/// A thread-safe, monotonically increasing counter.
///
/// Sequence numbers start at 0 and increment by 1 with each call to [`next`].
/// The counter wraps around at `u64::MAX` back to 0 without panicking.
///
/// # Examples
///
/// ```rust
/// use rover_core::protocol::SequenceCounter;
///
/// let counter = SequenceCounter::new();
/// assert_eq!(counter.next(), 0);
/// assert_eq!(counter.next(), 1);
/// ```
///
/// [`next`]: SequenceCounter::next
#[derive(Debug)]
pub struct SequenceCounter {
    inner: AtomicU64,
}

impl SequenceCounter {
    /// Creates a new counter starting at 0.
    pub fn new() -> Self {
        Self {
            inner: AtomicU64::new(0),
        }
    }

    /// Returns the next sequence number and atomically increments the counter.
    ///
    /// `Ordering::Relaxed` is enough: the number orders messages, it does
    /// not publish any other memory.
    pub fn next(&self) -> u64 {
        // `fetch_add` returns the old value and wraps on overflow.
        self.inner.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns the number the next call to [`SequenceCounter::next`] will
    /// hand out, i.e. how many messages have been stamped so far.
    pub fn current(&self) -> u64 {
        self.inner.load(Ordering::Relaxed)
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}
