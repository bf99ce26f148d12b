//! Outbound worker: outbound queue → encoder → byte sink.
//!
//! Each queued command is encoded, written, flushed, and returned to the
//! pool, in that order.  A failed write is logged and counted but does not
//! stop the loop: the device may recover, and the controller keeps producing
//! commands either way.
//!
//! # Shutdown
//!
//! The loop waits on the queue with a short timeout instead of blocking
//! forever, and checks the shared `running` flag whenever the wait times out.
//! Anything already queued when the flag is cleared is still written.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::pool::queue::PoolQueue;
use crate::protocol::encoder::CommandEncoder;

/// How long one queue wait lasts before the running flag is re-checked.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How an outbound worker finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutboundSummary {
    /// Commands written and flushed successfully.
    pub sent: u64,
    /// Commands whose write or flush failed.
    pub failed: u64,
}

/// Drains a shared command queue into `W`.
pub struct OutboundPipeline<W> {
    encoder: CommandEncoder<W>,
    queue: Arc<PoolQueue>,
    running: Arc<AtomicBool>,
    poll_interval: Duration,
}

impl<W: Write> OutboundPipeline<W> {
    pub fn new(sink: W, queue: Arc<PoolQueue>, running: Arc<AtomicBool>) -> Self {
        Self {
            encoder: CommandEncoder::new(sink),
            queue,
            running,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Overrides how often the running flag is checked while idle.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// The queue commands are taken from.
    pub fn queue(&self) -> &Arc<PoolQueue> {
        &self.queue
    }

    /// Runs until `running` is cleared and the queue is idle.
    pub fn run(mut self) -> OutboundSummary {
        info!(queue = self.queue.name(), "outbound worker started");
        let mut summary = OutboundSummary::default();

        loop {
            let Some(message) = self.queue.read_timeout(self.poll_interval) else {
                if self.running.load(Ordering::Relaxed) {
                    continue;
                }
                break;
            };

            match self.encoder.write_command(&message) {
                Ok(()) => {
                    summary.sent += 1;
                    debug!(
                        target_id = message.kind,
                        value = message.value(0).unwrap_or(0),
                        "command sent"
                    );
                }
                Err(e) => {
                    summary.failed += 1;
                    warn!(target_id = message.kind, "command write failed: {e}");
                }
            }
            self.queue.giveback(message);
        }

        info!(
            sent = summary.sent,
            failed = summary.failed,
            "outbound worker stopped"
        );
        summary
    }
}

impl<W: Write + Send + 'static> OutboundPipeline<W> {
    /// Runs the worker on a thread named `rover-outbound`.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be created.
    pub fn spawn(self) -> io::Result<JoinHandle<OutboundSummary>> {
        thread::Builder::new()
            .name("rover-outbound".to_string())
            .spawn(move || self.run())
    }
}
