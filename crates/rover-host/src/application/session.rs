//! The three worker threads of one device connection, started and stopped
//! together.
//!
//! Stopping has an order.  The controller is the only thing that gives
//! inbound messages back, so once it has stopped the inbound worker can be
//! parked on an exhausted pool, still holding frames it already buffered.
//! [`HostSession::stop`] therefore keeps recycling whatever is left in the
//! inbound queue until that worker has read to the end of the closed link.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rover_core::{
    InboundPipeline, InboundSummary, OutboundPipeline, OutboundSummary, ParserConfig, PoolQueue,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::application::mock_controller::{ControllerSummary, ScriptedController};

/// Pause between inbound drain passes while the worker finishes.
const DRAIN_INTERVAL: Duration = Duration::from_millis(5);

/// Errors from stopping a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{0} panicked")]
    WorkerPanicked(&'static str),
}

/// What each worker reported when it stopped.
#[derive(Debug)]
pub struct SessionSummary {
    pub inbound: InboundSummary,
    pub outbound: OutboundSummary,
    pub controller: ControllerSummary,
}

/// Running inbound, outbound and controller threads for one link.
pub struct HostSession {
    running: Arc<AtomicBool>,
    inbound: Arc<PoolQueue>,
    inbound_worker: JoinHandle<InboundSummary>,
    outbound_worker: JoinHandle<OutboundSummary>,
    controller: JoinHandle<ControllerSummary>,
}

impl HostSession {
    /// Spawns the workers: `reader` feeds the parser, `writer` receives
    /// encoded commands.
    ///
    /// # Errors
    ///
    /// Returns the OS error if a thread cannot be created.
    pub fn start<R, W>(
        reader: R,
        writer: W,
        protocol: &ParserConfig,
        inbound: Arc<PoolQueue>,
        outbound: Arc<PoolQueue>,
    ) -> io::Result<Self>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));

        let inbound_worker = InboundPipeline::new(reader, protocol, Arc::clone(&inbound)).spawn()?;
        let outbound_worker =
            OutboundPipeline::new(writer, Arc::clone(&outbound), Arc::clone(&running)).spawn()?;
        let controller =
            ScriptedController::new(Arc::clone(&inbound), outbound, Arc::clone(&running)).spawn()?;

        Ok(Self {
            running,
            inbound,
            inbound_worker,
            outbound_worker,
            controller,
        })
    }

    /// True once the inbound worker has hit end of stream or a read error.
    pub fn is_device_closed(&self) -> bool {
        self.inbound_worker.is_finished()
    }

    /// Stops every worker and waits for them.
    ///
    /// `close_link` must make the reader return end of stream or an error;
    /// for a socket, shut it down.  Commands already queued are still
    /// written before the outbound worker exits.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::WorkerPanicked`] if a worker thread panicked.
    pub fn stop(self, close_link: impl FnOnce()) -> Result<SessionSummary, SessionError> {
        self.running.store(false, Ordering::Relaxed);
        close_link();

        let controller = join(self.controller, "controller")?;

        let mut recycled = 0;
        while !self.inbound_worker.is_finished() {
            match self.inbound.recycle_pending() {
                0 => thread::sleep(DRAIN_INTERVAL),
                n => recycled += n,
            }
        }
        recycled += self.inbound.recycle_pending();
        if recycled > 0 {
            debug!(recycled, "dropped sensor messages received during shutdown");
        }

        let inbound = join(self.inbound_worker, "inbound worker")?;
        let outbound = join(self.outbound_worker, "outbound worker")?;

        info!(
            received = inbound.delivered,
            handled = controller.sensor_messages,
            sent = outbound.sent,
            write_failures = outbound.failed,
            "session stopped"
        );
        Ok(SessionSummary {
            inbound,
            outbound,
            controller,
        })
    }
}

fn join<T>(handle: JoinHandle<T>, name: &'static str) -> Result<T, SessionError> {
    handle.join().map_err(|_| SessionError::WorkerPanicked(name))
}
