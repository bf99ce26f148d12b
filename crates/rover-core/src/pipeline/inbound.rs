//! Inbound worker: byte source → parser → inbound queue.
//!
//! The loop is simple: obtain, fill, send, repeat.  It blocks in two places,
//! on the byte source while waiting for data and on the pool while every
//! message is held downstream.  The second is intentional; a slow controller
//! stops the parser reading, and TCP flow control pushes back on the device.
//!
//! To stop the worker, close the byte source (for a socket, shut it down).
//! The next read reports end of stream or an error and the loop returns.

use std::io::{self, Read};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{error, info};

use crate::pool::queue::PoolQueue;
use crate::protocol::parser::{MessageParser, ParseError, ParserConfig};

/// How an inbound worker finished.
#[derive(Debug)]
pub struct InboundSummary {
    /// Messages delivered to the queue.
    pub delivered: u64,
    /// The condition that ended the loop.
    pub stopped_by: ParseError,
}

/// Reads frames from `R` and delivers them to a shared queue.
pub struct InboundPipeline<R> {
    parser: MessageParser<R>,
    queue: Arc<PoolQueue>,
}

impl<R: Read> InboundPipeline<R> {
    pub fn new(source: R, config: &ParserConfig, queue: Arc<PoolQueue>) -> Self {
        Self::from_parser(MessageParser::new(source, config), queue)
    }

    /// Wraps an already configured parser, e.g. one with a custom checksum
    /// validator.
    pub fn from_parser(parser: MessageParser<R>, queue: Arc<PoolQueue>) -> Self {
        Self { parser, queue }
    }

    /// The queue messages are delivered to.
    pub fn queue(&self) -> &Arc<PoolQueue> {
        &self.queue
    }

    /// Runs until the byte source ends or fails.  Never delivers a partial
    /// frame.
    pub fn run(mut self) -> InboundSummary {
        info!(queue = self.queue.name(), "inbound worker started");
        let stopped_by = loop {
            if let Err(e) = self.parser.next_into(&self.queue) {
                break e;
            }
        };

        let delivered = self.parser.delivered();
        match &stopped_by {
            ParseError::EndOfStream => {
                info!(delivered, "inbound worker stopped: byte source closed")
            }
            ParseError::Io(e) => error!(delivered, "inbound worker stopped: {e}"),
        }
        InboundSummary {
            delivered,
            stopped_by,
        }
    }
}

impl<R: Read + Send + 'static> InboundPipeline<R> {
    /// Runs the worker on a thread named `rover-inbound`.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be created.
    pub fn spawn(self) -> io::Result<JoinHandle<InboundSummary>> {
        thread::Builder::new()
            .name("rover-inbound".to_string())
            .spawn(move || self.run())
    }
}
