//! Worker loops that connect the byte streams to the queues.
//!
//! - [`InboundPipeline`] parses frames from a byte source into the inbound
//!   queue.  It stops when the source ends or fails.
//! - [`OutboundPipeline`] drains the outbound queue into a byte sink.  It
//!   stops when its shared `running` flag is cleared.
//!
//! Each pipeline can run on the caller's thread (`run`) or on a named thread
//! of its own (`spawn`).  Both hand back a summary when they finish.

pub mod inbound;
pub mod outbound;

pub use inbound::{InboundPipeline, InboundSummary};
pub use outbound::{OutboundPipeline, OutboundSummary};
