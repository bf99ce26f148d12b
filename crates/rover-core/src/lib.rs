//! # rover-core
//!
//! Shared library for the rover host link: the streaming sensor protocol
//! parser, the capacity-bounded message pool and queues, the binary command
//! encoder, and the two worker loops that move traffic between a byte
//! stream and the queues.
//!
//! It has no dependency on sockets, serial ports, or UI frameworks.  The
//! worker loops consume any [`std::io::Read`] and write to any
//! [`std::io::Write`]; the host crate supplies a TCP connection.
//!
//! # Architecture overview (for beginners)
//!
//! The microcontroller streams NMEA-like text lines such as
//! `$PRSO303,254*31\r\n`.  The host turns each line into a [`Message`] and
//! hands it to a controller; the controller answers with command messages
//! which are packed into 3-byte frames and written back.
//!
//! ```text
//! byte source ─► MessageParser ─► PoolQueue (inbound) ─► controller
//!                                                            │
//! byte sink   ◄─ CommandEncoder ◄─ PoolQueue (outbound) ◄────┘
//! ```
//!
//! - **`protocol`** – The wire formats: the inbound text grammar (parser,
//!   escape sequences, checksum hook) and the outbound command frame.
//!
//! - **`pool`** – [`MessagePool`] caps how many [`Message`] instances are ever
//!   allocated; [`PoolQueue`] adds a FIFO on top of it.  When the pool is
//!   empty, producers block, which is how backpressure reaches the device.
//!
//! - **`pipeline`** – The inbound and outbound worker loops, each meant to
//!   run on its own thread.

pub mod pipeline;
pub mod pool;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `rover_core::PoolQueue` instead of `rover_core::pool::queue::PoolQueue`.
pub use pipeline::{InboundPipeline, InboundSummary, OutboundPipeline, OutboundSummary};
pub use pool::{MessagePool, PoolQueue, SendPolicy};
pub use protocol::checksum::{ChecksumMode, ChecksumValidator, XorChecksum};
pub use protocol::encoder::{encode_command, CommandEncoder, CommandFrame};
pub use protocol::message::{CommandTarget, Message, MessageError, SensorKind};
pub use protocol::parser::{MessageParser, ParseError, ParserConfig};
