//! Binary encoder for outbound command frames.
//!
//! Wire format:
//! ```text
//! [target:1][value:1][0x00]
//! ```
//! Every command is exactly [`COMMAND_FRAME_LEN`] bytes.  The target and value
//! are truncated to their low 8 bits, so a value of `-1` goes out as `0xFF`.

use std::io::{self, Write};

use tracing::trace;

use crate::protocol::constants::COMMAND_FRAME_LEN;
use crate::protocol::message::Message;

/// A decoded command frame, mainly useful for inspecting what was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFrame {
    pub target: u8,
    pub value: u8,
}

impl CommandFrame {
    /// Reads a frame back from its wire bytes.  The reserved third byte is
    /// ignored.
    pub fn from_bytes(bytes: [u8; COMMAND_FRAME_LEN]) -> Self {
        Self {
            target: bytes[0],
            value: bytes[1],
        }
    }

    /// The frame's wire bytes.
    pub fn to_bytes(self) -> [u8; COMMAND_FRAME_LEN] {
        [self.target, self.value, 0x00]
    }
}

/// Encodes `message` into a command frame.
///
/// A message with no values encodes a value of 0.
///
/// # Examples
///
/// ```rust
/// use rover_core::{encode_command, MessagePool};
///
/// let pool = MessagePool::new(1);
/// let mut m = pool.obtain();
/// m.set_command(2, 0xFF);
/// assert_eq!(encode_command(&m), [0x02, 0xFF, 0x00]);
/// ```
pub fn encode_command(message: &Message) -> [u8; COMMAND_FRAME_LEN] {
    CommandFrame {
        target: message.kind as u8,
        value: message.value(0).unwrap_or(0) as u8,
    }
    .to_bytes()
}

/// Writes encoded commands to a byte sink.
///
/// Each frame is flushed as soon as it is written so the device sees the
/// command without waiting for a buffer to fill.
#[derive(Debug)]
pub struct CommandEncoder<W> {
    sink: W,
}

impl<W: Write> CommandEncoder<W> {
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    /// Encodes and writes one command, then flushes.
    ///
    /// # Errors
    ///
    /// Returns the sink's I/O error from either the write or the flush.
    pub fn write_command(&mut self, message: &Message) -> io::Result<()> {
        let frame = encode_command(message);
        trace!("writing command frame {frame:02X?}");
        self.sink.write_all(&frame)?;
        self.sink.flush()
    }

    /// Borrows the underlying sink.
    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    /// Consumes the encoder and returns the sink.
    pub fn into_inner(self) -> W {
        self.sink
    }
}
