//! Streaming parser for the inbound sensor protocol.
//!
//! Frame grammar:
//! ```text
//! $<hdr><sub>,<arg1>,<arg2>,...,<argN>[*<cksum>]<CR><LF>
//! ```
//!
//! The parser reads one byte at a time from any [`Read`] source and fills a
//! pooled [`Message`] per frame.  It is deliberately forgiving:
//!
//! - A CR not followed by LF is kept as an ordinary body byte.
//! - A `&` not followed by `I`/`i` is kept as an ordinary body byte.
//! - Fields that are not integers (empty NMEA fields, decimals, letters) are
//!   left out of `values` but stay in the frame text.
//!
//! Two situations look ahead one byte that then turns out to belong to the
//! next step (the byte after a lone CR, the byte after a lone `&`).  That
//! byte is parked in `pending` and classified on the next iteration, so it
//! is never lost.
//!
//! # Escaped binary values
//!
//! `&I<hi><lo>` (or `&i`) carries a raw 16-bit argument, high byte first:
//! `value = hi * 256 + lo`.  The two raw bytes are consumed without being
//! classified, so they may safely equal a comma, `*`, or CR.
//!
//! # End of stream
//!
//! When the source reports end of stream or a read error, the parser stops
//! and the partially built frame is discarded.  It never tries to resync.

use std::fmt::Write as _;
use std::io::{self, Read};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::pool::queue::PoolQueue;
use crate::protocol::checksum::{ChecksumMode, ChecksumValidator};
use crate::protocol::constants::{
    AMP, COMMA, CR, DOLLAR, GPS_TALKER, LF, LOWER_I, MAX_MESSAGE_LEN, STAR, UPPER_I,
};
use crate::protocol::message::{Message, SensorKind};
use crate::protocol::sequence::SequenceCounter;

/// Why the parser stopped.  Both cases end the inbound worker.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The byte source has no more data (e.g. the device closed its socket).
    #[error("byte source reached end of stream")]
    EndOfStream,

    /// Reading from the byte source failed.
    #[error("byte source read failed: {0}")]
    Io(#[from] io::Error),
}

/// Parser settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParserConfig {
    /// Checksum handling; unchecked unless configured otherwise.
    #[serde(default)]
    pub checksum: ChecksumMode,
    /// Cap on how many bytes of one frame are kept as text.  Parsing and
    /// checksum validation continue past it.
    #[serde(default = "default_max_message_len")]
    pub max_message_len: usize,
}

fn default_max_message_len() -> usize {
    MAX_MESSAGE_LEN
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            checksum: ChecksumMode::default(),
            max_message_len: default_max_message_len(),
        }
    }
}

/// Result of reading one complete frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame is ready for delivery.
    Complete,
    /// The frame carried a checksum that the configured validator rejected.
    ChecksumRejected,
}

/// Composes an escaped two-byte value, high byte first.
pub fn compose_escaped(hi: u8, lo: u8) -> i32 {
    i32::from(hi) * 256 + i32::from(lo)
}

/// Splits a header token into `(kind, subindex)`.
///
/// The last three bytes are `<hdr><sub>`: `<hdr>` is a hex digit, or its raw
/// byte value when it is not one; `<sub>` is two decimal digits, or 0.  A
/// `GP` talker is a real NMEA GPS sentence.
pub fn decode_header(header: &[u8]) -> (i32, i32) {
    if header.starts_with(GPS_TALKER) {
        return (SensorKind::Gps as i32, 0);
    }
    if header.len() < 3 {
        return (0, 0);
    }
    let tail = &header[header.len() - 3..];
    let kind = char::from(tail[0])
        .to_digit(16)
        .map_or(i32::from(tail[0]), |d| d as i32);
    let subindex = if tail[1].is_ascii_digit() && tail[2].is_ascii_digit() {
        i32::from(tail[1] - b'0') * 10 + i32::from(tail[2] - b'0')
    } else {
        0
    };
    (kind, subindex)
}

fn parse_decimal(field: &[u8]) -> Option<i32> {
    std::str::from_utf8(field).ok()?.trim().parse().ok()
}

// ── Per-frame scratch state ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Header,
    Arguments,
    Checksum,
}

/// Working state for the frame being assembled.  Reused across frames.
#[derive(Debug)]
struct FrameScratch {
    /// Cap on the text, field, and declared-checksum buffers.
    max_len: usize,
    /// Whether `body` is collected at all.  It is never capped, so a long
    /// frame still validates against its checksum.
    keep_body: bool,
    section: Section,
    seen_dollar: bool,
    /// Any byte other than the leading `$` has been seen.
    started: bool,
    /// Bytes of the current field.
    field: Vec<u8>,
    /// Value of an escape seen in the current field.
    escaped: Option<i32>,
    /// Raw bytes between `$` and `*`, for checksum validation.
    body: Vec<u8>,
    /// Text after `*`.
    declared: Vec<u8>,
    overflow_logged: bool,
}

impl FrameScratch {
    fn new(max_len: usize, keep_body: bool) -> Self {
        Self {
            max_len,
            keep_body,
            section: Section::Header,
            seen_dollar: false,
            started: false,
            field: Vec::new(),
            escaped: None,
            body: Vec::new(),
            declared: Vec::new(),
            overflow_logged: false,
        }
    }

    fn reset(&mut self) {
        self.section = Section::Header;
        self.seen_dollar = false;
        self.started = false;
        self.field.clear();
        self.escaped = None;
        self.body.clear();
        self.declared.clear();
        self.overflow_logged = false;
    }

    fn push_capped(buf: &mut Vec<u8>, bytes: &[u8], max_len: usize) {
        let room = max_len.saturating_sub(buf.len());
        buf.extend_from_slice(&bytes[..bytes.len().min(room)]);
    }

    fn literal(&mut self, message: &mut Message, b: u8) {
        if message.text.len() < self.max_len {
            message.text.push(char::from(b));
        }

        if self.section == Section::Checksum {
            Self::push_capped(&mut self.declared, &[b], self.max_len);
            return;
        }
        if b == DOLLAR && !self.seen_dollar && !self.started {
            self.seen_dollar = true;
            return;
        }
        self.started = true;
        if b == STAR {
            self.end_field(message);
            self.section = Section::Checksum;
            return;
        }
        if self.keep_body {
            self.body.push(b);
        }
        if b == COMMA {
            self.end_field(message);
        } else {
            Self::push_capped(&mut self.field, &[b], self.max_len);
        }
    }

    fn escape(&mut self, message: &mut Message, marker: u8, hi: u8, lo: u8) {
        let value = compose_escaped(hi, lo);
        trace!(value, "escaped binary value");
        if message.text.len() < self.max_len {
            let _ = write!(message.text, "{value}");
        }
        if self.section == Section::Checksum {
            return;
        }
        self.started = true;
        if self.keep_body {
            self.body.extend_from_slice(&[AMP, marker, hi, lo]);
        }
        self.escaped = Some(value);
    }

    fn end_field(&mut self, message: &mut Message) {
        match self.section {
            Section::Header => {
                let (kind, subindex) = decode_header(&self.field);
                message.kind = kind;
                message.subindex = subindex;
                self.section = Section::Arguments;
            }
            Section::Arguments => {
                let value = self.escaped.or_else(|| parse_decimal(&self.field));
                match value {
                    Some(v) => {
                        if let Err(e) = message.push_value(v) {
                            if !self.overflow_logged {
                                warn!("dropping surplus argument values: {e}");
                                self.overflow_logged = true;
                            }
                        }
                    }
                    None if !self.field.is_empty() => {
                        trace!("non-integer field kept in text only");
                    }
                    None => {}
                }
            }
            Section::Checksum => {}
        }
        self.field.clear();
        self.escaped = None;
    }
}

// ── Parser ────────────────────────────────────────────────────────────────────

/// Turns a byte stream into [`Message`]s.
pub struct MessageParser<R> {
    source: R,
    /// A byte read ahead of time that still needs classifying.
    pending: Option<u8>,
    validator: Option<Box<dyn ChecksumValidator>>,
    sequence: SequenceCounter,
    scratch: FrameScratch,
}

impl<R: Read> MessageParser<R> {
    /// Creates a parser with the validator selected by `config.checksum`.
    pub fn new(source: R, config: &ParserConfig) -> Self {
        Self::build(source, config, config.checksum.validator())
    }

    /// Creates a parser that checks every checksummed frame with `validator`,
    /// regardless of `config.checksum`.
    pub fn with_validator(
        source: R,
        config: &ParserConfig,
        validator: Box<dyn ChecksumValidator>,
    ) -> Self {
        Self::build(source, config, Some(validator))
    }

    fn build(
        source: R,
        config: &ParserConfig,
        validator: Option<Box<dyn ChecksumValidator>>,
    ) -> Self {
        let keep_body = validator.is_some();
        Self {
            source,
            pending: None,
            validator,
            sequence: SequenceCounter::new(),
            scratch: FrameScratch::new(config.max_message_len, keep_body),
        }
    }

    /// Number of messages delivered so far.
    pub fn delivered(&self) -> u64 {
        self.sequence.current()
    }

    /// Obtains a message from `queue`, fills it from the stream, and sends it.
    ///
    /// A frame rejected by the checksum validator goes back to the pool and
    /// `Ok(())` is returned; the caller simply asks for the next frame.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] when the source ends or fails.  The partial
    /// message is returned to the pool, not delivered.
    pub fn next_into(&mut self, queue: &PoolQueue) -> Result<(), ParseError> {
        let mut message = queue.obtain();
        match self.fill(&mut message) {
            Ok(FrameOutcome::Complete) => {
                message.sequence = self.sequence.next();
                debug!(
                    queue = queue.name(),
                    sequence = message.sequence,
                    kind = message.kind,
                    subindex = message.subindex,
                    "frame complete: {}",
                    message.text
                );
                queue.send(message);
                Ok(())
            }
            Ok(FrameOutcome::ChecksumRejected) => {
                warn!("checksum mismatch, dropping frame: {}", message.text);
                queue.giveback(message);
                Ok(())
            }
            Err(e) => {
                queue.giveback(message);
                Err(e)
            }
        }
    }

    /// Reads bytes until one frame is complete and records it in `message`.
    ///
    /// `message` should be freshly obtained; its timestamp is set here.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::EndOfStream`] or [`ParseError::Io`] if the
    /// source stops before CR LF.
    pub fn fill(&mut self, message: &mut Message) -> Result<FrameOutcome, ParseError> {
        self.scratch.reset();
        message.timestamp = Some(Instant::now());

        loop {
            let b = self.next_byte()?;
            match b {
                CR => {
                    let next = self.read_byte()?;
                    if next == LF {
                        return Ok(self.finish(message));
                    }
                    // CR inside a frame; keep it and reclassify `next`.
                    self.pending = Some(next);
                    self.scratch.literal(message, CR);
                }
                AMP => {
                    let next = self.read_byte()?;
                    if next == UPPER_I || next == LOWER_I {
                        let hi = self.read_byte()?;
                        let lo = self.read_byte()?;
                        self.scratch.escape(message, next, hi, lo);
                    } else {
                        self.pending = Some(next);
                        self.scratch.literal(message, AMP);
                    }
                }
                _ => self.scratch.literal(message, b),
            }
        }
    }

    fn finish(&mut self, message: &mut Message) -> FrameOutcome {
        let has_checksum = self.scratch.section == Section::Checksum;
        if !has_checksum {
            self.scratch.end_field(message);
        }
        match &self.validator {
            Some(validator)
                if has_checksum
                    && !validator.validate(&self.scratch.body, &self.scratch.declared) =>
            {
                FrameOutcome::ChecksumRejected
            }
            _ => FrameOutcome::Complete,
        }
    }

    fn next_byte(&mut self) -> Result<u8, ParseError> {
        match self.pending.take() {
            Some(b) => Ok(b),
            None => self.read_byte(),
        }
    }

    fn read_byte(&mut self) -> Result<u8, ParseError> {
        let mut buf = [0u8; 1];
        loop {
            match self.source.read(&mut buf) {
                Ok(0) => return Err(ParseError::EndOfStream),
                Ok(_) => {
                    trace!(byte = buf[0], "read");
                    return Ok(buf[0]);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(ParseError::Io(e)),
            }
        }
    }
}
