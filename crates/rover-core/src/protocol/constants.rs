//! Byte values and limits shared by the parser, encoder, and queues.
//!
//! Inbound messages follow an NMEA-like format.  For the GPS sensor this is
//! real NMEA:
//!
//! ```text
//! $GPkkk,<arg1>,<arg2>,...,<argN>[*<cksum>]<CR><LF>
//! ```
//!
//! Every other microcontroller-attached sensor uses:
//!
//! ```text
//! $PRSOxnn,<arg1>,<arg2>,...,<argN>[*<cksum>]<CR><LF>
//! ```
//!
//! where `x` is the sensor category (read as a hex digit) and `nn` is the
//! two-digit decimal instance number.  Arguments are ASCII decimal, or a raw
//! two-byte value written as `&I<hi><lo>`.

// ── Framing bytes ─────────────────────────────────────────────────────────────

pub const CR: u8 = 0x0D;
pub const LF: u8 = 0x0A;
pub const DOLLAR: u8 = b'$';
pub const AMP: u8 = b'&';
pub const STAR: u8 = b'*';
pub const UPPER_I: u8 = b'I';
pub const LOWER_I: u8 = b'i';
pub const COMMA: u8 = b',';

// ── Limits ────────────────────────────────────────────────────────────────────

/// Maximum expected length of one inbound transmission.  Longer frames are
/// still parsed but their diagnostic text is truncated at this length.
pub const MAX_MESSAGE_LEN: usize = 500;

/// Length of one outbound command frame.
pub const COMMAND_FRAME_LEN: usize = 3;

/// Maximum number of argument values carried by one [`crate::Message`].
pub const MAX_MESSAGE_VALUES: usize = 20;

/// Talker prefix of a real NMEA GPS sentence.
pub const GPS_TALKER: &[u8] = b"GP";

// ── Queue sizing ──────────────────────────────────────────────────────────────

/// Suggested message limit for the inbound (sensor) queue.
pub const IN_QUEUE_MAX: usize = 100;

/// Suggested message limit for the outbound (command) queue.
pub const OUT_QUEUE_MAX: usize = 100;
