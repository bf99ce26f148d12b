//! Protocol module containing the message model, the inbound parser, and the
//! outbound command encoder.

pub mod checksum;
pub mod constants;
pub mod encoder;
pub mod message;
pub mod parser;
pub mod sequence;

pub use checksum::{ChecksumMode, ChecksumValidator, XorChecksum};
pub use encoder::{encode_command, CommandEncoder, CommandFrame};
pub use message::{CommandTarget, Message, MessageError, SensorKind};
pub use parser::{MessageParser, ParseError, ParserConfig};
pub use sequence::SequenceCounter;
