//! The reusable record carried through both queues.
//!
//! One [`Message`] type serves both directions: an inbound message holds one
//! sensor observation, an outbound message holds one command.  Instances are
//! drawn from and returned to a [`crate::MessagePool`], so the struct keeps
//! its storage inline (a fixed array of values, a reusable `String`) and is
//! cleared with [`Message::reset`] rather than reallocated.

use std::time::Instant;

use thiserror::Error;

use crate::protocol::constants::{MAX_MESSAGE_LEN, MAX_MESSAGE_VALUES};

/// Errors raised when filling a [`Message`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageError {
    /// The fixed-size value array is already full.
    #[error("message already holds the maximum of {max} values")]
    ValuesFull { max: usize },
}

// ── Kind codes ────────────────────────────────────────────────────────────────

/// Sensor categories carried in the `kind` field of inbound messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum SensorKind {
    LaserRangeFinder = 1,
    OpticalFlow = 2,
    Sonar = 3,
    Bumper = 4,
    Gps = 5,
    // Sensors on the host device itself.
    PhoneGps = 10,
    Compass = 11,
    Vision = 12,
}

impl TryFrom<i32> for SensorKind {
    type Error = ();

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(SensorKind::LaserRangeFinder),
            2 => Ok(SensorKind::OpticalFlow),
            3 => Ok(SensorKind::Sonar),
            4 => Ok(SensorKind::Bumper),
            5 => Ok(SensorKind::Gps),
            10 => Ok(SensorKind::PhoneGps),
            11 => Ok(SensorKind::Compass),
            12 => Ok(SensorKind::Vision),
            _ => Err(()),
        }
    }
}

/// Command targets carried in the `kind` field of outbound messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum CommandTarget {
    Steering = 1,
    Throttle = 2,
    TurretPan = 3,
    TurretTilt = 4,
}

impl TryFrom<i32> for CommandTarget {
    type Error = ();

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(CommandTarget::Steering),
            2 => Ok(CommandTarget::Throttle),
            3 => Ok(CommandTarget::TurretPan),
            4 => Ok(CommandTarget::TurretTilt),
            _ => Err(()),
        }
    }
}

// ── Message ───────────────────────────────────────────────────────────────────

/// One sensor reading or one command.
///
/// `kind` and `subindex` are kept as raw integers so codes this crate does
/// not know about still pass through; use [`Message::sensor_kind`] or
/// [`Message::command_target`] for a typed view.
#[derive(Debug, PartialEq)]
pub struct Message {
    /// Monotonic capture time.  Set by the parser for inbound messages only.
    pub timestamp: Option<Instant>,
    /// Per-parser sequence number of an inbound message.
    pub sequence: u64,
    /// Sensor category or command target.
    pub kind: i32,
    /// Which instance within `kind` (e.g. which sonar unit).
    pub subindex: i32,
    /// Reconstructed frame text, for diagnostics only.
    pub text: String,
    values: [i32; MAX_MESSAGE_VALUES],
    len: usize,
    instance_id: u64,
}

impl Message {
    /// Creates an empty message.  Only the pool should call this; everyone
    /// else obtains instances from a [`crate::PoolQueue`].
    pub(crate) fn with_instance_id(instance_id: u64) -> Self {
        Self {
            timestamp: None,
            sequence: 0,
            kind: 0,
            subindex: 0,
            text: String::with_capacity(MAX_MESSAGE_LEN),
            values: [0; MAX_MESSAGE_VALUES],
            len: 0,
            instance_id,
        }
    }

    /// Identifies the pooled instance.  Assigned when the pool creates the
    /// message and unchanged by [`Message::reset`], so recycling is visible.
    pub fn instance_id(&self) -> u64 {
        self.instance_id
    }

    /// Clears every field except the instance id.  The text buffer keeps its
    /// capacity.
    pub fn reset(&mut self) {
        self.timestamp = None;
        self.sequence = 0;
        self.kind = 0;
        self.subindex = 0;
        self.text.clear();
        self.values = [0; MAX_MESSAGE_VALUES];
        self.len = 0;
    }

    /// The argument values in wire order.
    pub fn values(&self) -> &[i32] {
        &self.values[..self.len]
    }

    /// Returns the value at `index`, if present.
    pub fn value(&self, index: usize) -> Option<i32> {
        self.values().get(index).copied()
    }

    /// Appends one argument value.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::ValuesFull`] once [`MAX_MESSAGE_VALUES`] values
    /// are stored; the message is left unchanged.
    pub fn push_value(&mut self, value: i32) -> Result<(), MessageError> {
        if self.len == MAX_MESSAGE_VALUES {
            return Err(MessageError::ValuesFull {
                max: MAX_MESSAGE_VALUES,
            });
        }
        self.values[self.len] = value;
        self.len += 1;
        Ok(())
    }

    /// Fills this message as an outbound command: `kind` is the target and
    /// the single value is the command argument.
    pub fn set_command(&mut self, target: i32, value: i32) {
        self.kind = target;
        self.values[0] = value;
        self.len = 1;
    }

    /// Typed view of `kind` for inbound messages.
    pub fn sensor_kind(&self) -> Option<SensorKind> {
        SensorKind::try_from(self.kind).ok()
    }

    /// Typed view of `kind` for outbound messages.
    pub fn command_target(&self) -> Option<CommandTarget> {
        CommandTarget::try_from(self.kind).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_value_keeps_wire_order() {
        // Arrange
        let mut m = Message::with_instance_id(0);

        // Act
        m.push_value(10).unwrap();
        m.push_value(-20).unwrap();
        m.push_value(30).unwrap();

        // Assert
        assert_eq!(m.values(), &[10, -20, 30]);
        assert_eq!(m.value(1), Some(-20));
        assert_eq!(m.value(3), None);
    }

    #[test]
    fn test_push_value_rejects_values_beyond_maximum() {
        // Arrange
        let mut m = Message::with_instance_id(0);
        for i in 0..MAX_MESSAGE_VALUES {
            m.push_value(i as i32).unwrap();
        }

        // Act
        let result = m.push_value(99);

        // Assert
        assert_eq!(
            result,
            Err(MessageError::ValuesFull {
                max: MAX_MESSAGE_VALUES
            })
        );
        assert_eq!(m.values().len(), MAX_MESSAGE_VALUES);
        assert_eq!(m.value(MAX_MESSAGE_VALUES - 1), Some(19));
    }

    #[test]
    fn test_reset_clears_fields_but_keeps_instance_id() {
        // Arrange
        let mut m = Message::with_instance_id(7);
        m.timestamp = Some(Instant::now());
        m.sequence = 42;
        m.kind = 3;
        m.subindex = 2;
        m.text.push_str("$PRSO302,1");
        m.push_value(1).unwrap();

        // Act
        m.reset();

        // Assert
        assert_eq!(m, Message::with_instance_id(7));
        assert_eq!(m.instance_id(), 7);
        assert!(m.values().is_empty());
    }

    #[test]
    fn test_set_command_overwrites_previous_values() {
        // Arrange
        let mut m = Message::with_instance_id(0);
        m.push_value(5).unwrap();
        m.push_value(6).unwrap();

        // Act
        m.set_command(CommandTarget::Throttle as i32, 0xFF);

        // Assert
        assert_eq!(m.command_target(), Some(CommandTarget::Throttle));
        assert_eq!(m.values(), &[0xFF]);
    }

    #[test]
    fn test_sensor_kind_round_trips_known_codes() {
        for kind in [
            SensorKind::LaserRangeFinder,
            SensorKind::OpticalFlow,
            SensorKind::Sonar,
            SensorKind::Bumper,
            SensorKind::Gps,
            SensorKind::PhoneGps,
            SensorKind::Compass,
            SensorKind::Vision,
        ] {
            assert_eq!(SensorKind::try_from(kind as i32), Ok(kind));
        }
        assert_eq!(SensorKind::try_from(6), Err(()));
    }

    #[test]
    fn test_unknown_command_target_has_no_typed_view() {
        let mut m = Message::with_instance_id(0);
        m.set_command(5, 1);
        assert_eq!(m.command_target(), None);
        assert_eq!(m.kind, 5);
    }
}
