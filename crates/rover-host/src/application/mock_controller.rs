//! Scripted stand-in for the rover's control logic.
//!
//! For every sensor message it consumes, the controller answers with the next
//! command from a fixed script.  It exists to prove the wiring end to end: a
//! frame that arrives on the socket produces exactly one 3-byte command on
//! the socket.  Real steering logic replaces this type, not the pipelines.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rover_core::{CommandTarget, PoolQueue};
use tracing::{debug, info};

/// `(target, value)` pairs sent in order, then repeated.
///
/// Target 5 is not a known actuator; the device ignores it, which checks that
/// unknown codes pass through the encoder unchanged.
pub const MOCK_SCRIPT: [(i32, i32); 5] = [
    (CommandTarget::Steering as i32, 0x80),
    (CommandTarget::Throttle as i32, 0xFF),
    (CommandTarget::TurretPan as i32, 0x10),
    (CommandTarget::TurretTilt as i32, 0xEF),
    (5, 0x01),
];

/// How long each queue wait lasts before the running flag is re-checked.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Counts reported when the controller stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerSummary {
    pub sensor_messages: u64,
    pub commands: u64,
}

/// Reads sensor messages and answers each with a scripted command.
pub struct ScriptedController {
    inbound: Arc<PoolQueue>,
    outbound: Arc<PoolQueue>,
    running: Arc<AtomicBool>,
    step: usize,
}

impl ScriptedController {
    pub fn new(inbound: Arc<PoolQueue>, outbound: Arc<PoolQueue>, running: Arc<AtomicBool>) -> Self {
        Self {
            inbound,
            outbound,
            running,
            step: 0,
        }
    }

    /// Runs until the running flag is cleared.
    pub fn run(mut self) -> ControllerSummary {
        info!("scripted controller started");
        let mut summary = ControllerSummary::default();

        while self.running.load(Ordering::Relaxed) {
            let Some(sensor) = self.inbound.read_timeout(POLL_INTERVAL) else {
                continue;
            };
            debug!(
                sequence = sensor.sequence,
                kind = sensor.kind,
                subindex = sensor.subindex,
                values = ?sensor.values(),
                "sensor message"
            );
            self.inbound.giveback(sensor);
            summary.sensor_messages += 1;

            if self.send_next_command() {
                summary.commands += 1;
            }
        }

        info!(
            sensor_messages = summary.sensor_messages,
            commands = summary.commands,
            "scripted controller stopped"
        );
        summary
    }

    /// Sends the next scripted command.  Returns `false` if shutdown began
    /// while waiting for a free outbound message.
    fn send_next_command(&mut self) -> bool {
        let mut command = loop {
            if let Some(m) = self.outbound.obtain_timeout(POLL_INTERVAL) {
                break m;
            }
            if !self.running.load(Ordering::Relaxed) {
                return false;
            }
        };

        let (target, value) = MOCK_SCRIPT[self.step];
        self.step = (self.step + 1) % MOCK_SCRIPT.len();
        command.set_command(target, value);
        self.outbound.send(command);
        true
    }

    /// Runs the controller on a thread named `rover-controller`.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be created.
    pub fn spawn(self) -> io::Result<JoinHandle<ControllerSummary>> {
        thread::Builder::new()
            .name("rover-controller".to_string())
            .spawn(move || self.run())
    }
}
