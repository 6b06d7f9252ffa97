//! I/O arbitration: couples the synchronous I/O instructions to
//! asynchronous peripherals.
//!
//! SKIP-mode instructions sample readiness once and fall through when the
//! unit is busy. WAIT-mode instructions poll inside the indicator-lag
//! window, then stall in IOHOLD until the unit comes ready or the operator
//! releases the hold. A missing unit always fails without stalling.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::api::Machine;
use crate::encoding::IoMode;
use crate::peripherals::Peripheral;

/// How long a WAIT instruction polls before advertising IOHOLD.
pub const INDICATOR_LAG: Duration = Duration::from_millis(200);

/// Poll period inside the indicator-lag window.
pub const READY_POLL: Duration = Duration::from_millis(10);

/// IOHOLD poll period for command and test traffic.
pub const HOLD_POLL_CONTROL: Duration = Duration::from_millis(50);

/// IOHOLD poll period for data traffic.
pub const HOLD_POLL_DATA: Duration = Duration::from_millis(20);

/// Readiness flavor of one arbitration pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IoFlavor {
    Test(u16),
    Command,
    Read,
    Write,
}

impl IoFlavor {
    fn ready(self, device: &Arc<dyn Peripheral>) -> bool {
        match self {
            Self::Test(cmd) => device.test_ready(cmd),
            Self::Command => device.command_ready(),
            Self::Read => device.read_ready(),
            Self::Write => device.write_ready(),
        }
    }

    const fn hold_poll(self) -> Duration {
        match self {
            Self::Test(_) | Self::Command => HOLD_POLL_CONTROL,
            Self::Read | Self::Write => HOLD_POLL_DATA,
        }
    }
}

impl Machine {
    /// Waits for a unit to come ready under the given mode. Returns false
    /// when the transfer should be abandoned.
    fn await_ready(&self, device: &Arc<dyn Peripheral>, flavor: IoFlavor, mode: IoMode) -> bool {
        if flavor.ready(device) {
            return true;
        }
        if mode == IoMode::Skip {
            return false;
        }

        let started = Instant::now();
        while started.elapsed() < INDICATOR_LAG {
            thread::sleep(READY_POLL);
            if flavor.ready(device) {
                return true;
            }
        }

        // Past the indicator lag: stall and tell the panel about it.
        self.controls().set_io_hold(true);
        debug!(?flavor, "entering IOHOLD");
        let poll = flavor.hold_poll();
        let ready = loop {
            if flavor.ready(device) {
                break true;
            }
            if self.controls().take_io_release() {
                // one final readiness check, then give up
                break flavor.ready(device);
            }
            thread::sleep(poll);
        };
        self.controls().set_io_hold(false);
        debug!(?flavor, ready, "leaving IOHOLD");
        ready
    }

    /// CEU: issues a command word to a unit.
    pub(crate) fn io_command(&mut self, unit: u8, cmd: u16, mode: IoMode) -> bool {
        let Some(device) = self.units().get(unit) else {
            return false;
        };
        if !self.await_ready(&device, IoFlavor::Command, mode) {
            return false;
        }
        device.command(cmd)
    }

    /// TEU: polls a device condition.
    pub(crate) fn io_test(&mut self, unit: u8, cmd: u16) -> bool {
        let Some(device) = self.units().get(unit) else {
            return false;
        };
        if !self.await_ready(&device, IoFlavor::Test(cmd), IoMode::Skip) {
            return false;
        }
        device.test(cmd)
    }

    /// AIP/MIP: reads one word from a unit.
    pub(crate) fn io_read(&mut self, unit: u8, mode: IoMode) -> Option<u16> {
        let device = self.units().get(unit)?;
        if !self.await_ready(&device, IoFlavor::Read, mode) {
            return None;
        }
        let (transferred, word) = device.read();
        transferred.then_some(word)
    }

    /// AOP/MOP: writes one word to a unit.
    pub(crate) fn io_write(&mut self, unit: u8, word: u16, mode: IoMode) -> bool {
        let Some(device) = self.units().get(unit) else {
            return false;
        };
        if !self.await_ready(&device, IoFlavor::Write, mode) {
            return false;
        }
        device.write(word)
    }
}
