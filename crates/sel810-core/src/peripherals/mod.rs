//! Peripheral capability surface and the attached-unit table.
//!
//! Every device (console teletype, file-backed reader/punch, TCP-attached
//! transports) implements the one [`Peripheral`] trait. Device models
//! themselves live outside this crate; the core only arbitrates readiness,
//! transfers single words and aggregates interrupt lines.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::debug;

/// Number of slots in a unit's interrupt-line vector: groups 0-7 plus one
/// reserved slot.
pub const INTERRUPT_SLOTS: usize = 9;

/// A unit's interrupt request lines: one 12-bit mask per slot.
pub type InterruptLines = [u16; INTERRUPT_SLOTS];

/// Highest addressable unit id (6-bit unit field).
pub const MAX_UNIT: u8 = 0o77;

/// Default TCP port of the front-panel protocol.
pub const FRONT_PANEL_PORT: u16 = 8100;

/// Default TCP port of the console teletype.
pub const CONSOLE_PORT: u16 = 8101;

/// Default port for a unit without an explicit assignment.
#[must_use]
pub const fn default_unit_port(unit: u8) -> u16 {
    FRONT_PANEL_PORT + unit as u16
}

/// Capability set implemented by every attached device.
///
/// Readiness queries are cheap and side-effect free; the operations move
/// single 16-bit words. Devices run their own worker flows, so every entry
/// point takes `&self` and the implementation synchronizes internally.
pub trait Peripheral: Send + Sync {
    /// True when the unit can answer `test` for this condition word.
    fn test_ready(&self, cmd: u16) -> bool;

    /// Polls a device condition; the result drives the TEU skip.
    fn test(&self, cmd: u16) -> bool;

    /// True when the unit can accept a command word.
    fn command_ready(&self) -> bool;

    /// Issues a 16-bit command word; false when the unit rejected it.
    fn command(&self, cmd: u16) -> bool;

    /// True when a word is available to read.
    fn read_ready(&self) -> bool;

    /// Reads one word; the flag is false when nothing was transferred.
    fn read(&self) -> (bool, u16);

    /// True when the unit can accept a data word.
    fn write_ready(&self) -> bool;

    /// Writes one word; false when the unit dropped it.
    fn write(&self, word: u16) -> bool;

    /// Current interrupt request lines, or `None` for a unit that never
    /// interrupts.
    fn interrupts(&self) -> Option<InterruptLines> {
        None
    }

    /// Releases every resource held by the device. Called exactly once,
    /// when the unit is detached or the machine tears down.
    fn exit(&self) {}
}

/// Attach-time failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AttachError {
    /// The unit id does not fit the 6-bit unit field.
    #[error("unit id {0} exceeds the 6-bit unit field")]
    UnitOutOfRange(u8),
}

/// Indexed sparse map from unit id to peripheral handle, guarded by one
/// coarse lock. Entries are swapped wholesale; the executor clones the
/// handle out and never holds the lock across a device call.
#[derive(Default)]
pub struct UnitTable {
    slots: Mutex<BTreeMap<u8, Arc<dyn Peripheral>>>,
}

impl UnitTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a device at `unit`, releasing any previous occupant.
    ///
    /// # Errors
    ///
    /// Returns [`AttachError::UnitOutOfRange`] when `unit` exceeds
    /// [`MAX_UNIT`].
    pub fn attach(&self, unit: u8, device: Arc<dyn Peripheral>) -> Result<(), AttachError> {
        if unit > MAX_UNIT {
            return Err(AttachError::UnitOutOfRange(unit));
        }
        let previous = self
            .slots
            .lock()
            .expect("unit table lock")
            .insert(unit, device);
        if let Some(old) = previous {
            old.exit();
        }
        debug!(unit, "unit attached");
        Ok(())
    }

    /// Detaches the device at `unit`, releasing it exactly once. Returns
    /// false when the slot was empty.
    pub fn detach(&self, unit: u8) -> bool {
        let removed = self.slots.lock().expect("unit table lock").remove(&unit);
        match removed {
            Some(device) => {
                device.exit();
                debug!(unit, "unit detached");
                true
            }
            None => false,
        }
    }

    /// Clones out the handle at `unit`, if any.
    #[must_use]
    pub fn get(&self, unit: u8) -> Option<Arc<dyn Peripheral>> {
        self.slots.lock().expect("unit table lock").get(&unit).cloned()
    }

    /// Clones out every attached handle, for interrupt-line aggregation.
    #[must_use]
    pub fn attached(&self) -> Vec<Arc<dyn Peripheral>> {
        self.slots
            .lock()
            .expect("unit table lock")
            .values()
            .cloned()
            .collect()
    }

    /// Detaches everything, releasing each device exactly once.
    pub fn detach_all(&self) {
        let drained = std::mem::take(&mut *self.slots.lock().expect("unit table lock"));
        for device in drained.values() {
            device.exit();
        }
    }
}
