//! Priority-vectored interrupt engine.
//!
//! Runs once per instruction, after the executor returns. Aggregates the
//! request lines of every attached unit, applies the one-cycle post-block
//! shadow, selects the highest-priority enabled request and vectors through
//! the fixed interrupt table with an implicit store-place-and-branch.

use tracing::trace;

use crate::api::Machine;
use crate::state::PC_MASK;

/// Number of priority groups.
pub const INTERRUPT_GROUPS: usize = 8;

/// Sentinel group meaning "no interrupt active".
pub const GROUP_NONE: u8 = 8;

/// Levels per group; bit 11 is level 1 (highest), bit 0 level 12 (lowest).
pub const LEVELS_PER_GROUP: u8 = 12;

const LEVEL_MASK: u16 = 0x0FFF;

/// Base of the interrupt vector table.
const VECTOR_BASE: u16 = 514;

/// Groups above this one skip a reserved 16-word range in the table.
const RESERVED_SKIP_GROUP: u8 = 2;

/// Computes the vector address for a group/level pair.
#[must_use]
pub const fn vector_address(group: u8, level: u8) -> u16 {
    let reserved = if group > RESERVED_SKIP_GROUP { 16 } else { 0 };
    VECTOR_BASE + group as u16 * 16 + (level as u16 - 1) + reserved
}

const fn level_of_bit(bit: u8) -> u8 {
    LEVELS_PER_GROUP - bit
}

fn highest_bit(mask: u16) -> Option<u8> {
    if mask & LEVEL_MASK == 0 {
        None
    } else {
        Some(15 - (mask & LEVEL_MASK).leading_zeros() as u8)
    }
}

/// Flat interrupt state: three parallel 12-bit mask arrays plus the latched
/// selection. `group == GROUP_NONE` is the idle sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterruptFile {
    request: [u16; INTERRUPT_GROUPS],
    enabled: [u16; INTERRUPT_GROUPS],
    active: [u16; INTERRUPT_GROUPS],
    group: u8,
    level: u8,
    mask: u16,
    blocked: bool,
    toi: bool,
}

impl Default for InterruptFile {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptFile {
    /// Creates the idle interrupt file.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            request: [0; INTERRUPT_GROUPS],
            enabled: [0; INTERRUPT_GROUPS],
            active: [0; INTERRUPT_GROUPS],
            group: GROUP_NONE,
            level: 0,
            mask: 0,
            blocked: false,
            toi: false,
        }
    }

    /// Currently active group, or [`GROUP_NONE`].
    #[must_use]
    pub const fn group(&self) -> u8 {
        self.group
    }

    /// Level of the active interrupt (1 highest, 12 lowest); 0 when idle.
    #[must_use]
    pub const fn level(&self) -> u8 {
        self.level
    }

    /// One-hot mask of the active level within its group.
    #[must_use]
    pub const fn mask(&self) -> u16 {
        self.mask
    }

    /// Enabled mask of one group.
    #[must_use]
    pub const fn enabled(&self, group: usize) -> u16 {
        self.enabled[group]
    }

    /// Pending request mask of one group.
    #[must_use]
    pub const fn request(&self, group: usize) -> u16 {
        self.request[group]
    }

    /// Active mask of one group.
    #[must_use]
    pub const fn active(&self, group: usize) -> u16 {
        self.active[group]
    }

    /// PIE: enables the masked levels of a group.
    pub fn enable(&mut self, group: usize, mask: u16) {
        self.enabled[group % INTERRUPT_GROUPS] |= mask & LEVEL_MASK;
    }

    /// PID: disables the masked levels of a group. Active levels stay
    /// active; disabling only gates future selection.
    pub fn disable(&mut self, group: usize, mask: u16) {
        self.enabled[group % INTERRUPT_GROUPS] &= !(mask & LEVEL_MASK);
    }

    /// Folds one unit's request lines into the pending requests.
    pub fn post_requests(&mut self, lines: &[u16; INTERRUPT_GROUPS + 1]) {
        for (group, line) in lines.iter().take(INTERRUPT_GROUPS).enumerate() {
            if *line != 0 {
                self.request[group] |= line & LEVEL_MASK;
            }
        }
    }

    /// Arms the one-cycle post-instruction lockout.
    pub fn block(&mut self) {
        self.blocked = true;
    }

    /// Arms the pending TOI dismissal.
    pub fn arm_toi(&mut self) {
        self.toi = true;
    }

    /// True while a TOI dismissal is pending.
    #[must_use]
    pub const fn toi_pending(&self) -> bool {
        self.toi
    }

    /// True when no level is active in any group.
    #[must_use]
    pub fn idle(&self) -> bool {
        self.active.iter().all(|mask| *mask == 0)
    }

    /// Consumes the lockout shadow; returns true when this cycle is gated.
    fn take_blocked(&mut self) -> bool {
        std::mem::replace(&mut self.blocked, false)
    }

    /// Scans for a request that outranks the current selection. A candidate
    /// preempts from a strictly lower-numbered group, or from the same
    /// group when its highest bit outranks the latched mask.
    fn select(&self) -> Option<(u8, u8)> {
        let limit = self.group.min(GROUP_NONE);
        for group in 0..INTERRUPT_GROUPS.min(limit as usize + 1) {
            let candidate = self.request[group] & self.enabled[group];
            let Some(bit) = highest_bit(candidate) else {
                if group as u8 == self.group {
                    break;
                }
                continue;
            };
            if (group as u8) < self.group {
                return Some((group as u8, bit));
            }
            // same group: must strictly outrank the active level
            let current = highest_bit(self.mask).unwrap_or(0);
            if bit > current {
                return Some((group as u8, bit));
            }
            break;
        }
        None
    }

    /// Latches a selection and marks its level active.
    fn activate(&mut self, group: u8, bit: u8) {
        self.group = group;
        self.mask = 1 << bit;
        self.level = level_of_bit(bit);
        self.active[group as usize] |= self.mask;
    }

    /// TOI dismissal: drops the current level from active and request
    /// state, clears the pending flag and restores the next-highest active
    /// level. Returns true when some level remains active.
    pub(crate) fn dismiss(&mut self) -> bool {
        self.toi = false;
        self.drop_current()
    }

    /// Drops the current level from active and request state, then restores
    /// the next-highest active level, if any. Returns true when some level
    /// remains active.
    fn drop_current(&mut self) -> bool {
        if self.group == GROUP_NONE {
            return false;
        }
        let group = self.group as usize;
        self.active[group] &= !self.mask;
        self.request[group] &= !self.mask;

        for group in 0..INTERRUPT_GROUPS {
            if let Some(bit) = highest_bit(self.active[group]) {
                self.group = group as u8;
                self.mask = 1 << bit;
                self.level = level_of_bit(bit);
                return true;
            }
        }
        self.group = GROUP_NONE;
        self.level = 0;
        self.mask = 0;
        false
    }
}

impl Machine {
    /// One interrupt-engine cycle: aggregate, gate, select, vector.
    pub fn interrupt_step(&mut self) {
        for device in self.units().attached() {
            if let Some(lines) = device.interrupts() {
                self.interrupts_mut().post_requests(&lines);
            }
        }

        if self.interrupts_mut().take_blocked() {
            return;
        }

        let Some((group, bit)) = self.interrupts().select() else {
            return;
        };
        self.interrupts_mut().activate(group, bit);
        self.controls().set_interrupt(true);

        let (level, vector) = {
            let ints = self.interrupts();
            (ints.level(), vector_address(group, ints.level()))
        };
        trace!(group, level, vector, "interrupt dispatch");

        // Implicit SPB* through the vector word.
        let target = self.read_mem(vector) & PC_MASK;
        let pc = self.regs().pc();
        self.write_mem(target, pc);
        self.write_pc(target.wrapping_add(1) & PC_MASK);
        let fetched = self.read_mem(self.regs().pc());
        self.regs_mut().set_t(fetched);
        self.write_ir(fetched);
        self.interrupts_mut().block();
    }

    /// Applies the pending TOI: dismisses the active level and restores the
    /// next-highest one, clearing the panel indicator when none remains.
    pub(crate) fn dismiss_interrupt(&mut self) {
        let group = self.interrupts().group();
        let level = self.interrupts().level();
        let any_left = self.interrupts_mut().dismiss();
        if !any_left {
            self.controls().set_interrupt(false);
        }
        trace!(group, level, "interrupt dismissed");
    }
}
