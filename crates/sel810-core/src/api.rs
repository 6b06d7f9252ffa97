//! Host-facing machine type and run-loop controller surface.
//!
//! The executor flow owns the [`Machine`] and is the only writer of
//! registers, memory and interrupt tables. Other flows steer it through the
//! shared handles: [`ControlFlags`] for halt/step/IOHOLD, the
//! [`BreakpointStore`] for debugger configuration and the [`UnitTable`] for
//! attach/detach.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::Serialize;
use tracing::warn;

use crate::disasm::disassemble;
use crate::interrupt::InterruptFile;
use crate::memory::{AccessKind, BreakRegister, BreakpointStore, CoreMemory};
use crate::panel::PanelMirror;
use crate::peripherals::{AttachError, Peripheral, UnitTable};
use crate::state::{ControlFlags, HaltReason, Registers, RunState};

/// How long the halted run loop parks between gate checks.
const HALT_SPIN: Duration = Duration::from_millis(1);

/// Status of one instruction step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepOutcome {
    /// The instruction retired normally.
    Retired,
    /// The instruction was HLT; the run loop is gated.
    Halted,
    /// A breakpoint fired during the step; the run loop is gated.
    Breakpoint,
}

/// Read-only machine snapshot for host inspection.
#[derive(Debug, Clone, Serialize)]
pub struct MachineSnapshot {
    /// Architectural register file.
    pub registers: Registers,
    /// Active interrupt group, 8 when idle.
    pub int_group: u8,
    /// Active interrupt level, 0 when idle.
    pub int_level: u8,
    /// True when the run loop is gated.
    pub halted: bool,
}

/// The emulated 810A: registers, core memory, interrupt file, attached
/// units and the front-panel mirror.
pub struct Machine {
    regs: Registers,
    memory: CoreMemory,
    interrupts: InterruptFile,
    units: Arc<UnitTable>,
    breakpoints: Arc<BreakpointStore>,
    controls: Arc<ControlFlags>,
    panel: PanelMirror,
    run_state: RunState,
    broke: bool,
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

impl Machine {
    /// Creates a halted machine with empty memory and no attached units.
    #[must_use]
    pub fn new() -> Self {
        Self {
            regs: Registers::default(),
            memory: CoreMemory::new(),
            interrupts: InterruptFile::new(),
            units: Arc::new(UnitTable::new()),
            breakpoints: Arc::new(BreakpointStore::new()),
            controls: Arc::new(ControlFlags::new()),
            panel: PanelMirror::default(),
            run_state: RunState::default(),
            broke: false,
        }
    }

    /// Architectural registers, read-only.
    #[must_use]
    pub const fn regs(&self) -> &Registers {
        &self.regs
    }

    /// Architectural registers, writable. Register-value breakpoints only
    /// watch the dedicated write helpers, matching the hardware debug
    /// surface: operator stores through the panel bypass them.
    pub const fn regs_mut(&mut self) -> &mut Registers {
        &mut self.regs
    }

    /// Core memory, read-only and breakpoint-free.
    #[must_use]
    pub const fn memory(&self) -> &CoreMemory {
        &self.memory
    }

    /// Core memory, writable and breakpoint-free (panel deposits).
    pub const fn memory_mut(&mut self) -> &mut CoreMemory {
        &mut self.memory
    }

    /// Interrupt file, read-only.
    #[must_use]
    pub const fn interrupts(&self) -> &InterruptFile {
        &self.interrupts
    }

    /// Interrupt file, writable.
    pub const fn interrupts_mut(&mut self) -> &mut InterruptFile {
        &mut self.interrupts
    }

    /// Shared control flags.
    #[must_use]
    pub fn controls(&self) -> &ControlFlags {
        &self.controls
    }

    /// Clones the control-flag handle for another flow.
    #[must_use]
    pub fn controls_handle(&self) -> Arc<ControlFlags> {
        Arc::clone(&self.controls)
    }

    /// Attached-unit table.
    #[must_use]
    pub fn units(&self) -> &UnitTable {
        &self.units
    }

    /// Clones the unit-table handle for another flow.
    #[must_use]
    pub fn units_handle(&self) -> Arc<UnitTable> {
        Arc::clone(&self.units)
    }

    /// Breakpoint store.
    #[must_use]
    pub fn breakpoints(&self) -> &BreakpointStore {
        &self.breakpoints
    }

    /// Clones the breakpoint-store handle for another flow.
    #[must_use]
    pub fn breakpoints_handle(&self) -> Arc<BreakpointStore> {
        Arc::clone(&self.breakpoints)
    }

    /// Front-panel mirror.
    pub const fn panel_mut(&mut self) -> &mut PanelMirror {
        &mut self.panel
    }

    /// Current run state.
    #[must_use]
    pub const fn run_state(&self) -> RunState {
        self.run_state
    }

    /// Builds a serializable snapshot for host inspection.
    #[must_use]
    pub fn snapshot(&self) -> MachineSnapshot {
        MachineSnapshot {
            registers: self.regs.clone(),
            int_group: self.interrupts.group(),
            int_level: self.interrupts.level(),
            halted: self.controls.halted(),
        }
    }

    // ---- breakpoint-checked access paths (executor flow) ----

    /// Reads memory, firing any read breakpoint on the address.
    pub fn read_mem(&mut self, addr: u16) -> u16 {
        let word = self.memory.read(addr);
        if self.breakpoints.check_access(AccessKind::Read, addr) {
            self.fire_break("read", addr);
        }
        word
    }

    /// Writes memory, firing any write breakpoint on the address.
    pub fn write_mem(&mut self, addr: u16, word: u16) {
        self.memory.write(addr, word);
        if self.breakpoints.check_access(AccessKind::Write, addr) {
            self.fire_break("write", addr);
        }
    }

    /// Writes A, firing any value breakpoint.
    pub fn write_a(&mut self, value: u16) {
        self.regs.set_a(value);
        if self.breakpoints.check_value(BreakRegister::A, value) {
            self.fire_break("A", value);
        }
    }

    /// Writes B, firing any value breakpoint.
    pub fn write_b(&mut self, value: u16) {
        self.regs.set_b(value);
        if self.breakpoints.check_value(BreakRegister::B, value) {
            self.fire_break("B", value);
        }
    }

    /// Writes IR, firing any value breakpoint.
    pub fn write_ir(&mut self, value: u16) {
        self.regs.set_ir(value);
        if self.breakpoints.check_value(BreakRegister::Ir, value) {
            self.fire_break("IR", value);
        }
    }

    /// Writes PC (masked to 15 bits), firing any value breakpoint.
    pub fn write_pc(&mut self, value: u16) {
        self.regs.set_pc(value);
        let masked = self.regs.pc();
        if self.breakpoints.check_value(BreakRegister::Pc, masked) {
            self.fire_break("PC", masked);
        }
    }

    fn fire_break(&mut self, kind: &'static str, matched: u16) {
        let pc = self.regs.pc();
        let ir = self.regs.ir();
        warn!(
            kind,
            matched,
            pc,
            ir,
            mnemonic = %disassemble(ir),
            "breakpoint fired"
        );
        self.broke = true;
        self.run_state = RunState::Stopped(HaltReason::Breakpoint);
        self.controls.set_halt(true);
    }

    pub(crate) fn clear_break_latch(&mut self) {
        self.broke = false;
    }

    #[must_use]
    pub(crate) fn break_latched(&self) -> bool {
        self.broke
    }

    pub(crate) fn halt_with(&mut self, reason: HaltReason) {
        self.run_state = RunState::Stopped(reason);
        self.controls.set_halt(true);
    }

    // ---- controller surface ----

    /// Master clear: zeroes A, B, T, IR, PC, VBR, OVF and CF, then refreshes
    /// the panel. Idempotent.
    pub fn master_clear(&mut self) {
        self.regs.master_clear();
        self.refresh_panel();
    }

    /// Stores a program image (big-endian byte pairs) starting at `start`.
    pub fn load_image(&mut self, start: u16, image: &[u8]) {
        self.memory.load_image(start, image);
    }

    /// Latches `M[PC]` into T and IR, establishing the prefetch invariant
    /// before the first step of a freshly loaded program.
    pub fn prime(&mut self) {
        let word = self.memory.read(self.regs.pc());
        self.regs.set_t(word);
        self.regs.set_ir(word);
    }

    /// Sets the operator control switches.
    pub fn set_switches(&mut self, value: u16) {
        self.regs.set_sr(value);
    }

    /// Attaches a device at `unit`.
    ///
    /// # Errors
    ///
    /// Returns [`AttachError::UnitOutOfRange`] for a unit id beyond the
    /// 6-bit field.
    pub fn attach(&self, unit: u8, device: Arc<dyn Peripheral>) -> Result<(), AttachError> {
        self.units.attach(unit, device)
    }

    /// Detaches the device at `unit`; false when the slot was empty.
    pub fn detach(&self, unit: u8) -> bool {
        self.units.detach(unit)
    }

    /// Gates the run loop.
    pub fn halt(&self) {
        self.controls.set_halt(true);
    }

    /// Releases the run loop.
    pub fn resume(&self) {
        self.controls.set_halt(false);
    }

    /// Arms a single step.
    pub fn arm_step(&self) {
        self.controls.arm_step();
    }

    /// Abandons a stalled I/O wait.
    pub fn release_io_hold(&self) {
        self.controls.release_io_hold();
    }

    /// One CPU step followed by one interrupt step, then a panel refresh.
    pub fn step_cycle(&mut self) -> StepOutcome {
        let outcome = self.execute_step();
        self.interrupt_step();
        self.refresh_panel();
        outcome
    }

    /// The executor flow: alternates CPU steps and interrupt steps until
    /// halted, spinning on the halt gate (with single-step service) until
    /// teardown is requested.
    pub fn run(&mut self) {
        while !self.controls.shutdown() {
            if self.controls.halted() {
                if self.run_state == RunState::Running {
                    self.run_state = RunState::Stopped(HaltReason::External);
                }
                if self.controls.take_step() {
                    self.step_cycle();
                } else {
                    thread::sleep(HALT_SPIN);
                }
            } else {
                self.run_state = RunState::Running;
                self.step_cycle();
            }
        }
    }

    /// Tears the machine down: stops the run loop and releases every
    /// attached unit exactly once.
    pub fn shutdown(&mut self) {
        self.controls.request_shutdown();
        self.controls.set_halt(true);
        self.units.detach_all();
        self.refresh_panel();
    }

    fn refresh_panel(&mut self) {
        self.panel
            .refresh(&self.regs, &self.interrupts, &self.controls);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{Machine, StepOutcome};
    use crate::memory::{AccessKind, BreakRegister, BREAK_ALWAYS};
    use crate::peripherals::AttachError;
    use crate::state::HaltReason;

    #[test]
    fn new_machine_is_halted_with_clear_state() {
        let machine = Machine::new();
        assert!(machine.controls().halted());
        assert_eq!(
            machine.run_state().halt_reason(),
            Some(HaltReason::External)
        );
        assert_eq!(machine.regs().pc(), 0);
    }

    #[test]
    fn read_breakpoint_halts_and_latches() {
        let mut machine = Machine::new();
        machine.breakpoints().set_access(AccessKind::Read, 0o100, BREAK_ALWAYS);
        machine.resume();
        let _ = machine.read_mem(0o100);
        assert!(machine.break_latched());
        assert!(machine.controls().halted());
        assert_eq!(
            machine.run_state().halt_reason(),
            Some(HaltReason::Breakpoint)
        );
    }

    #[test]
    fn value_breakpoint_watches_the_write_helper() {
        let mut machine = Machine::new();
        machine
            .breakpoints()
            .set_value(BreakRegister::A, 0x1234, true);
        machine.write_a(0x1233);
        assert!(!machine.break_latched());
        machine.write_a(0x1234);
        assert!(machine.break_latched());
    }

    #[test]
    fn step_cycle_executes_exactly_one_instruction() {
        let mut machine = Machine::new();
        // LAA 0o10 ; M[0o10] = 0o777
        machine.memory_mut().write(0, 0o01 << 12 | 0o10);
        machine.memory_mut().write(0o10, 0o777);
        machine.prime();
        let outcome = machine.step_cycle();
        assert_eq!(outcome, StepOutcome::Retired);
        assert_eq!(machine.regs().a(), 0o777);
        assert_eq!(machine.regs().pc(), 1);
        // prefetch invariant
        assert_eq!(machine.regs().ir(), machine.memory().read(1));
    }

    #[test]
    fn attach_rejects_out_of_range_units() {
        let machine = Machine::new();
        struct Dead;
        impl crate::peripherals::Peripheral for Dead {
            fn test_ready(&self, _cmd: u16) -> bool {
                false
            }
            fn test(&self, _cmd: u16) -> bool {
                false
            }
            fn command_ready(&self) -> bool {
                false
            }
            fn command(&self, _cmd: u16) -> bool {
                false
            }
            fn read_ready(&self) -> bool {
                false
            }
            fn read(&self) -> (bool, u16) {
                (false, 0)
            }
            fn write_ready(&self) -> bool {
                false
            }
            fn write(&self, _word: u16) -> bool {
                false
            }
        }
        assert_eq!(
            machine.attach(0o100, Arc::new(Dead)),
            Err(AttachError::UnitOutOfRange(0o100))
        );
        assert!(machine.attach(0o77, Arc::new(Dead)).is_ok());
    }

    #[test]
    fn master_clear_twice_equals_once() {
        let mut machine = Machine::new();
        machine.regs_mut().set_a(5);
        machine.regs_mut().set_pc(0o100);
        machine.master_clear();
        let snap_once = machine.snapshot();
        machine.master_clear();
        let snap_twice = machine.snapshot();
        assert_eq!(snap_once.registers, snap_twice.registers);
        assert_eq!(machine.regs().a(), 0);
        assert_eq!(machine.regs().pc(), 0);
    }
}
