//! # sel810-core
//!
//! CPU core and I/O subsystem of an emulator for the SEL 810A, a 16-bit
//! minicomputer of late-1960s design.
//!
//! The 810A packs its architecture into a single 16-bit word format:
//!
//!  - Two signed accumulators (`A`, `B`), a program counter confined to a
//!    32K word space, and a handful of operator-visible registers (`T`,
//!    `SR`, `VBR`, the protect shadow `PPR`).
//!  - 32,768 words of magnetic-core memory with base-relative,
//!    page-relative, indexed and chained-indirect addressing.
//!  - A priority-vectored interrupt system: eight groups of twelve levels,
//!    dispatched through a fixed vector table by an implicit
//!    store-place-and-branch and dismissed by TOI.
//!  - Memory-mapped peripheral I/O in blocking (WAIT) and non-blocking
//!    (SKIP) forms, with the IOHOLD stall coupling the synchronous CPU to
//!    asynchronous devices.
//!  - A debugger surface of address breakpoints (read/write counters) and
//!    register-value breakpoints, plus single-step control.
//!
//! Device models, transports and loaders live outside this crate; they
//! plug in through the [`peripherals::Peripheral`] capability set and the
//! shared control handles on [`Machine`].

/// Host-facing machine type and run-loop controller surface.
pub mod api;
pub use api::{Machine, MachineSnapshot, StepOutcome};

/// Architectural state: registers, run state, shared control flags.
pub mod state;
pub use state::{ControlFlags, HaltReason, Registers, RunState, PC_MASK, VBR_MASK};

/// Core memory and the breakpoint store.
pub mod memory;
pub use memory::{
    AccessKind, BreakRegister, BreakpointStore, CoreMemory, ADDR_MASK, BREAK_ALWAYS, MEMORY_WORDS,
};

/// Opcode classification tables and field extraction.
pub mod encoding;
pub use encoding::{AugmentedOp, ControlIoOp, DataIoOp, IoMode, MemoryOp, OP_MPY};

/// Instruction decode.
pub mod decoder;
pub use decoder::{decode, Instruction};

/// Mnemonic rendering for diagnostics and the panel.
pub mod disasm;
pub use disasm::disassemble;

/// Instruction execution.
pub mod execute;

/// SKIP/WAIT arbitration and IOHOLD.
pub mod io;
pub use io::{HOLD_POLL_CONTROL, HOLD_POLL_DATA, INDICATOR_LAG, READY_POLL};

/// Priority interrupt engine.
pub mod interrupt;
pub use interrupt::{vector_address, InterruptFile, GROUP_NONE, INTERRUPT_GROUPS};

/// Peripheral capability set and the attached-unit table.
pub mod peripherals;
pub use peripherals::{
    AttachError, InterruptLines, Peripheral, UnitTable, CONSOLE_PORT, FRONT_PANEL_PORT,
    INTERRUPT_SLOTS, MAX_UNIT,
};

/// Front-panel state mirror and frame codec.
pub mod panel;
pub use panel::{FrameError, PanelMirror, PANEL_PUSH_PERIOD};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
