/// Architectural register file.
pub mod registers;
/// Run-state machine and shared control flags.
pub mod run_state;

pub use registers::{Registers, PC_MASK, VBR_MASK};
pub use run_state::{ControlFlags, HaltReason, RunState};
