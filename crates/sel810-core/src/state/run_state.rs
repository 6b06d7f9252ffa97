use std::sync::atomic::{AtomicBool, Ordering};

/// Why the run loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HaltReason {
    /// Operator action (panel halt, or the machine has not been started).
    External,
    /// The program executed HLT.
    Halted,
    /// A memory or register breakpoint fired.
    Breakpoint,
}

/// Execution-state machine observed by the run-loop controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    /// Stopped; the executor spins until released or single-stepped.
    Stopped(HaltReason),
    /// Executing instructions.
    Running,
}

impl Default for RunState {
    fn default() -> Self {
        Self::Stopped(HaltReason::External)
    }
}

impl RunState {
    /// Returns the halt reason when the machine is stopped.
    #[must_use]
    pub const fn halt_reason(self) -> Option<HaltReason> {
        match self {
            Self::Stopped(reason) => Some(reason),
            Self::Running => None,
        }
    }
}

/// Volatile one-bit conditions shared between the executor flow, the
/// front-panel flow and peripheral workers. Single-flag transitions need no
/// lock; readers tolerate staleness.
#[derive(Debug, Default)]
pub struct ControlFlags {
    halt: AtomicBool,
    step: AtomicBool,
    io_hold: AtomicBool,
    io_release: AtomicBool,
    interrupt: AtomicBool,
    shutdown: AtomicBool,
}

impl ControlFlags {
    /// Creates the flag block in the halted state.
    #[must_use]
    pub fn new() -> Self {
        let flags = Self::default();
        flags.halt.store(true, Ordering::Relaxed);
        flags
    }

    /// True when the run loop is gated.
    #[must_use]
    pub fn halted(&self) -> bool {
        self.halt.load(Ordering::Relaxed)
    }

    /// Gates or releases the run loop.
    pub fn set_halt(&self, value: bool) {
        self.halt.store(value, Ordering::Relaxed);
    }

    /// Arms a single step.
    pub fn arm_step(&self) {
        self.step.store(true, Ordering::Relaxed);
    }

    /// Consumes an armed step, if any.
    #[must_use]
    pub fn take_step(&self) -> bool {
        self.step.swap(false, Ordering::Relaxed)
    }

    /// True while an I/O instruction is stalled past the indicator lag.
    #[must_use]
    pub fn io_hold(&self) -> bool {
        self.io_hold.load(Ordering::Relaxed)
    }

    /// Advertises or clears the IOHOLD stall.
    pub fn set_io_hold(&self, value: bool) {
        self.io_hold.store(value, Ordering::Relaxed);
    }

    /// Abandons the current IOHOLD wait; the stalled I/O call re-checks
    /// readiness once more and gives up.
    pub fn release_io_hold(&self) {
        self.io_release.store(true, Ordering::Relaxed);
    }

    /// Consumes a pending IOHOLD release.
    #[must_use]
    pub fn take_io_release(&self) -> bool {
        self.io_release.swap(false, Ordering::Relaxed)
    }

    /// True while any interrupt level is active (panel indicator).
    #[must_use]
    pub fn interrupt(&self) -> bool {
        self.interrupt.load(Ordering::Relaxed)
    }

    /// Raises or drops the interrupt indicator.
    pub fn set_interrupt(&self, value: bool) {
        self.interrupt.store(value, Ordering::Relaxed);
    }

    /// True once teardown has been requested; the run loop exits.
    #[must_use]
    pub fn shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Requests teardown of the executor flow.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}
