//! Debugger breakpoint store, co-located with core memory.
//!
//! Two families of breakpoints exist: per-address access counters (read and
//! write) and per-value bitmaps over the register-write helpers for A, B,
//! IR and PC. A counter of -1 breaks on every match without decrementing; a
//! positive counter decrements on match and fires on the 1 -> 0 transition.
//!
//! Configuration happens from the panel/debugger flow, matching happens on
//! the executor hot path. The counters live under one lock; a per-category
//! "any set" flag lets the hot path skip the lock entirely while no
//! breakpoint of that category exists.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::memory::MEMORY_WORDS;

/// Sentinel counter value: break on every match, never decrement.
pub const BREAK_ALWAYS: i16 = -1;

const VALUE_BITMAP_WORDS: usize = (u16::MAX as usize + 1) / u64::BITS as usize;

/// Memory access direction a counter breakpoint watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessKind {
    /// Fires on `read(addr)`.
    Read,
    /// Fires on `write(addr, _)`.
    Write,
}

impl AccessKind {
    const fn index(self) -> usize {
        match self {
            Self::Read => 0,
            Self::Write => 1,
        }
    }
}

/// Register watched by a value breakpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BreakRegister {
    /// The A accumulator.
    A,
    /// The B accumulator.
    B,
    /// The instruction register.
    Ir,
    /// The program counter.
    Pc,
}

impl BreakRegister {
    const fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
            Self::Ir => 2,
            Self::Pc => 3,
        }
    }
}

struct AccessTable {
    counts: Box<[i16]>,
    live: usize,
}

impl AccessTable {
    fn new() -> Self {
        Self {
            counts: vec![0; MEMORY_WORDS].into_boxed_slice(),
            live: 0,
        }
    }
}

struct ValueTable {
    bits: Box<[u64]>,
    live: usize,
}

impl ValueTable {
    fn new() -> Self {
        Self {
            bits: vec![0; VALUE_BITMAP_WORDS].into_boxed_slice(),
            live: 0,
        }
    }

    fn get(&self, value: u16) -> bool {
        self.bits[usize::from(value) / 64] & (1 << (value % 64)) != 0
    }

    fn set(&mut self, value: u16, enable: bool) {
        let slot = &mut self.bits[usize::from(value) / 64];
        let mask = 1u64 << (value % 64);
        let was = *slot & mask != 0;
        if enable {
            *slot |= mask;
            if !was {
                self.live += 1;
            }
        } else {
            *slot &= !mask;
            if was {
                self.live -= 1;
            }
        }
    }
}

struct Tables {
    access: [AccessTable; 2],
    value: [ValueTable; 4],
}

/// Shared breakpoint store. Counter updates happen under the inner lock;
/// the any-set flags are plain atomics maintained under that same lock.
pub struct BreakpointStore {
    any_access: [AtomicBool; 2],
    any_value: [AtomicBool; 4],
    inner: Mutex<Tables>,
}

impl Default for BreakpointStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BreakpointStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            any_access: [AtomicBool::new(false), AtomicBool::new(false)],
            any_value: std::array::from_fn(|_| AtomicBool::new(false)),
            inner: Mutex::new(Tables {
                access: [AccessTable::new(), AccessTable::new()],
                value: std::array::from_fn(|_| ValueTable::new()),
            }),
        }
    }

    /// Configures an access breakpoint. `count` of [`BREAK_ALWAYS`] breaks on
    /// every match; a positive count arms a countdown; 0 clears the entry.
    pub fn set_access(&self, kind: AccessKind, addr: u16, count: i16) {
        let addr = usize::from(addr) % MEMORY_WORDS;
        let mut tables = self.inner.lock().expect("breakpoint lock");
        let table = &mut tables.access[kind.index()];
        let was_live = table.counts[addr] != 0;
        table.counts[addr] = count;
        match (was_live, count != 0) {
            (false, true) => table.live += 1,
            (true, false) => table.live -= 1,
            _ => {}
        }
        self.any_access[kind.index()].store(table.live > 0, Ordering::Relaxed);
    }

    /// Configures a register-value breakpoint for `register` at `value`.
    pub fn set_value(&self, register: BreakRegister, value: u16, enable: bool) {
        let mut tables = self.inner.lock().expect("breakpoint lock");
        let table = &mut tables.value[register.index()];
        table.set(value, enable);
        self.any_value[register.index()].store(table.live > 0, Ordering::Relaxed);
    }

    /// Removes every configured breakpoint.
    pub fn clear(&self) {
        let mut tables = self.inner.lock().expect("breakpoint lock");
        for table in &mut tables.access {
            table.counts.fill(0);
            table.live = 0;
        }
        for table in &mut tables.value {
            table.bits.fill(0);
            table.live = 0;
        }
        for flag in &self.any_access {
            flag.store(false, Ordering::Relaxed);
        }
        for flag in &self.any_value {
            flag.store(false, Ordering::Relaxed);
        }
    }

    /// Hot-path check for one memory access. Returns true when a breakpoint
    /// fires: a -1 counter matches without decrement, a positive counter
    /// fires on the 1 -> 0 transition.
    #[must_use]
    pub fn check_access(&self, kind: AccessKind, addr: u16) -> bool {
        if !self.any_access[kind.index()].load(Ordering::Relaxed) {
            return false;
        }
        let addr = usize::from(addr) % MEMORY_WORDS;
        let mut tables = self.inner.lock().expect("breakpoint lock");
        let table = &mut tables.access[kind.index()];
        match table.counts[addr] {
            0 => false,
            count if count < 0 => true,
            count => {
                table.counts[addr] = count - 1;
                if count == 1 {
                    table.live -= 1;
                    self.any_access[kind.index()].store(table.live > 0, Ordering::Relaxed);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Hot-path check for one register write. The value is the raw 16-bit
    /// pattern, so negative accumulator contents index as `value as u16`.
    #[must_use]
    pub fn check_value(&self, register: BreakRegister, value: u16) -> bool {
        if !self.any_value[register.index()].load(Ordering::Relaxed) {
            return false;
        }
        let tables = self.inner.lock().expect("breakpoint lock");
        tables.value[register.index()].get(value)
    }
}
