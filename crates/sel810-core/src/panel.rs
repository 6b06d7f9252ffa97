//! Front-panel state mirror.
//!
//! A plain structure of scalar fields plus a dirty flag. The executor flow
//! refreshes it after every step; the front-panel flow serializes it as a
//! length-prefixed JSON frame (2-byte big-endian length, UTF-8 body) and
//! pushes it over the port-8100 protocol. The transport itself lives
//! outside this crate.
//!
//! The PWM arrays model indicator persistence: each lamp's duty cycle
//! decays by half per refresh, so a bit that flickers for one instruction
//! still registers on the panel.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::interrupt::InterruptFile;
use crate::state::{ControlFlags, Registers};

/// How often the front-panel flow pushes a dirty mirror.
pub const PANEL_PUSH_PERIOD: Duration = Duration::from_millis(200);

/// Frame-encoding failures.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The mirror did not serialize.
    #[error("panel frame encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
    /// The JSON body exceeds the 2-byte length prefix.
    #[error("panel frame body of {0} bytes exceeds the frame format")]
    Oversize(usize),
}

/// Scalar snapshot of everything the panel displays.
#[derive(Debug, Clone, Serialize)]
pub struct PanelMirror {
    a: u16,
    b: u16,
    x: u16,
    pc: u16,
    ir: u16,
    t: u16,
    sr: u16,
    vbr: u16,
    cf: bool,
    xp: bool,
    ovf: bool,
    halted: bool,
    io_hold: bool,
    interrupt: bool,
    int_group: u8,
    int_level: u8,
    pwm_a: [u8; 16],
    pwm_b: [u8; 16],
    pwm_pc: [u8; 15],
    #[serde(skip)]
    dirty: bool,
}

impl Default for PanelMirror {
    fn default() -> Self {
        Self {
            a: 0,
            b: 0,
            x: 0,
            pc: 0,
            ir: 0,
            t: 0,
            sr: 0,
            vbr: 0,
            cf: false,
            xp: false,
            ovf: false,
            halted: true,
            io_hold: false,
            interrupt: false,
            int_group: crate::interrupt::GROUP_NONE,
            int_level: 0,
            pwm_a: [0; 16],
            pwm_b: [0; 16],
            pwm_pc: [0; 15],
            dirty: true,
        }
    }
}

fn decay_into(lamps: &mut [u8], value: u16) {
    for (bit, lamp) in lamps.iter_mut().enumerate() {
        let lit = value >> bit & 1 != 0;
        *lamp = *lamp / 2 + if lit { 128 } else { 0 };
    }
}

impl PanelMirror {
    /// Refreshes the mirror from machine state. Executor flow only.
    pub fn refresh(&mut self, regs: &Registers, interrupts: &InterruptFile, flags: &ControlFlags) {
        self.a = regs.a();
        self.b = regs.b();
        self.x = regs.x();
        self.pc = regs.pc();
        self.ir = regs.ir();
        self.t = regs.t();
        self.sr = regs.sr();
        self.vbr = regs.vbr();
        self.cf = regs.cf();
        self.xp = regs.xp();
        self.ovf = regs.ovf();
        self.halted = flags.halted();
        self.io_hold = flags.io_hold();
        self.interrupt = flags.interrupt();
        self.int_group = interrupts.group();
        self.int_level = interrupts.level();
        decay_into(&mut self.pwm_a, regs.a());
        decay_into(&mut self.pwm_b, regs.b());
        decay_into(&mut self.pwm_pc, regs.pc());
        self.dirty = true;
    }

    /// True when the mirror changed since the last frame was taken.
    #[must_use]
    pub const fn dirty(&self) -> bool {
        self.dirty
    }

    /// Encodes the mirror as one protocol frame and clears the dirty flag.
    /// Returns `None` when nothing changed.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError`] when the body fails to serialize or does not
    /// fit the 2-byte length prefix.
    pub fn take_frame(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        if !self.dirty {
            return Ok(None);
        }
        let frame = self.encode_frame()?;
        self.dirty = false;
        Ok(Some(frame))
    }

    /// Encodes the mirror as one length-prefixed JSON frame.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError`] when the body fails to serialize or does not
    /// fit the 2-byte length prefix.
    pub fn encode_frame(&self) -> Result<Vec<u8>, FrameError> {
        let body = serde_json::to_vec(self)?;
        let length = u16::try_from(body.len()).map_err(|_| FrameError::Oversize(body.len()))?;
        let mut frame = Vec::with_capacity(body.len() + 2);
        frame.extend_from_slice(&length.to_be_bytes());
        frame.extend_from_slice(&body);
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::PanelMirror;
    use crate::interrupt::InterruptFile;
    use crate::state::{ControlFlags, Registers};

    #[test]
    fn frames_are_length_prefixed_json() {
        let mirror = PanelMirror::default();
        let frame = mirror.encode_frame().expect("encode");
        let length = u16::from_be_bytes([frame[0], frame[1]]) as usize;
        assert_eq!(length, frame.len() - 2);
        let body: serde_json::Value =
            serde_json::from_slice(&frame[2..]).expect("body is JSON");
        assert_eq!(body["pc"], 0);
        assert_eq!(body["halted"], true);
        assert!(body.get("dirty").is_none());
    }

    #[test]
    fn take_frame_consumes_the_dirty_flag() {
        let mut mirror = PanelMirror::default();
        assert!(mirror.take_frame().expect("encode").is_some());
        assert!(mirror.take_frame().expect("encode").is_none());

        let regs = Registers::default();
        let ints = InterruptFile::new();
        let flags = ControlFlags::new();
        mirror.refresh(&regs, &ints, &flags);
        assert!(mirror.dirty());
        assert!(mirror.take_frame().expect("encode").is_some());
    }

    #[test]
    fn lamp_persistence_decays_by_halves() {
        let mut mirror = PanelMirror::default();
        let mut regs = Registers::default();
        let ints = InterruptFile::new();
        let flags = ControlFlags::new();

        regs.set_a(0x0001);
        mirror.refresh(&regs, &ints, &flags);
        assert_eq!(mirror.pwm_a[0], 128);
        regs.set_a(0);
        mirror.refresh(&regs, &ints, &flags);
        assert_eq!(mirror.pwm_a[0], 64);
        mirror.refresh(&regs, &ints, &flags);
        assert_eq!(mirror.pwm_a[0], 32);
    }
}
