//! Instruction executor.
//!
//! One call to [`Machine::execute_step`] runs the instruction latched in
//! `IR`, applies the PC increment (default 1, plus 1 per fired skip, 0 for
//! jumps and HLT) and prefetches the next instruction through `T` into
//! `IR`. The step never returns an error: undefined encodings are no-ops
//! and device trouble surfaces as a failed transfer.

/// Effective-address computation.
pub(crate) mod ea;
/// Arithmetic and shift helpers.
pub mod helpers;

use helpers::{
    add_with_carry, pair_join, rotate_frl, shift_fla, shift_fll, shift_fra, shift_lsa, shift_lsl,
    shift_rsa, shift_rsl, sub_with_borrow,
};

use crate::api::{Machine, StepOutcome};
use crate::decoder::{decode, Instruction};
use crate::encoding::{
    opcode, AugmentedOp, ControlIoOp, DataIoOp, IoMode, MemoryOp, OP_MPY,
};
use crate::state::{HaltReason, PC_MASK};

impl Machine {
    /// Executes the instruction in `IR` and prefetches the next one.
    pub fn execute_step(&mut self) -> StepOutcome {
        self.clear_break_latch();
        let word = self.regs().ir();
        let instr = decode(word);

        let mut halted = false;
        let pc_inc = match instr {
            Instruction::MemoryRef { op, x, i, m, disp } => {
                self.exec_memory_ref(op, x, i, m, disp)
            }
            Instruction::Augmented { op, count } => self.exec_augmented(op, count, &mut halted),
            Instruction::ControlIo { op, i, unit } => self.exec_control_io(op, i, unit),
            Instruction::DataIo { op, mode, r, unit } => self.exec_data_io(op, mode, r, unit),
            Instruction::Undefined(_) => 1,
        };

        // Carry discipline: CSB's set survives its own step, MPY preserves,
        // everything else clears.
        let csb = matches!(
            instr,
            Instruction::Augmented {
                op: AugmentedOp::Csb,
                ..
            }
        );
        if !csb && opcode(word) != OP_MPY {
            self.regs_mut().set_cf(false);
        }

        let next_pc = self.regs().pc().wrapping_add(pc_inc) & PC_MASK;
        self.write_pc(next_pc);

        // Prefetch: the transfer register is the panel's view of the next
        // instruction.
        let fetched = self.read_mem(next_pc);
        self.regs_mut().set_t(fetched);
        self.write_ir(fetched);

        if self.break_latched() {
            StepOutcome::Breakpoint
        } else if halted {
            StepOutcome::Halted
        } else {
            StepOutcome::Retired
        }
    }

    fn exec_memory_ref(&mut self, op: MemoryOp, x: bool, i: bool, m: bool, disp: u16) -> u16 {
        let ea = self.effective_address(x, i, m, disp);
        match op {
            MemoryOp::Laa => {
                let word = self.read_mem(ea);
                self.write_a(word);
                1
            }
            MemoryOp::Lba => {
                let word = self.read_mem(ea);
                self.write_b(word);
                1
            }
            MemoryOp::Sta => {
                let a = self.regs().a();
                self.write_mem(ea, a);
                1
            }
            MemoryOp::Stb => {
                let b = self.regs().b();
                self.write_mem(ea, b);
                1
            }
            MemoryOp::Ama => {
                let word = self.read_mem(ea);
                let (sum, overflow) = add_with_carry(self.regs().a(), word, self.regs().cf());
                self.write_a(sum);
                if overflow {
                    self.regs_mut().set_ovf(true);
                }
                1
            }
            MemoryOp::Sma => {
                let word = self.read_mem(ea);
                let (diff, overflow) = sub_with_borrow(self.regs().a(), word, self.regs().cf());
                self.write_a(diff);
                if overflow {
                    self.regs_mut().set_ovf(true);
                }
                1
            }
            MemoryOp::Mpy => self.exec_mpy(ea),
            MemoryOp::Div => self.exec_div(ea),
            MemoryOp::Bru => {
                if i && self.interrupts().toi_pending() {
                    self.dismiss_interrupt();
                }
                self.write_pc(ea);
                0
            }
            MemoryOp::Spb => {
                let return_word = self.regs().pc().wrapping_add(1) & 0x3FFF;
                self.write_mem(ea, return_word);
                self.write_pc(ea);
                self.interrupts_mut().block();
                // pc_inc of 1 lands execution at EA + 1
                1
            }
            MemoryOp::Ims => {
                let word = self.read_mem(ea).wrapping_add(1);
                self.write_mem(ea, word);
                if word == 0 {
                    2
                } else {
                    1
                }
            }
            MemoryOp::Cma => {
                let word = self.read_mem(ea) as i16;
                let a = self.regs().a() as i16;
                if a > word {
                    3
                } else if a == word {
                    2
                } else {
                    1
                }
            }
            MemoryOp::Amb => {
                let word = self.read_mem(ea);
                let (sum, overflow) = add_with_carry(self.regs().b(), word, self.regs().cf());
                self.write_b(sum);
                if overflow {
                    self.regs_mut().set_ovf(true);
                }
                1
            }
        }
    }

    /// B times M[EA], packed into the 31-bit double accumulator. The one
    /// unrepresentable product, -32768 squared, overflows the 30-bit
    /// magnitude: OVF sets and the top bit lands in A bit 14.
    fn exec_mpy(&mut self, ea: u16) -> u16 {
        let multiplicand = self.read_mem(ea) as i16;
        let multiplier = self.regs().b() as i16;
        let mut product = i32::from(multiplier) * i32::from(multiplicand);
        if multiplier == i16::MIN && multiplicand == i16::MIN {
            self.regs_mut().set_ovf(true);
            product >>= 1;
        }
        self.write_a(((product >> 15) & 0xFFFF) as u16);
        self.write_b((product & 0x7FFF) as u16);
        1
    }

    /// Divides the 31-bit double accumulator by M[EA]; quotient to A,
    /// remainder to B. A quotient that cannot fit leaves both untouched
    /// with OVF set.
    fn exec_div(&mut self, ea: u16) -> u16 {
        let divisor = self.read_mem(ea) as i16;
        let high = self.regs().a() as i16;
        if i32::from(high).abs() >= i32::from(divisor).abs() {
            self.regs_mut().set_ovf(true);
            return 1;
        }
        let dividend = pair_join(self.regs().a(), self.regs().b());
        let quotient = dividend / i32::from(divisor);
        let remainder = dividend % i32::from(divisor);
        self.write_a(quotient as u16);
        self.write_b(remainder as u16);
        1
    }

    fn exec_augmented(&mut self, op: AugmentedOp, count: u8, halted: &mut bool) -> u16 {
        match op {
            AugmentedOp::Hlt => {
                *halted = true;
                self.halt_with(HaltReason::Halted);
                0
            }
            AugmentedOp::Rna => {
                if self.regs().b() & 0x4000 != 0 {
                    let rounded = self.regs().a().wrapping_add(1);
                    if rounded == 0 {
                        self.regs_mut().set_ovf(true);
                    }
                    self.write_a(rounded);
                }
                1
            }
            AugmentedOp::Neg => {
                let value =
                    -i32::from(self.regs().a() as i16) - i32::from(self.regs().cf());
                if value > i32::from(i16::MAX) || value < i32::from(i16::MIN) {
                    self.regs_mut().set_ovf(true);
                }
                self.write_a(value as u16);
                1
            }
            AugmentedOp::Cla => {
                self.write_a(0);
                1
            }
            AugmentedOp::Tba => {
                let b = self.regs().b();
                self.write_a(b);
                1
            }
            AugmentedOp::Tab => {
                let a = self.regs().a();
                self.write_b(a);
                1
            }
            AugmentedOp::Iab => {
                let (a, b) = (self.regs().a(), self.regs().b());
                self.write_a(b);
                self.write_b(a);
                1
            }
            AugmentedOp::Csb => {
                let b = self.regs().b();
                self.regs_mut().set_cf(b & 0x8000 != 0);
                self.write_b(b & 0x7FFF);
                self.interrupts_mut().block();
                1
            }
            AugmentedOp::Rsa => {
                let a = shift_rsa(self.regs().a(), count);
                self.write_a(a);
                1
            }
            AugmentedOp::Lsa => {
                let a = shift_lsa(self.regs().a(), count);
                self.write_a(a);
                1
            }
            AugmentedOp::Fra => {
                let (a, b) = shift_fra(self.regs().a(), self.regs().b(), count);
                self.write_a(a);
                self.write_b(b);
                1
            }
            AugmentedOp::Fll => {
                let (a, b) = shift_fll(self.regs().a(), self.regs().b(), count);
                self.write_a(a);
                self.write_b(b);
                1
            }
            AugmentedOp::Frl => {
                let (a, b) = rotate_frl(self.regs().a(), self.regs().b(), count);
                self.write_a(a);
                self.write_b(b);
                1
            }
            AugmentedOp::Rsl => {
                let a = shift_rsl(self.regs().a(), count);
                self.write_a(a);
                1
            }
            AugmentedOp::Lsl => {
                let a = shift_lsl(self.regs().a(), count);
                self.write_a(a);
                1
            }
            AugmentedOp::Fla => {
                let (a, b) = shift_fla(self.regs().a(), self.regs().b(), count);
                self.write_a(a);
                self.write_b(b);
                1
            }
            AugmentedOp::Asc => {
                let a = self.regs().a() ^ 0x8000;
                self.write_a(a);
                1
            }
            AugmentedOp::Sas => {
                let a = self.regs().a() as i16;
                if a > 0 {
                    3
                } else if a == 0 {
                    2
                } else {
                    1
                }
            }
            AugmentedOp::Saz => {
                if self.regs().a() == 0 {
                    2
                } else {
                    1
                }
            }
            AugmentedOp::San => {
                if (self.regs().a() as i16) < 0 {
                    2
                } else {
                    1
                }
            }
            AugmentedOp::Sap => {
                if self.regs().a() & 0x8000 == 0 {
                    2
                } else {
                    1
                }
            }
            AugmentedOp::Sof => {
                if self.regs().ovf() {
                    self.regs_mut().set_ovf(false);
                    1
                } else {
                    2
                }
            }
            AugmentedOp::Ibs => {
                let b = self.regs().b().wrapping_add(1);
                self.write_b(b);
                if b == 0 {
                    2
                } else {
                    1
                }
            }
            AugmentedOp::Aba => {
                let a = self.regs().a() & self.regs().b();
                self.write_a(a);
                1
            }
            AugmentedOp::Oba => {
                let a = self.regs().a() | self.regs().b();
                self.write_a(a);
                1
            }
            AugmentedOp::Lcs => {
                let sr = self.regs().sr();
                self.write_a(sr);
                1
            }
            AugmentedOp::Sno => {
                let a = self.regs().a();
                if (a >> 15) & 1 != (a >> 14) & 1 {
                    2
                } else {
                    1
                }
            }
            AugmentedOp::Nop => 1,
            AugmentedOp::Cns => {
                let a = self.regs().a();
                if a & 0x8000 != 0 {
                    self.write_a((a & 0x7FFF).wrapping_neg());
                }
                1
            }
            AugmentedOp::Toi => {
                self.interrupts_mut().arm_toi();
                self.interrupts_mut().block();
                1
            }
            AugmentedOp::Lob => {
                let pointer = self.regs().pc().wrapping_add(1) & PC_MASK;
                let target = self.read_mem(pointer) & PC_MASK;
                if self.interrupts().toi_pending() {
                    self.dismiss_interrupt();
                }
                self.write_pc(target);
                0
            }
            AugmentedOp::Ovs => {
                self.regs_mut().set_ovf(true);
                1
            }
            AugmentedOp::Tbp => {
                let b = self.regs().b();
                self.regs_mut().set_ppr(b);
                1
            }
            AugmentedOp::Tpb => {
                let ppr = self.regs().ppr();
                self.write_b(ppr);
                1
            }
            AugmentedOp::Tbv => {
                let b = self.regs().b();
                self.regs_mut().set_vbr(b);
                1
            }
            AugmentedOp::Tvb => {
                let vbr = self.regs().vbr();
                self.write_b(vbr);
                1
            }
        }
    }

    fn exec_control_io(&mut self, op: ControlIoOp, indirect: bool, unit: u8) -> u16 {
        match op {
            ControlIoOp::Ceu(mode) => {
                let command = self.fetch_operand_word(indirect);
                let accepted = self.io_command(unit, command, mode);
                if accepted && mode == IoMode::Skip {
                    3
                } else {
                    2
                }
            }
            ControlIoOp::Teu => {
                let condition = self.fetch_operand_word(indirect);
                if self.io_test(unit, condition) {
                    3
                } else {
                    2
                }
            }
            ControlIoOp::Sns => {
                // switches number from the sign bit down
                let bit = 15 - u16::from(unit & 15);
                if self.regs().sr() & (1 << bit) == 0 {
                    2
                } else {
                    1
                }
            }
            ControlIoOp::PriorityMask => {
                let word = self.fetch_operand_word(indirect);
                let group = usize::from((word >> 12) & 0x7);
                let mask = word & 0x0FFF;
                match unit {
                    0 => self.interrupts_mut().enable(group, mask),
                    1 => self.interrupts_mut().disable(group, mask),
                    _ => {}
                }
                self.interrupts_mut().block();
                2
            }
        }
    }

    fn exec_data_io(&mut self, op: DataIoOp, mode: IoMode, r: bool, unit: u8) -> u16 {
        match op {
            DataIoOp::Aop => {
                let a = self.regs().a();
                let sent = self.io_write(unit, a, mode);
                if sent && mode == IoMode::Skip {
                    2
                } else {
                    1
                }
            }
            DataIoOp::Aip => match self.io_read(unit, mode) {
                Some(word) => {
                    let value = if r {
                        self.regs().a().wrapping_add(word)
                    } else {
                        word
                    };
                    self.write_a(value);
                    if mode == IoMode::Skip {
                        2
                    } else {
                        1
                    }
                }
                None => 1,
            },
            DataIoOp::Mop => {
                let ea = self.data_io_address();
                let word = self.read_mem(ea);
                let sent = self.io_write(unit, word, mode);
                if sent && mode == IoMode::Skip {
                    3
                } else {
                    2
                }
            }
            DataIoOp::Mip => {
                let ea = self.data_io_address();
                match self.io_read(unit, mode) {
                    Some(word) => {
                        self.write_mem(ea, word);
                        if mode == IoMode::Skip {
                            3
                        } else {
                            2
                        }
                    }
                    None => 2,
                }
            }
        }
    }

    /// MOP/MIP address word: the word after the instruction carries X/I/M
    /// designators and a displacement, resolved like any memory reference.
    fn data_io_address(&mut self) -> u16 {
        let pointer = self.regs().pc().wrapping_add(1) & PC_MASK;
        let word = self.read_mem(pointer);
        self.effective_address(
            word & crate::encoding::BIT_X != 0,
            word & crate::encoding::BIT_I != 0,
            word & crate::encoding::BIT_M != 0,
            word & crate::encoding::DISP_MASK,
        )
    }
}
