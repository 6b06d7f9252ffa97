//! Machine-level invariants checked over random instruction streams.

use proptest::prelude::*;
use sel810_core::{Machine, PC_MASK};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// PC bit 15 stays clear and the prefetch invariant holds after every
    /// step, whatever the instruction stream.
    #[test]
    fn pc_and_prefetch_invariants_hold(
        words in proptest::collection::vec(any::<u16>(), 64),
        a in any::<u16>(),
        b in any::<u16>(),
        start in 0u16..=PC_MASK,
    ) {
        let mut machine = Machine::new();
        for (offset, word) in words.iter().enumerate() {
            let addr = start.wrapping_add(offset as u16) & PC_MASK;
            machine.memory_mut().write(addr, *word);
        }
        machine.regs_mut().set_pc(start);
        machine.regs_mut().set_a(a);
        machine.regs_mut().set_b(b);
        machine.prime();

        for _ in 0..32 {
            machine.step_cycle();
            prop_assert_eq!(machine.regs().pc() & 0x8000, 0);
            prop_assert_eq!(
                machine.regs().ir(),
                machine.memory().read(machine.regs().pc())
            );
        }
    }

    /// Carry discipline: only CSB sets the flip-flop, only MPY preserves it
    /// across a step, every other instruction leaves it clear.
    #[test]
    fn carry_discipline_holds(
        words in proptest::collection::vec(any::<u16>(), 64),
        b in any::<u16>(),
        start in 0u16..=PC_MASK,
    ) {
        let mut machine = Machine::new();
        for (offset, word) in words.iter().enumerate() {
            let addr = start.wrapping_add(offset as u16) & PC_MASK;
            machine.memory_mut().write(addr, *word);
        }
        machine.regs_mut().set_pc(start);
        machine.regs_mut().set_b(b);
        machine.prime();

        for _ in 0..32 {
            let ir = machine.regs().ir();
            let cf_before = machine.regs().cf();
            let b_before = machine.regs().b();
            machine.step_cycle();

            let opcode = ir >> 12;
            let is_csb = opcode == 0 && (ir & 0x3F) == 0o07;
            if is_csb {
                prop_assert_eq!(machine.regs().cf(), b_before & 0x8000 != 0);
            } else if opcode == 7 {
                prop_assert_eq!(machine.regs().cf(), cf_before);
            } else {
                prop_assert!(!machine.regs().cf());
            }
        }
    }

    /// Augmented no-ops (sub-ops octal 44 and up) change nothing but PC.
    #[test]
    fn unassigned_augmented_subops_only_advance_pc(sub in 0o44u16..=0o77, count in 0u16..16) {
        let word = (count << 6) | sub;
        let mut machine = Machine::new();
        machine.memory_mut().write(0, word);
        machine.regs_mut().set_a(0xA5A5);
        machine.regs_mut().set_b(0x5A5A);
        machine.prime();
        machine.step_cycle();
        prop_assert_eq!(machine.regs().a(), 0xA5A5);
        prop_assert_eq!(machine.regs().b(), 0x5A5A);
        prop_assert_eq!(machine.regs().pc(), 1);
        prop_assert!(!machine.regs().ovf());
    }
}
