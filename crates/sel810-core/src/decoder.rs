//! Instruction decode for the 810A word formats.
//!
//! Decode never fails: the hardware has no illegal-instruction trap, so
//! unassigned encodings decode to [`Instruction::Undefined`] and execute as
//! no-ops.

use crate::encoding::{
    augmented_subop, io_subop, io_unit, opcode, shift_count, AugmentedOp, ControlIoOp, DataIoOp,
    IoMode, MemoryOp, BIT_I, BIT_M, BIT_R, BIT_X, DISP_MASK, OP_AUGMENTED, OP_IO_CONTROL,
    OP_IO_DATA,
};

/// One decoded 810A instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// Memory-reference operation with its addressing designators.
    MemoryRef {
        /// Operation selected by the opcode field.
        op: MemoryOp,
        /// Index designator (bit 11).
        x: bool,
        /// Indirect designator (bit 10).
        i: bool,
        /// Map (page-relative) designator (bit 9).
        m: bool,
        /// 9-bit displacement.
        disp: u16,
    },
    /// Augmented-00 operation; the count is meaningful for the shift family.
    Augmented {
        /// Sub-operation from bits 5-0.
        op: AugmentedOp,
        /// Shift count from bits 9-6.
        count: u8,
    },
    /// Control-I/O or priority-interrupt operation.
    ControlIo {
        /// Sub-operation from bits 8-6.
        op: ControlIoOp,
        /// Indirect designator applied to the trailing word.
        i: bool,
        /// Addressed unit (or switch / enable-disable selector).
        unit: u8,
    },
    /// Data-I/O operation.
    DataIo {
        /// Transfer flavor.
        op: DataIoOp,
        /// SKIP or WAIT variant.
        mode: IoMode,
        /// Augmenting-input designator (bit 11): input adds into A.
        r: bool,
        /// Addressed unit.
        unit: u8,
    },
    /// Unassigned encoding; executes as a no-op.
    Undefined(u16),
}

/// Decodes one 16-bit instruction word.
#[must_use]
pub fn decode(word: u16) -> Instruction {
    let op = opcode(word);
    match op {
        OP_AUGMENTED => match AugmentedOp::from_subop(augmented_subop(word)) {
            Some(op) => Instruction::Augmented {
                op,
                count: shift_count(word),
            },
            None => Instruction::Undefined(word),
        },
        OP_IO_CONTROL => match ControlIoOp::from_subop(io_subop(word)) {
            Some(op) => Instruction::ControlIo {
                op,
                i: word & BIT_I != 0,
                unit: io_unit(word),
            },
            None => Instruction::Undefined(word),
        },
        OP_IO_DATA => {
            let (op, mode) = DataIoOp::from_subop(io_subop(word));
            Instruction::DataIo {
                op,
                mode,
                r: word & BIT_R != 0,
                unit: io_unit(word),
            }
        }
        _ => match MemoryOp::from_opcode(op) {
            Some(op) => Instruction::MemoryRef {
                op,
                x: word & BIT_X != 0,
                i: word & BIT_I != 0,
                m: word & BIT_M != 0,
                disp: word & DISP_MASK,
            },
            None => Instruction::Undefined(word),
        },
    }
}
