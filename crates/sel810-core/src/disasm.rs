//! Instruction disassembly for the 810A.
//!
//! Produces the mnemonic form used by breakpoint diagnostics and the front
//! panel. Addresses and operands render in octal, the machine's native
//! radix.

use std::fmt::Write as _;

use crate::decoder::{decode, Instruction};
use crate::encoding::{ControlIoOp, DataIoOp, IoMode};

/// Renders one instruction word as assembler text.
///
/// Memory-reference operands carry the `*` indirect suffix and the `,X`
/// index suffix; I/O mnemonics carry the `W` wait suffix. Unassigned words
/// render as an octal `DATA` directive.
#[must_use]
pub fn disassemble(word: u16) -> String {
    match decode(word) {
        Instruction::MemoryRef { op, x, i, m, disp } => {
            let mut text = String::new();
            let _ = write!(text, "{}{} ", op.mnemonic(), if i { "*" } else { "" });
            let _ = write!(text, "0o{disp:o}");
            if m {
                text.push_str(",M");
            }
            if x {
                text.push_str(",X");
            }
            text
        }
        Instruction::Augmented { op, count } => {
            if op.uses_shift_count() {
                format!("{} {}", op.mnemonic(), count)
            } else {
                op.mnemonic().to_string()
            }
        }
        Instruction::ControlIo { op, i, unit } => {
            let star = if i { "*" } else { "" };
            match op {
                ControlIoOp::Ceu(IoMode::Skip) => format!("CEU{star} 0o{unit:o}"),
                ControlIoOp::Ceu(IoMode::Wait) => format!("CEUW{star} 0o{unit:o}"),
                ControlIoOp::Teu => format!("TEU{star} 0o{unit:o}"),
                ControlIoOp::Sns => format!("SNS {}", unit & 15),
                ControlIoOp::PriorityMask if unit == 0 => "PIE".to_string(),
                ControlIoOp::PriorityMask if unit == 1 => "PID".to_string(),
                ControlIoOp::PriorityMask => format!("PIE? 0o{unit:o}"),
            }
        }
        Instruction::DataIo { op, mode, r, unit } => {
            let base = match op {
                DataIoOp::Aop => "AOP",
                DataIoOp::Aip => "AIP",
                DataIoOp::Mop => "MOP",
                DataIoOp::Mip => "MIP",
            };
            let wait = if mode == IoMode::Wait { "W" } else { "" };
            let add = if r { ",R" } else { "" };
            format!("{base}{wait} 0o{unit:o}{add}")
        }
        Instruction::Undefined(word) => format!("DATA 0o{word:06o}"),
    }
}
