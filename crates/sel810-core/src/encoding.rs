//! Deterministic opcode and field classification for the 810A word formats.
//!
//! The canonical instruction layout keeps the opcode in bits 15-12. Opcode 0
//! selects the augmented-00 group (6-bit sub-op in bits 5-0, shift count in
//! bits 9-6), opcode 0o13 the control-I/O group and opcode 0o17 the data-I/O
//! group (3-bit sub-op in bits 8-6, unit in bits 5-0). Everything else is a
//! memory-reference instruction with X/I/M designators and a 9-bit
//! displacement.

/// Opcode value of the augmented-00 group.
pub const OP_AUGMENTED: u8 = 0o00;
/// Opcode value of the control-I/O / priority-interrupt group.
pub const OP_IO_CONTROL: u8 = 0o13;
/// Opcode value of the data-I/O group.
pub const OP_IO_DATA: u8 = 0o17;
/// Opcode value of MPY, the one instruction that preserves carry.
pub const OP_MPY: u8 = 0o07;

/// Index designator (memory reference), bit 11.
pub const BIT_X: u16 = 1 << 11;
/// Indirect designator, bit 10.
pub const BIT_I: u16 = 1 << 10;
/// Map (page-relative) designator, bit 9.
pub const BIT_M: u16 = 1 << 9;
/// Augmenting-input designator of data-I/O instructions, bit 11.
pub const BIT_R: u16 = 1 << 11;

/// 9-bit displacement mask of memory-reference words.
pub const DISP_MASK: u16 = 0x01FF;
/// Unit field mask of I/O words (bits 5-0).
pub const UNIT_MASK: u16 = 0x003F;

/// Extracts the opcode field, bits 15-12.
#[must_use]
pub const fn opcode(word: u16) -> u8 {
    (word >> 12) as u8
}

/// Extracts the 6-bit augmented sub-op, bits 5-0.
#[must_use]
pub const fn augmented_subop(word: u16) -> u8 {
    (word & 0x3F) as u8
}

/// Extracts the 4-bit shift count, bits 9-6.
#[must_use]
pub const fn shift_count(word: u16) -> u8 {
    ((word >> 6) & 0x0F) as u8
}

/// Extracts the 3-bit I/O sub-op, bits 8-6.
#[must_use]
pub const fn io_subop(word: u16) -> u8 {
    ((word >> 6) & 0x07) as u8
}

/// Extracts the unit field, bits 5-0.
#[must_use]
pub const fn io_unit(word: u16) -> u8 {
    (word & UNIT_MASK) as u8
}

/// Memory-reference operations (opcodes 1-10 and 12-14).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum MemoryOp {
    Laa,
    Lba,
    Sta,
    Stb,
    Ama,
    Sma,
    Mpy,
    Div,
    Bru,
    Spb,
    Ims,
    Cma,
    Amb,
}

impl MemoryOp {
    /// Classifies an opcode field value as a memory-reference operation.
    #[must_use]
    pub const fn from_opcode(op: u8) -> Option<Self> {
        match op {
            0o01 => Some(Self::Laa),
            0o02 => Some(Self::Lba),
            0o03 => Some(Self::Sta),
            0o04 => Some(Self::Stb),
            0o05 => Some(Self::Ama),
            0o06 => Some(Self::Sma),
            0o07 => Some(Self::Mpy),
            0o10 => Some(Self::Div),
            0o11 => Some(Self::Bru),
            0o12 => Some(Self::Spb),
            0o14 => Some(Self::Ims),
            0o15 => Some(Self::Cma),
            0o16 => Some(Self::Amb),
            _ => None,
        }
    }

    /// Canonical mnemonic.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Laa => "LAA",
            Self::Lba => "LBA",
            Self::Sta => "STA",
            Self::Stb => "STB",
            Self::Ama => "AMA",
            Self::Sma => "SMA",
            Self::Mpy => "MPY",
            Self::Div => "DIV",
            Self::Bru => "BRU",
            Self::Spb => "SPB",
            Self::Ims => "IMS",
            Self::Cma => "CMA",
            Self::Amb => "AMB",
        }
    }
}

/// Augmented-00 operations. Sub-ops 0o44 and above are not assigned on the
/// 810A and execute as no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum AugmentedOp {
    Hlt,
    Rna,
    Neg,
    Cla,
    Tba,
    Tab,
    Iab,
    Csb,
    Rsa,
    Lsa,
    Fra,
    Fll,
    Frl,
    Rsl,
    Lsl,
    Fla,
    Asc,
    Sas,
    Saz,
    San,
    Sap,
    Sof,
    Ibs,
    Aba,
    Oba,
    Lcs,
    Sno,
    Nop,
    Cns,
    Toi,
    Lob,
    Ovs,
    Tbp,
    Tpb,
    Tbv,
    Tvb,
}

/// Assigned augmented-00 sub-op table (sub-op value in octal).
pub const AUGMENTED_TABLE: &[(u8, AugmentedOp)] = &[
    (0o00, AugmentedOp::Hlt),
    (0o01, AugmentedOp::Rna),
    (0o02, AugmentedOp::Neg),
    (0o03, AugmentedOp::Cla),
    (0o04, AugmentedOp::Tba),
    (0o05, AugmentedOp::Tab),
    (0o06, AugmentedOp::Iab),
    (0o07, AugmentedOp::Csb),
    (0o10, AugmentedOp::Rsa),
    (0o11, AugmentedOp::Lsa),
    (0o12, AugmentedOp::Fra),
    (0o13, AugmentedOp::Fll),
    (0o14, AugmentedOp::Frl),
    (0o15, AugmentedOp::Rsl),
    (0o16, AugmentedOp::Lsl),
    (0o17, AugmentedOp::Fla),
    (0o20, AugmentedOp::Asc),
    (0o21, AugmentedOp::Sas),
    (0o22, AugmentedOp::Saz),
    (0o23, AugmentedOp::San),
    (0o24, AugmentedOp::Sap),
    (0o25, AugmentedOp::Sof),
    (0o26, AugmentedOp::Ibs),
    (0o27, AugmentedOp::Aba),
    (0o30, AugmentedOp::Oba),
    (0o31, AugmentedOp::Lcs),
    (0o32, AugmentedOp::Sno),
    (0o33, AugmentedOp::Nop),
    (0o34, AugmentedOp::Cns),
    (0o35, AugmentedOp::Toi),
    (0o36, AugmentedOp::Lob),
    (0o37, AugmentedOp::Ovs),
    (0o40, AugmentedOp::Tbp),
    (0o41, AugmentedOp::Tpb),
    (0o42, AugmentedOp::Tbv),
    (0o43, AugmentedOp::Tvb),
];

impl AugmentedOp {
    /// Classifies a 6-bit sub-op. `None` means an unassigned sub-op, which
    /// the executor treats as a no-op.
    #[must_use]
    pub fn from_subop(sub: u8) -> Option<Self> {
        AUGMENTED_TABLE
            .iter()
            .find_map(|(value, op)| (*value == sub).then_some(*op))
    }

    /// True for the shift family, which consumes the count field.
    #[must_use]
    pub const fn uses_shift_count(self) -> bool {
        matches!(
            self,
            Self::Rsa
                | Self::Lsa
                | Self::Fra
                | Self::Fll
                | Self::Frl
                | Self::Rsl
                | Self::Lsl
                | Self::Fla
        )
    }

    /// Canonical mnemonic.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Hlt => "HLT",
            Self::Rna => "RNA",
            Self::Neg => "NEG",
            Self::Cla => "CLA",
            Self::Tba => "TBA",
            Self::Tab => "TAB",
            Self::Iab => "IAB",
            Self::Csb => "CSB",
            Self::Rsa => "RSA",
            Self::Lsa => "LSA",
            Self::Fra => "FRA",
            Self::Fll => "FLL",
            Self::Frl => "FRL",
            Self::Rsl => "RSL",
            Self::Lsl => "LSL",
            Self::Fla => "FLA",
            Self::Asc => "ASC",
            Self::Sas => "SAS",
            Self::Saz => "SAZ",
            Self::San => "SAN",
            Self::Sap => "SAP",
            Self::Sof => "SOF",
            Self::Ibs => "IBS",
            Self::Aba => "ABA",
            Self::Oba => "OBA",
            Self::Lcs => "LCS",
            Self::Sno => "SNO",
            Self::Nop => "NOP",
            Self::Cns => "CNS",
            Self::Toi => "TOI",
            Self::Lob => "LOB",
            Self::Ovs => "OVS",
            Self::Tbp => "TBP",
            Self::Tpb => "TPB",
            Self::Tbv => "TBV",
            Self::Tvb => "TVB",
        }
    }
}

/// SKIP or WAIT variant of an I/O instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IoMode {
    /// Return immediately with a success/failure skip.
    Skip,
    /// Block until the unit is ready, stalling through IOHOLD if needed.
    Wait,
}

/// Control-I/O and priority-interrupt operations (opcode 0o13).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlIoOp {
    /// Command external unit; the command word follows the instruction.
    Ceu(IoMode),
    /// Test external unit and skip on the tested condition.
    Teu,
    /// Skip when the addressed console switch is clear.
    Sns,
    /// Priority-interrupt enable (unit 0) or disable (unit 1); the
    /// group/mask word follows the instruction.
    PriorityMask,
}

impl ControlIoOp {
    /// Classifies the 3-bit sub-op. Unassigned sub-ops execute as no-ops.
    #[must_use]
    pub const fn from_subop(sub: u8) -> Option<Self> {
        match sub {
            0 => Some(Self::Ceu(IoMode::Skip)),
            1 => Some(Self::Ceu(IoMode::Wait)),
            2 => Some(Self::Teu),
            4 => Some(Self::Sns),
            6 => Some(Self::PriorityMask),
            _ => None,
        }
    }
}

/// Data-transfer flavor of an opcode 0o17 instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataIoOp {
    /// Word out of A to the unit.
    Aop,
    /// Word from the unit into A (added when the R designator is set).
    Aip,
    /// Word out of memory to the unit through an effective address.
    Mop,
    /// Word from the unit into memory through an effective address.
    Mip,
}

impl DataIoOp {
    /// Splits the 3-bit sub-op into flavor and SKIP/WAIT mode.
    #[must_use]
    pub const fn from_subop(sub: u8) -> (Self, IoMode) {
        let mode = if sub & 1 == 0 {
            IoMode::Skip
        } else {
            IoMode::Wait
        };
        let flavor = match sub >> 1 {
            0 => Self::Aop,
            1 => Self::Aip,
            2 => Self::Mop,
            _ => Self::Mip,
        };
        (flavor, mode)
    }

    /// True when this flavor transfers through memory rather than A, making
    /// the instruction two words long.
    #[must_use]
    pub const fn uses_memory(self) -> bool {
        matches!(self, Self::Mop | Self::Mip)
    }
}
