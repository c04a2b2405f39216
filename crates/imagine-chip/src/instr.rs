//! Instruction word format for the engine's microcode.
//!
//! Every instruction is one 32-bit word pushed through the input FIFO.
//!
//! ```text
//!  31 30 29    26 25            16 15                 0
//! ┌─────┬────────┬────────────────┬────────────────────┐
//! │ sub │ opcode │ addr (10 bits) │ data (16 bits)     │   MV_WRITE
//! └─────┴────────┴────────────────┴────────────────────┘
//! ┌─────┬────────┬──┬──┬──┬───────────────────┬────────┐
//! │ sub │ opcode │Fn│R │C │        xx         │ block  │   MV_SELECT
//! └─────┴────────┴──┴──┴──┴───────────────────┴────────┘
//! ```
//!
//! `sub` picks the submodule (0 = matrix-vector array, 1 = vector shift
//! register). The driver only ever builds the select, write, no-op and
//! sync words; everything else arrives pre-assembled inside a
//! [`Program`](crate::program::Program).

use crate::params::{ADDR_WIDTH, DATA_WIDTH, ID_WIDTH};
use std::fmt;

const SUB_SHIFT: u32 = 30;
const OP_SHIFT: u32 = 26;
const OP_MASK: u32 = 0xF;
const ADDR_SHIFT: u32 = DATA_WIDTH;
const ADDR_MASK: u32 = (1 << ADDR_WIDTH) - 1;
const DATA_MASK: u32 = (1 << DATA_WIDTH) - 1;
const BLOCK_MASK: u32 = (1 << ID_WIDTH) - 1;
const SELECT_ROW_ALL: u32 = 1 << 23;
const SELECT_COL_ALL: u32 = 1 << 22;

/// Submodule codes.
pub mod submodule {
    /// Matrix-vector PE array.
    pub const MV: u32 = 0;
    /// Vector shift register.
    pub const VV: u32 = 1;
}

/// Opcodes of the matrix-vector submodule.
pub mod mv_op {
    /// No operation. Two in a row form `MV_SYNC`.
    pub const NOP: u32 = 0x0;
    /// Write one BRAM row of the selected blocks.
    pub const WRITE: u32 = 0x1;
    /// Fixed-point multiply step.
    pub const MULT: u32 = 0x3;
    /// Row accumulation across blocks.
    pub const ACCUM_ROW: u32 = 0x4;
    /// Register add.
    pub const ADD: u32 = 0x5;
    /// Block select.
    pub const SELECT: u32 = 0x6;
    /// Move with bit offset.
    pub const MOV_OFFSET: u32 = 0x7;
}

/// Opcodes of the vector shift register submodule.
pub mod vv_op {
    /// Wait for the shift register to drain.
    pub const SYNC: u32 = 0x0;
    /// Serial (shift-out) mode.
    pub const SERIAL_EN: u32 = 0x1;
    /// Parallel (capture) mode.
    pub const PARALLEL_EN: u32 = 0x2;
}

/// One 32-bit engine instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct InstructionWord(u32);

impl InstructionWord {
    /// Wrap a raw word (e.g. from a pre-assembled listing).
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw 32-bit value as pushed into FIFO-in.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    const fn header(sub: u32, op: u32) -> u32 {
        (sub << SUB_SHIFT) | ((op & OP_MASK) << OP_SHIFT)
    }

    /// `MV_SELECT` with both row-all and column-all flags: every PE block.
    #[must_use]
    pub const fn select_all() -> Self {
        Self(Self::header(submodule::MV, mv_op::SELECT) | SELECT_ROW_ALL | SELECT_COL_ALL)
    }

    /// `MV_SELECT` of one column of PE blocks.
    #[must_use]
    pub const fn select_column(block: u8) -> Self {
        Self(Self::header(submodule::MV, mv_op::SELECT) | block as u32)
    }

    /// `MV_WRITE` of one BRAM row in every selected block.
    ///
    /// `addr` is masked to the 10-bit field; callers range-check it.
    #[must_use]
    pub const fn mem_write(addr: u16, data: u16) -> Self {
        Self(
            Self::header(submodule::MV, mv_op::WRITE)
                | ((addr as u32 & ADDR_MASK) << ADDR_SHIFT)
                | data as u32,
        )
    }

    /// `MV_NOP`.
    #[must_use]
    pub const fn nop() -> Self {
        Self(Self::header(submodule::MV, mv_op::NOP))
    }

    /// `MV_SYNC`: two no-ops, enough for the array pipeline to settle.
    #[must_use]
    pub const fn mv_sync() -> [Self; 2] {
        [Self::nop(), Self::nop()]
    }

    /// `VV_SYNC`.
    #[must_use]
    pub const fn vv_sync() -> Self {
        Self(Self::header(submodule::VV, vv_op::SYNC))
    }

    /// Submodule code (bits 31..30).
    #[must_use]
    pub const fn submodule(self) -> u32 {
        self.0 >> SUB_SHIFT
    }

    /// Opcode (bits 29..26).
    #[must_use]
    pub const fn opcode(self) -> u32 {
        (self.0 >> OP_SHIFT) & OP_MASK
    }

    /// BRAM address field (bits 25..16).
    #[must_use]
    pub const fn address(self) -> u16 {
        ((self.0 >> ADDR_SHIFT) & ADDR_MASK) as u16
    }

    /// Data field (bits 15..0).
    #[must_use]
    pub const fn data(self) -> u16 {
        (self.0 & DATA_MASK) as u16
    }

    /// Block id of a select word (bits 7..0).
    #[must_use]
    pub const fn block(self) -> u8 {
        (self.0 & BLOCK_MASK) as u8
    }

    /// Classify the word.
    #[must_use]
    pub const fn kind(self) -> InstructionKind {
        match (self.submodule(), self.opcode()) {
            (submodule::MV, mv_op::NOP) if self.0 == 0 => InstructionKind::Nop,
            (submodule::MV, mv_op::WRITE) => InstructionKind::Write {
                addr: self.address(),
                data: self.data(),
            },
            (submodule::MV, mv_op::SELECT) => {
                if self.0 & (SELECT_ROW_ALL | SELECT_COL_ALL) == (SELECT_ROW_ALL | SELECT_COL_ALL) {
                    InstructionKind::SelectAll
                } else {
                    InstructionKind::SelectColumn(self.block())
                }
            }
            (submodule::VV, vv_op::SYNC) => InstructionKind::VvSync,
            (sub, op) => InstructionKind::Other {
                submodule: sub,
                opcode: op,
            },
        }
    }

    /// Assembler mnemonic, if the opcode is one the driver knows by name.
    #[must_use]
    pub const fn mnemonic(self) -> Option<&'static str> {
        Some(match (self.submodule(), self.opcode()) {
            (submodule::MV, mv_op::NOP) => "MV_NOP",
            (submodule::MV, mv_op::WRITE) => "MV_WRITE",
            (submodule::MV, mv_op::MULT) => "MV_MULT",
            (submodule::MV, mv_op::ACCUM_ROW) => "MV_ACCUM_ROW",
            (submodule::MV, mv_op::ADD) => "MV_ADD",
            (submodule::MV, mv_op::SELECT) => "MV_SELECT",
            (submodule::MV, mv_op::MOV_OFFSET) => "MV_MOV_OFFSET",
            (submodule::VV, vv_op::SYNC) => "VV_SYNC",
            (submodule::VV, vv_op::SERIAL_EN) => "VV_SERIAL_EN",
            (submodule::VV, vv_op::PARALLEL_EN) => "VV_PARALLEL_EN",
            _ => return None,
        })
    }
}

impl From<u32> for InstructionWord {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl From<InstructionWord> for u32 {
    fn from(word: InstructionWord) -> Self {
        word.0
    }
}

impl fmt::Display for InstructionWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)?;
        match self.kind() {
            InstructionKind::Write { addr, data } => {
                write!(f, "  MV_WRITE addr={addr} data={data:#06x}")
            }
            InstructionKind::SelectAll => write!(f, "  MV_SELECT_ALL"),
            InstructionKind::SelectColumn(block) => write!(f, "  MV_SELECT_COL col={block}"),
            _ => match self.mnemonic() {
                Some(m) => write!(f, "  {m}"),
                None => Ok(()),
            },
        }
    }
}

/// Decoded view of an instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionKind {
    /// All-zero word.
    Nop,
    /// Row write.
    Write {
        /// BRAM row address.
        addr: u16,
        /// Row contents, one bit per lane.
        data: u16,
    },
    /// Select every PE block.
    SelectAll,
    /// Select one column of PE blocks.
    SelectColumn(u8),
    /// Shift register sync.
    VvSync,
    /// Anything the driver does not generate itself.
    Other {
        /// Submodule code.
        submodule: u32,
        /// Opcode.
        opcode: u32,
    },
}

/// Words that zero one vector register: select every block, then write
/// zero to each of its `reg_width` rows starting at `base`.
pub fn clear_register(base: u16, reg_width: usize) -> impl Iterator<Item = InstructionWord> {
    std::iter::once(InstructionWord::select_all()).chain(
        (base..).take(reg_width).map(|addr| InstructionWord::mem_write(addr, 0)),
    )
}
