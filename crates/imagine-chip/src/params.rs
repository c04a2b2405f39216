//! Synthesis parameters of the engine as seen by the host driver.
//!
//! The IP is generated with a fixed PE block geometry. The driver needs two
//! of those numbers at runtime (`lanes_per_block`, `reg_width`); the field
//! widths of the instruction word are fixed by the microcode format.

use std::fmt;

/// Width of the BRAM address field in an instruction word.
pub const ADDR_WIDTH: u32 = 10;

/// Width of the data field in an instruction word (one BRAM row).
pub const DATA_WIDTH: u32 = 16;

/// Width of a PE block row/column identifier.
pub const ID_WIDTH: u32 = 8;

/// Number of addressable BRAM rows.
pub const BRAM_ROWS: usize = 1 << ADDR_WIDTH;

/// Number of addressable PE block columns.
pub const MAX_BLOCKS: usize = 1 << ID_WIDTH;

/// PEs per block on the reference ZCU104 build.
pub const DEFAULT_LANES_PER_BLOCK: usize = 16;

/// PE register width on the reference ZCU104 build.
pub const DEFAULT_REG_WIDTH: usize = 16;

/// Rejected engine geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamsError {
    /// Lane count is zero or wider than one BRAM row.
    Lanes(usize),
    /// Register width is zero or wider than a lane value.
    RegWidth(usize),
}

impl fmt::Display for ParamsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lanes(n) => write!(f, "lanes per block must be 1..={DATA_WIDTH}, got {n}"),
            Self::RegWidth(n) => write!(f, "register width must be 1..=16, got {n}"),
        }
    }
}

impl std::error::Error for ParamsError {}

/// Engine geometry used by the transposer and the vector loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineParams {
    lanes_per_block: usize,
    reg_width: usize,
}

impl EngineParams {
    /// Validate and build a geometry.
    ///
    /// One BRAM row carries one bit per lane, so a block can hold at most
    /// `DATA_WIDTH` lanes. Lane values are 16-bit, so a register is at most
    /// 16 bit-planes deep.
    ///
    /// # Errors
    ///
    /// Returns [`ParamsError`] if either dimension is out of range.
    pub const fn new(lanes_per_block: usize, reg_width: usize) -> Result<Self, ParamsError> {
        if lanes_per_block == 0 || lanes_per_block > DATA_WIDTH as usize {
            return Err(ParamsError::Lanes(lanes_per_block));
        }
        if reg_width == 0 || reg_width > 16 {
            return Err(ParamsError::RegWidth(reg_width));
        }
        Ok(Self {
            lanes_per_block,
            reg_width,
        })
    }

    /// PEs per block (lanes handled by one select-column window).
    #[must_use]
    pub const fn lanes_per_block(&self) -> usize {
        self.lanes_per_block
    }

    /// Bit-planes per vector register.
    #[must_use]
    pub const fn reg_width(&self) -> usize {
        self.reg_width
    }

    /// Number of vector registers that fit in the BRAM address space.
    #[must_use]
    pub const fn register_count(&self) -> usize {
        BRAM_ROWS / self.reg_width
    }

    /// BRAM base address of a vector register, if it exists.
    #[must_use]
    pub const fn register_base(&self, register: usize) -> Option<u16> {
        if register >= self.register_count() {
            return None;
        }
        // register_count() bounds this below BRAM_ROWS
        #[allow(clippy::cast_possible_truncation)]
        Some((register * self.reg_width) as u16)
    }

    /// Longest vector a single register can hold.
    #[must_use]
    pub const fn max_vector_len(&self) -> usize {
        MAX_BLOCKS * self.lanes_per_block
    }
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            lanes_per_block: DEFAULT_LANES_PER_BLOCK,
            reg_width: DEFAULT_REG_WIDTH,
        }
    }
}
