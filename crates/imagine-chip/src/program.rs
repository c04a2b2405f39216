//! Pre-assembled engine programs.
//!
//! The assembler emits a program as a flat list of instruction words plus
//! the engine configuration it was assembled for:
//!
//! | Field | Meaning | Reference build |
//! |-------|---------|-----------------|
//! | `frac_width` | fixed-point fraction bits of the data | 8 |
//! | `max_rows` | PE array rows (`mvMaxRow`) | 64 |
//! | `max_cols` | PE array columns (`mvMaxCol`) | 64 |
//! | `reg_width` | PE register width | 16 |
//! | `id_width` | block row/column id width | 8 |
//! | `lanes_per_block` | PEs per block (`peCount`) | 16 |
//!
//! Programs are opaque to the driver: it streams the words in order and
//! never rewrites them.

use crate::instr::InstructionWord;
use crate::params::{DEFAULT_LANES_PER_BLOCK, DEFAULT_REG_WIDTH, ID_WIDTH};

/// Engine configuration a program was assembled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramConfig {
    /// Fixed-point fraction bits.
    pub frac_width: u32,
    /// PE array rows.
    pub max_rows: usize,
    /// PE array columns.
    pub max_cols: usize,
    /// PE register width.
    pub reg_width: usize,
    /// Block id width.
    pub id_width: u32,
    /// PEs per block.
    pub lanes_per_block: usize,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            frac_width: 8,
            max_rows: 64,
            max_cols: 64,
            reg_width: DEFAULT_REG_WIDTH,
            id_width: ID_WIDTH,
            lanes_per_block: DEFAULT_LANES_PER_BLOCK,
        }
    }
}

/// An ordered, immutable instruction sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    name: String,
    words: Vec<InstructionWord>,
    config: ProgramConfig,
}

impl Program {
    /// Build a program from assembled words.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        words: impl IntoIterator<Item = InstructionWord>,
        config: ProgramConfig,
    ) -> Self {
        Self {
            name: name.into(),
            words: words.into_iter().collect(),
            config,
        }
    }

    /// Build a program from a raw word table, as emitted for a static array.
    #[must_use]
    pub fn from_raw_words(name: impl Into<String>, words: &[u32], config: ProgramConfig) -> Self {
        Self::new(
            name,
            words.iter().copied().map(InstructionWord::from_raw),
            config,
        )
    }

    /// Program name (listing stem or symbol name).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Instruction words in push order.
    #[must_use]
    pub fn words(&self) -> &[InstructionWord] {
        &self.words
    }

    /// Target configuration.
    #[must_use]
    pub const fn config(&self) -> &ProgramConfig {
        &self.config
    }

    /// Number of instruction words.
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// True if the program has no words.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}
