//! Vector loading
//!
//! Loads a host vector into one engine vector register.
//!
//! # Sequence
//!
//! ```text
//! MV_SELECT_ALL                      ┐
//! MV_WRITE base+0, 0                 │ clear: every row of every block
//! ...                                │
//! MV_WRITE base+reg_width-1, 0       ┘
//! MV_SELECT_COL 0                    ┐ block 0, only if any row non-zero
//! MV_WRITE base+r, row[r]            │ one per non-zero row, ascending
//! ...                                ┘
//! MV_SELECT_COL 1                      block 1 ...
//! ```
//!
//! The clear is what lets the block writes skip zero rows and zero blocks:
//! whatever a previous load left behind is gone before the sparse writes.
//!
//! Every lane value must fit a `reg_width`-bit signed register; the whole
//! vector is checked before the first word goes out.
//!
//! There is no rollback. If the stream is cut off part way, the register
//! holds a mix of old and new rows; load it again.

use crate::error::{ImagineError, Result};
use crate::fixed;
use crate::port::RegisterPort;
use crate::transport::FifoTransport;
use crate::transpose::{check_lanes, transpose};
use imagine_chip::instr::clear_register;
use imagine_chip::params::{ID_WIDTH, MAX_BLOCKS};
use imagine_chip::{EngineParams, InstructionWord, Program};
use tracing::debug;

/// Summary of one planned or pushed load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// Instruction words, including the clear.
    pub instructions: usize,
    /// Block windows the vector was split into.
    pub windows: usize,
    /// Windows skipped because every lane was zero.
    pub zero_windows: usize,
    /// Row writes issued after the clear.
    pub row_writes: usize,
}

/// Check that a program was assembled for the engine geometry.
///
/// # Errors
///
/// Returns [`ImagineError::ProgramMismatch`] if the register width or the
/// block width differ, or the program needs wider block ids than the
/// engine decodes.
pub fn check_compatible(program: &Program, params: &EngineParams) -> Result<()> {
    let cfg = program.config();
    if cfg.reg_width != params.reg_width() {
        return Err(ImagineError::program_mismatch(format!(
            "'{}' assembled for {}-bit registers, engine has {}",
            program.name(),
            cfg.reg_width,
            params.reg_width()
        )));
    }
    if cfg.lanes_per_block != params.lanes_per_block() {
        return Err(ImagineError::program_mismatch(format!(
            "'{}' assembled for {} lanes per block, engine has {}",
            program.name(),
            cfg.lanes_per_block,
            params.lanes_per_block()
        )));
    }
    if cfg.id_width > ID_WIDTH {
        return Err(ImagineError::program_mismatch(format!(
            "'{}' uses {}-bit block ids, engine decodes {ID_WIDTH}",
            program.name(),
            cfg.id_width
        )));
    }
    Ok(())
}

/// Builds and streams vector-register loads for one engine geometry.
#[derive(Debug, Clone, Copy)]
pub struct VectorLoader {
    params: EngineParams,
}

impl VectorLoader {
    /// Loader for the given geometry.
    pub const fn new(params: EngineParams) -> Self {
        Self { params }
    }

    /// Engine geometry.
    pub const fn params(&self) -> &EngineParams {
        &self.params
    }

    /// Check that a program was assembled for this geometry.
    ///
    /// # Errors
    ///
    /// See [`check_compatible`].
    pub fn check_program(&self, program: &Program) -> Result<()> {
        check_compatible(program, &self.params)
    }

    /// Clear a vector register. Returns the instruction count.
    ///
    /// # Errors
    ///
    /// Returns [`ImagineError::RegisterOutOfRange`] for a register without a
    /// BRAM image, or a transport timeout.
    pub fn clear_register<P: RegisterPort>(
        &self,
        transport: &mut FifoTransport<P>,
        register: usize,
    ) -> Result<usize> {
        let base = self.register_base(register)?;
        transport.push_all(clear_register(base, self.params.reg_width()))
    }

    /// Instruction words that load `values` into `register`, without
    /// pushing them.
    ///
    /// # Errors
    ///
    /// Same range checks as [`load_vector_row`](Self::load_vector_row).
    pub fn plan_vector_row(&self, register: usize, values: &[i16]) -> Result<Vec<InstructionWord>> {
        let mut words = Vec::new();
        self.emit(register, values, |w| {
            words.push(w);
            Ok(())
        })?;
        Ok(words)
    }

    /// Load `values` into `register`. Returns the instruction count.
    ///
    /// # Errors
    ///
    /// Returns [`ImagineError::RegisterOutOfRange`],
    /// [`ImagineError::VectorTooLong`] or [`ImagineError::ValueOutOfRange`]
    /// before pushing anything, or a transport timeout part way through.
    pub fn load_vector_row<P: RegisterPort>(
        &self,
        transport: &mut FifoTransport<P>,
        register: usize,
        values: &[i16],
    ) -> Result<usize> {
        let stats = self.emit(register, values, |w| transport.push_instruction(w))?;
        Ok(stats.instructions)
    }

    /// Load a float vector, converting it to fixed point with `frac_width`
    /// fraction bits first. Returns the instruction count.
    ///
    /// Conversion saturates at the `i16` limits; anything that then does
    /// not fit the register width is rejected.
    ///
    /// # Errors
    ///
    /// Same as [`load_vector_row`](Self::load_vector_row).
    pub fn load_vector_row_f32<P: RegisterPort>(
        &self,
        transport: &mut FifoTransport<P>,
        register: usize,
        values: &[f32],
        frac_width: u32,
    ) -> Result<usize> {
        let mut lanes = vec![0i16; values.len()];
        fixed::to_fixed_slice(values, frac_width, &mut lanes);
        self.load_vector_row(transport, register, &lanes)
    }

    /// Statistics for loading `values` into `register`, without pushing.
    ///
    /// # Errors
    ///
    /// Same range checks as [`load_vector_row`](Self::load_vector_row).
    pub fn stats(&self, register: usize, values: &[i16]) -> Result<LoadStats> {
        self.emit(register, values, |_| Ok(()))
    }

    fn register_base(&self, register: usize) -> Result<u16> {
        self.params
            .register_base(register)
            .ok_or(ImagineError::RegisterOutOfRange {
                register,
                max: self.params.register_count(),
            })
    }

    /// Shared load sequence. Range checks happen before the first word.
    fn emit(
        &self,
        register: usize,
        values: &[i16],
        mut sink: impl FnMut(InstructionWord) -> Result<()>,
    ) -> Result<LoadStats> {
        let base = self.register_base(register)?;
        let windows = values.chunks(self.params.lanes_per_block());
        if windows.len() > MAX_BLOCKS {
            return Err(ImagineError::VectorTooLong {
                windows: windows.len(),
                max: MAX_BLOCKS,
            });
        }
        check_lanes(values, self.params.reg_width())?;

        let mut stats = LoadStats {
            windows: windows.len(),
            ..LoadStats::default()
        };

        for word in clear_register(base, self.params.reg_width()) {
            sink(word)?;
            stats.instructions += 1;
        }

        for (block, window) in windows.enumerate() {
            let image = transpose(&self.params, window)?;
            if image.is_zero() {
                stats.zero_windows += 1;
                continue;
            }
            // windows.len() <= MAX_BLOCKS checked above
            #[allow(clippy::cast_possible_truncation)]
            let column = block as u8;
            sink(InstructionWord::select_column(column))?;
            stats.instructions += 1;
            for (row, data) in image.iter_non_zero() {
                // row < reg_width <= 16
                #[allow(clippy::cast_possible_truncation)]
                let addr = base + row as u16;
                sink(InstructionWord::mem_write(addr, data))?;
                stats.instructions += 1;
                stats.row_writes += 1;
            }
        }

        debug!(
            "Vector register {register}: {} windows ({} zero), {} row writes, {} instructions",
            stats.windows, stats.zero_windows, stats.row_writes, stats.instructions
        );
        Ok(stats)
    }
}
