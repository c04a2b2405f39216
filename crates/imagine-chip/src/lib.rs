//! Silicon model of the IMAGine GEMV engine.
//!
//! This crate has **no dependencies** and **no hardware access**. It is a
//! pure model of what the host driver needs to know about the IP: register
//! addresses, instruction and output word layouts, block geometry, and the
//! program descriptor produced by the assembler.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`regs`] | AXI-Lite register map and bit definitions |
//! | [`params`] | Field widths and PE block geometry |
//! | [`instr`] | Instruction word encoder / decoder |
//! | [`output`] | FIFO-out word decoder |
//! | [`program`] | Pre-assembled program descriptor |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod instr;
pub mod output;
pub mod params;
pub mod program;
pub mod regs;

pub use instr::{InstructionKind, InstructionWord};
pub use output::OutputWord;
pub use params::{EngineParams, ParamsError};
pub use program::{Program, ProgramConfig};
