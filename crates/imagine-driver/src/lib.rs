//! Host driver for the IMAGine GEMV engine.
//!
//! The engine is a systolic array of processing elements behind two
//! hardware FIFOs and a handful of status/control registers. The host never
//! touches PE memory directly: it streams 32-bit instruction words into
//! FIFO-in and drains results from FIFO-out.
//!
//! # Layers
//!
//! ```text
//! VectorLoader      split → transpose → encode, skip zero rows
//!      │
//! FifoTransport     backpressure, strobes, EOV, WaitStrategy
//!      │
//! RegisterPort      MmioPort (volatile, mmap) | SimulatedEngine
//! ```
//!
//! # Quick start
//!
//! ```no_run
//! use imagine_driver::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let port = MmioPort::map(imagine_driver::mmio::default_device_path(), 0)?;
//! let mut fifo = FifoTransport::new(port);
//! let loader = VectorLoader::new(EngineParams::default());
//!
//! loader.load_vector_row(&mut fifo, 0, &[1, 2, 3, 4])?;
//! let program = imagine_driver::listing::read_listing("gemv.lst")?;
//! fifo.push_program(&program)?;
//! fifo.poll_until_complete()?;
//! fifo.clear_end_of_vector();
//! let y = fifo.pop_vector(64);
//! # let _ = y;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

mod error;
pub mod fixed;
pub mod listing;
mod loader;
pub mod mmio;
mod port;
pub mod sim;
mod transport;
pub mod transpose;
pub mod wait;

pub use error::{ImagineError, Result};
pub use loader::{check_compatible, LoadStats, VectorLoader};
pub use mmio::MmioPort;
pub use port::RegisterPort;
pub use sim::SimulatedEngine;
pub use transport::{FifoTransport, Sample};
pub use transpose::{transpose, RowImage};
pub use wait::{Backoff, PollConfig, Sleep, Spin, WaitStrategy};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        FifoTransport, ImagineError, MmioPort, PollConfig, RegisterPort, Result, Sample,
        SimulatedEngine, VectorLoader, WaitStrategy,
    };
    pub use imagine_chip::{EngineParams, InstructionWord, Program, ProgramConfig};
}
