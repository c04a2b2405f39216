//! Register port abstraction
//!
//! Everything above this layer talks to the engine through sixteen 32-bit
//! registers addressed by index (see [`imagine_chip::regs`]). Two ports
//! exist: [`MmioPort`](crate::mmio::MmioPort) for the real IP and
//! [`SimulatedEngine`](crate::sim::SimulatedEngine) for tests and dry runs.

use std::fmt::Debug;

/// Raw access to the engine's register file.
///
/// Indices are register numbers, not byte offsets. Implementations may
/// panic on an index outside `0..REG_COUNT`; the driver only uses indices
/// from the register map.
pub trait RegisterPort: Debug {
    /// Read register `index`.
    fn read(&mut self, index: usize) -> u32;

    /// Write register `index`.
    fn write(&mut self, index: usize, value: u32);
}

impl<P: RegisterPort + ?Sized> RegisterPort for &mut P {
    fn read(&mut self, index: usize) -> u32 {
        (**self).read(index)
    }

    fn write(&mut self, index: usize, value: u32) {
        (**self).write(index, value);
    }
}

impl<P: RegisterPort + ?Sized> RegisterPort for Box<P> {
    fn read(&mut self, index: usize) -> u32 {
        (**self).read(index)
    }

    fn write(&mut self, index: usize, value: u32) {
        (**self).write(index, value);
    }
}
