//! Memory-mapped access to the IMAGine register window
//!
//! Two ways to obtain a port:
//!
//! - [`MmioPort::from_raw`] on a bare-metal host where the IP sits at a
//!   fixed physical address (e.g. `XPAR_IMAGINE_GEMV_0_S00_AXI_BASEADDR`).
//! - [`MmioPort::map`] on a Linux host, mapping one page of a UIO device or
//!   `/dev/mem` with `rustix`.

// MMIO registers are naturally aligned by the AXI interconnect
#![allow(clippy::cast_ptr_alignment)]

use crate::error::{ImagineError, Result};
use crate::port::RegisterPort;
use imagine_chip::regs::{self, REG_COUNT};
use rustix::mm::{mmap, munmap, MapFlags, ProtFlags};
use std::fs::OpenOptions;
use std::os::unix::io::AsFd;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

/// Environment variable naming the device node to map.
pub const DEVICE_ENV: &str = "IMAGINE_DEVICE";

/// Device node used when [`DEVICE_ENV`] is unset.
pub const DEFAULT_DEVICE: &str = "/dev/uio0";

/// Mapping granularity. The register window (64 bytes) fits in one page.
const PAGE_SIZE: usize = 4096;

/// Device node to map: `$IMAGINE_DEVICE`, else [`DEFAULT_DEVICE`].
pub fn default_device_path() -> PathBuf {
    std::env::var_os(DEVICE_ENV).map_or_else(|| PathBuf::from(DEFAULT_DEVICE), PathBuf::from)
}

/// Volatile register port over the IP's AXI-Lite window.
pub struct MmioPort {
    base: NonNull<u32>,
    /// Owned mapping `(ptr, len)` to release on drop; `None` for `from_raw`.
    mapping: Option<(NonNull<u8>, usize)>,
}

impl std::fmt::Debug for MmioPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MmioPort")
            .field("base", &format_args!("{:p}", self.base))
            .field("mapped", &self.mapping.is_some())
            .finish()
    }
}

// SAFETY: Send - the port exclusively owns its view of the register window.
// Moving it to another thread does not invalidate the mapping. It is not
// Sync: register access needs `&mut self`, one driver instance at a time.
unsafe impl Send for MmioPort {}

impl MmioPort {
    /// Wrap a register window at a fixed address.
    ///
    /// # Safety
    ///
    /// `base` must point to the IP's register window, mapped as device
    /// memory, valid for `REG_COUNT` 32-bit volatile reads and writes for
    /// the life of the port, and not accessed through any other port.
    pub const unsafe fn from_raw(base: NonNull<u32>) -> Self {
        Self {
            base,
            mapping: None,
        }
    }

    /// Map the register window from a device node.
    ///
    /// `offset` is the page-aligned byte offset of the window in the node:
    /// `0` for a UIO device, the physical base address for `/dev/mem`.
    ///
    /// # Errors
    ///
    /// Returns error if the node cannot be opened, the offset is not page
    /// aligned, or `mmap` fails.
    pub fn map(path: impl AsRef<Path>, offset: u64) -> Result<Self> {
        let path = path.as_ref();
        if offset % PAGE_SIZE as u64 != 0 {
            return Err(ImagineError::mapping(
                path,
                format!("offset {offset:#x} is not page aligned"),
            ));
        }

        tracing::debug!("Mapping IMAGine registers: {} @ {offset:#x}", path.display());

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| ImagineError::mapping(path, e.to_string()))?;

        // SAFETY: mmap of a device node. Invariants: (1) fd is open read/write
        // for the duration of the call; (2) length is one page, covering the
        // 64-byte window; (3) MAP_SHARED so writes reach the device; (4) the
        // mapping outlives the fd, which may be closed after mmap returns;
        // (5) released exactly once in Drop.
        let ptr = unsafe {
            mmap(
                std::ptr::null_mut(),
                PAGE_SIZE,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                file.as_fd(),
                offset,
            )
        }
        .map_err(|e| ImagineError::mapping(path, format!("mmap failed: {e}")))?;

        let ptr = NonNull::new(ptr.cast::<u8>())
            .ok_or_else(|| ImagineError::mapping(path, "mmap returned null"))?;

        tracing::info!("Mapped IMAGine registers from {} at {ptr:p}", path.display());

        Ok(Self {
            base: ptr.cast::<u32>(),
            mapping: Some((ptr, PAGE_SIZE)),
        })
    }

    fn reg_ptr(&self, index: usize) -> *mut u32 {
        assert!(index < REG_COUNT, "Register index {index} out of range");
        // SAFETY: index < REG_COUNT keeps the pointer inside the window
        // guaranteed by from_raw/map.
        unsafe { self.base.as_ptr().add(index) }
    }
}

impl RegisterPort for MmioPort {
    fn read(&mut self, index: usize) -> u32 {
        let ptr = self.reg_ptr(index);
        // SAFETY: read_volatile necessary for MMIO, status bits change under
        // us. ptr is in bounds and aligned (reg_ptr).
        let value = unsafe { ptr.read_volatile() };
        tracing::trace!("read  {:<13} = {value:#010x}", regs::name(index));
        value
    }

    fn write(&mut self, index: usize, value: u32) {
        let ptr = self.reg_ptr(index);
        tracing::trace!("write {:<13} = {value:#010x}", regs::name(index));
        // SAFETY: write_volatile necessary for MMIO, writes have side
        // effects (strobes). ptr is in bounds and aligned (reg_ptr).
        unsafe { ptr.write_volatile(value) };
    }
}

impl Drop for MmioPort {
    fn drop(&mut self) {
        if let Some((ptr, len)) = self.mapping.take() {
            // SAFETY: (ptr, len) came from a successful mmap in map() and
            // Drop runs at most once.
            if let Err(e) = unsafe { munmap(ptr.as_ptr().cast(), len) } {
                tracing::error!("munmap failed during drop: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_port_over_plain_memory() {
        let mut window = [0u32; REG_COUNT];
        // SAFETY: window outlives the port and is only touched through it
        let base = NonNull::new(window.as_mut_ptr()).unwrap();
        let mut port = unsafe { MmioPort::from_raw(base) };
        port.write(regs::FINP_DATA, 0xDEAF_CAFE);
        port.write(regs::ENGINE_STATUS, 1);
        assert_eq!(port.read(regs::FINP_DATA), 0xDEAF_CAFE);
        assert_eq!(port.read(regs::ENGINE_STATUS), 1);
        drop(port);
        assert_eq!(window[regs::ENGINE_STATUS], 1);
    }

    #[test]
    fn rejects_unaligned_offset() {
        let err = MmioPort::map("/dev/null", 0x10).unwrap_err();
        assert!(matches!(err, ImagineError::Mapping { .. }));
    }

    #[test]
    #[ignore] // Requires the IMAGine IP behind a UIO device
    fn map_uio_device() {
        let mut port = MmioPort::map(default_device_path(), 0).expect("map registers");
        let status = port.read(regs::FIFO_STATUS);
        println!("fifo_status = {status:#x}");
    }
}
