//! AXI-Lite register map of the IMAGine GEMV IP.
//!
//! Sixteen 32-bit slave registers starting at the IP base address. The
//! lower half is written by the host, the upper half is read-only status.
//!
//! ```text
//! reg   offset  dir  purpose
//! ────  ──────  ───  ──────────────────────────────────────────────
//!  0    0x00    W    FIFO-in data (instruction word)
//!  1    0x04    W    FIFO control   (bit 0 reset, bit 1 wr, bit 2 rd)
//!  2    0x08    W    engine control (bit 0 clear EOV)
//!  3-7          W    reserved
//!  8    0x20    R    FIFO-out data  (output word)
//!  9    0x24    R    FIFO status    (bit 0 in-full, bit 1 out-valid)
//! 10    0x28    R    engine status  (bit 0 EOV)
//! 11-15         R    reserved
//! ```

/// Number of slave registers exposed by the IP.
pub const REG_COUNT: usize = 16;

/// Width of one register in bytes.
pub const REG_BYTES: usize = 4;

/// Size of the register window in bytes.
pub const WINDOW_BYTES: usize = REG_COUNT * REG_BYTES;

// ── Host-written registers ───────────────────────────────────────────────────

/// FIFO-in data register. Latched into the input FIFO on a write strobe.
pub const FINP_DATA: usize = 0;

/// FIFO control register (bit-pulse control).
pub const FIFO_CTRL: usize = 1;

/// Engine control register (bit-pulse control).
pub const ENGINE_CTRL: usize = 2;

// ── Status registers ─────────────────────────────────────────────────────────

/// FIFO-out data register. Holds the head of the output FIFO while valid.
pub const FOUT_DATA: usize = 8;

/// FIFO status register.
pub const FIFO_STATUS: usize = 9;

/// Engine status register.
pub const ENGINE_STATUS: usize = 10;

/// Byte offset of register `index` from the IP base address.
#[must_use]
pub const fn offset(index: usize) -> usize {
    index * REG_BYTES
}

/// True for the reserved slots 3–7 and 11–15.
#[must_use]
pub const fn is_reserved(index: usize) -> bool {
    matches!(index, 3..=7 | 11..=15)
}

/// Short name of a register, for dumps and trace output.
#[must_use]
pub const fn name(index: usize) -> &'static str {
    match index {
        FINP_DATA => "finp_data",
        FIFO_CTRL => "fifo_ctrl",
        ENGINE_CTRL => "engine_ctrl",
        FOUT_DATA => "fout_data",
        FIFO_STATUS => "fifo_status",
        ENGINE_STATUS => "engine_status",
        _ => "reserved",
    }
}

// ── Bit definitions ──────────────────────────────────────────────────────────

/// `FIFO_CTRL` bits. Each is pulsed: set, then cleared.
pub mod fifo_ctrl {
    /// Reset both FIFOs.
    pub const RESET: u32 = 1 << 0;
    /// Latch `FINP_DATA` into the input FIFO.
    pub const FINP_WR: u32 = 1 << 1;
    /// Pop the head of the output FIFO.
    pub const FOUT_RD: u32 = 1 << 2;
}

/// `ENGINE_CTRL` bits.
pub mod engine_ctrl {
    /// Clear the sticky end-of-vector flag.
    pub const CLEAR_EOV: u32 = 1 << 0;
}

/// `FIFO_STATUS` bits.
pub mod fifo_status {
    /// Input FIFO cannot accept another word.
    pub const FINP_FULL: u32 = 1 << 0;
    /// `FOUT_DATA` holds a valid output word.
    pub const FOUT_VALID: u32 = 1 << 1;
}

/// `ENGINE_STATUS` bits.
pub mod engine_status {
    /// End-of-vector: the last compute pass finished. Sticky until cleared.
    pub const EOV: u32 = 1 << 0;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_match_axi_layout() {
        assert_eq!(offset(FINP_DATA), 0x00);
        assert_eq!(offset(FIFO_CTRL), 0x04);
        assert_eq!(offset(ENGINE_CTRL), 0x08);
        assert_eq!(offset(FOUT_DATA), 0x20);
        assert_eq!(offset(FIFO_STATUS), 0x24);
        assert_eq!(offset(ENGINE_STATUS), 0x28);
        assert_eq!(WINDOW_BYTES, 0x40);
    }

    #[test]
    fn reserved_slots() {
        let reserved: Vec<usize> = (0..REG_COUNT).filter(|&i| is_reserved(i)).collect();
        assert_eq!(reserved, vec![3, 4, 5, 6, 7, 11, 12, 13, 14, 15]);
        assert_eq!(name(5), "reserved");
        assert_eq!(name(FIFO_STATUS), "fifo_status");
    }

    #[test]
    fn control_bits_distinct() {
        assert_eq!(
            fifo_ctrl::RESET | fifo_ctrl::FINP_WR | fifo_ctrl::FOUT_RD,
            0b111
        );
        assert_ne!(fifo_status::FINP_FULL, fifo_status::FOUT_VALID);
    }
}
