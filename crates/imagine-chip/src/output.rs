//! FIFO-out word format.
//!
//! ```text
//!  31        24 23       16 15                 0
//! ┌────────────┬───────────┬────────────────────┐
//! │ attribute  │  unused   │  sample (i16)      │
//! └────────────┴───────────┴────────────────────┘
//! ```

/// One raw word read from the FIFO-out data register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct OutputWord(u32);

impl OutputWord {
    /// Wrap a raw register value.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Pack a sample and attribute the way the engine does.
    #[must_use]
    pub const fn new(value: i16, attrib: u8) -> Self {
        Self(((attrib as u32) << 24) | (value as u16 as u32))
    }

    /// Raw register value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Signed fixed-point sample (low 16 bits).
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub const fn value(self) -> i16 {
        self.0 as u16 as i16
    }

    /// Attribute byte (bits 31..24).
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn attrib(self) -> u8 {
        (self.0 >> 24) as u8
    }
}
