//! Bit-plane transposition
//!
//! The host holds a vector as one 16-bit value per lane. The engine's BRAM
//! holds it as bit-planes: row `b` of a register carries bit `b` of every
//! lane in the block, lane `i` at bit position `i`.
//!
//! ```text
//!  lane:      3    2    1    0           row 0: 0b1011   (bit 0 of each lane)
//!  value:   0b01 0b10 0b01 0b11   ──▶    row 1: 0b0101   (bit 1 of each lane)
//! ```
//!
//! Every vector load pays this transpose once per block. Rows that come out
//! all-zero need no write, which is what keeps sparse loads short.

use crate::error::{ImagineError, Result};
use crate::fixed::{fits_width, sign_extend};
use imagine_chip::EngineParams;

/// Deepest register supported (lane values are 16-bit).
const MAX_ROWS: usize = 16;

/// BRAM image of one block of one vector register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowImage {
    rows: [u16; MAX_ROWS],
    depth: usize,
    lanes: usize,
    non_zero: usize,
}

impl RowImage {
    /// One row per bit position, `reg_width` entries.
    pub fn rows(&self) -> &[u16] {
        &self.rows[..self.depth]
    }

    /// Lanes that went into the image.
    pub const fn lanes(&self) -> usize {
        self.lanes
    }

    /// Rows with at least one bit set.
    pub const fn non_zero_rows(&self) -> usize {
        self.non_zero
    }

    /// True if every row is zero.
    pub const fn is_zero(&self) -> bool {
        self.non_zero == 0
    }

    /// `(row index, row)` for every non-zero row, ascending.
    pub fn iter_non_zero(&self) -> impl Iterator<Item = (usize, u16)> + '_ {
        self.rows()
            .iter()
            .copied()
            .enumerate()
            .filter(|&(_, row)| row != 0)
    }

    /// Gather the lane values back out of the rows.
    ///
    /// Lanes are sign-extended from the register width.
    pub fn reconstruct(&self) -> Vec<i16> {
        (0..self.lanes)
            .map(|lane| {
                let bits = self
                    .rows()
                    .iter()
                    .enumerate()
                    .fold(0u16, |acc, (b, &row)| acc | (((row >> lane) & 1) << b));
                sign_extend(bits, self.depth)
            })
            .collect()
    }
}

/// Transpose one block window into its BRAM row image.
///
/// # Errors
///
/// Returns [`ImagineError::WindowTooWide`] if `values` has more entries
/// than the engine has lanes per block, or
/// [`ImagineError::ValueOutOfRange`] if a value needs more than
/// `reg_width` bits.
pub fn transpose(params: &EngineParams, values: &[i16]) -> Result<RowImage> {
    let max = params.lanes_per_block();
    if values.len() > max {
        return Err(ImagineError::WindowTooWide {
            len: values.len(),
            max,
        });
    }

    let depth = params.reg_width();
    check_lanes(values, depth)?;
    let mut rows = [0u16; MAX_ROWS];
    let mut non_zero = 0;
    for (bit, row) in rows.iter_mut().enumerate().take(depth) {
        for (lane, &value) in values.iter().enumerate() {
            // Lane values are raw register bits
            #[allow(clippy::cast_sign_loss)]
            let lane_bit = ((value as u16) >> bit) & 1;
            *row |= lane_bit << lane;
        }
        if *row != 0 {
            non_zero += 1;
        }
    }

    Ok(RowImage {
        rows,
        depth,
        lanes: values.len(),
        non_zero,
    })
}

/// Reject the first value that does not fit a `reg_width`-bit lane.
pub(crate) fn check_lanes(values: &[i16], reg_width: usize) -> Result<()> {
    match values.iter().position(|&v| !fits_width(v, reg_width)) {
        Some(i) => Err(ImagineError::ValueOutOfRange {
            index: i,
            value: values[i],
            reg_width,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> EngineParams {
        EngineParams::default()
    }

    #[test]
    fn worked_example() {
        let p = EngineParams::new(4, 2).unwrap();
        // lanes 0..4 = 0b11, 0b01, 0b10, 0b01 as 2-bit signed values
        let img = transpose(&p, &[-1, 1, -2, 1]).unwrap();
        assert_eq!(img.rows(), &[0b1011, 0b0101]);
        assert_eq!(img.non_zero_rows(), 2);
    }

    #[test]
    fn round_trip_full_window() {
        let values: Vec<i16> = vec![
            0, 1, -1, 255, -256, i16::MAX, i16::MIN, 0x5555, 0x2AAA, 7, -7, 100, -100, 1024,
            -32000, 3,
        ];
        let img = transpose(&params(), &values).unwrap();
        assert_eq!(img.rows().len(), 16);
        assert_eq!(img.reconstruct(), values);
    }

    #[test]
    #[allow(clippy::cast_possible_truncation)]
    fn round_trip_many_windows() {
        // xorshift, deterministic
        let mut state = 0x1234_5678u32;
        let p = params();
        for n in 0..=16 {
            let values: Vec<i16> = (0..n)
                .map(|_| {
                    state ^= state << 13;
                    state ^= state >> 17;
                    state ^= state << 5;
                    state as i16
                })
                .collect();
            let img = transpose(&p, &values).unwrap();
            assert_eq!(img.reconstruct(), values, "window of {n}");
        }
    }

    #[test]
    fn zero_window_has_no_non_zero_rows() {
        let img = transpose(&params(), &[0; 16]).unwrap();
        assert!(img.is_zero());
        assert_eq!(img.iter_non_zero().count(), 0);
    }

    #[test]
    fn sparse_rows_counted() {
        // Only bits 0 and 4 set anywhere
        let img = transpose(&params(), &[1, 16, 17, 0]).unwrap();
        assert_eq!(img.non_zero_rows(), 2);
        let nz: Vec<_> = img.iter_non_zero().collect();
        assert_eq!(nz, vec![(0, 0b0101), (4, 0b0110)]);
    }

    #[test]
    fn short_window_only_touches_low_lanes() {
        let img = transpose(&params(), &[-1, -1, -1]).unwrap();
        assert!(img.rows().iter().all(|&r| r == 0b111));
        assert_eq!(img.lanes(), 3);
    }

    #[test]
    fn rejects_oversized_window() {
        let err = transpose(&params(), &[1; 17]).unwrap_err();
        assert!(matches!(err, ImagineError::WindowTooWide { len: 17, max: 16 }));
    }

    #[test]
    fn narrow_register_sign_extends() {
        let p = EngineParams::new(8, 8).unwrap();
        let img = transpose(&p, &[-1, 127, -128, 5]).unwrap();
        assert_eq!(img.rows().len(), 8);
        assert_eq!(img.reconstruct(), vec![-1, 127, -128, 5]);
    }

    #[test]
    fn rejects_value_wider_than_register() {
        let p = EngineParams::new(8, 8).unwrap();
        let err = transpose(&p, &[1, 300, -200]).unwrap_err();
        assert!(matches!(
            err,
            ImagineError::ValueOutOfRange {
                index: 1,
                value: 300,
                reg_width: 8
            }
        ));
    }
}
