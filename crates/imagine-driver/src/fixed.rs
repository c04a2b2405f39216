//! Fixed-point conversion for engine data
//!
//! Lane values are signed 16-bit fixed point with `frac_width` fraction
//! bits, as recorded in each program's configuration.

/// Scale factor `2^frac_width`.
#[allow(clippy::cast_precision_loss)]
pub fn scale(frac_width: u32) -> f32 {
    (1u32 << frac_width.min(31)) as f32
}

/// Float to fixed point, truncating toward zero.
///
/// Out-of-range values saturate to `i16::MIN` / `i16::MAX`; NaN maps to 0.
#[allow(clippy::cast_possible_truncation)]
pub fn to_fixed(value: f32, frac_width: u32) -> i16 {
    (value * scale(frac_width)) as i16
}

/// Fixed point to float.
pub fn from_fixed(value: i16, frac_width: u32) -> f32 {
    f32::from(value) / scale(frac_width)
}

/// Convert a slice into a caller-provided buffer. Returns the count written.
pub fn to_fixed_slice(values: &[f32], frac_width: u32, out: &mut [i16]) -> usize {
    let n = values.len().min(out.len());
    for (dst, &src) in out.iter_mut().zip(&values[..n]) {
        *dst = to_fixed(src, frac_width);
    }
    n
}

/// Sign-extend the low `width` bits of `bits`. `width` is `1..=16`.
pub fn sign_extend(bits: u16, width: usize) -> i16 {
    let shift = 16 - width;
    // Reinterpret then arithmetic-shift back down
    #[allow(clippy::cast_possible_wrap)]
    let v = (bits << shift) as i16;
    v >> shift
}

/// True if `value` is representable as a `width`-bit signed lane.
pub fn fits_width(value: i16, width: usize) -> bool {
    width >= 16 || {
        let half = 1i32 << (width - 1);
        (-half..half).contains(&i32::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_exact_values() {
        for v in [0.0f32, 1.0, -1.0, 0.5, -0.25, 3.75, 127.99609375] {
            assert_eq!(from_fixed(to_fixed(v, 8), 8), v);
        }
    }

    #[test]
    fn truncates_toward_zero() {
        assert_eq!(to_fixed(0.9 / 256.0, 8), 0);
        assert_eq!(to_fixed(-1.9 / 256.0, 8), -1);
    }

    #[test]
    fn saturates() {
        assert_eq!(to_fixed(1000.0, 8), i16::MAX);
        assert_eq!(to_fixed(-1000.0, 8), i16::MIN);
        assert_eq!(to_fixed(f32::NAN, 8), 0);
    }

    #[test]
    fn slice_conversion_stops_at_shorter() {
        let mut out = [0i16; 2];
        assert_eq!(to_fixed_slice(&[1.0, 2.0, 3.0], 4, &mut out), 2);
        assert_eq!(out, [16, 32]);
    }

    #[test]
    fn sign_extension() {
        assert_eq!(sign_extend(0xFFFF, 16), -1);
        assert_eq!(sign_extend(0x00FF, 8), -1);
        assert_eq!(sign_extend(0x007F, 8), 127);
        assert_eq!(sign_extend(0x0005, 4), 5);
        assert_eq!(sign_extend(0x0001, 1), -1);
    }

    #[test]
    fn width_limits() {
        assert!(fits_width(i16::MIN, 16));
        assert!(fits_width(i16::MAX, 16));
        assert!(fits_width(127, 8));
        assert!(fits_width(-128, 8));
        assert!(!fits_width(128, 8));
        assert!(!fits_width(-129, 8));
        assert!(fits_width(-1, 1));
        assert!(!fits_width(1, 1));
    }
}
