//! Integer helpers for the step timing hot path.
//!
//! Everything here runs in a fixed number of iterations so the timer
//! interrupt has a known worst-case duration.

/// Integer square root with a bounded iteration count.
pub trait IntSqrt: Copy {
    /// Largest `r` with `r * r <= self`.
    fn isqrt(self) -> Self;
}

macro_rules! impl_int_sqrt {
    ($($t:ty),*) => {
        $(
            impl IntSqrt for $t {
                #[inline]
                fn isqrt(self) -> Self {
                    // One result bit per iteration, always BITS / 2 iterations.
                    let mut op = self;
                    let mut res: $t = 0;
                    let mut one: $t = 1 << (<$t>::BITS - 2);
                    while one != 0 {
                        if op >= res + one {
                            op -= res + one;
                            res = (res >> 1) + one;
                        } else {
                            res >>= 1;
                        }
                        one >>= 2;
                    }
                    res
                }
            }
        )*
    };
}

impl_int_sqrt!(u16, u32, u64);

/// Round a non-negative float to the nearest integer, saturating at
/// `u32::MAX`. NaN maps to zero.
#[inline]
pub fn round_to_u32(value: f32) -> u32 {
    let r = libm::roundf(value);
    if r >= u32::MAX as f32 {
        u32::MAX
    } else if r > 0.0 {
        r as u32
    } else {
        0
    }
}

/// Round a float to the nearest integer, saturating at the `i32` range.
#[inline]
pub fn round_to_i32(value: f32) -> i32 {
    let r = libm::roundf(value);
    if r >= i32::MAX as f32 {
        i32::MAX
    } else if r <= i32::MIN as f32 {
        i32::MIN
    } else if r.is_nan() {
        0
    } else {
        r as i32
    }
}

/// `a * b / c` in 64-bit arithmetic, rounded down and saturated to `u32`.
#[inline]
pub fn mul_div_u32(a: u32, b: u32, c: u32) -> u32 {
    debug_assert!(c != 0);
    let r = (a as u64 * b as u64) / c as u64;
    if r > u32::MAX as u64 {
        u32::MAX
    } else {
        r as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isqrt_exact_squares() {
        for r in [0u64, 1, 2, 3, 255, 65_535, 1 << 20, u32::MAX as u64] {
            assert_eq!(IntSqrt::isqrt(r * r), r);
        }
    }

    #[test]
    fn test_isqrt_rounds_down() {
        assert_eq!(IntSqrt::isqrt(8u32), 2);
        assert_eq!(IntSqrt::isqrt(15u16), 3);
        assert_eq!(IntSqrt::isqrt(24u64), 4);
        assert_eq!(IntSqrt::isqrt(u16::MAX), 255);
        assert_eq!(IntSqrt::isqrt(u32::MAX), 65_535);
        assert_eq!(IntSqrt::isqrt(u64::MAX), u32::MAX as u64);
    }

    #[test]
    fn test_isqrt_widths_agree() {
        for v in (0u32..70_000).step_by(7) {
            let r = IntSqrt::isqrt(v as u64);
            assert_eq!(IntSqrt::isqrt(v) as u64, r);
            if v <= u16::MAX as u32 {
                assert_eq!(IntSqrt::isqrt(v as u16) as u64, r);
            }
            assert!(r * r <= v as u64 && (r + 1) * (r + 1) > v as u64);
        }
    }

    #[test]
    fn test_saturating_rounding() {
        assert_eq!(round_to_u32(2.5), 3);
        assert_eq!(round_to_u32(-4.0), 0);
        assert_eq!(round_to_u32(1e12), u32::MAX);
        assert_eq!(round_to_u32(f32::NAN), 0);
        assert_eq!(round_to_i32(-2.5), -3);
        assert_eq!(round_to_i32(-1e12), i32::MIN);
        assert_eq!(round_to_i32(f32::NAN), 0);
    }

    #[test]
    fn test_mul_div() {
        assert_eq!(mul_div_u32(1_000_000, 3, 4), 750_000);
        assert_eq!(mul_div_u32(u32::MAX, u32::MAX, 1), u32::MAX);
    }
}
