//! Fast base-2 log/exp approximations over IEEE-754 bit patterns.
//!
//! `pow2` is the *exact* algebraic inverse of `approx_log2`, not of the true
//! `log2`. The histogram derives its bin edges from this pair, so both sides
//! must come from the same approximation or adjacent bins stop tiling the
//! axis.

/// Quadratic log2 approximation: split off the binary exponent, rebuild the
/// mantissa `m` in `[1, 2)` by masking, and evaluate `m*(2 - m/3) + e - 2/3`.
/// Error stays within ±0.01 and vanishes at every power of two.
#[inline]
pub fn approx_log2(value: f64) -> f64 {
    let bits = value.to_bits();
    let exponent = (((bits & 0x7ff0_0000_0000_0000) >> 52) as i64 - 1024) as f64;
    let m = f64::from_bits((bits & 0x800f_ffff_ffff_ffff) | 0x3ff0_0000_0000_0000);
    m * (2.0 - m / 3.0) + exponent - 2.0 / 3.0
}

/// Inverse of [`approx_log2`]: recover the octave from `floor(x)`, then undo
/// the quadratic by solving `m*(2 - m/3) - 2/3 = x'` for the mantissa.
#[inline]
pub fn pow2(x: f64) -> f64 {
    let e = x.floor() - 1.0;
    let xp = x - e; // in [1, 2)
    let m = 3.0 - (7.0 - 3.0 * xp).sqrt();
    (e + 1.0).exp2() * m
}
