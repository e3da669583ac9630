//! Scalar helpers and numerical tolerances.

/// Tolerance used for geometric comparisons (angles, lengths in metres).
pub const EPSILON: f64 = 1e-10;

/// Finite stand-in for an unbounded coordinate.
pub const INFINITY: f64 = 1e100;

/// Square of `x`.
#[inline]
pub fn sqr(x: f64) -> f64 {
    x * x
}

/// Sign of `x`, with zero counted as positive.
#[inline]
pub fn sign(x: f64) -> f64 {
    if x < 0.0 {
        -1.0
    } else {
        1.0
    }
}

/// Floating modulo mapped into `[0, m)` for positive `m`.
///
/// $x \bmod m$ with the result shifted by $m$ when negative.
pub fn fmod_pos(x: f64, m: f64) -> f64 {
    let r = x % m;
    if r < 0.0 {
        r + m
    } else {
        r
    }
}
