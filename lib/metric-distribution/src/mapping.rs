//! Exponential bucket index mapping.
//!
//! Bucket boundaries are integer powers of `base = 2^(2^-scale)`. Buckets are upper-inclusive: bucket `i` covers
//! `(base^i, base^(i+1)]`, which matches the OpenTelemetry exponential histogram data model. Larger scales give
//! finer buckets, and every increment of the scale splits each bucket in two.
//!
//! For `scale <= 0`, indices and boundaries are derived exactly from the binary exponent of the value. For
//! `scale > 0`, a logarithm is used, except for exact powers of two which are always mapped exactly.

use std::f64::consts::{LN_2, LOG2_E};

/// Smallest supported scale.
pub const MIN_SCALE: i32 = -10;

/// Largest supported scale.
pub const MAX_SCALE: i32 = 20;

const SIGNIFICAND_WIDTH: u32 = 52;
const SIGNIFICAND_MASK: u64 = (1 << SIGNIFICAND_WIDTH) - 1;
const EXPONENT_MASK: u64 = 0x7ff;
const EXPONENT_BIAS: i64 = 1023;
const MIN_NORMAL_EXPONENT: i64 = -1022;
const MAX_NORMAL_EXPONENT: i64 = 1023;
const MIN_SUBNORMAL_EXPONENT: i64 = -1074;

/// Splits a positive, finite value into its base-2 exponent and whether it is an exact power of two.
///
/// The value lies in `[2^exponent, 2^(exponent + 1))`.
fn decompose(value: f64) -> (i64, bool) {
    let bits = value.to_bits();
    let biased_exponent = ((bits >> SIGNIFICAND_WIDTH) & EXPONENT_MASK) as i64;
    let significand = bits & SIGNIFICAND_MASK;

    if biased_exponent == 0 {
        // Subnormal: the value is `significand * 2^-1074`.
        let top_bit = 63 - i64::from(significand.leading_zeros());
        let exact = significand == 1 << top_bit;
        (MIN_SUBNORMAL_EXPONENT + top_bit, exact)
    } else {
        (biased_exponent - EXPONENT_BIAS, significand == 0)
    }
}

/// Computes `2^exponent` exactly, saturating to infinity above the normal range and to zero below the subnormal range.
fn exact_power_of_two(exponent: i64) -> f64 {
    if exponent > MAX_NORMAL_EXPONENT {
        f64::INFINITY
    } else if exponent >= MIN_NORMAL_EXPONENT {
        f64::from_bits(((exponent + EXPONENT_BIAS) as u64) << SIGNIFICAND_WIDTH)
    } else if exponent >= MIN_SUBNORMAL_EXPONENT {
        f64::from_bits(1 << (exponent - MIN_SUBNORMAL_EXPONENT))
    } else {
        0.0
    }
}

/// Clamps a scale into `[MIN_SCALE, MAX_SCALE]`.
pub fn clamp_scale(scale: i32) -> i32 {
    scale.clamp(MIN_SCALE, MAX_SCALE)
}

/// Maps a value to the index of the bucket containing its magnitude.
///
/// The sign of the value is ignored, so negative values map to the bucket of their absolute value. The value must be
/// non-zero and finite, and the scale must lie within `[MIN_SCALE, MAX_SCALE]`.
pub fn map_to_index(value: f64, scale: i32) -> i32 {
    let value = value.abs();
    debug_assert!(value > 0.0 && value.is_finite(), "value must be non-zero and finite");
    debug_assert!((MIN_SCALE..=MAX_SCALE).contains(&scale), "scale out of range");

    let (exponent, exact) = decompose(value);
    let index = if scale <= 0 {
        // Exact powers of two sit on the upper, inclusive, edge of the bucket below.
        let exponent = if exact { exponent - 1 } else { exponent };
        exponent >> -scale
    } else if exact {
        (exponent << scale) - 1
    } else {
        let scale_factor = LOG2_E * f64::from(1u32 << scale);
        (value.ln() * scale_factor).ceil() as i64 - 1
    };

    index as i32
}

/// Returns the lower boundary of the bucket at `index`.
///
/// The upper boundary of bucket `i` is `lower_boundary(i + 1, scale)`. Boundaries past the representable range
/// saturate to infinity, or zero for large negative indices.
pub fn lower_boundary(index: i32, scale: i32) -> f64 {
    debug_assert!((MIN_SCALE..=MAX_SCALE).contains(&scale), "scale out of range");

    if scale <= 0 {
        return exact_power_of_two(i64::from(index) << -scale);
    }

    let inverse_factor = LN_2 / f64::from(1u32 << scale);
    (f64::from(index) * inverse_factor).exp()
}
