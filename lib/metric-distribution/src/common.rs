use float_cmp::ApproxEqRatio as _;
use snafu::ensure;
use tracing::debug;

use crate::error::{DegenerateSource, DistributionError, MergeError, UnsupportedValue, UnsupportedWeight};

/// Largest magnitude a distribution accepts, `2^360`.
pub const MAX_VALUE: f64 = 2.348_542_582_773_833_2e108;

/// Smallest value a distribution accepts, `-2^360`.
pub const MIN_VALUE: f64 = -MAX_VALUE;

/// Compares two floating-point values for approximate equality using a ratio-based approach.
///
/// When comparing two values, the smaller value cannot deviate by more than 0.0000001% of the larger value.
/// This handles NaN values by considering two NaN values as equal.
pub fn float_eq(l_value: f64, r_value: f64) -> bool {
    const RATIO_ERROR: f64 = 0.00000001;

    (l_value.is_nan() && r_value.is_nan()) || l_value.approx_eq_ratio(&r_value, RATIO_ERROR)
}

/// Returns `true` if the value lies within `[MIN_VALUE, MAX_VALUE]`.
///
/// NaN and infinities are never supported.
pub fn is_supported_value(value: f64) -> bool {
    (MIN_VALUE..=MAX_VALUE).contains(&value)
}

/// Validates a sample before it is recorded.
pub(crate) fn validate_sample(value: f64, weight: f64, allow_negative: bool) -> Result<(), DistributionError> {
    ensure!(weight > 0.0 && weight.is_finite(), UnsupportedWeight { weight });
    ensure!(
        is_supported_value(value) && (allow_negative || value >= 0.0),
        UnsupportedValue { value }
    );
    Ok(())
}

/// Ensures a source with `sample_count` samples, scaled by `weight`, actually contributes samples.
pub(crate) fn validate_merge_weight(sample_count: f64, weight: f64) -> Result<(), MergeError> {
    ensure!(
        weight.is_finite() && sample_count * weight > 0.0,
        DegenerateSource { sample_count, weight }
    );
    Ok(())
}

/// Merges an incoming unit into the current one.
///
/// The first non-empty unit wins. Conflicting units are logged and otherwise ignored.
pub(crate) fn merge_unit(current: &mut String, incoming: &str) {
    if current.is_empty() {
        current.push_str(incoming);
    } else if !incoming.is_empty() && current != incoming {
        debug!(current = %current, incoming, "Conflicting units in distribution. Keeping the first unit.");
    }
}
