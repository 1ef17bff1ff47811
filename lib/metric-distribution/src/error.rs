//! Error types for recording samples and merging distributions.

use snafu::Snafu;
use tracing::{debug, error};

use crate::DistributionKind;

/// Errors that can occur when recording a sample.
#[derive(Clone, Copy, Debug, PartialEq, Snafu)]
#[snafu(context(suffix(false)), visibility(pub(crate)))]
pub enum DistributionError {
    /// The sample weight was not a positive, finite number, or could not be represented by the distribution.
    #[snafu(display("unsupported weight {}", weight))]
    UnsupportedWeight {
        /// The rejected weight.
        weight: f64,
    },

    /// The sample value was outside of the representable range.
    #[snafu(display("unsupported value {}: outside of the representable range", value))]
    UnsupportedValue {
        /// The rejected value.
        value: f64,
    },
}

/// Errors that can occur when merging one distribution into another.
#[derive(Clone, Debug, PartialEq, Snafu)]
#[snafu(context(suffix(false)), visibility(pub(crate)))]
pub enum MergeError {
    /// The source distribution would not contribute any samples.
    #[snafu(display(
        "source sample count {} with weight {} contributes no samples",
        sample_count,
        weight
    ))]
    DegenerateSource {
        /// Sample count of the source distribution.
        sample_count: f64,
        /// Weight the source was to be merged with.
        weight: f64,
    },

    /// The two distributions are of different kinds.
    #[snafu(display("cannot merge a {} distribution into a {} distribution", from, to))]
    IncompatibleKinds {
        /// Kind of the source distribution.
        from: DistributionKind,
        /// Kind of the target distribution.
        to: DistributionKind,
    },

    /// The exponential histograms use different scales.
    #[snafu(display("scale mismatch: source has scale {}, target has scale {}", from, to))]
    ScaleMismatch {
        /// Scale of the source histogram.
        from: i32,
        /// Scale of the target histogram.
        to: i32,
    },

    /// The exponential histograms use different zero thresholds.
    #[snafu(display(
        "zero threshold mismatch: source has threshold {}, target has threshold {}",
        from,
        to
    ))]
    ZeroThresholdMismatch {
        /// Zero threshold of the source histogram.
        from: f64,
        /// Zero threshold of the target histogram.
        to: f64,
    },

    /// The weight cannot be applied to integral bucket counts.
    #[snafu(display("weight {} is not integral and cannot scale integral bucket counts", weight))]
    FractionalWeight {
        /// The rejected weight.
        weight: f64,
    },

    /// Scaling the source counts by the weight would overflow the integral bucket counts.
    #[snafu(display("weight {} overflows integral bucket counts", weight))]
    CountOverflow {
        /// The rejected weight.
        weight: f64,
    },
}

impl MergeError {
    /// Logs a refused merge.
    ///
    /// Merging an empty source is routine and only logged at debug level, while every other refusal points at
    /// misconfigured callers.
    pub(crate) fn report(&self) {
        match self {
            Self::DegenerateSource { .. } => debug!(error = %self, "Skipping merge of distribution with no samples."),
            _ => error!(error = %self, "Refusing to merge incompatible distributions."),
        }
    }
}
