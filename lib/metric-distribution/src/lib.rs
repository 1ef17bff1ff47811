//! Metric distributions for aggregating and exporting weighted samples.
//!
//! Three kinds of distributions are provided:
//!
//! - [`RegularDistribution`] records every distinct value exactly.
//! - [`Seh1Distribution`] records values in fixed buckets that are each roughly 10% wide.
//! - [`ExpHistogramDistribution`] records values in OpenTelemetry-style exponential buckets, and can import
//!   [`ExponentialHistogramDataPoint`][otel::ExponentialHistogramDataPoint]s without loss.
//!
//! All of them track the minimum, maximum, sum, and total weight of the recorded samples, and can be merged with a
//! distribution of the same kind. Since exports usually bound the number of values per datum, every distribution can
//! be resized into a set of distributions that each stay within a given number of buckets.
#![deny(warnings)]
#![deny(missing_docs)]

mod common;
pub use self::common::{float_eq, is_supported_value, MAX_VALUE, MIN_VALUE};

mod distribution;
pub use self::distribution::{Distribution, DistributionKind};

mod error;
pub use self::error::{DistributionError, MergeError};

mod exph;
pub use self::exph::ExpHistogramDistribution;

pub mod mapping;

pub mod otel;

mod regular;
pub use self::regular::RegularDistribution;

mod seh1;
pub use self::seh1::Seh1Distribution;
