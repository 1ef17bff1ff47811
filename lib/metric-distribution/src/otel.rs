//! OpenTelemetry histogram data points.
//!
//! These mirror the fields of the OTLP `ExponentialHistogramDataPoint` and `HistogramDataPoint` messages that the
//! distributions know how to import. Attributes, timestamps, and exemplars are handled by whoever owns the data point.

use tracing::debug;

use crate::{common::float_eq, error::DistributionError};

/// A contiguous run of exponential histogram buckets.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Buckets {
    /// Bucket index of the first count.
    pub offset: i32,

    /// Bucket counts, where entry `i` holds the count of bucket `offset + i`.
    pub bucket_counts: Vec<u64>,
}

impl Buckets {
    /// Creates a new run of buckets starting at `offset`.
    pub fn new(offset: i32, bucket_counts: Vec<u64>) -> Self {
        Self { offset, bucket_counts }
    }

    /// Returns an iterator over the non-empty buckets as `(index, count)` pairs.
    ///
    /// Buckets whose index would overflow are skipped.
    pub fn non_empty(&self) -> impl Iterator<Item = (i32, u64)> + '_ {
        self.bucket_counts.iter().enumerate().filter_map(|(i, &count)| {
            if count == 0 {
                return None;
            }
            let index = i32::try_from(i).ok().and_then(|i| self.offset.checked_add(i))?;
            Some((index, count))
        })
    }
}

/// An exponential histogram data point.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExponentialHistogramDataPoint {
    /// Total number of samples.
    pub count: u64,

    /// Sum of all samples.
    pub sum: f64,

    /// Smallest sample, if known.
    pub min: Option<f64>,

    /// Largest sample, if known.
    pub max: Option<f64>,

    /// Resolution of the bucket boundaries.
    pub scale: i32,

    /// Number of samples whose magnitude is at most `zero_threshold`.
    pub zero_count: u64,

    /// Width of the zero bucket.
    pub zero_threshold: f64,

    /// Buckets for positive samples.
    pub positive: Buckets,

    /// Buckets for negative samples, indexed by magnitude.
    pub negative: Buckets,
}

/// An explicit-bucket histogram data point.
///
/// Bucket `i` covers `(explicit_bounds[i - 1], explicit_bounds[i]]`, with the first and last buckets unbounded below
/// and above respectively.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HistogramDataPoint {
    /// Total number of samples.
    pub count: u64,

    /// Sum of all samples.
    pub sum: f64,

    /// Smallest sample, if known.
    pub min: Option<f64>,

    /// Largest sample, if known.
    pub max: Option<f64>,

    /// Upper bounds of every bucket but the last.
    pub explicit_bounds: Vec<f64>,

    /// Count for each bucket. Holds one more entry than `explicit_bounds`.
    pub bucket_counts: Vec<u64>,
}

impl HistogramDataPoint {
    /// Returns `true` if there is exactly one more bucket count than there are bounds.
    pub fn is_well_formed(&self) -> bool {
        self.bucket_counts.len() == self.explicit_bounds.len() + 1
    }

    /// Returns a representative value and count for every non-empty bucket, in bucket order.
    ///
    /// The representative value is the midpoint of the bucket. The unbounded edges of the outer buckets are closed
    /// with `min` and `max` when present, falling back to zero below a positive first bound and to the last bound
    /// above. A histogram without bounds is represented by the midpoint of `min` and `max`, or by the mean. Values
    /// are clamped into `[min, max]` when those are known.
    ///
    /// Malformed data points yield nothing.
    pub fn representative_values(&self) -> Vec<(f64, u64)> {
        if !self.is_well_formed() {
            return Vec::new();
        }

        let bounds = &self.explicit_bounds;
        let last = bounds.len();
        let mut values = Vec::new();
        for (i, &count) in self.bucket_counts.iter().enumerate() {
            if count == 0 {
                continue;
            }

            let lower = if i > 0 {
                Some(bounds[i - 1])
            } else {
                self.min.or_else(|| bounds.first().map(|&first| first.min(0.0)))
            };
            let upper = if i < last {
                Some(bounds[i])
            } else {
                self.max.or_else(|| bounds.last().copied())
            };

            let mut value = match (lower, upper) {
                (Some(lower), Some(upper)) => (lower + upper) / 2.0,
                _ if self.count > 0 => self.sum / self.count as f64,
                _ => continue,
            };
            if let Some(max) = self.max {
                value = value.min(max);
            }
            if let Some(min) = self.min {
                value = value.max(min);
            }
            values.push((value, count));
        }
        values
    }
}

/// Statistics of an explicit-bucket data point that replace the ones accumulated from its buckets.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct HistogramOverrides {
    pub sum: Option<f64>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
}

impl HistogramOverrides {
    pub fn apply(self, sum: &mut f64, minimum: &mut f64, maximum: &mut f64) {
        if let Some(value) = self.sum {
            *sum = value;
        }
        if let Some(value) = self.minimum {
            *minimum = value;
        }
        if let Some(value) = self.maximum {
            *maximum = value;
        }
    }
}

/// Records every non-empty bucket of an explicit-bucket data point through `add_entry`.
///
/// Returns the data point statistics that should replace the accumulated ones, or `None` if the data point is
/// malformed or none of its buckets could be recorded. Negative extremes are never taken over, and the data point's
/// sum is only taken over when every bucket was recorded.
pub(crate) fn import_histogram<F>(dp: &HistogramDataPoint, mut add_entry: F) -> Option<HistogramOverrides>
where
    F: FnMut(f64, f64) -> Result<(), DistributionError>,
{
    if !dp.is_well_formed() {
        debug!(
            bounds = dp.explicit_bounds.len(),
            buckets = dp.bucket_counts.len(),
            "Skipping malformed histogram data point."
        );
        return None;
    }

    let mut recorded = 0.0;
    let mut dropped = 0u64;
    let mut dropped_buckets = 0usize;
    for (value, count) in dp.representative_values() {
        match add_entry(value, count as f64) {
            Ok(()) => recorded += count as f64,
            Err(_) => {
                dropped = dropped.saturating_add(count);
                dropped_buckets += 1;
            }
        }
    }

    if dropped_buckets > 0 {
        debug!(
            dropped_buckets,
            dropped_count = dropped,
            "Dropped histogram buckets with unsupported values. Keeping the sum of the recorded buckets."
        );
    }
    if recorded == 0.0 {
        return None;
    }
    if !float_eq(recorded, dp.count as f64) {
        debug!(
            expected = dp.count,
            actual = recorded,
            "Histogram bucket counts do not add up to the data point count."
        );
    }

    Some(HistogramOverrides {
        sum: (dropped_buckets == 0).then_some(dp.sum),
        minimum: dp.min.filter(|min| *min >= 0.0),
        maximum: dp.max.filter(|max| *max >= 0.0),
    })
}
