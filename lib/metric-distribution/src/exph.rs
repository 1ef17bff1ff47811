use std::{collections::BTreeMap, mem};

use snafu::ensure;
use tracing::debug;

use crate::{
    common::{merge_unit, validate_merge_weight, validate_sample},
    error::{
        CountOverflow, DistributionError, FractionalWeight, MergeError, ScaleMismatch, UnsupportedWeight,
        ZeroThresholdMismatch,
    },
    mapping::{clamp_scale, lower_boundary, map_to_index},
    otel::ExponentialHistogramDataPoint,
};

/// Exclusive upper bound of integral weights, `2^64`.
const MAX_WEIGHT: f64 = u64::MAX as f64;

/// A single bucket of an exponential histogram.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Bucket {
    Positive(i32),
    Zero,
    Negative(i32),
}

impl Bucket {
    /// Returns the signed `(low, high)` edges of the bucket.
    fn bounds(self, scale: i32, zero_threshold: f64) -> (f64, f64) {
        match self {
            Self::Positive(index) => (lower_boundary(index, scale), lower_boundary(index + 1, scale)),
            Self::Zero => (-zero_threshold, zero_threshold),
            Self::Negative(index) => (-lower_boundary(index + 1, scale), -lower_boundary(index, scale)),
        }
    }

    /// Returns the value reported for the bucket: the arithmetic midpoint of its edges, or zero for the zero bucket.
    fn representative_value(self, scale: i32) -> f64 {
        match self {
            Self::Positive(index) => (lower_boundary(index, scale) + lower_boundary(index + 1, scale)) / 2.0,
            Self::Zero => 0.0,
            Self::Negative(index) => -(lower_boundary(index, scale) + lower_boundary(index + 1, scale)) / 2.0,
        }
    }
}

/// An exponential histogram, following the OpenTelemetry exponential histogram data model.
///
/// Positive and negative samples are counted in buckets with exponentially growing boundaries determined by the
/// scale, indexed by magnitude. Samples whose magnitude does not exceed the zero threshold are counted in a dedicated
/// zero bucket. Bucket counts are integral.
#[derive(Clone, Debug, PartialEq)]
pub struct ExpHistogramDistribution {
    maximum: f64,
    minimum: f64,
    sample_count: f64,
    sum: f64,
    scale: i32,
    positive_buckets: BTreeMap<i32, u64>,
    negative_buckets: BTreeMap<i32, u64>,
    zero_threshold: f64,
    zero_count: u64,
    unit: String,
}

impl ExpHistogramDistribution {
    /// Creates a new, empty `ExpHistogramDistribution` with a scale of zero and an exact zero bucket.
    pub fn new() -> Self {
        Self::with_scale(0, 0.0)
    }

    /// Creates a new, empty `ExpHistogramDistribution` with the given scale and zero threshold.
    ///
    /// The scale is clamped into `[MIN_SCALE, MAX_SCALE]`. A zero threshold that is negative is used by magnitude,
    /// and one that is not finite is replaced with zero.
    pub fn with_scale(scale: i32, zero_threshold: f64) -> Self {
        let clamped_scale = clamp_scale(scale);
        if clamped_scale != scale {
            debug!(scale, clamped_scale, "Clamped exponential histogram scale into the supported range.");
        }

        let zero_threshold = if zero_threshold.is_finite() {
            zero_threshold.abs()
        } else {
            debug!(zero_threshold, "Ignoring non-finite zero threshold.");
            0.0
        };

        Self {
            maximum: f64::MIN,
            minimum: f64::MAX,
            sample_count: 0.0,
            sum: 0.0,
            scale: clamped_scale,
            positive_buckets: BTreeMap::new(),
            negative_buckets: BTreeMap::new(),
            zero_threshold,
            zero_count: 0,
            unit: String::new(),
        }
    }

    /// Creates a distribution from an exponential histogram data point.
    ///
    /// Bucket counts, zero count, scale, zero threshold, count, and sum are taken over as is. A count lower than the
    /// total of the bucket counts is raised to that total. When the data point does not carry a minimum or maximum,
    /// the outer edges of the outermost non-empty buckets are used instead.
    pub fn from_otel(dp: &ExponentialHistogramDataPoint, unit: &str) -> Self {
        let mut distribution = Self::with_scale(dp.scale, dp.zero_threshold);
        for (index, count) in dp.positive.non_empty() {
            distribution.positive_buckets.insert(index, count);
        }
        for (index, count) in dp.negative.non_empty() {
            distribution.negative_buckets.insert(index, count);
        }
        distribution.zero_count = dp.zero_count;

        let bucket_total = distribution.bucket_total();
        distribution.sample_count = if dp.count < bucket_total {
            debug!(
                count = dp.count,
                bucket_total,
                "Exponential histogram count is lower than its bucket counts. Using the bucket counts."
            );
            bucket_total as f64
        } else {
            dp.count as f64
        };
        distribution.sum = dp.sum;
        distribution.unit.push_str(unit);

        let (bucket_minimum, bucket_maximum) = distribution.bucket_extremes();
        distribution.minimum = dp.min.unwrap_or(bucket_minimum);
        distribution.maximum = dp.max.unwrap_or(bucket_maximum);
        distribution
    }

    /// Replaces the contents of this distribution with the given exponential histogram data point.
    ///
    /// See [`from_otel`][Self::from_otel].
    pub fn convert_from_otel(&mut self, dp: &ExponentialHistogramDataPoint, unit: &str) {
        *self = Self::from_otel(dp, unit);
    }

    /// Returns the largest recorded value.
    pub fn maximum(&self) -> f64 {
        self.maximum
    }

    /// Returns the smallest recorded value.
    pub fn minimum(&self) -> f64 {
        self.minimum
    }

    /// Returns the total number of recorded samples.
    pub fn sample_count(&self) -> f64 {
        self.sample_count
    }

    /// Returns the sum of all recorded values.
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Returns the unit of the recorded values.
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Returns the scale of the bucket boundaries.
    pub fn scale(&self) -> i32 {
        self.scale
    }

    /// Returns the zero threshold.
    pub fn zero_threshold(&self) -> f64 {
        self.zero_threshold
    }

    /// Returns the number of samples in the zero bucket.
    pub fn zero_count(&self) -> u64 {
        self.zero_count
    }

    /// Returns the number of non-empty buckets, including the zero bucket.
    pub fn size(&self) -> usize {
        self.positive_buckets.len() + self.negative_buckets.len() + usize::from(self.zero_count > 0)
    }

    /// Returns `true` if there are no non-empty buckets.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Returns the representative value and count of every non-empty bucket, in descending order of value.
    ///
    /// Positive buckets come first, from the highest index down, followed by the zero bucket and then the negative
    /// buckets from the smallest magnitude up.
    pub fn values_and_counts(&self) -> (Vec<f64>, Vec<f64>) {
        self.descending_buckets()
            .map(|(bucket, count)| (bucket.representative_value(self.scale), count as f64))
            .unzip()
    }

    /// Records a sample with the given weight.
    ///
    /// # Errors
    ///
    /// If the weight is not a positive integer, or if the value is outside of the supported range, an error is
    /// returned and the distribution is left unchanged.
    pub fn add_entry(&mut self, value: f64, weight: f64) -> Result<(), DistributionError> {
        self.add_entry_with_unit(value, weight, "")
    }

    /// Records a sample with the given weight and unit.
    ///
    /// The first non-empty unit is kept.
    ///
    /// # Errors
    ///
    /// If the weight is not a positive integer, if it would overflow the count of the bucket, or if the value is
    /// outside of the supported range, an error is returned and the distribution is left unchanged.
    pub fn add_entry_with_unit(&mut self, value: f64, weight: f64, unit: &str) -> Result<(), DistributionError> {
        validate_sample(value, weight, true)?;
        ensure!(weight.fract() == 0.0 && weight < MAX_WEIGHT, UnsupportedWeight { weight });

        let count = weight as u64;
        let bucket_count = if value.abs() <= self.zero_threshold {
            &mut self.zero_count
        } else {
            let buckets = if value > 0.0 {
                &mut self.positive_buckets
            } else {
                &mut self.negative_buckets
            };
            // A newly inserted bucket always has room for `count`, so a failed add never leaves an empty bucket.
            buckets.entry(map_to_index(value, self.scale)).or_insert(0)
        };
        let Some(updated) = bucket_count.checked_add(count) else {
            return UnsupportedWeight { weight }.fail();
        };
        *bucket_count = updated;

        self.sample_count += weight;
        self.sum += value * weight;
        self.minimum = self.minimum.min(value);
        self.maximum = self.maximum.max(value);
        merge_unit(&mut self.unit, unit);
        Ok(())
    }

    /// Merges another histogram into this one, scaling its counts by `weight`.
    ///
    /// # Errors
    ///
    /// If the other histogram would contribute no samples, uses a different scale or zero threshold, or if the
    /// weight is not integral or would overflow the bucket counts, an error is returned and this histogram is left
    /// unchanged.
    pub fn try_add_distribution_with_weight(&mut self, other: &Self, weight: f64) -> Result<(), MergeError> {
        validate_merge_weight(other.sample_count, weight)?;
        ensure!(
            other.scale == self.scale,
            ScaleMismatch {
                from: other.scale,
                to: self.scale
            }
        );
        ensure!(
            other.zero_threshold == self.zero_threshold,
            ZeroThresholdMismatch {
                from: other.zero_threshold,
                to: self.zero_threshold
            }
        );
        ensure!(weight.fract() == 0.0, FractionalWeight { weight });
        ensure!(
            weight < MAX_WEIGHT && self.can_merge_counts(other, weight as u64),
            CountOverflow { weight }
        );

        let factor = weight as u64;
        merge_buckets(&mut self.positive_buckets, &other.positive_buckets, factor);
        merge_buckets(&mut self.negative_buckets, &other.negative_buckets, factor);
        self.zero_count = scaled_add(self.zero_count, other.zero_count, factor).unwrap_or(u64::MAX);
        self.sample_count += other.sample_count * weight;
        self.sum += other.sum * weight;
        self.minimum = self.minimum.min(other.minimum);
        self.maximum = self.maximum.max(other.maximum);
        merge_unit(&mut self.unit, &other.unit);
        Ok(())
    }

    /// Merges another histogram into this one, scaling its counts by `weight`.
    ///
    /// Refused merges are logged and skipped.
    pub fn add_distribution_with_weight(&mut self, other: &Self, weight: f64) {
        if let Err(e) = self.try_add_distribution_with_weight(other, weight) {
            e.report();
        }
    }

    /// Merges another histogram into this one.
    pub fn add_distribution(&mut self, other: &Self) {
        self.add_distribution_with_weight(other, 1.0);
    }

    /// Splits the histogram into chunks of at most `max_size` non-empty buckets.
    ///
    /// Buckets are handed out in descending order of value, as reported by
    /// [`values_and_counts`][Self::values_and_counts]. Each chunk reports the upper edge of its first bucket as its
    /// maximum and the lower edge of its last bucket as its minimum, except that the first chunk reports the overall
    /// maximum and the last chunk the overall minimum. The sum, and any samples counted by the overall sample count
    /// but not by the buckets, go to the first chunk. Every chunk keeps the scale, zero threshold, and unit.
    ///
    /// An empty histogram is returned as is. A `max_size` of zero is treated as one.
    pub fn resize(self, max_size: usize) -> Vec<Self> {
        let size = self.size();
        if size == 0 {
            return vec![self];
        }

        let max_size = max_size.max(1);
        let mut chunks = Vec::with_capacity(size.div_ceil(max_size));
        let mut current = self.empty_chunk();
        let mut current_size = 0;
        for (bucket, count) in self.descending_buckets() {
            let (low, high) = bucket.bounds(self.scale, self.zero_threshold);
            if current_size == 0 {
                current.maximum = high;
            }
            current.minimum = low;
            current.insert_bucket(bucket, count);
            current_size += 1;

            if current_size == max_size {
                chunks.push(mem::replace(&mut current, self.empty_chunk()));
                current_size = 0;
            }
        }
        if current_size > 0 {
            chunks.push(current);
        }

        let bucket_count: f64 = chunks.iter().map(|chunk| chunk.sample_count).sum();
        if let Some(first) = chunks.first_mut() {
            first.sum = self.sum;
            first.maximum = self.maximum;
            first.sample_count += (self.sample_count - bucket_count).max(0.0);
        }
        if let Some(last) = chunks.last_mut() {
            last.minimum = self.minimum;
        }
        chunks
    }

    fn bucket_total(&self) -> u64 {
        self.positive_buckets
            .values()
            .chain(self.negative_buckets.values())
            .fold(self.zero_count, |total, &count| total.saturating_add(count))
    }

    fn can_merge_counts(&self, other: &Self, factor: u64) -> bool {
        scaled_add(self.zero_count, other.zero_count, factor).is_some()
            && can_merge_buckets(&self.positive_buckets, &other.positive_buckets, factor)
            && can_merge_buckets(&self.negative_buckets, &other.negative_buckets, factor)
    }

    fn descending_buckets(&self) -> impl Iterator<Item = (Bucket, u64)> + '_ {
        let positive = self
            .positive_buckets
            .iter()
            .rev()
            .map(|(&index, &count)| (Bucket::Positive(index), count));
        let zero = (self.zero_count > 0).then_some((Bucket::Zero, self.zero_count));
        let negative = self
            .negative_buckets
            .iter()
            .map(|(&index, &count)| (Bucket::Negative(index), count));
        positive.chain(zero).chain(negative)
    }

    /// Returns the lowest and highest bucket edges, or the empty sentinels if there are no buckets.
    fn bucket_extremes(&self) -> (f64, f64) {
        let mut buckets = self.descending_buckets();
        let Some((highest, _)) = buckets.next() else {
            return (f64::MAX, f64::MIN);
        };
        let lowest = buckets.last().map_or(highest, |(bucket, _)| bucket);

        let (minimum, _) = lowest.bounds(self.scale, self.zero_threshold);
        let (_, maximum) = highest.bounds(self.scale, self.zero_threshold);
        (minimum, maximum)
    }

    fn insert_bucket(&mut self, bucket: Bucket, count: u64) {
        match bucket {
            Bucket::Positive(index) => {
                self.positive_buckets.insert(index, count);
            }
            Bucket::Zero => self.zero_count = count,
            Bucket::Negative(index) => {
                self.negative_buckets.insert(index, count);
            }
        }
        self.sample_count += count as f64;
    }

    fn empty_chunk(&self) -> Self {
        Self {
            unit: self.unit.clone(),
            ..Self::with_scale(self.scale, self.zero_threshold)
        }
    }
}

impl Default for ExpHistogramDistribution {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns `current + count * factor`, or `None` on overflow.
fn scaled_add(current: u64, count: u64, factor: u64) -> Option<u64> {
    count.checked_mul(factor)?.checked_add(current)
}

fn can_merge_buckets(target: &BTreeMap<i32, u64>, source: &BTreeMap<i32, u64>, factor: u64) -> bool {
    source
        .iter()
        .all(|(index, &count)| scaled_add(target.get(index).copied().unwrap_or(0), count, factor).is_some())
}

fn merge_buckets(target: &mut BTreeMap<i32, u64>, source: &BTreeMap<i32, u64>, factor: u64) {
    for (&index, &count) in source {
        let bucket_count = target.entry(index).or_insert(0);
        *bucket_count = scaled_add(*bucket_count, count, factor).unwrap_or(u64::MAX);
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::{common::float_eq, otel::Buckets, MAX_VALUE};

    fn data_point(scale: i32, positive: Buckets, negative: Buckets, zero_count: u64) -> ExponentialHistogramDataPoint {
        let count =
            positive.bucket_counts.iter().sum::<u64>() + negative.bucket_counts.iter().sum::<u64>() + zero_count;
        ExponentialHistogramDataPoint {
            count,
            scale,
            zero_count,
            positive,
            negative,
            ..Default::default()
        }
    }

    fn assert_float_vec_eq(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len(), "{:?} != {:?}", actual, expected);
        for (a, e) in actual.iter().zip(expected) {
            assert!(float_eq(*a, *e), "{:?} != {:?}", actual, expected);
        }
    }

    #[test]
    fn test_new() {
        let dist = ExpHistogramDistribution::new();
        assert_eq!(dist.maximum(), f64::MIN);
        assert_eq!(dist.minimum(), f64::MAX);
        assert_eq!(dist.sample_count(), 0.0);
        assert_eq!(dist.sum(), 0.0);
        assert_eq!(dist.scale(), 0);
        assert_eq!(dist.zero_threshold(), 0.0);
        assert_eq!(dist.size(), 0);
        assert!(dist.is_empty());
        assert_eq!(dist.values_and_counts(), (vec![], vec![]));
    }

    #[test]
    fn test_with_scale_clamps() {
        assert_eq!(ExpHistogramDistribution::with_scale(42, 0.0).scale(), 20);
        assert_eq!(ExpHistogramDistribution::with_scale(-42, 0.0).scale(), -10);
        assert_eq!(ExpHistogramDistribution::with_scale(0, -0.5).zero_threshold(), 0.5);
        assert_eq!(ExpHistogramDistribution::with_scale(0, f64::NAN).zero_threshold(), 0.0);
    }

    #[test]
    fn test_add_entry() {
        let mut dist = ExpHistogramDistribution::new();
        dist.add_entry_with_unit(3.0, 1.0, "Seconds").unwrap();
        dist.add_entry(4.0, 2.0).unwrap();
        dist.add_entry(0.0, 1.0).unwrap();
        dist.add_entry(-3.0, 1.0).unwrap();

        assert_eq!(dist.maximum(), 4.0);
        assert_eq!(dist.minimum(), -3.0);
        assert_eq!(dist.sample_count(), 5.0);
        assert_eq!(dist.sum(), 8.0);
        assert_eq!(dist.zero_count(), 1);
        assert_eq!(dist.size(), 3);
        assert_eq!(dist.unit(), "Seconds");
        // 3 and 4 both fall into (2, 4].
        assert_eq!(dist.values_and_counts(), (vec![3.0, 0.0, -3.0], vec![3.0, 1.0, 1.0]));
    }

    #[test]
    fn test_add_entry_zero_threshold() {
        let mut dist = ExpHistogramDistribution::with_scale(0, 0.5);
        dist.add_entry(0.5, 1.0).unwrap();
        dist.add_entry(-0.25, 1.0).unwrap();
        dist.add_entry(0.75, 1.0).unwrap();
        assert_eq!(dist.zero_count(), 2);
        assert_eq!(dist.size(), 2);
    }

    #[test]
    fn test_add_entry_rejects_invalid_samples() {
        let mut dist = ExpHistogramDistribution::new();
        assert_eq!(
            dist.add_entry(1.0, 0.0),
            Err(DistributionError::UnsupportedWeight { weight: 0.0 })
        );
        assert_eq!(
            dist.add_entry(1.0, 1.5),
            Err(DistributionError::UnsupportedWeight { weight: 1.5 })
        );
        assert!(dist.add_entry(MAX_VALUE * 1.001, 1.0).is_err());
        assert!(dist.add_entry(f64::NEG_INFINITY, 1.0).is_err());
        assert_eq!(
            dist.add_entry(3.0, 1e20),
            Err(DistributionError::UnsupportedWeight { weight: 1e20 })
        );
        assert!(dist.add_entry(3.0, u64::MAX as f64).is_err());
        assert_eq!(dist, ExpHistogramDistribution::new());
    }

    #[test]
    fn test_add_entry_rejects_count_overflow() {
        let half = 2.0f64.powi(63);
        let mut dist = ExpHistogramDistribution::new();
        dist.add_entry(3.0, half).unwrap();
        dist.add_entry(-3.0, half).unwrap();
        let before = dist.clone();

        // 3.0 and 3.5 share the (2, 4] bucket at scale 0.
        assert_eq!(
            dist.add_entry(3.5, half),
            Err(DistributionError::UnsupportedWeight { weight: half })
        );
        assert!(dist.add_entry(-3.5, half).is_err());
        assert_eq!(dist, before);

        dist.add_entry(100.0, half).unwrap();
        assert_eq!(dist.sample_count(), 3.0 * half);
        assert_eq!(dist.values_and_counts().1, vec![half, half, half]);
    }

    #[test]
    fn test_values_and_counts_scale_zero() {
        let mut dist = ExpHistogramDistribution::new();
        for index in 0..10 {
            dist.positive_buckets.insert(index, 1);
        }
        let (values, counts) = dist.values_and_counts();
        assert_float_vec_eq(&values, &[768.0, 384.0, 192.0, 96.0, 48.0, 24.0, 12.0, 6.0, 3.0, 1.5]);
        assert_eq!(counts, vec![1.0; 10]);
    }

    #[test]
    fn test_values_and_counts_positive_scale() {
        let mut dist = ExpHistogramDistribution::with_scale(2, 0.0);
        dist.positive_buckets.insert(0, 1);
        let (values, _) = dist.values_and_counts();
        assert_float_vec_eq(&values, &[1.0946035575013604]);
    }

    #[test]
    fn test_values_and_counts_negative_scale() {
        let mut dist = ExpHistogramDistribution::with_scale(-3, 0.0);
        dist.positive_buckets.insert(0, 1);
        dist.negative_buckets.insert(0, 2);
        let (values, counts) = dist.values_and_counts();
        assert_float_vec_eq(&values, &[128.5, -128.5]);
        assert_eq!(counts, vec![1.0, 2.0]);
    }

    #[test]
    fn test_from_otel() {
        let dp = ExponentialHistogramDataPoint {
            count: 10,
            sum: 120.0,
            min: Some(-7.0),
            max: Some(60.0),
            scale: 0,
            zero_count: 2,
            zero_threshold: 0.0,
            positive: Buckets::new(1, vec![1, 0, 3, 2]),
            negative: Buckets::new(2, vec![2]),
        };
        let dist = ExpHistogramDistribution::from_otel(&dp, "Bytes");
        assert_eq!(dist.sample_count(), 10.0);
        assert_eq!(dist.sum(), 120.0);
        assert_eq!(dist.minimum(), -7.0);
        assert_eq!(dist.maximum(), 60.0);
        assert_eq!(dist.zero_count(), 2);
        assert_eq!(dist.size(), 5);
        assert_eq!(dist.unit(), "Bytes");
        assert_eq!(
            dist.values_and_counts(),
            (vec![24.0, 12.0, 3.0, 0.0, -6.0], vec![2.0, 3.0, 1.0, 2.0, 2.0])
        );
    }

    #[test]
    fn test_from_otel_derives_missing_extremes() {
        let dp = data_point(0, Buckets::new(1, vec![1, 0, 3]), Buckets::new(2, vec![2]), 0);
        let dist = ExpHistogramDistribution::from_otel(&dp, "");
        assert_eq!(dist.maximum(), 16.0);
        assert_eq!(dist.minimum(), -8.0);

        let dp = data_point(0, Buckets::default(), Buckets::default(), 3);
        let dist = ExpHistogramDistribution::from_otel(&dp, "");
        assert_eq!(dist.maximum(), 0.0);
        assert_eq!(dist.minimum(), 0.0);

        let dist = ExpHistogramDistribution::from_otel(&ExponentialHistogramDataPoint::default(), "");
        assert_eq!(dist, ExpHistogramDistribution::new());
    }

    #[test]
    fn test_convert_from_otel_replaces_contents() {
        let mut dist = ExpHistogramDistribution::new();
        dist.add_entry(100.0, 1.0).unwrap();

        let dp = data_point(3, Buckets::new(0, vec![4]), Buckets::default(), 0);
        dist.convert_from_otel(&dp, "Count");
        assert_eq!(dist.scale(), 3);
        assert_eq!(dist.sample_count(), 4.0);
        assert_eq!(dist.size(), 1);
        assert_eq!(dist.unit(), "Count");
    }

    #[test]
    fn test_add_distribution_positive() {
        let mut dist = ExpHistogramDistribution::from_otel(
            &ExponentialHistogramDataPoint {
                max: Some(6.0),
                min: Some(2.0),
                sum: 52.0,
                ..data_point(0, Buckets::new(1, vec![4, 6]), Buckets::default(), 0)
            },
            "",
        );
        let other = ExpHistogramDistribution::from_otel(
            &ExponentialHistogramDataPoint {
                max: Some(750.0),
                min: Some(300.0),
                sum: 850.0,
                ..data_point(0, Buckets::new(8, vec![1, 1]), Buckets::default(), 0)
            },
            "",
        );

        dist.add_distribution(&other);
        assert_eq!(dist.maximum(), 750.0);
        assert_eq!(dist.minimum(), 2.0);
        assert_eq!(dist.sample_count(), 12.0);
        assert_eq!(dist.sum(), 902.0);
        assert_eq!(dist.size(), 4);
        assert_eq!(dist.values_and_counts().1, vec![1.0, 1.0, 6.0, 4.0]);
    }

    #[test]
    fn test_add_distribution_overlapping_with_weight() {
        let mut dist = ExpHistogramDistribution::from_otel(
            &data_point(1, Buckets::new(0, vec![1, 2]), Buckets::new(0, vec![1]), 1),
            "",
        );
        let other = ExpHistogramDistribution::from_otel(
            &data_point(1, Buckets::new(1, vec![1, 1]), Buckets::new(0, vec![3]), 2),
            "",
        );

        dist.add_distribution_with_weight(&other, 2.0);
        assert_eq!(dist.sample_count(), 5.0 + 7.0 * 2.0);
        assert_eq!(dist.zero_count(), 5);
        assert_eq!(dist.values_and_counts().1, vec![2.0, 4.0, 1.0, 5.0, 7.0]);
    }

    #[test]
    fn test_add_distribution_is_commutative() {
        let mut a = ExpHistogramDistribution::new();
        a.add_entry_with_unit(3.0, 1.0, "Seconds").unwrap();
        a.add_entry(-10.0, 2.0).unwrap();
        let mut b = ExpHistogramDistribution::new();
        b.add_entry(0.0, 1.0).unwrap();
        b.add_entry(100.0, 1.0).unwrap();

        let mut left = a.clone();
        left.add_distribution(&b);
        let mut right = b.clone();
        right.add_distribution(&a);
        assert_eq!(left, right);
    }

    #[test]
    fn test_add_distribution_refusals() {
        let mut dist = ExpHistogramDistribution::new();
        dist.add_entry(1.0, 1.0).unwrap();
        let before = dist.clone();

        let mut other_scale = ExpHistogramDistribution::with_scale(1, 0.0);
        other_scale.add_entry(1.0, 1.0).unwrap();
        assert_eq!(
            dist.try_add_distribution_with_weight(&other_scale, 1.0),
            Err(MergeError::ScaleMismatch { from: 1, to: 0 })
        );

        let mut other_threshold = ExpHistogramDistribution::with_scale(0, 0.1);
        other_threshold.add_entry(1.0, 1.0).unwrap();
        assert_eq!(
            dist.try_add_distribution_with_weight(&other_threshold, 1.0),
            Err(MergeError::ZeroThresholdMismatch { from: 0.1, to: 0.0 })
        );

        let mut other = ExpHistogramDistribution::new();
        other.add_entry(1.0, 1.0).unwrap();
        assert_eq!(
            dist.try_add_distribution_with_weight(&other, 0.5),
            Err(MergeError::FractionalWeight { weight: 0.5 })
        );
        assert!(matches!(
            dist.try_add_distribution_with_weight(&ExpHistogramDistribution::new(), 1.0),
            Err(MergeError::DegenerateSource { .. })
        ));

        dist.add_distribution(&other_scale);
        dist.add_distribution(&other_threshold);
        assert_eq!(dist, before);
    }

    #[test]
    fn test_add_distribution_rejects_count_overflow() {
        let half = 2.0f64.powi(63);
        let mut dist = ExpHistogramDistribution::new();
        dist.add_entry(3.0, half).unwrap();
        dist.add_entry(0.0, 1.0).unwrap();
        let before = dist.clone();

        let mut other = ExpHistogramDistribution::new();
        other.add_entry(3.0, half).unwrap();
        assert_eq!(
            dist.try_add_distribution_with_weight(&other, 1.0),
            Err(MergeError::CountOverflow { weight: 1.0 })
        );

        let mut zeros = ExpHistogramDistribution::new();
        zeros.add_entry(0.0, 1.0).unwrap();
        assert_eq!(
            dist.try_add_distribution_with_weight(&zeros, 1e20),
            Err(MergeError::CountOverflow { weight: 1e20 })
        );
        assert_eq!(
            dist.try_add_distribution_with_weight(&zeros, u64::MAX as f64),
            Err(MergeError::CountOverflow {
                weight: u64::MAX as f64
            })
        );

        dist.add_distribution(&other);
        assert_eq!(dist, before);

        dist.add_distribution_with_weight(&zeros, 4.0);
        assert_eq!(dist.zero_count(), 5);
    }

    #[test]
    fn test_resize_positive() {
        let dp = ExponentialHistogramDataPoint {
            sum: 3000.0,
            min: Some(1.5),
            max: Some(1000.0),
            ..data_point(0, Buckets::new(0, vec![1; 10]), Buckets::default(), 0)
        };
        let dist = ExpHistogramDistribution::from_otel(&dp, "Count");

        let chunks = dist.resize(4);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.iter().map(ExpHistogramDistribution::size).collect::<Vec<_>>(), vec![4, 4, 2]);
        assert_eq!(
            chunks.iter().map(ExpHistogramDistribution::sample_count).collect::<Vec<_>>(),
            vec![4.0, 4.0, 2.0]
        );
        assert_eq!(
            chunks.iter().map(ExpHistogramDistribution::sum).collect::<Vec<_>>(),
            vec![3000.0, 0.0, 0.0]
        );

        // Buckets 9..=6, 5..=2, and 1..=0.
        assert_eq!(chunks[0].maximum(), 1000.0);
        assert_eq!(chunks[0].minimum(), 64.0);
        assert_eq!(chunks[1].maximum(), 64.0);
        assert_eq!(chunks[1].minimum(), 4.0);
        assert_eq!(chunks[2].maximum(), 4.0);
        assert_eq!(chunks[2].minimum(), 1.5);

        for chunk in &chunks {
            assert_eq!(chunk.scale(), 0);
            assert_eq!(chunk.unit(), "Count");
        }
    }

    #[test]
    fn test_resize_mixed_signs() {
        let dp = ExponentialHistogramDataPoint {
            sum: -4.0,
            min: Some(-12.0),
            max: Some(7.0),
            zero_threshold: 0.5,
            ..data_point(0, Buckets::new(1, vec![1, 2]), Buckets::new(2, vec![1, 1]), 3)
        };
        let dist = ExpHistogramDistribution::from_otel(&dp, "");

        let chunks = dist.clone().resize(2);
        assert_eq!(chunks.len(), 3);

        // (4, 8] and (2, 4]
        assert_eq!(chunks[0].maximum(), 7.0);
        assert_eq!(chunks[0].minimum(), 2.0);
        // Zero bucket and (-8, -4]
        assert_eq!(chunks[1].maximum(), 0.5);
        assert_eq!(chunks[1].minimum(), -8.0);
        assert_eq!(chunks[1].zero_count(), 3);
        // (-16, -8]
        assert_eq!(chunks[2].maximum(), -8.0);
        assert_eq!(chunks[2].minimum(), -12.0);

        let (values, counts): (Vec<f64>, Vec<f64>) = chunks
            .iter()
            .map(ExpHistogramDistribution::values_and_counts)
            .fold((Vec::new(), Vec::new()), |(mut values, mut counts), (v, c)| {
                values.extend(v);
                counts.extend(c);
                (values, counts)
            });
        assert_eq!((values, counts), dist.values_and_counts());
    }

    #[test]
    fn test_resize_carries_residual_count() {
        let dp = ExponentialHistogramDataPoint {
            count: 10,
            ..data_point(0, Buckets::new(0, vec![2, 3]), Buckets::default(), 0)
        };
        let dist = ExpHistogramDistribution::from_otel(&dp, "");

        let chunks = dist.resize(1);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].sample_count(), 8.0);
        assert_eq!(chunks[1].sample_count(), 2.0);
    }

    #[test]
    fn test_from_otel_raises_count_to_bucket_total() {
        let dp = ExponentialHistogramDataPoint {
            count: 1,
            ..data_point(0, Buckets::new(0, vec![5, 5]), Buckets::default(), 0)
        };
        let dist = ExpHistogramDistribution::from_otel(&dp, "");
        assert_eq!(dist.sample_count(), 10.0);

        let chunks = dist.resize(1);
        assert_eq!(
            chunks.iter().map(ExpHistogramDistribution::sample_count).collect::<Vec<_>>(),
            vec![5.0, 5.0]
        );
    }

    #[test]
    fn test_resize_edge_sizes() {
        let empty = ExpHistogramDistribution::new();
        assert_eq!(empty.clone().resize(5), vec![empty]);

        let mut dist = ExpHistogramDistribution::new();
        dist.add_entry(1.0, 1.0).unwrap();
        dist.add_entry(100.0, 1.0).unwrap();
        assert_eq!(dist.resize(0).len(), 2);
    }

    proptest! {
        #[test]
        fn property_test_resize_invariants(
            values in proptest::collection::vec(-1e12f64..1e12, 1..300),
            scale in -4i32..8,
            max_size in 1usize..40,
        ) {
            let mut dist = ExpHistogramDistribution::with_scale(scale, 0.0);
            for value in &values {
                dist.add_entry(*value, 1.0).unwrap();
            }

            let chunks = dist.clone().resize(max_size);
            prop_assert_eq!(chunks.len(), dist.size().div_ceil(max_size));
            prop_assert!(chunks.iter().all(|chunk| chunk.size() <= max_size));

            let total_count: f64 = chunks.iter().map(ExpHistogramDistribution::sample_count).sum();
            let total_sum: f64 = chunks.iter().map(ExpHistogramDistribution::sum).sum();
            prop_assert_eq!(total_count, dist.sample_count());
            prop_assert_eq!(total_sum, dist.sum());
            prop_assert_eq!(chunks[0].maximum(), dist.maximum());
            prop_assert_eq!(chunks[chunks.len() - 1].minimum(), dist.minimum());
            for chunk in &chunks {
                prop_assert_eq!(chunk.scale(), dist.scale());
            }
        }

        #[test]
        fn property_test_accounting(
            entries in proptest::collection::vec((-1e6f64..1e6, 1u32..1000), 1..300),
        ) {
            let mut dist = ExpHistogramDistribution::new();
            let mut expected_count = 0.0;
            let mut expected_sum = 0.0;
            for &(value, weight) in &entries {
                let weight = f64::from(weight);
                dist.add_entry(value, weight).unwrap();
                expected_count += weight;
                expected_sum += value * weight;
            }

            prop_assert_eq!(dist.sample_count(), expected_count);
            prop_assert_eq!(dist.sum(), expected_sum);
            prop_assert_eq!(dist.values_and_counts().1.iter().sum::<f64>(), dist.sample_count());
        }
    }
}
