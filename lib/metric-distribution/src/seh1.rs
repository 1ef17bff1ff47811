use std::{collections::BTreeMap, mem};

use crate::{
    common::{merge_unit, validate_merge_weight, validate_sample},
    error::{DistributionError, MergeError},
    otel::{import_histogram, HistogramDataPoint},
};

/// Bucket holding every non-positive sample.
const ZERO_BUCKET: i16 = i16::MIN;

/// Width of a bucket in log space, `ln(1.1)`.
///
/// Every bucket spans roughly 10% of its lower bound.
fn bucket_factor() -> f64 {
    1.1f64.ln()
}

fn bucket_index(value: f64) -> i16 {
    if value > 0.0 {
        // Saturates for values far outside of the supported range.
        (value.ln() / bucket_factor()).floor() as i16
    } else {
        ZERO_BUCKET
    }
}

fn bucket_value(index: i16) -> f64 {
    if index == ZERO_BUCKET {
        0.0
    } else {
        ((f64::from(index) + 0.5) * bucket_factor()).exp()
    }
}

/// A sparse exponential histogram with fixed 10% buckets.
///
/// Every positive sample is assigned to bucket `floor(ln(value) / ln(1.1))`, and all non-positive samples share a
/// single zero bucket. A bucket is represented by the geometric middle of its range, so reported values are within
/// roughly 5% of the samples they stand for, while the number of buckets only grows logarithmically with the range of
/// observed values.
#[derive(Clone, Debug, PartialEq)]
pub struct Seh1Distribution {
    maximum: f64,
    minimum: f64,
    sample_count: f64,
    sum: f64,
    buckets: BTreeMap<i16, f64>,
    unit: String,
}

impl Seh1Distribution {
    /// Creates a new, empty `Seh1Distribution`.
    pub fn new() -> Self {
        Self {
            maximum: 0.0,
            minimum: f64::MAX,
            sample_count: 0.0,
            sum: 0.0,
            buckets: BTreeMap::new(),
            unit: String::new(),
        }
    }

    /// Creates a distribution from an explicit-bucket histogram data point.
    ///
    /// Every non-empty bucket is recorded at its representative value, and the data point's own sum, minimum, and
    /// maximum replace the ones accumulated from those values. Buckets with negative representative values cannot be
    /// recorded and are dropped, in which case the sum of the recorded buckets is kept.
    pub fn from_otel_histogram(dp: &HistogramDataPoint, unit: &str) -> Self {
        let mut distribution = Self::new();
        distribution.unit.push_str(unit);

        let overrides = import_histogram(dp, |value, weight| distribution.add_entry(value, weight));
        if let Some(overrides) = overrides {
            overrides.apply(&mut distribution.sum, &mut distribution.minimum, &mut distribution.maximum);
        }
        distribution
    }

    /// Returns the largest recorded value.
    pub fn maximum(&self) -> f64 {
        self.maximum
    }

    /// Returns the smallest recorded value.
    pub fn minimum(&self) -> f64 {
        self.minimum
    }

    /// Returns the total weight of all recorded samples.
    pub fn sample_count(&self) -> f64 {
        self.sample_count
    }

    /// Returns the weighted sum of all recorded values.
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Returns the unit of the recorded values.
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Returns the number of non-empty buckets.
    pub fn size(&self) -> usize {
        self.buckets.len()
    }

    /// Returns `true` if no samples have been recorded.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Returns the representative value and count of every non-empty bucket, in ascending order.
    pub fn values_and_counts(&self) -> (Vec<f64>, Vec<f64>) {
        self.buckets
            .iter()
            .map(|(&index, &count)| (bucket_value(index), count))
            .unzip()
    }

    /// Returns `true` if a sample with the given value can be recorded without exceeding `limit` buckets.
    ///
    /// Recording into an existing bucket never grows the distribution.
    pub fn can_add(&self, value: f64, limit: usize) -> bool {
        self.buckets.len() < limit || self.buckets.contains_key(&bucket_index(value))
    }

    /// Records a sample with the given weight.
    ///
    /// # Errors
    ///
    /// If the weight is not positive and finite, or if the value is negative or outside of the supported range, an
    /// error is returned and the distribution is left unchanged.
    pub fn add_entry(&mut self, value: f64, weight: f64) -> Result<(), DistributionError> {
        self.add_entry_with_unit(value, weight, "")
    }

    /// Records a sample with the given weight and unit.
    ///
    /// The first non-empty unit is kept.
    ///
    /// # Errors
    ///
    /// If the weight is not positive and finite, or if the value is negative or outside of the supported range, an
    /// error is returned and the distribution is left unchanged.
    pub fn add_entry_with_unit(&mut self, value: f64, weight: f64, unit: &str) -> Result<(), DistributionError> {
        validate_sample(value, weight, false)?;

        self.sample_count += weight;
        self.sum += value * weight;
        self.minimum = self.minimum.min(value);
        self.maximum = self.maximum.max(value);
        *self.buckets.entry(bucket_index(value)).or_insert(0.0) += weight;
        merge_unit(&mut self.unit, unit);
        Ok(())
    }

    /// Merges another distribution into this one, scaling its counts by `weight`.
    ///
    /// # Errors
    ///
    /// If the other distribution would contribute no samples, an error is returned and this distribution is left
    /// unchanged.
    pub fn try_add_distribution_with_weight(&mut self, other: &Self, weight: f64) -> Result<(), MergeError> {
        validate_merge_weight(other.sample_count, weight)?;

        for (&index, &count) in &other.buckets {
            *self.buckets.entry(index).or_insert(0.0) += count * weight;
        }
        self.sample_count += other.sample_count * weight;
        self.sum += other.sum * weight;
        self.minimum = self.minimum.min(other.minimum);
        self.maximum = self.maximum.max(other.maximum);
        merge_unit(&mut self.unit, &other.unit);
        Ok(())
    }

    /// Merges another distribution into this one, scaling its counts by `weight`.
    ///
    /// Merges that would contribute no samples are logged and skipped.
    pub fn add_distribution_with_weight(&mut self, other: &Self, weight: f64) {
        if let Err(e) = self.try_add_distribution_with_weight(other, weight) {
            e.report();
        }
    }

    /// Merges another distribution into this one.
    pub fn add_distribution(&mut self, other: &Self) {
        self.add_distribution_with_weight(other, 1.0);
    }

    /// Splits the distribution into chunks of at most `max_size` buckets.
    ///
    /// A distribution that already fits is returned as is. Otherwise, buckets are handed out in ascending order. The
    /// sum goes to the first chunk, the overall minimum to the first chunk, and the overall maximum to the last chunk,
    /// while every other chunk reports the edges of its own buckets. A `max_size` of zero is treated as one.
    pub fn resize(self, max_size: usize) -> Vec<Self> {
        let max_size = max_size.max(1);
        if self.buckets.len() <= max_size {
            return vec![self];
        }

        let mut chunks = Vec::with_capacity(self.buckets.len().div_ceil(max_size));
        let mut current = self.empty_chunk();
        for (&index, &count) in &self.buckets {
            let value = bucket_value(index);
            if current.buckets.is_empty() {
                current.minimum = value;
            }
            current.maximum = value;
            current.sample_count += count;
            current.buckets.insert(index, count);

            if current.buckets.len() == max_size {
                chunks.push(mem::replace(&mut current, self.empty_chunk()));
            }
        }
        if !current.buckets.is_empty() {
            chunks.push(current);
        }

        if let Some(first) = chunks.first_mut() {
            first.sum = self.sum;
            first.minimum = self.minimum;
        }
        if let Some(last) = chunks.last_mut() {
            last.maximum = self.maximum;
        }
        chunks
    }

    fn empty_chunk(&self) -> Self {
        Self {
            unit: self.unit.clone(),
            ..Self::new()
        }
    }
}

impl Default for Seh1Distribution {
    fn default() -> Self {
        Self::new()
    }
}
