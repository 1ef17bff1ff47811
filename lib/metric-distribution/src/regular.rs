use std::{collections::BTreeMap, mem};

use ordered_float::OrderedFloat;
use tracing::debug;

use crate::{
    common::{merge_unit, validate_merge_weight, validate_sample},
    error::{DistributionError, MergeError},
    otel::{import_histogram, HistogramDataPoint},
    seh1::Seh1Distribution,
};

/// A distribution that records every distinct value exactly.
///
/// Each distinct value gets its own bucket, so the size of the distribution grows with the number of distinct values
/// observed. [`resize`][Self::resize] turns it into a set of bounded [`Seh1Distribution`]s for export.
#[derive(Clone, Debug, PartialEq)]
pub struct RegularDistribution {
    maximum: f64,
    minimum: f64,
    sample_count: f64,
    sum: f64,
    buckets: BTreeMap<OrderedFloat<f64>, f64>,
    unit: String,
}

impl RegularDistribution {
    /// Creates a new, empty `RegularDistribution`.
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

    /// Returns the number of distinct values recorded.
    pub fn size(&self) -> usize {
        self.buckets.len()
    }

    /// Returns `true` if no samples have been recorded.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Returns the accumulated weight for the given value.
    pub fn count_for(&self, value: f64) -> f64 {
        self.buckets.get(&OrderedFloat(value)).copied().unwrap_or(0.0)
    }

    /// Returns every distinct value and its accumulated weight, in ascending order of value.
    pub fn values_and_counts(&self) -> (Vec<f64>, Vec<f64>) {
        self.buckets.iter().map(|(value, &count)| (value.0, count)).unzip()
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
        *self.buckets.entry(OrderedFloat(value)).or_insert(0.0) += weight;
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

        for (&value, &count) in &other.buckets {
            *self.buckets.entry(value).or_insert(0.0) += count * weight;
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

    /// Packs the recorded values into `Seh1Distribution`s holding at most `max_size` buckets each.
    ///
    /// Values are packed in ascending order, and a new chunk is started whenever the next value would need a new
    /// bucket in a full chunk. Every chunk carries the unit of this distribution. A `max_size` of zero is treated as
    /// one.
    pub fn resize(&self, max_size: usize) -> Vec<Seh1Distribution> {
        let max_size = max_size.max(1);
        let mut chunks = Vec::new();
        let mut current = Seh1Distribution::new();
        for (value, &count) in &self.buckets {
            if !current.can_add(value.0, max_size) {
                chunks.push(mem::take(&mut current));
            }
            if let Err(e) = current.add_entry_with_unit(value.0, count, &self.unit) {
                debug!(error = %e, value = value.0, "Dropping value while resizing distribution.");
            }
        }
        if !current.is_empty() {
            chunks.push(current);
        }
        chunks
    }
}

impl Default for RegularDistribution {
    fn default() -> Self {
        Self::new()
    }
}
