use std::collections::{btree_map::Entry, BTreeMap};

use metric_distribution::{Distribution, DistributionError};
use tracing::{debug, warn};

use crate::DistributionStrategy;

/// Identifies the series a sample belongs to within an aggregation window.
///
/// Dimensions are kept sorted by name, so the order they are given in does not matter.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct AggregationKey {
    name: String,
    dimensions: Vec<(String, String)>,
    window_start: u64,
}

impl AggregationKey {
    /// Creates a new `AggregationKey`.
    pub fn new<I, K, V>(name: impl Into<String>, dimensions: I, window_start: u64) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut dimensions = dimensions
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect::<Vec<_>>();
        dimensions.sort();

        Self {
            name: name.into(),
            dimensions,
            window_start,
        }
    }

    /// Returns the metric name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the dimensions, sorted by name.
    pub fn dimensions(&self) -> &[(String, String)] {
        &self.dimensions
    }

    /// Returns the start of the aggregation window.
    pub fn window_start(&self) -> u64 {
        self.window_start
    }
}

/// Accumulates samples and distributions per aggregation key.
///
/// Each key owns a single distribution, created with the configured [`DistributionStrategy`] on first use, until the
/// aggregator is flushed.
#[derive(Debug, Default)]
pub struct Aggregator {
    strategy: DistributionStrategy,
    entries: BTreeMap<AggregationKey, Distribution>,
}

impl Aggregator {
    /// Creates a new, empty `Aggregator`.
    pub fn new(strategy: DistributionStrategy) -> Self {
        Self {
            strategy,
            entries: BTreeMap::new(),
        }
    }

    /// Returns the strategy used for new distributions.
    pub fn strategy(&self) -> DistributionStrategy {
        self.strategy
    }

    /// Returns the number of keys with accumulated data.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing has been accumulated since the last flush.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records a single sample for the given key.
    ///
    /// # Errors
    ///
    /// If the sample is not supported by the distribution, an error is returned and nothing is recorded. No
    /// distribution is created for a key whose first sample is rejected.
    pub fn add_sample(&mut self, key: AggregationKey, value: f64, unit: &str) -> Result<(), DistributionError> {
        self.add_weighted_sample(key, value, 1.0, unit)
    }

    /// Records a sample with the given weight for the given key.
    ///
    /// # Errors
    ///
    /// If the sample is not supported by the distribution, an error is returned and nothing is recorded. No
    /// distribution is created for a key whose first sample is rejected.
    pub fn add_weighted_sample(
        &mut self, key: AggregationKey, value: f64, weight: f64, unit: &str,
    ) -> Result<(), DistributionError> {
        let result = match self.entries.entry(key) {
            Entry::Occupied(mut entry) => entry.get_mut().add_entry_with_unit(value, weight, unit),
            Entry::Vacant(entry) => {
                let mut distribution = self.strategy.new_distribution();
                let result = distribution.add_entry_with_unit(value, weight, unit);
                if result.is_ok() {
                    entry.insert(distribution);
                }
                result
            }
        };

        if let Err(e) = &result {
            match e {
                DistributionError::UnsupportedValue { .. } => warn!(error = %e, "Dropping unsupported sample."),
                DistributionError::UnsupportedWeight { .. } => debug!(error = %e, "Dropping unsupported sample."),
            }
        }
        result
    }

    /// Merges a distribution into the one accumulated for the given key.
    ///
    /// The first distribution for a key is stored as is. Later distributions are merged into it, and merges that are
    /// refused are logged and skipped.
    pub fn add_distribution(&mut self, key: AggregationKey, distribution: Distribution) {
        match self.entries.entry(key) {
            Entry::Occupied(mut entry) => entry.get_mut().add_distribution(&distribution),
            Entry::Vacant(entry) => {
                entry.insert(distribution);
            }
        }
    }

    /// Drains all accumulated distributions, in key order.
    pub fn flush(&mut self) -> Vec<(AggregationKey, Distribution)> {
        std::mem::take(&mut self.entries).into_iter().collect()
    }
}
