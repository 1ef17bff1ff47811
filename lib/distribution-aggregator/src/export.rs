use metric_distribution::Distribution;
use tracing::debug;

/// Summary statistics of an exported datum.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StatisticSet {
    /// Largest value.
    pub maximum: f64,

    /// Smallest value.
    pub minimum: f64,

    /// Total weight of all samples.
    pub sample_count: f64,

    /// Weighted sum of all values.
    pub sum: f64,
}

/// A distribution ready to be written out, as parallel value and count arrays.
#[derive(Clone, Debug, PartialEq)]
pub struct DistributionDatum {
    /// Representative values.
    pub values: Vec<f64>,

    /// Weight of each value in `values`.
    pub counts: Vec<f64>,

    /// Summary statistics.
    pub statistics: StatisticSet,

    /// Unit of the values.
    pub unit: String,
}

impl From<&Distribution> for DistributionDatum {
    fn from(distribution: &Distribution) -> Self {
        let (values, counts) = distribution.values_and_counts();
        Self {
            values,
            counts,
            statistics: StatisticSet {
                maximum: distribution.maximum(),
                minimum: distribution.minimum(),
                sample_count: distribution.sample_count(),
                sum: distribution.sum(),
            },
            unit: distribution.unit().to_string(),
        }
    }
}

/// Builds the datums for a distribution, holding at most `max_values_per_datum` values each.
///
/// Distributions that are too large are split with [`Distribution::resize`]. Empty distributions produce no datums.
pub fn build_datums(distribution: Distribution, max_values_per_datum: usize) -> Vec<DistributionDatum> {
    if distribution.is_empty() {
        debug!(kind = %distribution.kind(), "Skipping export of empty distribution.");
        return Vec::new();
    }

    distribution
        .resize(max_values_per_datum)
        .iter()
        .map(DistributionDatum::from)
        .collect()
}
