use metric_distribution::{
    otel::HistogramDataPoint, Distribution, DistributionKind, RegularDistribution, Seh1Distribution,
};
use tracing::debug;

/// Smallest number of values per datum for which SEH1 distributions are used.
///
/// SEH1 distributions cannot grow past a few thousand buckets for realistic value ranges, so with a limit this large
/// they rarely need to be split on export.
pub const SEH1_VALUES_PER_DATUM_THRESHOLD: usize = 5000;

/// Chooses which kind of distribution accumulates samples.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DistributionStrategy {
    kind: DistributionKind,
}

impl DistributionStrategy {
    /// Creates a new `DistributionStrategy` that accumulates into distributions of the given kind.
    pub const fn new(kind: DistributionKind) -> Self {
        Self { kind }
    }

    /// Creates a strategy based on the maximum number of values allowed per exported datum.
    ///
    /// Limits of at least [`SEH1_VALUES_PER_DATUM_THRESHOLD`] use SEH1 distributions, while smaller limits keep exact
    /// values and rely on splitting them on export.
    pub fn from_max_values_per_datum(max_values_per_datum: usize) -> Self {
        if max_values_per_datum >= SEH1_VALUES_PER_DATUM_THRESHOLD {
            Self::new(DistributionKind::Seh1)
        } else {
            Self::new(DistributionKind::Regular)
        }
    }

    /// Returns the kind of distribution used.
    pub fn kind(&self) -> DistributionKind {
        self.kind
    }

    /// Creates a new, empty distribution.
    pub fn new_distribution(&self) -> Distribution {
        Distribution::new(self.kind)
    }

    /// Creates a distribution from an explicit-bucket histogram data point.
    ///
    /// Exponential histograms cannot represent arbitrary explicit buckets, so that strategy falls back to exact values.
    pub fn distribution_from_histogram(&self, dp: &HistogramDataPoint, unit: &str) -> Distribution {
        match self.kind {
            DistributionKind::Seh1 => Seh1Distribution::from_otel_histogram(dp, unit).into(),
            DistributionKind::Regular => RegularDistribution::from_otel_histogram(dp, unit).into(),
            DistributionKind::ExpHistogram => {
                debug!("Importing explicit-bucket histogram as exact values.");
                RegularDistribution::from_otel_histogram(dp, unit).into()
            }
        }
    }
}

impl Default for DistributionStrategy {
    fn default() -> Self {
        Self::new(DistributionKind::Regular)
    }
}
