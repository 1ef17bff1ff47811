use std::fmt;

use crate::{
    error::{DistributionError, IncompatibleKinds, MergeError},
    ExpHistogramDistribution, RegularDistribution, Seh1Distribution,
};

/// The kind of a [`Distribution`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum DistributionKind {
    /// Exact values, see [`RegularDistribution`].
    Regular,

    /// Fixed 10% buckets, see [`Seh1Distribution`].
    Seh1,

    /// OpenTelemetry-style exponential buckets, see [`ExpHistogramDistribution`].
    ExpHistogram,
}

impl DistributionKind {
    /// Returns the name of the kind.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::Seh1 => "seh1",
            Self::ExpHistogram => "exponential histogram",
        }
    }
}

impl fmt::Display for DistributionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

macro_rules! dispatch {
    ($self:expr, $inner:ident => $body:expr) => {
        match $self {
            Distribution::Regular($inner) => $body,
            Distribution::Seh1($inner) => $body,
            Distribution::ExpHistogram($inner) => $body,
        }
    };
}

/// A distribution of any kind.
///
/// Wraps the concrete distributions so that callers can aggregate and export them without knowing which kind is in
/// use. Merges are only possible between distributions of the same kind.
#[derive(Clone, Debug, PartialEq)]
pub enum Distribution {
    /// An exact-value distribution.
    Regular(RegularDistribution),

    /// A fixed-bucket exponential histogram.
    Seh1(Seh1Distribution),

    /// An OpenTelemetry-style exponential histogram.
    ExpHistogram(ExpHistogramDistribution),
}

impl Distribution {
    /// Creates a new, empty distribution of the given kind.
    pub fn new(kind: DistributionKind) -> Self {
        match kind {
            DistributionKind::Regular => Self::Regular(RegularDistribution::new()),
            DistributionKind::Seh1 => Self::Seh1(Seh1Distribution::new()),
            DistributionKind::ExpHistogram => Self::ExpHistogram(ExpHistogramDistribution::new()),
        }
    }

    /// Returns the kind of this distribution.
    pub fn kind(&self) -> DistributionKind {
        match self {
            Self::Regular(_) => DistributionKind::Regular,
            Self::Seh1(_) => DistributionKind::Seh1,
            Self::ExpHistogram(_) => DistributionKind::ExpHistogram,
        }
    }

    /// Returns the largest recorded value.
    pub fn maximum(&self) -> f64 {
        dispatch!(self, d => d.maximum())
    }

    /// Returns the smallest recorded value.
    pub fn minimum(&self) -> f64 {
        dispatch!(self, d => d.minimum())
    }

    /// Returns the total weight of all recorded samples.
    pub fn sample_count(&self) -> f64 {
        dispatch!(self, d => d.sample_count())
    }

    /// Returns the weighted sum of all recorded values.
    pub fn sum(&self) -> f64 {
        dispatch!(self, d => d.sum())
    }

    /// Returns the unit of the recorded values.
    pub fn unit(&self) -> &str {
        dispatch!(self, d => d.unit())
    }

    /// Returns the number of non-empty buckets.
    pub fn size(&self) -> usize {
        dispatch!(self, d => d.size())
    }

    /// Returns `true` if there are no non-empty buckets.
    pub fn is_empty(&self) -> bool {
        dispatch!(self, d => d.is_empty())
    }

    /// Returns the representative value and count of every non-empty bucket.
    ///
    /// Regular and SEH1 distributions report in ascending order, exponential histograms in descending order.
    pub fn values_and_counts(&self) -> (Vec<f64>, Vec<f64>) {
        dispatch!(self, d => d.values_and_counts())
    }

    /// Records a sample with the given weight.
    ///
    /// # Errors
    ///
    /// If the sample cannot be represented by this kind of distribution, an error is returned and the distribution is
    /// left unchanged.
    pub fn add_entry(&mut self, value: f64, weight: f64) -> Result<(), DistributionError> {
        dispatch!(self, d => d.add_entry(value, weight))
    }

    /// Records a sample with the given weight and unit.
    ///
    /// # Errors
    ///
    /// If the sample cannot be represented by this kind of distribution, an error is returned and the distribution is
    /// left unchanged.
    pub fn add_entry_with_unit(&mut self, value: f64, weight: f64, unit: &str) -> Result<(), DistributionError> {
        dispatch!(self, d => d.add_entry_with_unit(value, weight, unit))
    }

    /// Merges another distribution into this one, scaling its counts by `weight`.
    ///
    /// # Errors
    ///
    /// If the distributions are of different kinds, or the concrete distribution refuses the merge, an error is
    /// returned and this distribution is left unchanged.
    pub fn try_add_distribution_with_weight(&mut self, other: &Distribution, weight: f64) -> Result<(), MergeError> {
        match (self, other) {
            (Self::Regular(to), Self::Regular(from)) => to.try_add_distribution_with_weight(from, weight),
            (Self::Seh1(to), Self::Seh1(from)) => to.try_add_distribution_with_weight(from, weight),
            (Self::ExpHistogram(to), Self::ExpHistogram(from)) => to.try_add_distribution_with_weight(from, weight),
            (to, from) => IncompatibleKinds {
                from: from.kind(),
                to: to.kind(),
            }
            .fail(),
        }
    }

    /// Merges another distribution into this one, scaling its counts by `weight`.
    ///
    /// Refused merges are logged and skipped.
    pub fn add_distribution_with_weight(&mut self, other: &Distribution, weight: f64) {
        if let Err(e) = self.try_add_distribution_with_weight(other, weight) {
            e.report();
        }
    }

    /// Merges another distribution into this one.
    pub fn add_distribution(&mut self, other: &Distribution) {
        self.add_distribution_with_weight(other, 1.0);
    }

    /// Splits the distribution into distributions of at most `max_size` buckets.
    ///
    /// Regular distributions are packed into SEH1 distributions, while the other kinds split into chunks of their own
    /// kind. See the `resize` method of each concrete distribution for details.
    pub fn resize(self, max_size: usize) -> Vec<Distribution> {
        match self {
            Self::Regular(d) => d.resize(max_size).into_iter().map(Self::Seh1).collect(),
            Self::Seh1(d) => d.resize(max_size).into_iter().map(Self::Seh1).collect(),
            Self::ExpHistogram(d) => d.resize(max_size).into_iter().map(Self::ExpHistogram).collect(),
        }
    }
}

impl From<RegularDistribution> for Distribution {
    fn from(distribution: RegularDistribution) -> Self {
        Self::Regular(distribution)
    }
}

impl From<Seh1Distribution> for Distribution {
    fn from(distribution: Seh1Distribution) -> Self {
        Self::Seh1(distribution)
    }
}

impl From<ExpHistogramDistribution> for Distribution {
    fn from(distribution: ExpHistogramDistribution) -> Self {
        Self::ExpHistogram(distribution)
    }
}
