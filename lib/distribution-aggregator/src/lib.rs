//! Aggregation and export of metric distributions.
//!
//! Samples and pre-aggregated distributions are accumulated per [`AggregationKey`] by an [`Aggregator`], using the
//! kind of distribution chosen by a [`DistributionStrategy`]. On flush, every accumulated distribution is turned into
//! one or more [`DistributionDatum`]s, each holding no more values than the configured limit.
#![deny(warnings)]
#![deny(missing_docs)]

mod aggregator;
pub use self::aggregator::{AggregationKey, Aggregator};

mod config;
pub use self::config::{AggregatorConfiguration, ConfigurationError, ConfigurationLoader, DEFAULT_MAX_VALUES_PER_DATUM};

mod export;
pub use self::export::{build_datums, DistributionDatum, StatisticSet};

mod strategy;
pub use self::strategy::{DistributionStrategy, SEH1_VALUES_PER_DATUM_THRESHOLD};
