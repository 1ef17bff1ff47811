//! Aggregator configuration.

use std::path::{Path, PathBuf};

use figment::{
    error::Kind,
    providers::{Data, Env, Yaml},
    value::{Dict, Map},
    Figment, Metadata, Profile, Provider,
};
use serde::Deserialize;
use snafu::{ResultExt as _, Snafu};
use tracing::debug;

use crate::DistributionStrategy;

/// Default maximum number of values per exported datum.
pub const DEFAULT_MAX_VALUES_PER_DATUM: usize = 150;

/// A configuration error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum ConfigurationError {
    /// Environment variable prefix was empty.
    #[snafu(display("Environment variable prefix must not be empty."))]
    EmptyPrefix,

    /// Configuration file could not be read.
    #[snafu(display("Failed to read configuration file '{}'.", path.display()))]
    Io {
        /// Path to the configuration file.
        path: PathBuf,

        /// Error source.
        source: std::io::Error,
    },

    /// Requested field's data type was not the expected data type.
    #[snafu(display(
        "Expected value for field '{}' to be '{}', got '{}' instead.",
        field,
        expected_ty,
        actual_ty
    ))]
    InvalidFieldType {
        /// Name of the invalid field.
        ///
        /// This is a period-separated path to the field.
        field: String,

        /// Expected data type.
        expected_ty: String,

        /// Actual data type.
        actual_ty: String,
    },

    /// Field had a value of the right type that is not allowed.
    #[snafu(display("Invalid value for field '{}': {}", field, reason))]
    InvalidValue {
        /// Name of the invalid field.
        field: &'static str,

        /// Why the value is not allowed.
        reason: String,
    },

    /// Generic configuration error.
    #[snafu(display("Failed to query configuration."))]
    Generic {
        /// Error source.
        source: figment::Error,
    },
}

impl From<figment::Error> for ConfigurationError {
    fn from(e: figment::Error) -> Self {
        match e.kind {
            Kind::InvalidType(actual_ty, expected_ty) => Self::InvalidFieldType {
                field: e.path.join("."),
                expected_ty,
                actual_ty: actual_ty.to_string(),
            },
            _ => Self::Generic { source: e },
        }
    }
}

/// Configuration data resolved from a single source.
struct ResolvedProvider {
    data: Map<Profile, Dict>,
    metadata: Metadata,
}

impl ResolvedProvider {
    fn from_yaml(path: &Path) -> Result<Self, ConfigurationError> {
        let file_data = std::fs::read_to_string(path).context(Io { path })?;
        let data = Data::<Yaml>::string(&file_data).data()?;

        Ok(Self {
            data,
            metadata: Metadata::from("YAML file", path),
        })
    }

    fn from_environment(prefix: &str) -> Result<Self, ConfigurationError> {
        let data = Env::prefixed(prefix).data()?;

        Ok(Self {
            data,
            metadata: Metadata::named(format!("environment variables prefixed with '{}'", prefix)),
        })
    }
}

impl Provider for ResolvedProvider {
    fn metadata(&self) -> Metadata {
        self.metadata.clone()
    }

    fn data(&self) -> Result<Map<Profile, Dict>, figment::Error> {
        Ok(self.data.clone())
    }
}

/// A configuration loader that can pull from YAML files and environment variables.
///
/// Sources take precedence in the order they are added: values from a source added later override values from
/// sources added before it. Once all sources are added, the configuration is extracted with
/// [`into_typed`][Self::into_typed].
#[derive(Default)]
pub struct ConfigurationLoader {
    providers: Vec<ResolvedProvider>,
}

impl ConfigurationLoader {
    /// Loads the given YAML configuration file.
    ///
    /// # Errors
    ///
    /// If the file could not be read, or if the file is not valid YAML, an error will be returned.
    pub fn from_yaml<P>(mut self, path: P) -> Result<Self, ConfigurationError>
    where
        P: AsRef<Path>,
    {
        let provider = ResolvedProvider::from_yaml(path.as_ref())?;
        self.providers.push(provider);
        Ok(self)
    }

    /// Attempts to load the given YAML configuration file, ignoring any errors.
    ///
    /// Errors include the file not existing, not being readable, and not being valid YAML.
    pub fn try_from_yaml<P>(mut self, path: P) -> Self
    where
        P: AsRef<Path>,
    {
        match ResolvedProvider::from_yaml(path.as_ref()) {
            Ok(provider) => self.providers.push(provider),
            Err(e) => {
                debug!(error = %e, file_path = %path.as_ref().display(), "Unable to read YAML configuration file. Ignoring.");
            }
        }
        self
    }

    /// Loads configuration from environment variables.
    ///
    /// The prefix given will have an underscore appended to it if it does not already end with one. For example, with a
    /// prefix of `app`, any environment variable starting with `app_` would be matched.
    ///
    /// The prefix is case-insensitive.
    ///
    /// # Errors
    ///
    /// If the prefix is empty, or the matching environment variables cannot be parsed, an error will be returned.
    pub fn from_environment(mut self, prefix: &'static str) -> Result<Self, ConfigurationError> {
        if prefix.is_empty() {
            return Err(ConfigurationError::EmptyPrefix);
        }

        let prefix = if prefix.ends_with('_') {
            prefix.to_string()
        } else {
            format!("{}_", prefix)
        };

        let provider = ResolvedProvider::from_environment(&prefix)?;
        self.providers.push(provider);
        Ok(self)
    }

    /// Consumes the configuration loader, deserializing it as `T`.
    ///
    /// # Errors
    ///
    /// If the configuration could not be deserialized into `T`, an error will be returned.
    pub fn into_typed<'a, T>(self) -> Result<T, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        let figment = self
            .providers
            .into_iter()
            .fold(Figment::new(), |figment, provider| figment.admerge(provider));

        figment.extract().map_err(Into::into)
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct RawAggregatorConfiguration {
    max_values_per_datum: usize,
}

impl Default for RawAggregatorConfiguration {
    fn default() -> Self {
        Self {
            max_values_per_datum: DEFAULT_MAX_VALUES_PER_DATUM,
        }
    }
}

/// Aggregator configuration.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(try_from = "RawAggregatorConfiguration")]
pub struct AggregatorConfiguration {
    max_values_per_datum: usize,
}

impl AggregatorConfiguration {
    /// Creates a new `AggregatorConfiguration` with the given maximum number of values per exported datum.
    ///
    /// # Errors
    ///
    /// If `max_values_per_datum` is zero, an error is returned.
    pub fn new(max_values_per_datum: usize) -> Result<Self, ConfigurationError> {
        if max_values_per_datum == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "max_values_per_datum",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self { max_values_per_datum })
    }

    /// Returns the maximum number of values per exported datum.
    pub fn max_values_per_datum(&self) -> usize {
        self.max_values_per_datum
    }

    /// Returns the distribution strategy implied by this configuration.
    pub fn strategy(&self) -> DistributionStrategy {
        DistributionStrategy::from_max_values_per_datum(self.max_values_per_datum)
    }
}

impl Default for AggregatorConfiguration {
    fn default() -> Self {
        Self {
            max_values_per_datum: DEFAULT_MAX_VALUES_PER_DATUM,
        }
    }
}

impl TryFrom<RawAggregatorConfiguration> for AggregatorConfiguration {
    type Error = ConfigurationError;

    fn try_from(raw: RawAggregatorConfiguration) -> Result<Self, Self::Error> {
        Self::new(raw.max_values_per_datum)
    }
}
