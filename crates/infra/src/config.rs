//! Configuration loading and representation.
//!
//! Sources, later ones winning:
//! 1. Built-in defaults
//! 2. `stockpulse.toml` in the working directory (optional), or an explicit file
//! 3. Environment variables `STOCKPULSE_*`, with `__` separating nested keys
//!    (`STOCKPULSE_FORECAST__TEST_MONTHS=3`)

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::info;

use stockpulse_ai::{FeatureConfig, TuningConfig};
use stockpulse_inventory::ReplenishmentPolicy;

const DEFAULT_FILE: &str = "stockpulse";
const ENV_PREFIX: &str = "STOCKPULSE";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastSettings {
    pub rolling_window_months: u32,
    pub test_months: u32,
    /// Steps used when a request does not specify one.
    pub default_steps: u32,
    pub retrain_each_step: bool,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        let features = FeatureConfig::default();
        Self {
            rolling_window_months: features.rolling_window_months,
            test_months: features.test_months,
            default_steps: 3,
            retrain_each_step: true,
        }
    }
}

impl ForecastSettings {
    pub fn feature_config(&self) -> FeatureConfig {
        FeatureConfig {
            rolling_window_months: self.rolling_window_months,
            test_months: self.test_months,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Postgres connection string; unset means the in-memory store.
    pub database_url: Option<String>,
    pub model_path: PathBuf,
    pub replenishment: ReplenishmentPolicy,
    pub forecast: ForecastSettings,
    pub tuning: TuningConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: None,
            model_path: PathBuf::from("stockpulse_model.json"),
            replenishment: ReplenishmentPolicy::default(),
            forecast: ForecastSettings::default(),
            tuning: TuningConfig::default(),
        }
    }
}

impl Settings {
    /// Load from the default sources, or from `file` (which must exist) instead of
    /// the optional `stockpulse.toml`.
    pub fn load(file: Option<&Path>) -> Result<Self, SettingsError> {
        let source = match file {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_FILE).required(false),
        };
        let config = Config::builder()
            .add_source(source)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;
        Self::from_config(config)
    }

    fn from_config(config: Config) -> Result<Self, SettingsError> {
        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        info!(
            postgres = settings.database_url.is_some(),
            model_path = %settings.model_path.display(),
            "configuration loaded"
        );
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        self.replenishment
            .validate()
            .map_err(|e| SettingsError::Invalid(e.to_string()))?;
        self.forecast
            .feature_config()
            .validate()
            .map_err(|e| SettingsError::Invalid(e.to_string()))?;
        if self.forecast.default_steps == 0 {
            return Err(SettingsError::Invalid("forecast.default_steps must be >= 1".to_string()));
        }
        self.tuning
            .validate()
            .map_err(|e| SettingsError::Invalid(e.to_string()))?;
        if self.database_url.as_deref().is_some_and(|url| url.trim().is_empty()) {
            return Err(SettingsError::Invalid("database_url must not be blank".to_string()));
        }
        Ok(())
    }
}
