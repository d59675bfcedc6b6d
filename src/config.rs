use crate::error::{AnalyticsError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AnalyticsConfig {
    #[schemars(description = "Span in days of a range when the caller gives neither bound, or only one")]
    pub default_range_days: u32,

    #[schemars(description = "Forecast horizon in calendar days when the caller gives none")]
    pub default_horizon_days: u32,

    #[schemars(description = "History lookback in months for model-ready series and forecasts")]
    pub default_history_months: u32,

    #[schemars(description = "Directory export workbooks are written into")]
    pub export_dir: PathBuf,

    #[schemars(description = "Deadline in seconds for one bounded forecast fit")]
    pub forecast_timeout_secs: u64,

    #[schemars(description = "Forecast fits allowed to run at the same time")]
    pub max_concurrent_forecasts: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            default_range_days: 365,
            default_horizon_days: 56,
            default_history_months: 12,
            export_dir: PathBuf::from("."),
            forecast_timeout_secs: 30,
            max_concurrent_forecasts: 2,
        }
    }
}

impl AnalyticsConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_range_days == 0 {
            return Err(AnalyticsError::InvalidConfig(
                "default_range_days must be at least 1".to_string(),
            ));
        }
        if self.max_concurrent_forecasts == 0 {
            return Err(AnalyticsError::InvalidConfig(
                "max_concurrent_forecasts must be at least 1".to_string(),
            ));
        }
        if self.forecast_timeout_secs == 0 {
            return Err(AnalyticsError::InvalidConfig(
                "forecast_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn forecast_timeout(&self) -> Duration {
        Duration::from_secs(self.forecast_timeout_secs)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(AnalyticsConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::generate_json_schema())
    }
}
