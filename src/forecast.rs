//! Point forecasts over a dense daily series.
//!
//! The built-in model is ARIMA(1,1,1) from `anofox-forecast`, fitted by
//! conditional sum of squares on the first differences with a drift term.
//! Any other [`ForecastModel`] can be installed on the [`ForecastEngine`].

use crate::error::{AnalyticsError, Result};
use crate::schema::{DatedValue, ForecastResult};
use crate::utils::DailySeries;
use chrono::Duration;

/// A point forecaster over an evenly spaced series.
pub trait ForecastModel: Send + Sync {
    fn name(&self) -> &str;

    /// `horizon` values following the last element of `values`.
    fn forecast(&self, values: &[f64], horizon: usize) -> Result<Vec<f64>>;
}

#[cfg(feature = "forecasting")]
pub use arima::ArimaModel;

#[cfg(feature = "forecasting")]
mod arima {
    use super::ForecastModel;
    use crate::error::{AnalyticsError, Result};
    use anofox_forecast::core::TimeSeries;
    use anofox_forecast::models::arima::ARIMA;
    use anofox_forecast::models::Forecaster;
    use anofox_forecast::ForecastError;
    use chrono::{DateTime, Duration, Utc};
    use log::debug;

    /// Shortest series ARIMA(1,1,1) will fit. Anything shorter is forecast
    /// as a random walk.
    const MIN_OBSERVATIONS: usize = 4;

    fn model_err(e: ForecastError) -> AnalyticsError {
        AnalyticsError::Model(format!("ARIMA(1,1,1): {}", e))
    }

    #[derive(Debug, Clone, Copy, Default)]
    pub struct ArimaModel;

    impl ArimaModel {
        pub fn new() -> Self {
            Self
        }

        /// Fits ARIMA(1,1,1) to `values` laid out on consecutive days.
        pub fn fit(&self, values: &[f64]) -> Result<ARIMA> {
            let timestamps: Vec<DateTime<Utc>> = (0..values.len())
                .map(|i| DateTime::<Utc>::UNIX_EPOCH + Duration::days(i as i64))
                .collect();
            let series = TimeSeries::univariate(timestamps, values.to_vec()).map_err(model_err)?;

            let mut model = ARIMA::new(1, 1, 1);
            model.fit(&series).map_err(model_err)?;
            debug!(
                "ARIMA(1,1,1) fit on {} points: ar={:?}, ma={:?}, drift={:.4}",
                values.len(),
                model.ar_coefficients(),
                model.ma_coefficients(),
                model.intercept()
            );
            Ok(model)
        }
    }

    impl ForecastModel for ArimaModel {
        fn name(&self) -> &str {
            "ARIMA(1,1,1)"
        }

        fn forecast(&self, values: &[f64], horizon: usize) -> Result<Vec<f64>> {
            let Some(&last) = values.last() else {
                return Err(AnalyticsError::Model(
                    "cannot fit a model to an empty series".to_string(),
                ));
            };
            if values.iter().any(|v| !v.is_finite()) {
                return Err(AnalyticsError::Model(
                    "series contains non-finite values".to_string(),
                ));
            }
            if values.len() < MIN_OBSERVATIONS {
                debug!(
                    "{} points are too few for ARIMA(1,1,1), repeating the last value",
                    values.len()
                );
                return Ok(vec![last; horizon]);
            }

            let model = self.fit(values)?;
            let forecast = model.predict(horizon).map_err(model_err)?;
            Ok(forecast.primary().to_vec())
        }
    }
}

/// Forecasts a dense daily series with an injected model.
pub struct ForecastEngine {
    model: Option<Box<dyn ForecastModel>>,
}

impl Default for ForecastEngine {
    #[cfg(feature = "forecasting")]
    fn default() -> Self {
        Self::with_model(Box::new(ArimaModel::new()))
    }

    #[cfg(not(feature = "forecasting"))]
    fn default() -> Self {
        Self::without_model()
    }
}

impl ForecastEngine {
    pub fn with_model(model: Box<dyn ForecastModel>) -> Self {
        Self { model: Some(model) }
    }

    pub fn without_model() -> Self {
        Self { model: None }
    }

    pub fn model_name(&self) -> Option<&str> {
        self.model.as_deref().map(|m| m.name())
    }

    /// History for every input day plus `horizon` forecasts on the
    /// calendar days after the last one. An empty series yields an empty
    /// result, but only once a model is known to be installed.
    pub fn forecast(&self, series: &DailySeries<f64>, horizon: usize) -> Result<ForecastResult> {
        let model = self
            .model
            .as_deref()
            .ok_or(AnalyticsError::MissingCapability {
                capability: "forecast-model",
                hint: "enable the `forecasting` feature or install a model with ForecastEngine::with_model",
            })?;

        let Some((&last_date, _)) = series.last_key_value() else {
            return Ok(ForecastResult::empty());
        };

        let values: Vec<f64> = series.values().copied().collect();
        let predicted = model.forecast(&values, horizon)?;

        let history = series
            .iter()
            .map(|(date, value)| DatedValue {
                date: date.format("%Y-%m-%d").to_string(),
                value: *value,
            })
            .collect();
        let forecast = predicted
            .into_iter()
            .enumerate()
            .map(|(step, value)| {
                let date = last_date
                    .checked_add_signed(Duration::days(step as i64 + 1))
                    .ok_or_else(|| {
                        AnalyticsError::Model(format!(
                            "forecast step {} runs past the last representable date",
                            step + 1
                        ))
                    })?;
                Ok(DatedValue {
                    date: date.format("%Y-%m-%d").to_string(),
                    value,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ForecastResult {
            history,
            forecast,
            model: Some(model.name().to_string()),
        })
    }
}
