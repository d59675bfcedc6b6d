//! Forecasts on a bounded blocking pool with a deadline.
//!
//! The fit is CPU-bound and cannot be interrupted. A call that hits the
//! deadline returns [`AnalyticsError::Timeout`] while its fit keeps its
//! concurrency slot until it actually finishes, so the pool never runs more
//! than `max_concurrent_forecasts` fits at once.

use crate::error::{AnalyticsError, Result};
use crate::schema::ForecastResult;
use crate::service::AnalyticsService;
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

pub struct BoundedForecaster {
    service: Arc<AnalyticsService>,
    semaphore: Arc<Semaphore>,
    timeout: Duration,
}

impl BoundedForecaster {
    /// Limits and deadline come from the service configuration.
    pub fn new(service: Arc<AnalyticsService>) -> Self {
        let config = service.config();
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_forecasts));
        let timeout = config.forecast_timeout();
        Self {
            service,
            semaphore,
            timeout,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub async fn forecast_revenue(
        &self,
        resort: Option<String>,
        months: Option<u32>,
        horizon: Option<u32>,
    ) -> Result<ForecastResult> {
        let timeout = self.timeout;
        match tokio::time::timeout(timeout, self.run(resort, months, horizon)).await {
            Ok(result) => {
                debug!("Bounded forecast finished");
                result
            }
            Err(_) => {
                warn!("Forecast did not finish within {:?}", timeout);
                Err(AnalyticsError::Timeout(timeout))
            }
        }
    }

    async fn run(
        &self,
        resort: Option<String>,
        months: Option<u32>,
        horizon: Option<u32>,
    ) -> Result<ForecastResult> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| AnalyticsError::Model("forecast pool is closed".to_string()))?;

        let service = Arc::clone(&self.service);
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            service.forecast_revenue(resort.as_deref(), months, horizon)
        })
        .await
        .map_err(|e| AnalyticsError::Model(format!("forecast task failed: {}", e)))?
    }
}
