//! Query endpoints over a record store.
//!
//! Every call reads a fresh snapshot and recomputes; nothing is cached
//! between calls. Ranges left open by the caller are resolved against the
//! injected clock.

use crate::cancellations::{Basis, CancellationEngine};
use crate::config::AnalyticsConfig;
use crate::error::{AnalyticsError, Result};
use crate::export::{ExportArtifact, ExportAssembler, Row};
use crate::forecast::ForecastEngine;
use crate::lead_time::LeadTimeEngine;
use crate::occupancy::OccupancyEngine;
use crate::revenue::{self, model_ready_rows, RevenueEngine};
use crate::schema::{
    BookingRateResponse, CancellationResponse, ForecastResult, LeadTimeRow, OccupancyRow,
    PrepParams, PrepResponse, RevenuePoint, RevenueTrendRow, SeriesResponse, SummaryResponse,
};
use crate::seasonality::BookingRateEngine;
use crate::store::RecordStore;
use crate::trend::RevenueTrendEngine;
use crate::utils::{resolve_range, Clock, DailySeries, Granularity, SystemClock};
use chrono::{Months, NaiveDate};
use log::info;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const REVENUE_DAILY_SHEET: &str = "RevenueDaily";
pub const CANCELLATIONS_SHEET: &str = "Cancellations";
pub const LEAD_TIME_SHEET: &str = "LeadTime";

const REVENUE_DAILY_COLUMNS: [&str; 4] = ["date", "revenue", "bookings", "avg_rev_per_booking"];
const CANCELLATIONS_COLUMNS: [&str; 6] = [
    "date",
    "denominator",
    "cancelled",
    "no_show",
    "cancel_rate",
    "no_show_rate",
];
const LEAD_TIME_COLUMNS: [&str; 10] = [
    "date",
    "early",
    "standard",
    "last_minute",
    "very_late",
    "total",
    "share_early",
    "share_standard",
    "share_last_minute",
    "share_very_late",
];

pub struct AnalyticsService {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    config: AnalyticsConfig,
    forecaster: ForecastEngine,
    exporter: ExportAssembler,
}

impl AnalyticsService {
    /// Service on the system clock with the default forecast and export
    /// backends for the enabled features.
    pub fn new(store: Arc<dyn RecordStore>, config: AnalyticsConfig) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            config,
            forecaster: ForecastEngine::default(),
            exporter: ExportAssembler::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_forecast_engine(mut self, engine: ForecastEngine) -> Self {
        self.forecaster = engine;
        self
    }

    pub fn with_export_assembler(mut self, assembler: ExportAssembler) -> Self {
        self.exporter = assembler;
        self
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    fn resolve(&self, date_from: Option<NaiveDate>, date_to: Option<NaiveDate>) -> (NaiveDate, NaiveDate) {
        resolve_range(
            date_from,
            date_to,
            self.config.default_range_days,
            self.clock.today(),
        )
    }

    /// `months` calendar months back from today, through today.
    fn lookback(&self, months: u32) -> (NaiveDate, NaiveDate) {
        let today = self.clock.today();
        let start = today
            .checked_sub_months(Months::new(months))
            .unwrap_or(NaiveDate::MIN);
        (start, today)
    }

    pub fn summary(
        &self,
        resort: Option<&str>,
        date_from: Option<NaiveDate>,
        date_to: Option<NaiveDate>,
    ) -> Result<SummaryResponse> {
        info!(
            "summary resort={:?} from={:?} to={:?}",
            resort, date_from, date_to
        );
        revenue::summary(self.store.as_ref(), resort, date_from, date_to)
    }

    pub fn revenue_timeseries(
        &self,
        resort: Option<&str>,
        date_from: Option<NaiveDate>,
        date_to: Option<NaiveDate>,
    ) -> Result<SeriesResponse<RevenuePoint>> {
        info!(
            "revenue_timeseries resort={:?} from={:?} to={:?}",
            resort, date_from, date_to
        );
        let series = revenue::revenue_timeseries(self.store.as_ref(), resort, date_from, date_to)?;
        Ok(SeriesResponse { series })
    }

    pub fn occupancy_trend(
        &self,
        location_id: Option<&str>,
        date_from: Option<NaiveDate>,
        date_to: Option<NaiveDate>,
        granularity: Granularity,
    ) -> Result<SeriesResponse<OccupancyRow>> {
        let (start, end) = self.resolve(date_from, date_to);
        info!(
            "occupancy_trend location={:?} {}..{} by {}",
            location_id, start, end, granularity
        );
        let series = OccupancyEngine::new(self.store.as_ref()).trend(location_id, start, end, granularity)?;
        Ok(SeriesResponse { series })
    }

    pub fn booking_rate_trend(
        &self,
        date_from: Option<NaiveDate>,
        date_to: Option<NaiveDate>,
        granularity: Granularity,
    ) -> Result<BookingRateResponse> {
        let (start, end) = self.resolve(date_from, date_to);
        info!("booking_rate_trend {}..{} by {}", start, end, granularity);
        BookingRateEngine::new(self.store.as_ref()).trend(start, end, granularity)
    }

    pub fn revenue_trend(
        &self,
        resort: Option<&str>,
        date_from: Option<NaiveDate>,
        date_to: Option<NaiveDate>,
        granularity: Granularity,
    ) -> Result<SeriesResponse<RevenueTrendRow>> {
        let (start, end) = self.resolve(date_from, date_to);
        info!(
            "revenue_trend resort={:?} {}..{} by {}",
            resort, start, end, granularity
        );
        let series = RevenueTrendEngine::new(self.store.as_ref()).trend(resort, start, end, granularity)?;
        Ok(SeriesResponse { series })
    }

    pub fn cancellations_trend(
        &self,
        date_from: Option<NaiveDate>,
        date_to: Option<NaiveDate>,
        granularity: Granularity,
        basis: Basis,
    ) -> Result<CancellationResponse> {
        let (start, end) = self.resolve(date_from, date_to);
        info!(
            "cancellations_trend {}..{} by {} ({} basis)",
            start,
            end,
            granularity,
            basis.as_str()
        );
        CancellationEngine::new(self.store.as_ref()).trend(start, end, granularity, basis)
    }

    pub fn lead_time_trend(
        &self,
        date_from: Option<NaiveDate>,
        date_to: Option<NaiveDate>,
        granularity: Granularity,
    ) -> Result<SeriesResponse<LeadTimeRow>> {
        let (start, end) = self.resolve(date_from, date_to);
        info!("lead_time_trend {}..{} by {}", start, end, granularity);
        let series = LeadTimeEngine::new(self.store.as_ref()).distribution(start, end, granularity)?;
        Ok(SeriesResponse { series })
    }

    pub fn prep_timeseries(&self, resort: Option<&str>, months: Option<u32>) -> Result<PrepResponse> {
        let months = months.unwrap_or(self.config.default_history_months);
        let (start, end) = self.lookback(months);
        info!("prep_timeseries resort={:?} {}..{}", resort, start, end);

        let engine = RevenueEngine::new(self.store.as_ref());
        let revenue = engine.revenue_series(resort, start, end)?;
        let bookings = engine.bookings_series(start, end)?;

        Ok(PrepResponse {
            rows: model_ready_rows(&revenue, &bookings),
            params: PrepParams {
                resort: resort.map(str::to_string),
                months,
                date_from: start,
                date_to: end,
            },
        })
    }

    /// Dense daily revenue over the last `months` months, the forecast input.
    pub fn forecast_input(&self, resort: Option<&str>, months: Option<u32>) -> Result<DailySeries<f64>> {
        let months = months.unwrap_or(self.config.default_history_months);
        let (start, end) = self.lookback(months);
        RevenueEngine::new(self.store.as_ref()).revenue_series(resort, start, end)
    }

    pub fn forecast_revenue(
        &self,
        resort: Option<&str>,
        months: Option<u32>,
        horizon: Option<u32>,
    ) -> Result<ForecastResult> {
        let horizon = horizon.unwrap_or(self.config.default_horizon_days);
        info!(
            "forecast_revenue resort={:?} months={:?} horizon={}",
            resort, months, horizon
        );
        let series = self.forecast_input(resort, months)?;
        self.forecaster.forecast(&series, horizon as usize)
    }

    /// Workbook with daily revenue, cancellations and lead times for one
    /// calendar year. Written under the configured export directory.
    pub fn export_year_excel(&self, resort: Option<&str>, year: i32) -> Result<ExportArtifact> {
        let (start, end) = match (
            NaiveDate::from_ymd_opt(year, 1, 1),
            NaiveDate::from_ymd_opt(year, 12, 31),
        ) {
            (Some(start), Some(end)) => (start, end),
            _ => return Err(AnalyticsError::Export(format!("year {} is out of range", year))),
        };
        info!("export_year_excel resort={:?} year={}", resort, year);

        let store = self.store.as_ref();
        let engine = RevenueEngine::new(store);
        let revenue = engine.revenue_series(resort, start, end)?;
        let bookings = engine.bookings_series(start, end)?;

        let revenue_rows = model_ready_rows(&revenue, &bookings)
            .iter()
            .map(serde_json::to_value)
            .map(|value| value.map(into_row))
            .collect::<std::result::Result<Vec<Row>, _>>()?;

        let cancellation_rows = CancellationEngine::new(store)
            .trend(start, end, Granularity::Day, Basis::All)?
            .series
            .into_iter()
            .map(|r| {
                into_row(json!({
                    "date": r.period,
                    "denominator": r.denominator,
                    "cancelled": r.cancelled,
                    "no_show": r.no_show,
                    "cancel_rate": r.cancel_rate,
                    "no_show_rate": r.no_show_rate,
                }))
            })
            .collect();

        let lead_rows = LeadTimeEngine::new(store)
            .distribution(start, end, Granularity::Day)?
            .into_iter()
            .map(|r| {
                into_row(json!({
                    "date": r.period,
                    "early": r.counts.early,
                    "standard": r.counts.standard,
                    "last_minute": r.counts.last_minute,
                    "very_late": r.counts.very_late,
                    "total": r.counts.total,
                    "share_early": r.share.early,
                    "share_standard": r.share.standard,
                    "share_last_minute": r.share.last_minute,
                    "share_very_late": r.share.very_late,
                }))
            })
            .collect();

        let sheets = vec![
            (REVENUE_DAILY_SHEET.to_string(), revenue_rows),
            (CANCELLATIONS_SHEET.to_string(), cancellation_rows),
            (LEAD_TIME_SHEET.to_string(), lead_rows),
        ];
        let orders = export_column_orders();
        let stem = format!("analytics_{}_{}", resort.unwrap_or("all"), year);

        self.exporter
            .export(&stem, &self.config.export_dir, &sheets, Some(&orders))
    }
}

fn into_row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}

pub fn export_column_orders() -> BTreeMap<String, Vec<String>> {
    fn owned(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|c| c.to_string()).collect()
    }
    BTreeMap::from([
        (REVENUE_DAILY_SHEET.to_string(), owned(&REVENUE_DAILY_COLUMNS)),
        (CANCELLATIONS_SHEET.to_string(), owned(&CANCELLATIONS_COLUMNS)),
        (LEAD_TIME_SHEET.to_string(), owned(&LEAD_TIME_COLUMNS)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{BookingRecord, TransactionRecord};
    use crate::store::InMemoryStore;
    use crate::utils::FixedClock;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn service(store: InMemoryStore) -> AnalyticsService {
        AnalyticsService::new(Arc::new(store), AnalyticsConfig::default())
            .with_clock(Arc::new(FixedClock(d(2024, 3, 31))))
    }

    #[test]
    fn test_open_range_defaults_to_config_span() {
        let mut store = InMemoryStore::new();
        store.insert_bookings(vec![
            BookingRecord {
                checkin_date: Some(d(2023, 3, 31)),
                ..Default::default()
            },
            BookingRecord {
                checkin_date: Some(d(2023, 3, 30)),
                ..Default::default()
            },
        ]);
        let svc = service(store);

        // 365 days back from 2024-03-31 lands on 2023-04-01 (leap year).
        let out = svc.booking_rate_trend(None, None, Granularity::Day).unwrap();
        assert!(out.series.is_empty());

        let out = svc
            .booking_rate_trend(Some(d(2023, 3, 31)), None, Granularity::Day)
            .unwrap();
        assert_eq!(out.series.len(), 1);
    }

    #[test]
    fn test_prep_timeseries_uses_calendar_months() {
        let mut store = InMemoryStore::new();
        store.insert_transactions(vec![TransactionRecord {
            business_date: Some(d(2024, 2, 29)),
            revenue_amt: Some(10.0),
            ..Default::default()
        }]);
        let svc = service(store);

        let out = svc.prep_timeseries(Some("R9"), Some(1)).unwrap();
        assert_eq!(out.params.date_from, d(2024, 2, 29));
        assert_eq!(out.params.date_to, d(2024, 3, 31));
        assert_eq!(out.params.months, 1);
        assert_eq!(out.params.resort.as_deref(), Some("R9"));
        assert_eq!(out.rows.len(), 32);
        // Resort filter excludes the unassigned transaction.
        assert_eq!(out.rows[0].revenue, 0.0);

        let all = svc.prep_timeseries(None, Some(1)).unwrap();
        assert_eq!(all.rows[0].revenue, 10.0);
        assert_eq!(all.params.months, 1);
    }

    #[test]
    fn test_forecast_without_model_fails_at_call_time() {
        let svc = service(InMemoryStore::new()).with_forecast_engine(ForecastEngine::without_model());
        assert!(svc.summary(None, None, None).is_ok());
        let err = svc.forecast_revenue(None, None, None).unwrap_err();
        assert!(matches!(err, AnalyticsError::MissingCapability { .. }));
    }

    #[test]
    fn test_export_without_writer_fails_at_call_time() {
        let svc = service(InMemoryStore::new()).with_export_assembler(ExportAssembler::without_writer());
        let err = svc.export_year_excel(None, 2024).unwrap_err();
        assert!(matches!(
            err,
            AnalyticsError::MissingCapability {
                capability: "workbook-writer",
                ..
            }
        ));
    }

    #[cfg(feature = "xlsx")]
    #[test]
    fn test_export_resort_is_sanitized_in_filename() {
        let dir = std::env::temp_dir().join(format!("booking-analytics-resort-{}", std::process::id()));
        let config = AnalyticsConfig {
            export_dir: dir.clone(),
            ..AnalyticsConfig::default()
        };
        let svc = AnalyticsService::new(Arc::new(InMemoryStore::new()), config)
            .with_clock(Arc::new(FixedClock(d(2024, 3, 31))));

        let artifact = svc.export_year_excel(Some("R/1"), 2024).unwrap();
        assert_eq!(artifact.filename, "analytics_R_1_2024.xlsx");
        assert!(dir.join("analytics_R_1_2024.xlsx").is_file());

        let artifact = svc.export_year_excel(Some("x\"; y"), 2024).unwrap();
        assert_eq!(
            artifact.content_disposition(),
            "attachment; filename=\"analytics_x___y_2024.xlsx\""
        );
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_export_column_orders() {
        let orders = export_column_orders();
        assert_eq!(orders.len(), 3);
        assert_eq!(orders[LEAD_TIME_SHEET].len(), 10);
        assert_eq!(orders[REVENUE_DAILY_SHEET][0], "date");
    }
}
