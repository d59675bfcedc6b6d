use booking_analytics::*;
use chrono::NaiveDate;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

const TRANSACTIONS_CSV: &str = "pkid,business_date,resort,trx_code,revenue_amt,net_amount,gross_amount,non_revenue_amount\n\
1,2024-01-01,R1,RM,100.00,90.00,110.00,\n\
2,2024-01-03,R1,RM,50.00,45.00,55.00,\n\
3,2024-01-03,R2,FB,,20.00,22.00,5.00\n\
4,2024-02-15 00:00:00,R1,RM,200.00,180.00,220.00,NULL\n";

const BOOKINGS_CSV: &str = "checkin_date,created_ts,status,cancellation_flag,no_show_flag,customer_id\n\
2024-01-01,2024-01-01 09:00:00,CONFIRMED,0,0,c1\n\
2024-01-01,2023-12-01 09:00:00,CANCELLED,1,0,c2\n\
2024-01-03,2023-12-20T10:00:00,COMPLETED,0,0,c1\n\
2024-01-03,,NO_SHOW,0,1,c3\n\
2024-02-15,2024-02-20 08:00:00,CANCELLED,0,1,c4\n";

const INVENTORY_CSV: &str = "date,location_id,capacity,occupied\n\
2024-01-01,L1,100,80\n\
2024-01-02,L1,100,60\n\
2024-01-01,L2,50,50\n";

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn loaded_store() -> InMemoryStore {
    let mut store = InMemoryStore::new();
    load_transactions(&mut store, TRANSACTIONS_CSV.as_bytes(), LoadOptions::default()).unwrap();
    load_bookings(&mut store, BOOKINGS_CSV.as_bytes(), LoadOptions::default()).unwrap();
    load_inventory(&mut store, INVENTORY_CSV.as_bytes(), LoadOptions::default()).unwrap();
    store
}

fn temp_export_dir(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("booking-analytics-{}-{}", tag, std::process::id()))
}

fn service_with(config: AnalyticsConfig) -> AnalyticsService {
    AnalyticsService::new(Arc::new(loaded_store()), config)
        .with_clock(Arc::new(FixedClock(d(2024, 3, 31))))
}

fn service() -> AnalyticsService {
    service_with(AnalyticsConfig::default())
}

#[test]
fn test_summary_and_revenue_timeseries() {
    let svc = service();

    let all = svc.summary(None, None, None).unwrap();
    assert_eq!(all.rows, 4.0);
    assert!((all.revenue - 350.0).abs() < 1e-9);
    assert!((all.gross - 407.0).abs() < 1e-9);
    assert!((all.net - 335.0).abs() < 1e-9);
    assert!((all.non_revenue - 5.0).abs() < 1e-9);

    let r1 = svc.summary(Some("R1"), None, Some(d(2024, 1, 31))).unwrap();
    assert_eq!(r1.rows, 2.0);
    assert!((r1.revenue - 150.0).abs() < 1e-9);
    assert_eq!(r1.non_revenue, 0.0);

    let series = svc
        .revenue_timeseries(None, Some(d(2024, 1, 1)), Some(d(2024, 1, 31)))
        .unwrap()
        .series;
    let dates: Vec<&str> = series.iter().map(|p| p.date.as_str()).collect();
    assert_eq!(dates, vec!["2024-01-01", "2024-01-03"]);
    assert!((series[1].revenue - 50.0).abs() < 1e-9);
    assert!((series[1].net - 65.0).abs() < 1e-9);
}

#[test]
fn test_revenue_series_gap_fill_example() {
    let store = loaded_store();
    let engine = RevenueEngine::new(&store);
    let series = engine
        .revenue_series(Some("R1"), d(2024, 1, 1), d(2024, 1, 3))
        .unwrap();

    let values: Vec<f64> = series.values().copied().collect();
    assert_eq!(values, vec![100.0, 0.0, 50.0]);
    assert_eq!(series.len(), day_count(d(2024, 1, 1), d(2024, 1, 3)));

    // Filling an already dense series changes nothing.
    let refilled = fill_missing_dates(&series, d(2024, 1, 1), d(2024, 1, 3), 0.0);
    assert_eq!(refilled, series);
}

#[test]
fn test_cancellations_by_basis() {
    let svc = service();

    let all = svc
        .cancellations_trend(Some(d(2024, 1, 1)), Some(d(2024, 1, 3)), Granularity::Day, Basis::All)
        .unwrap();
    assert_eq!(all.basis, "all");
    assert_eq!(all.series.len(), 3);

    let jan1 = &all.series[0];
    assert_eq!(jan1.period, "2024-01-01");
    assert_eq!(jan1.denominator, 2);
    assert_eq!(jan1.cancelled, 1);
    assert_eq!(jan1.cancel_rate, 0.5);

    assert_eq!(all.series[1].denominator, 0);
    assert_eq!(all.series[1].cancel_rate, 0.0);
    assert_eq!(all.series[2].no_show_rate, 0.5);

    let confirmed = svc
        .cancellations_trend(
            Some(d(2024, 1, 3)),
            Some(d(2024, 1, 1)),
            Granularity::from_param(Some("DAY")),
            Basis::from_param(Some("confirmed")),
        )
        .unwrap();
    assert_eq!(confirmed.basis, "confirmed");
    // The reversed range is swapped, not rejected.
    assert_eq!(confirmed.series.len(), 3);
    assert_eq!(confirmed.series[0].denominator, 1);
    assert_eq!(confirmed.series[0].cancel_rate, 1.0);
    assert_eq!(confirmed.series[2].denominator, 1);
    assert_eq!(confirmed.series[2].no_show_rate, 1.0);
}

#[test]
fn test_cancelled_no_show_counts_twice() {
    let svc = service();
    let out = svc
        .cancellations_trend(Some(d(2024, 2, 1)), Some(d(2024, 2, 29)), Granularity::Month, Basis::All)
        .unwrap();
    assert_eq!(out.series.len(), 1);
    assert_eq!(out.series[0].period, "2024-02");
    assert_eq!(out.series[0].cancelled, 1);
    assert_eq!(out.series[0].no_show, 1);
}

#[test]
fn test_lead_time_distribution() {
    let svc = service();

    let daily = svc
        .lead_time_trend(Some(d(2024, 1, 1)), Some(d(2024, 1, 3)), Granularity::Day)
        .unwrap()
        .series;
    assert_eq!(daily.len(), 3);

    let jan1 = &daily[0];
    assert_eq!(jan1.counts.last_minute, 1);
    assert_eq!(jan1.counts.early, 1);
    assert_eq!(jan1.counts.total, 2);
    assert_eq!(jan1.share.last_minute, 0.5);

    // The NO_SHOW booking has no creation timestamp and is left out.
    let jan3 = &daily[2];
    assert_eq!(jan3.counts.standard, 1);
    assert_eq!(jan3.counts.total, 1);
    assert_eq!(jan3.share.standard, 1.0);

    let monthly = svc
        .lead_time_trend(Some(d(2024, 2, 1)), Some(d(2024, 2, 29)), Granularity::Month)
        .unwrap()
        .series;
    assert_eq!(monthly[0].counts.very_late, 1);
}

#[test]
fn test_booking_rate_and_seasonality() {
    let svc = service();
    let out = svc
        .booking_rate_trend(Some(d(2024, 1, 1)), Some(d(2024, 3, 31)), Granularity::Month)
        .unwrap();

    let counts: Vec<(String, i64)> = out.series.iter().map(|r| (r.period.clone(), r.bookings)).collect();
    assert_eq!(counts, vec![("2024-01".to_string(), 4), ("2024-02".to_string(), 1)]);

    // 2024-01-01 is a Monday, 2024-01-03 a Wednesday, 2024-02-15 a Thursday.
    assert_eq!(out.weekday_avg, [2.0, 0.0, 2.0, 1.0, 0.0, 0.0, 0.0]);
    assert_eq!(out.month_avg[0], 2.0);
    assert_eq!(out.month_avg[1], 1.0);
    assert_eq!(out.month_avg[2], 0.0);
}

#[test]
fn test_revenue_trend_by_month() {
    let svc = service();
    let rows = svc
        .revenue_trend(None, Some(d(2024, 1, 1)), Some(d(2024, 3, 31)), Granularity::Month)
        .unwrap()
        .series;

    assert_eq!(rows.len(), 2);
    let jan = &rows[0];
    assert_eq!(jan.period, "2024-01");
    assert_eq!(jan.revenue, 150.0);
    assert_eq!(jan.bookings, 4);
    assert_eq!(jan.avg_rev_per_booking, 37.5);
    assert_eq!(jan.avg_rev_per_customer, Some(50.0));

    let feb = &rows[1];
    assert_eq!(feb.revenue, 200.0);
    assert_eq!(feb.avg_rev_per_customer, Some(200.0));
}

#[test]
fn test_occupancy_by_week() {
    let svc = service();
    let all = svc
        .occupancy_trend(None, Some(d(2024, 1, 1)), Some(d(2024, 1, 7)), Granularity::Week)
        .unwrap()
        .series;
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].period, "2024-W01");
    assert_eq!(all[0].capacity, 250);
    assert_eq!(all[0].occupied, 190);
    assert_eq!(all[0].occupancy_rate, 0.76);

    let l1 = svc
        .occupancy_trend(Some("L1"), Some(d(2024, 1, 1)), Some(d(2024, 1, 7)), Granularity::Week)
        .unwrap()
        .series;
    assert_eq!(l1[0].occupancy_rate, 0.7);
}

#[test]
fn test_prep_timeseries_rows() {
    let svc = service();
    let out = svc.prep_timeseries(None, Some(3)).unwrap();

    assert_eq!(out.params.date_from, d(2023, 12, 31));
    assert_eq!(out.params.date_to, d(2024, 3, 31));
    assert_eq!(out.rows.len(), 92);

    let jan1 = out.rows.iter().find(|r| r.date == "2024-01-01").unwrap();
    assert_eq!(jan1.revenue, 100.0);
    assert_eq!(jan1.bookings, 2);
    assert_eq!(jan1.avg_rev_per_booking, 50.0);

    let jan2 = out.rows.iter().find(|r| r.date == "2024-01-02").unwrap();
    assert_eq!(jan2.revenue, 0.0);
    assert_eq!(jan2.avg_rev_per_booking, 0.0);
}

#[cfg(feature = "forecasting")]
#[test]
fn test_forecast_revenue_end_to_end() -> anyhow::Result<()> {
    let svc = service();
    let out = svc.forecast_revenue(Some("R1"), Some(3), Some(7))?;

    assert_eq!(out.history.len(), 92);
    assert_eq!(out.history[0].date, "2023-12-31");
    assert_eq!(out.forecast.len(), 7);
    assert_eq!(out.forecast[0].date, "2024-04-01");
    assert_eq!(out.forecast[6].date, "2024-04-07");
    assert!(out.forecast.iter().all(|p| p.value.is_finite()));
    assert_eq!(out.model.as_deref(), Some("ARIMA(1,1,1)"));

    let json = serde_json::to_value(&out)?;
    assert!(json["history"].is_array());
    assert!(json["forecast"].is_array());
    Ok(())
}

#[test]
fn test_forecast_default_horizon_comes_from_config() -> anyhow::Result<()> {
    struct Naive;
    impl ForecastModel for Naive {
        fn name(&self) -> &str {
            "naive"
        }
        fn forecast(&self, values: &[f64], horizon: usize) -> Result<Vec<f64>> {
            Ok(vec![values.last().copied().unwrap_or(0.0); horizon])
        }
    }

    let svc = service().with_forecast_engine(ForecastEngine::with_model(Box::new(Naive)));
    let out = svc.forecast_revenue(None, None, None)?;
    assert_eq!(out.forecast.len(), 56);
    assert_eq!(out.history.first().map(|p| p.date.as_str()), Some("2023-03-31"));
    Ok(())
}

#[cfg(feature = "forecasting")]
#[test]
fn test_forecast_empty_series_and_missing_model() {
    let engine = ForecastEngine::with_model(Box::new(ArimaModel::new()));
    let out = engine.forecast(&DailySeries::new(), 14).unwrap();
    assert!(out.history.is_empty());
    assert!(out.forecast.is_empty());

    let svc = service().with_forecast_engine(ForecastEngine::without_model());
    match svc.forecast_revenue(None, Some(1), Some(7)) {
        Err(AnalyticsError::MissingCapability { capability, .. }) => {
            assert_eq!(capability, "forecast-model")
        }
        other => panic!("expected missing capability, got {:?}", other.map(|r| r.model)),
    }
}

#[test]
fn test_export_projection_example() {
    let rows = vec![json!({
        "date": "2024-01-01",
        "revenue": 10,
        "bookings": 2,
        "avg_rev_per_booking": 5,
        "extra": "x"
    })
    .as_object()
    .cloned()
    .unwrap()];
    let order: Vec<String> = ["date", "revenue", "bookings", "avg_rev_per_booking"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let sheet = project_sheet("RevenueDaily", &rows, Some(&order));
    assert_eq!(sheet.columns, order);
    assert_eq!(sheet.rows[0].len(), 4);
    assert!(!sheet.columns.iter().any(|c| c == "extra"));
}

#[cfg(feature = "xlsx")]
#[test]
fn test_export_year_excel_writes_workbook() -> anyhow::Result<()> {
    let dir = temp_export_dir("year");
    let svc = service_with(AnalyticsConfig {
        export_dir: dir.clone(),
        ..Default::default()
    });

    let artifact = svc.export_year_excel(Some("R1"), 2024)?;
    assert_eq!(artifact.filename, "analytics_R1_2024.xlsx");
    assert_eq!(
        artifact.content_type,
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
    );
    assert_eq!(
        artifact.content_disposition(),
        "attachment; filename=\"analytics_R1_2024.xlsx\""
    );
    assert_eq!(&artifact.bytes[..2], b"PK");

    let on_disk = std::fs::read(dir.join(&artifact.filename))?;
    assert_eq!(on_disk, artifact.bytes);

    let everyone = svc.export_year_excel(None, 2024)?;
    assert_eq!(everyone.filename, "analytics_all_2024.xlsx");

    std::fs::remove_dir_all(&dir).ok();
    Ok(())
}

#[test]
fn test_export_without_writer_is_fatal_configuration_error() {
    let dir = temp_export_dir("nowriter");
    let svc = service_with(AnalyticsConfig {
        export_dir: dir.clone(),
        ..Default::default()
    })
    .with_export_assembler(ExportAssembler::without_writer());

    let err = svc.export_year_excel(None, 2024).unwrap_err();
    assert!(matches!(err, AnalyticsError::MissingCapability { .. }));
    assert!(!err.is_retryable());
    assert!(!dir.join("analytics_all_2024.xlsx").exists());
}

#[test]
fn test_reload_with_truncate() {
    let mut store = loaded_store();
    assert_eq!(store.transaction_count(), 4);

    let replacement = "pkid,business_date,resort,revenue_amt\n9,2024-05-01,R3,12.5\n";
    let report = load_transactions(&mut store, replacement.as_bytes(), LoadOptions { truncate: true }).unwrap();
    assert_eq!(report.loaded, 1);
    assert_eq!(store.transaction_count(), 1);

    let totals = booking_analytics::revenue::summary(&store, Some("R3"), None, None).unwrap();
    assert_eq!(totals.rows, 1.0);
    assert_eq!(totals.revenue, 12.5);
}

#[test]
fn test_schema_generation() {
    let schema_json = AnalyticsConfig::schema_as_json().unwrap();
    assert!(schema_json.contains("default_horizon_days"));

    let config = AnalyticsConfig::from_json_str(r#"{"default_range_days": 30}"#).unwrap();
    let svc = service_with(config);
    // 30 days back from 2024-03-31.
    let out = svc
        .cancellations_trend(None, None, Granularity::Day, Basis::All)
        .unwrap();
    assert_eq!(out.series.len(), 31);
    assert_eq!(out.series[0].period, "2024-03-01");
}
