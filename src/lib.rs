//! # Booking Analytics
//!
//! A library for turning sparse operational records (financial transactions,
//! bookings, inventory snapshots) into regularized time series, trend tables
//! and short-horizon revenue forecasts.
//!
//! ## Core Concepts
//!
//! - **Range**: every query works on a closed `[start, end]` date range; open
//!   bounds are filled from an injected clock and never cause an error
//! - **Period Key**: rows are bucketed by `YYYY-MM-DD`, ISO `YYYY-Www` or `YYYY-MM`
//! - **Dense Series**: daily series are gap-filled so every calendar day has a value
//! - **Basis**: the booking population a cancellation rate is measured against
//! - **Capabilities**: the forecast model and the workbook writer are injected;
//!   calling an engine without one fails with [`AnalyticsError::MissingCapability`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use booking_analytics::*;
//! use chrono::NaiveDate;
//! use std::sync::Arc;
//!
//! let mut store = InMemoryStore::new();
//! load_transactions_file(&mut store, "transactions.csv", LoadOptions::default())?;
//! load_bookings_file(&mut store, "bookings.csv", LoadOptions::default())?;
//!
//! let service = AnalyticsService::new(Arc::new(store), AnalyticsConfig::default());
//!
//! let trend = service.cancellations_trend(
//!     NaiveDate::from_ymd_opt(2024, 1, 1),
//!     NaiveDate::from_ymd_opt(2024, 3, 31),
//!     Granularity::from_param(Some("week")),
//!     Basis::Confirmed,
//! )?;
//!
//! let forecast = service.forecast_revenue(Some("R1"), Some(12), Some(28))?;
//! let workbook = service.export_year_excel(None, 2024)?;
//! ```

pub mod cancellations;
pub mod config;
pub mod error;
pub mod export;
pub mod forecast;
pub mod ingestion;
pub mod lead_time;
pub mod occupancy;
pub mod revenue;
pub mod schema;
pub mod seasonality;
pub mod service;
pub mod store;
pub mod trend;
pub mod utils;

#[cfg(feature = "runtime")]
pub mod runtime;

pub use cancellations::{cancellation_series, is_cancelled, is_no_show, Basis, CancellationEngine};
pub use config::AnalyticsConfig;
pub use error::{AnalyticsError, Result};
#[cfg(feature = "xlsx")]
pub use export::XlsxWorkbookWriter;
pub use export::{
    project_sheet, sanitize_file_stem, truncate_sheet_name, ExportArtifact, ExportAssembler, ProjectedSheet, Row,
    WorkbookWriter,
};
#[cfg(feature = "forecasting")]
pub use forecast::ArimaModel;
pub use forecast::{ForecastEngine, ForecastModel};
pub use ingestion::{
    load_bookings, load_bookings_file, load_inventory, load_inventory_file, load_transactions,
    load_transactions_file, LoadOptions, LoadReport,
};
pub use lead_time::{lead_time_distribution, LeadTimeBucket, LeadTimeEngine};
pub use occupancy::{occupancy_trend, OccupancyEngine};
pub use revenue::{avg_revenue_per_booking, model_ready_rows, RevenueEngine};
pub use schema::*;
pub use seasonality::{month_profile, weekday_profile, BookingRateEngine};
pub use service::AnalyticsService;
pub use store::{InMemoryStore, RecordQuery, RecordStore, TransactionTotals};
pub use trend::{revenue_trend, RevenueTrendEngine};
pub use utils::*;

#[cfg(feature = "runtime")]
pub use runtime::BoundedForecaster;
