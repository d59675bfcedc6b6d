use chrono::{NaiveDate, NaiveDateTime};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A posted financial transaction. Source of truth for revenue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TransactionRecord {
    pub pkid: i64,
    #[schemars(description = "Operational date the transaction is attributed to")]
    pub business_date: Option<NaiveDate>,
    pub resort: Option<String>,
    pub trx_code: Option<String>,
    pub revenue_amt: Option<f64>,
    pub net_amount: Option<f64>,
    pub gross_amount: Option<f64>,
    pub non_revenue_amount: Option<f64>,
}

/// Booking lifecycle status. Matching is exact and case-sensitive; anything
/// else, including a lowercase spelling of a known status, is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum BookingStatus {
    #[default]
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
    Other(String),
}

impl BookingStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "CONFIRMED" => BookingStatus::Confirmed,
            "COMPLETED" => BookingStatus::Completed,
            "CANCELLED" => BookingStatus::Cancelled,
            "NO_SHOW" => BookingStatus::NoShow,
            _ => BookingStatus::Other(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::NoShow => "NO_SHOW",
            BookingStatus::Other(raw) => raw,
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for BookingStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for BookingStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(BookingStatus::parse(&raw))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BookingRecord {
    #[schemars(description = "Arrival date; every booking trend is bucketed on it")]
    pub checkin_date: Option<NaiveDate>,
    pub created_ts: Option<NaiveDateTime>,
    #[serde(default)]
    #[schemars(with = "String")]
    pub status: BookingStatus,
    #[serde(default)]
    pub cancellation_flag: bool,
    #[serde(default)]
    pub no_show_flag: bool,
    pub customer_id: Option<String>,
}

/// Per-day capacity and occupancy for one location.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InventoryRecord {
    pub date: NaiveDate,
    pub location_id: Option<String>,
    pub capacity: i64,
    pub occupied: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SummaryResponse {
    pub rows: f64,
    pub revenue: f64,
    pub gross: f64,
    pub net: f64,
    pub non_revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RevenuePoint {
    pub date: String,
    pub revenue: f64,
    pub gross: f64,
    pub net: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SeriesResponse<T> {
    pub series: Vec<T>,
}

/// One dense day ready for charting or model input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ModelReadyRow {
    pub date: String,
    pub revenue: f64,
    pub bookings: i64,
    pub avg_rev_per_booking: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PrepParams {
    pub resort: Option<String>,
    pub months: u32,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PrepResponse {
    pub rows: Vec<ModelReadyRow>,
    pub params: PrepParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OccupancyRow {
    pub period: String,
    pub capacity: i64,
    pub occupied: i64,
    pub occupancy_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BookingCountRow {
    pub period: String,
    pub bookings: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BookingRateResponse {
    pub series: Vec<BookingCountRow>,
    #[schemars(description = "Average bookings per observed check-in day, Monday=0 .. Sunday=6")]
    pub weekday_avg: [f64; 7],
    #[schemars(description = "Average bookings per observed check-in day, January=0 .. December=11")]
    pub month_avg: [f64; 12],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RevenueTrendRow {
    pub period: String,
    pub revenue: f64,
    pub bookings: i64,
    pub avg_rev_per_booking: f64,
    pub avg_rev_per_customer: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CancellationRow {
    pub period: String,
    pub denominator: i64,
    pub cancelled: i64,
    pub no_show: i64,
    pub cancel_rate: f64,
    pub no_show_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CancellationResponse {
    pub series: Vec<CancellationRow>,
    pub basis: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LeadTimeCounts {
    pub early: i64,
    pub standard: i64,
    pub last_minute: i64,
    pub very_late: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LeadTimeShare {
    pub early: f64,
    pub standard: f64,
    pub last_minute: f64,
    pub very_late: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LeadTimeRow {
    pub period: String,
    pub counts: LeadTimeCounts,
    pub share: LeadTimeShare,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DatedValue {
    pub date: String,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ForecastResult {
    pub history: Vec<DatedValue>,
    pub forecast: Vec<DatedValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ForecastResult {
    pub fn empty() -> Self {
        Self::default()
    }
}
