use crate::error::Result;
use crate::schema::{BookingRecord, BookingStatus, CancellationResponse, CancellationRow};
use crate::store::{RecordQuery, RecordStore};
use crate::utils::{days_in_range, period_key, round_to, safe_ratio, Granularity};
use chrono::NaiveDate;
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Population the cancellation and no-show rates are measured against.
/// Rows are always bucketed by check-in date whatever the basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Basis {
    /// Every booking in the period.
    #[default]
    All,
    /// Only bookings whose status is `CONFIRMED` or `COMPLETED`.
    Confirmed,
    /// Every booking in the period, same count as `All`.
    Created,
}

impl Basis {
    pub fn from_param(param: Option<&str>) -> Self {
        match param.map(|p| p.trim().to_ascii_lowercase()).as_deref() {
            Some("confirmed") => Basis::Confirmed,
            Some("created") => Basis::Created,
            _ => Basis::All,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Basis::All => "all",
            Basis::Confirmed => "confirmed",
            Basis::Created => "created",
        }
    }

    pub fn counts_toward_denominator(&self, booking: &BookingRecord) -> bool {
        match self {
            Basis::All | Basis::Created => true,
            Basis::Confirmed => matches!(
                booking.status,
                BookingStatus::Confirmed | BookingStatus::Completed
            ),
        }
    }
}

pub fn is_cancelled(booking: &BookingRecord) -> bool {
    booking.status == BookingStatus::Cancelled || booking.cancellation_flag
}

pub fn is_no_show(booking: &BookingRecord) -> bool {
    booking.status == BookingStatus::NoShow || booking.no_show_flag
}

#[derive(Debug, Default, Clone, Copy)]
struct CancellationCounts {
    denominator: i64,
    cancelled: i64,
    no_show: i64,
}

pub struct CancellationEngine<'a> {
    store: &'a dyn RecordStore,
}

impl<'a> CancellationEngine<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self { store }
    }

    pub fn trend(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        granularity: Granularity,
        basis: Basis,
    ) -> Result<CancellationResponse> {
        let bookings = self.store.bookings(&RecordQuery::between(start, end))?;
        Ok(CancellationResponse {
            series: cancellation_series(&bookings, start, end, granularity, basis),
            basis: basis.as_str().to_string(),
        })
    }
}

/// One row per period covering `[start, end]`, including periods without
/// bookings. A booking can count as both cancelled and no-show.
pub fn cancellation_series(
    bookings: &[BookingRecord],
    start: NaiveDate,
    end: NaiveDate,
    granularity: Granularity,
    basis: Basis,
) -> Vec<CancellationRow> {
    let mut buckets: BTreeMap<String, CancellationCounts> = days_in_range(start, end)
        .map(|day| (period_key(day, granularity), CancellationCounts::default()))
        .collect();

    for booking in bookings {
        let Some(checkin) = booking.checkin_date else {
            continue;
        };
        let counts = buckets.entry(period_key(checkin, granularity)).or_default();
        if is_cancelled(booking) {
            counts.cancelled += 1;
        }
        if is_no_show(booking) {
            counts.no_show += 1;
        }
        if basis.counts_toward_denominator(booking) {
            counts.denominator += 1;
        }
    }

    debug!(
        "Cancellations {}..{} ({} basis): {} bookings over {} periods",
        start,
        end,
        basis.as_str(),
        bookings.len(),
        buckets.len()
    );

    buckets
        .into_iter()
        .map(|(period, c)| CancellationRow {
            period,
            denominator: c.denominator,
            cancelled: c.cancelled,
            no_show: c.no_show,
            cancel_rate: round_to(safe_ratio(c.cancelled as f64, c.denominator as f64), 4),
            no_show_rate: round_to(safe_ratio(c.no_show as f64, c.denominator as f64), 4),
        })
        .collect()
}
