//! Booking-rate trend and weekday / month seasonality profiles.
//!
//! The seasonality averages divide by the number of *observed* check-in
//! days falling on each weekday (or calendar month), not by how many such
//! days the range contains. Days without bookings never enter the average.

use crate::error::Result;
use crate::schema::{BookingCountRow, BookingRateResponse};
use crate::store::{RecordQuery, RecordStore};
use crate::utils::{period_key, round_to, safe_ratio, DailySeries, Granularity};
use chrono::{Datelike, NaiveDate};
use log::debug;
use std::collections::BTreeMap;

pub struct BookingRateEngine<'a> {
    store: &'a dyn RecordStore,
}

impl<'a> BookingRateEngine<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self { store }
    }

    pub fn trend(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        granularity: Granularity,
    ) -> Result<BookingRateResponse> {
        let daily = self
            .store
            .booking_counts_by_checkin(&RecordQuery::between(start, end))?;

        debug!(
            "Booking rate {}..{}: {} observed check-in days",
            start,
            end,
            daily.len()
        );

        Ok(BookingRateResponse {
            series: booking_counts_by_period(&daily, granularity),
            weekday_avg: weekday_profile(&daily),
            month_avg: month_profile(&daily),
        })
    }
}

pub fn booking_counts_by_period(
    daily: &DailySeries<i64>,
    granularity: Granularity,
) -> Vec<BookingCountRow> {
    let mut buckets: BTreeMap<String, i64> = BTreeMap::new();
    for (date, count) in daily {
        *buckets.entry(period_key(*date, granularity)).or_default() += count;
    }

    buckets
        .into_iter()
        .map(|(period, bookings)| BookingCountRow { period, bookings })
        .collect()
}

/// Average bookings per observed check-in day, Monday = 0.
pub fn weekday_profile(daily: &DailySeries<i64>) -> [f64; 7] {
    profile(daily, |date| date.weekday().num_days_from_monday() as usize)
}

/// Average bookings per observed check-in day, January = 0.
pub fn month_profile(daily: &DailySeries<i64>) -> [f64; 12] {
    profile(daily, |date| date.month0() as usize)
}

fn profile<const N: usize>(daily: &DailySeries<i64>, slot: impl Fn(NaiveDate) -> usize) -> [f64; N] {
    let mut sums = [0i64; N];
    let mut observed = [0i64; N];

    for (date, count) in daily {
        let idx = slot(*date);
        sums[idx] += count;
        observed[idx] += 1;
    }

    let mut averages = [0.0; N];
    for idx in 0..N {
        averages[idx] = round_to(safe_ratio(sums[idx] as f64, observed[idx] as f64), 4);
    }
    averages
}
