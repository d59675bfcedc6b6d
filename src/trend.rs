use crate::error::Result;
use crate::schema::{BookingRecord, RevenueTrendRow};
use crate::store::{RecordQuery, RecordStore, TransactionTotals};
use crate::utils::{period_key, round_to, safe_ratio, DailySeries, Granularity};
use chrono::NaiveDate;
use log::debug;
use std::collections::{BTreeMap, BTreeSet, HashSet};

pub struct RevenueTrendEngine<'a> {
    store: &'a dyn RecordStore,
}

impl<'a> RevenueTrendEngine<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self { store }
    }

    pub fn trend(
        &self,
        resort: Option<&str>,
        start: NaiveDate,
        end: NaiveDate,
        granularity: Granularity,
    ) -> Result<Vec<RevenueTrendRow>> {
        let range = RecordQuery::between(start, end);
        let revenue = self
            .store
            .transaction_totals_by_date(&range.clone().with_dimension(resort))?;
        let bookings = self.store.bookings(&range)?;

        Ok(revenue_trend(
            &revenue,
            &bookings,
            granularity,
            self.store.tracks_customers(),
        ))
    }
}

/// Revenue and bookings bucketed independently, emitted over the union of
/// their periods. A period with activity in neither source is absent.
///
/// `avg_rev_per_customer` is `None` when the store has no customer
/// identifiers.
pub fn revenue_trend(
    revenue_by_date: &DailySeries<TransactionTotals>,
    bookings: &[BookingRecord],
    granularity: Granularity,
    tracks_customers: bool,
) -> Vec<RevenueTrendRow> {
    let mut revenue: BTreeMap<String, f64> = BTreeMap::new();
    for (date, totals) in revenue_by_date {
        *revenue.entry(period_key(*date, granularity)).or_default() += totals.revenue_or_net();
    }

    let mut booking_counts: BTreeMap<String, i64> = BTreeMap::new();
    let mut customers: BTreeMap<String, HashSet<&str>> = BTreeMap::new();
    for booking in bookings {
        let Some(checkin) = booking.checkin_date else {
            continue;
        };
        let key = period_key(checkin, granularity);
        if let Some(customer) = booking.customer_id.as_deref() {
            customers.entry(key.clone()).or_default().insert(customer);
        }
        *booking_counts.entry(key).or_default() += 1;
    }

    let periods: BTreeSet<&String> = revenue.keys().chain(booking_counts.keys()).collect();

    debug!(
        "Revenue trend: {} revenue periods, {} booking periods, {} emitted",
        revenue.len(),
        booking_counts.len(),
        periods.len()
    );

    periods
        .into_iter()
        .map(|period| {
            let rev = revenue.get(period).copied().unwrap_or(0.0);
            let count = booking_counts.get(period).copied().unwrap_or(0);
            let avg_rev_per_customer = tracks_customers.then(|| {
                let distinct = customers.get(period).map_or(0, HashSet::len);
                round_to(safe_ratio(rev, distinct as f64), 2)
            });

            RevenueTrendRow {
                period: period.clone(),
                revenue: round_to(rev, 2),
                bookings: count,
                avg_rev_per_booking: round_to(safe_ratio(rev, count as f64), 2),
                avg_rev_per_customer,
            }
        })
        .collect()
}
