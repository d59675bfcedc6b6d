use crate::error::Result;
use crate::schema::{ModelReadyRow, RevenuePoint, SummaryResponse};
use crate::store::{RecordQuery, RecordStore};
use crate::utils::{clamp_outliers_iqr, fill_missing_dates, round_to, DailySeries};
use chrono::NaiveDate;
use log::debug;

/// Dense daily revenue and booking series over a resolved range.
pub struct RevenueEngine<'a> {
    store: &'a dyn RecordStore,
}

impl<'a> RevenueEngine<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self { store }
    }

    /// Revenue per business date, gap-filled with 0.0. A date with no
    /// revenue amounts at all falls back to its net total.
    pub fn revenue_series(
        &self,
        resort: Option<&str>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<DailySeries<f64>> {
        let query = RecordQuery::between(start, end).with_dimension(resort);
        let grouped = self.store.transaction_totals_by_date(&query)?;

        let sparse: DailySeries<f64> = grouped
            .iter()
            .map(|(date, totals)| (*date, totals.revenue_or_net()))
            .collect();

        debug!(
            "Revenue series {}..{}: {} days with transactions",
            start,
            end,
            sparse.len()
        );

        Ok(fill_missing_dates(&sparse, start, end, 0.0))
    }

    /// Bookings per check-in date, gap-filled with 0.
    pub fn bookings_series(&self, start: NaiveDate, end: NaiveDate) -> Result<DailySeries<i64>> {
        let grouped = self
            .store
            .booking_counts_by_checkin(&RecordQuery::between(start, end))?;
        Ok(fill_missing_dates(&grouped, start, end, 0))
    }
}

/// Per-day revenue / bookings (0.0 on days without bookings), clamped
/// against outliers.
pub fn avg_revenue_per_booking(
    revenue: &DailySeries<f64>,
    bookings: &DailySeries<i64>,
) -> DailySeries<f64> {
    let raw: Vec<(NaiveDate, Option<f64>)> = revenue
        .iter()
        .map(|(date, rev)| {
            let count = bookings.get(date).copied().unwrap_or(0);
            let avg = if count > 0 { rev / count as f64 } else { 0.0 };
            (*date, Some(avg))
        })
        .collect();

    let values: Vec<Option<f64>> = raw.iter().map(|(_, v)| *v).collect();
    let clamped = clamp_outliers_iqr(&values);

    raw.iter()
        .zip(clamped)
        .map(|((date, _), value)| (*date, value.unwrap_or(0.0)))
        .collect()
}

/// One row per revenue date. The per-booking average floors its
/// denominator at one booking.
pub fn model_ready_rows(
    revenue: &DailySeries<f64>,
    bookings: &DailySeries<i64>,
) -> Vec<ModelReadyRow> {
    revenue
        .iter()
        .map(|(date, rev)| {
            let count = bookings.get(date).copied().unwrap_or(0);
            ModelReadyRow {
                date: date.format("%Y-%m-%d").to_string(),
                revenue: round_to(*rev, 2),
                bookings: count,
                avg_rev_per_booking: round_to(rev / count.max(1) as f64, 2),
            }
        })
        .collect()
}

/// Whole-range totals. Bounds apply only when given.
pub fn summary(
    store: &dyn RecordStore,
    resort: Option<&str>,
    date_from: Option<NaiveDate>,
    date_to: Option<NaiveDate>,
) -> Result<SummaryResponse> {
    let query = RecordQuery {
        date_from,
        date_to,
        dimension: None,
    }
    .with_dimension(resort);
    let totals = store.transaction_totals(&query)?;

    Ok(SummaryResponse {
        rows: totals.rows as f64,
        revenue: totals.revenue.unwrap_or(0.0),
        gross: totals.gross.unwrap_or(0.0),
        net: totals.net.unwrap_or(0.0),
        non_revenue: totals.non_revenue.unwrap_or(0.0),
    })
}

/// Sparse per-business-date sums, ascending. Dates without rows are absent.
pub fn revenue_timeseries(
    store: &dyn RecordStore,
    resort: Option<&str>,
    date_from: Option<NaiveDate>,
    date_to: Option<NaiveDate>,
) -> Result<Vec<RevenuePoint>> {
    let query = RecordQuery {
        date_from,
        date_to,
        dimension: None,
    }
    .with_dimension(resort);

    Ok(store
        .transaction_totals_by_date(&query)?
        .into_iter()
        .map(|(date, totals)| RevenuePoint {
            date: date.format("%Y-%m-%d").to_string(),
            revenue: totals.revenue.unwrap_or(0.0),
            gross: totals.gross.unwrap_or(0.0),
            net: totals.net.unwrap_or(0.0),
        })
        .collect())
}
