//! Read-only access to the record store.
//!
//! Engines only see [`RecordStore`]: filtered snapshot reads plus grouped
//! aggregates. The grouped reads have default implementations over the
//! snapshot reads; a SQL-backed store can override them with a native
//! `GROUP BY`.

use crate::error::Result;
use crate::schema::{BookingRecord, InventoryRecord, TransactionRecord};
use crate::utils::DailySeries;
use chrono::NaiveDate;

/// Filter shared by every entity read. `dimension` is the resort for
/// transactions and the location for inventory; bookings ignore it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordQuery {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub dimension: Option<String>,
}

impl RecordQuery {
    pub fn between(date_from: NaiveDate, date_to: NaiveDate) -> Self {
        Self {
            date_from: Some(date_from),
            date_to: Some(date_to),
            dimension: None,
        }
    }

    pub fn with_dimension(mut self, dimension: Option<&str>) -> Self {
        self.dimension = dimension.filter(|d| !d.is_empty()).map(str::to_string);
        self
    }

    /// Open bounds match anything; a set bound never matches a missing date.
    pub fn covers(&self, date: Option<NaiveDate>) -> bool {
        match date {
            Some(date) => {
                self.date_from.map_or(true, |from| date >= from)
                    && self.date_to.map_or(true, |to| date <= to)
            }
            None => self.date_from.is_none() && self.date_to.is_none(),
        }
    }

    pub fn matches_dimension(&self, value: Option<&str>) -> bool {
        match &self.dimension {
            Some(wanted) => value == Some(wanted.as_str()),
            None => true,
        }
    }
}

/// SQL-style sums over a group of transactions: a field total stays `None`
/// until at least one non-null value was added.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TransactionTotals {
    pub rows: u64,
    pub revenue: Option<f64>,
    pub net: Option<f64>,
    pub gross: Option<f64>,
    pub non_revenue: Option<f64>,
}

impl TransactionTotals {
    pub fn add(&mut self, record: &TransactionRecord) {
        self.rows += 1;
        sum_into(&mut self.revenue, record.revenue_amt);
        sum_into(&mut self.net, record.net_amount);
        sum_into(&mut self.gross, record.gross_amount);
        sum_into(&mut self.non_revenue, record.non_revenue_amount);
    }

    /// Revenue for the group, falling back to the net total when no row
    /// carried a revenue amount.
    pub fn revenue_or_net(&self) -> f64 {
        self.revenue.or(self.net).unwrap_or(0.0)
    }
}

fn sum_into(total: &mut Option<f64>, value: Option<f64>) {
    if let Some(v) = value {
        *total = Some(total.unwrap_or(0.0) + v);
    }
}

pub trait RecordStore: Send + Sync {
    fn transactions(&self, query: &RecordQuery) -> Result<Vec<TransactionRecord>>;

    fn bookings(&self, query: &RecordQuery) -> Result<Vec<BookingRecord>>;

    fn inventory(&self, query: &RecordQuery) -> Result<Vec<InventoryRecord>>;

    /// Whether booking records carry a customer identifier at all.
    fn tracks_customers(&self) -> bool {
        true
    }

    fn transaction_totals(&self, query: &RecordQuery) -> Result<TransactionTotals> {
        let mut totals = TransactionTotals::default();
        for record in self.transactions(query)? {
            totals.add(&record);
        }
        Ok(totals)
    }

    /// Totals grouped by business date. Rows without a business date are
    /// not grouped.
    fn transaction_totals_by_date(
        &self,
        query: &RecordQuery,
    ) -> Result<DailySeries<TransactionTotals>> {
        let mut grouped: DailySeries<TransactionTotals> = DailySeries::new();
        for record in self.transactions(query)? {
            if let Some(date) = record.business_date {
                grouped.entry(date).or_default().add(&record);
            }
        }
        Ok(grouped)
    }

    fn booking_counts_by_checkin(&self, query: &RecordQuery) -> Result<DailySeries<i64>> {
        let mut grouped: DailySeries<i64> = DailySeries::new();
        for record in self.bookings(query)? {
            if let Some(date) = record.checkin_date {
                *grouped.entry(date).or_default() += 1;
            }
        }
        Ok(grouped)
    }
}

/// Vec-backed store used by the bulk loaders and in tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    transactions: Vec<TransactionRecord>,
    bookings: Vec<BookingRecord>,
    inventory: Vec<InventoryRecord>,
    tracks_customers: bool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tracks_customers: true,
            ..Default::default()
        }
    }

    /// Store whose booking schema has no customer identifier column.
    pub fn without_customer_ids() -> Self {
        Self::default()
    }

    pub fn insert_transactions(&mut self, records: impl IntoIterator<Item = TransactionRecord>) {
        self.transactions.extend(records);
    }

    pub fn insert_bookings(&mut self, records: impl IntoIterator<Item = BookingRecord>) {
        self.bookings.extend(records);
    }

    pub fn insert_inventory(&mut self, records: impl IntoIterator<Item = InventoryRecord>) {
        self.inventory.extend(records);
    }

    pub fn truncate_transactions(&mut self) {
        self.transactions.clear();
    }

    pub fn truncate_bookings(&mut self) {
        self.bookings.clear();
    }

    pub fn truncate_inventory(&mut self) {
        self.inventory.clear();
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    pub fn booking_count(&self) -> usize {
        self.bookings.len()
    }

    pub fn inventory_count(&self) -> usize {
        self.inventory.len()
    }
}

impl RecordStore for InMemoryStore {
    fn transactions(&self, query: &RecordQuery) -> Result<Vec<TransactionRecord>> {
        Ok(self
            .transactions
            .iter()
            .filter(|t| query.covers(t.business_date))
            .filter(|t| query.matches_dimension(t.resort.as_deref()))
            .cloned()
            .collect())
    }

    fn bookings(&self, query: &RecordQuery) -> Result<Vec<BookingRecord>> {
        Ok(self
            .bookings
            .iter()
            .filter(|b| query.covers(b.checkin_date))
            .cloned()
            .collect())
    }

    fn inventory(&self, query: &RecordQuery) -> Result<Vec<InventoryRecord>> {
        Ok(self
            .inventory
            .iter()
            .filter(|i| query.covers(Some(i.date)))
            .filter(|i| query.matches_dimension(i.location_id.as_deref()))
            .cloned()
            .collect())
    }

    fn tracks_customers(&self) -> bool {
        self.tracks_customers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn trx(date: Option<NaiveDate>, resort: &str, revenue: Option<f64>, net: Option<f64>) -> TransactionRecord {
        TransactionRecord {
            business_date: date,
            resort: Some(resort.to_string()),
            revenue_amt: revenue,
            net_amount: net,
            ..Default::default()
        }
    }

    #[test]
    fn test_query_covers_bounds() {
        let query = RecordQuery::between(d(2024, 1, 1), d(2024, 1, 31));
        assert!(query.covers(Some(d(2024, 1, 1))));
        assert!(query.covers(Some(d(2024, 1, 31))));
        assert!(!query.covers(Some(d(2024, 2, 1))));
        assert!(!query.covers(None));
        assert!(RecordQuery::default().covers(None));
    }

    #[test]
    fn test_totals_keep_sql_null_semantics() {
        let mut totals = TransactionTotals::default();
        totals.add(&trx(Some(d(2024, 1, 1)), "A", None, Some(40.0)));
        totals.add(&trx(Some(d(2024, 1, 1)), "A", None, Some(2.0)));
        assert_eq!(totals.rows, 2);
        assert_eq!(totals.revenue, None);
        assert_eq!(totals.gross, None);
        assert_eq!(totals.revenue_or_net(), 42.0);

        totals.add(&trx(Some(d(2024, 1, 1)), "A", Some(10.0), None));
        assert_eq!(totals.revenue_or_net(), 10.0);
    }

    #[test]
    fn test_grouped_reads_filter_dimension() {
        let mut store = InMemoryStore::new();
        store.insert_transactions(vec![
            trx(Some(d(2024, 1, 1)), "A", Some(100.0), None),
            trx(Some(d(2024, 1, 1)), "B", Some(7.0), None),
            trx(Some(d(2024, 1, 3)), "A", Some(50.0), None),
            trx(None, "A", Some(1.0), None),
        ]);

        let query = RecordQuery::between(d(2024, 1, 1), d(2024, 1, 3)).with_dimension(Some("A"));
        let grouped = store.transaction_totals_by_date(&query).unwrap();
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[&d(2024, 1, 1)].revenue, Some(100.0));

        let everything = store.transaction_totals(&RecordQuery::default()).unwrap();
        assert_eq!(everything.rows, 4);
        assert_eq!(everything.revenue, Some(158.0));
    }

    #[test]
    fn test_empty_dimension_is_ignored() {
        let query = RecordQuery::default().with_dimension(Some(""));
        assert_eq!(query.dimension, None);
    }
}
