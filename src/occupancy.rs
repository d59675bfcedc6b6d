use crate::error::Result;
use crate::schema::{InventoryRecord, OccupancyRow};
use crate::store::{RecordQuery, RecordStore};
use crate::utils::{period_key, round_to, safe_ratio, Granularity};
use chrono::NaiveDate;
use log::debug;
use std::collections::BTreeMap;

#[derive(Debug, Default, Clone, Copy)]
struct OccupancyBucket {
    capacity: i64,
    occupied: i64,
}

pub struct OccupancyEngine<'a> {
    store: &'a dyn RecordStore,
}

impl<'a> OccupancyEngine<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self { store }
    }

    pub fn trend(
        &self,
        location_id: Option<&str>,
        start: NaiveDate,
        end: NaiveDate,
        granularity: Granularity,
    ) -> Result<Vec<OccupancyRow>> {
        let query = RecordQuery::between(start, end).with_dimension(location_id);
        let records = self.store.inventory(&query)?;
        Ok(occupancy_trend(&records, granularity))
    }
}

/// Sums capacity and occupied per period. The rate is 0.0 for periods
/// without capacity.
pub fn occupancy_trend(records: &[InventoryRecord], granularity: Granularity) -> Vec<OccupancyRow> {
    let mut buckets: BTreeMap<String, OccupancyBucket> = BTreeMap::new();
    for record in records {
        let bucket = buckets
            .entry(period_key(record.date, granularity))
            .or_default();
        bucket.capacity += record.capacity;
        bucket.occupied += record.occupied;
    }

    debug!(
        "Occupancy trend: {} inventory rows into {} {} periods",
        records.len(),
        buckets.len(),
        granularity
    );

    buckets
        .into_iter()
        .map(|(period, bucket)| OccupancyRow {
            period,
            capacity: bucket.capacity,
            occupied: bucket.occupied,
            occupancy_rate: round_to(
                safe_ratio(bucket.occupied as f64, bucket.capacity as f64),
                4,
            ),
        })
        .collect()
}
