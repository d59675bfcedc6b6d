use crate::error::Result;
use crate::schema::{BookingRecord, LeadTimeCounts, LeadTimeRow, LeadTimeShare};
use crate::store::{RecordQuery, RecordStore};
use crate::utils::{days_in_range, period_key, round_to, Granularity};
use chrono::NaiveDate;
use log::{debug, warn};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadTimeBucket {
    /// 30 days or more ahead.
    Early,
    /// 7 to 29 days ahead.
    Standard,
    /// 0 to 6 days ahead.
    LastMinute,
    /// Created after check-in.
    VeryLate,
}

impl LeadTimeBucket {
    pub fn for_lead_days(days: i64) -> Self {
        match days {
            d if d >= 30 => LeadTimeBucket::Early,
            7..=29 => LeadTimeBucket::Standard,
            0..=6 => LeadTimeBucket::LastMinute,
            _ => LeadTimeBucket::VeryLate,
        }
    }
}

impl LeadTimeCounts {
    fn record(&mut self, bucket: LeadTimeBucket) {
        match bucket {
            LeadTimeBucket::Early => self.early += 1,
            LeadTimeBucket::Standard => self.standard += 1,
            LeadTimeBucket::LastMinute => self.last_minute += 1,
            LeadTimeBucket::VeryLate => self.very_late += 1,
        }
        self.total += 1;
    }

    pub fn share(&self) -> LeadTimeShare {
        let total = self.total.max(1) as f64;
        LeadTimeShare {
            early: round_to(self.early as f64 / total, 4),
            standard: round_to(self.standard as f64 / total, 4),
            last_minute: round_to(self.last_minute as f64 / total, 4),
            very_late: round_to(self.very_late as f64 / total, 4),
        }
    }
}

/// Days between creation and check-in, or `None` when either is missing.
pub fn lead_days(booking: &BookingRecord) -> Option<i64> {
    let checkin = booking.checkin_date?;
    let created = booking.created_ts?.date();
    Some((checkin - created).num_days())
}

pub struct LeadTimeEngine<'a> {
    store: &'a dyn RecordStore,
}

impl<'a> LeadTimeEngine<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self { store }
    }

    pub fn distribution(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        granularity: Granularity,
    ) -> Result<Vec<LeadTimeRow>> {
        let bookings = self.store.bookings(&RecordQuery::between(start, end))?;
        Ok(lead_time_distribution(&bookings, start, end, granularity))
    }
}

/// Bucket counts and shares per check-in period over `[start, end]`.
/// Bookings missing either date are left out, total included.
pub fn lead_time_distribution(
    bookings: &[BookingRecord],
    start: NaiveDate,
    end: NaiveDate,
    granularity: Granularity,
) -> Vec<LeadTimeRow> {
    let mut buckets: BTreeMap<String, LeadTimeCounts> = days_in_range(start, end)
        .map(|day| (period_key(day, granularity), LeadTimeCounts::default()))
        .collect();

    let mut skipped = 0usize;
    let mut very_late = 0usize;
    for booking in bookings {
        let (Some(checkin), Some(lead)) = (booking.checkin_date, lead_days(booking)) else {
            skipped += 1;
            continue;
        };
        let bucket = LeadTimeBucket::for_lead_days(lead);
        if bucket == LeadTimeBucket::VeryLate {
            very_late += 1;
        }
        buckets
            .entry(period_key(checkin, granularity))
            .or_default()
            .record(bucket);
    }

    if very_late > 0 {
        warn!(
            "{} bookings in {}..{} were created after their check-in date",
            very_late, start, end
        );
    }
    debug!(
        "Lead time {}..{}: {} bookings, {} skipped for missing dates",
        start,
        end,
        bookings.len(),
        skipped
    );

    buckets
        .into_iter()
        .map(|(period, counts)| LeadTimeRow {
            period,
            share: counts.share(),
            counts,
        })
        .collect()
}
