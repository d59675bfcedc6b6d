//! CSV bulk loading into an [`InMemoryStore`].
//!
//! Files carry a header row whose names match the record fields. Field
//! casting is best-effort: an unreadable date, timestamp or amount becomes
//! `None` and the record is still loaded. Only a missing or malformed
//! transaction `pkid` fails the load.

use crate::error::{AnalyticsError, Result};
use crate::schema::{BookingRecord, BookingStatus, InventoryRecord, TransactionRecord};
use crate::store::InMemoryStore;
use chrono::{NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord};
use log::{info, warn};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// Clear the target collection before inserting.
    pub truncate: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    pub skipped: usize,
}

fn prefix(raw: &str, chars: usize) -> &str {
    match raw.char_indices().nth(chars) {
        Some((idx, _)) => &raw[..idx],
        None => raw,
    }
}

/// `YYYY-MM-DD` from the first ten characters.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(prefix(raw, 10), DATE_FORMAT).ok()
}

/// Space or `T` separated timestamp from the first nineteen characters.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let head = prefix(raw, 19);
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(head, fmt).ok())
}

pub fn to_decimal(raw: &str) -> Option<f64> {
    match raw.trim() {
        "" | "NULL" => None,
        s => s.parse::<f64>().ok(),
    }
}

pub fn parse_int(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    raw.parse::<i64>().ok()
}

pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "y" | "yes" => Some(true),
        "0" | "false" | "n" | "no" => Some(false),
        _ => None,
    }
}

/// Header-name lookup over one CSV file.
struct Columns {
    index: HashMap<String, usize>,
}

impl Columns {
    fn new(headers: &StringRecord) -> Self {
        let index = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_string(), i))
            .collect();
        Self { index }
    }

    fn raw<'r>(&self, record: &'r StringRecord, name: &str) -> &'r str {
        self.index
            .get(name)
            .and_then(|&i| record.get(i))
            .unwrap_or("")
    }

    fn text(&self, record: &StringRecord, name: &str) -> Option<String> {
        let value = self.raw(record, name).trim();
        (!value.is_empty()).then(|| value.to_string())
    }
}

fn line_of(record: &StringRecord) -> u64 {
    record.position().map_or(0, |p| p.line())
}

fn reader<R: Read>(source: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(source)
}

pub fn parse_transactions<R: Read>(source: R) -> Result<Vec<TransactionRecord>> {
    let mut rdr = reader(source);
    let cols = Columns::new(rdr.headers()?);
    let mut out = Vec::new();

    for record in rdr.records() {
        let record = record?;
        let raw_pkid = cols.raw(&record, "pkid");
        let pkid = parse_int(raw_pkid).ok_or_else(|| AnalyticsError::Ingestion {
            line: line_of(&record),
            details: format!("pkid '{}' is not an integer", raw_pkid),
        })?;

        out.push(TransactionRecord {
            pkid,
            business_date: parse_date(cols.raw(&record, "business_date")),
            resort: cols.text(&record, "resort"),
            trx_code: cols.text(&record, "trx_code"),
            revenue_amt: to_decimal(cols.raw(&record, "revenue_amt")),
            net_amount: to_decimal(cols.raw(&record, "net_amount")),
            gross_amount: to_decimal(cols.raw(&record, "gross_amount")),
            non_revenue_amount: to_decimal(cols.raw(&record, "non_revenue_amount")),
        });
    }
    Ok(out)
}

pub fn parse_bookings<R: Read>(source: R) -> Result<Vec<BookingRecord>> {
    let mut rdr = reader(source);
    let cols = Columns::new(rdr.headers()?);
    let mut out = Vec::new();

    for record in rdr.records() {
        let record = record?;
        let status = cols
            .text(&record, "status")
            .map(|s| BookingStatus::parse(&s))
            .unwrap_or_default();

        out.push(BookingRecord {
            checkin_date: parse_date(cols.raw(&record, "checkin_date")),
            created_ts: parse_datetime(cols.raw(&record, "created_ts")),
            status,
            cancellation_flag: parse_flag(cols.raw(&record, "cancellation_flag")).unwrap_or(false),
            no_show_flag: parse_flag(cols.raw(&record, "no_show_flag")).unwrap_or(false),
            customer_id: cols.text(&record, "customer_id"),
        });
    }
    Ok(out)
}

/// Rows without a readable `date` cannot be placed on the calendar and are
/// counted as skipped.
pub fn parse_inventory<R: Read>(source: R) -> Result<(Vec<InventoryRecord>, usize)> {
    let mut rdr = reader(source);
    let cols = Columns::new(rdr.headers()?);
    let mut out = Vec::new();
    let mut skipped = 0;

    for record in rdr.records() {
        let record = record?;
        let Some(date) = parse_date(cols.raw(&record, "date")) else {
            warn!(
                "Skipping inventory line {}: unreadable date '{}'",
                line_of(&record),
                cols.raw(&record, "date")
            );
            skipped += 1;
            continue;
        };

        out.push(InventoryRecord {
            date,
            location_id: cols.text(&record, "location_id"),
            capacity: parse_int(cols.raw(&record, "capacity")).unwrap_or(0),
            occupied: parse_int(cols.raw(&record, "occupied")).unwrap_or(0),
        });
    }
    Ok((out, skipped))
}

/// The file is parsed completely before the store is touched, so a failed
/// load leaves the collection as it was.
pub fn load_transactions<R: Read>(
    store: &mut InMemoryStore,
    source: R,
    options: LoadOptions,
) -> Result<LoadReport> {
    let records = parse_transactions(source)?;
    if options.truncate {
        info!("Truncating {} transactions", store.transaction_count());
        store.truncate_transactions();
    }
    let loaded = records.len();
    store.insert_transactions(records);
    info!("Loaded {} transactions", loaded);
    Ok(LoadReport { loaded, skipped: 0 })
}

pub fn load_bookings<R: Read>(
    store: &mut InMemoryStore,
    source: R,
    options: LoadOptions,
) -> Result<LoadReport> {
    let records = parse_bookings(source)?;
    if options.truncate {
        info!("Truncating {} bookings", store.booking_count());
        store.truncate_bookings();
    }
    let loaded = records.len();
    store.insert_bookings(records);
    info!("Loaded {} bookings", loaded);
    Ok(LoadReport { loaded, skipped: 0 })
}

pub fn load_inventory<R: Read>(
    store: &mut InMemoryStore,
    source: R,
    options: LoadOptions,
) -> Result<LoadReport> {
    let (records, skipped) = parse_inventory(source)?;
    if options.truncate {
        info!("Truncating {} inventory rows", store.inventory_count());
        store.truncate_inventory();
    }
    let loaded = records.len();
    store.insert_inventory(records);
    info!("Loaded {} inventory rows ({} skipped)", loaded, skipped);
    Ok(LoadReport { loaded, skipped })
}

pub fn load_transactions_file(
    store: &mut InMemoryStore,
    path: impl AsRef<Path>,
    options: LoadOptions,
) -> Result<LoadReport> {
    load_transactions(store, File::open(path)?, options)
}

pub fn load_bookings_file(
    store: &mut InMemoryStore,
    path: impl AsRef<Path>,
    options: LoadOptions,
) -> Result<LoadReport> {
    load_bookings(store, File::open(path)?, options)
}

pub fn load_inventory_file(
    store: &mut InMemoryStore,
    path: impl AsRef<Path>,
    options: LoadOptions,
) -> Result<LoadReport> {
    load_inventory(store, File::open(path)?, options)
}
