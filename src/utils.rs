use chrono::{Datelike, Duration, Local, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Floor applied to the interquartile range so a constant series still has a
/// non-zero clamping band.
pub const IQR_EPSILON: f64 = 1e-9;

/// Chronologically ordered date -> value mapping. Sparse when it comes
/// straight out of a group-by, dense once it went through
/// [`fill_missing_dates`].
pub type DailySeries<T> = BTreeMap<NaiveDate, T>;

/// Source of "today" for range defaulting.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Clock pinned to a single date, for tests and replays.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Normalizes an optional `(from, to)` pair into an ordered closed interval.
///
/// A missing `to` becomes `today`, a missing `from` becomes
/// `to - default_days`, and a reversed pair is swapped. Never fails.
pub fn resolve_range(
    date_from: Option<NaiveDate>,
    date_to: Option<NaiveDate>,
    default_days: u32,
    today: NaiveDate,
) -> (NaiveDate, NaiveDate) {
    let end = date_to.unwrap_or(today);
    let start = date_from.unwrap_or_else(|| {
        end.checked_sub_signed(Duration::days(i64::from(default_days)))
            .unwrap_or(NaiveDate::MIN)
    });

    if start > end {
        (end, start)
    } else {
        (start, end)
    }
}

/// Period bucketing granularity for the trend engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Day,
    Week,
    Month,
}

impl Granularity {
    /// Case-insensitive parse of a `grp` request parameter. Anything that is
    /// not `day`, `week` or `month` falls back to `Day`.
    pub fn from_param(param: Option<&str>) -> Self {
        match param.map(|p| p.to_ascii_lowercase()).as_deref() {
            Some("week") => Granularity::Week,
            Some("month") => Granularity::Month,
            _ => Granularity::Day,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps a date to its bucket key: `YYYY-MM-DD`, `YYYY-Www` or `YYYY-MM`.
///
/// Week keys use the ISO year, which differs from the calendar year for
/// dates in the first or last ISO week (2024-12-30 is `2025-W01`).
pub fn period_key(date: NaiveDate, granularity: Granularity) -> String {
    match granularity {
        Granularity::Day => date.format("%Y-%m-%d").to_string(),
        Granularity::Week => {
            let iso = date.iso_week();
            format!("{}-W{:02}", iso.year(), iso.week())
        }
        Granularity::Month => date.format("%Y-%m").to_string(),
    }
}

/// Every calendar day from `start` to `end`, inclusive.
pub fn days_in_range(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |d| *d <= end)
}

/// Number of days in the closed interval `[start, end]`.
pub fn day_count(start: NaiveDate, end: NaiveDate) -> usize {
    if end < start {
        return 0;
    }
    (end - start).num_days() as usize + 1
}

/// Expands a sparse series into one entry per day of `[start, end]`,
/// using `fill` for days without a value. Entries outside the interval are
/// dropped.
pub fn fill_missing_dates<T: Clone>(
    series: &DailySeries<T>,
    start: NaiveDate,
    end: NaiveDate,
    fill: T,
) -> DailySeries<T> {
    days_in_range(start, end)
        .map(|day| {
            let value = series.get(&day).cloned().unwrap_or_else(|| fill.clone());
            (day, value)
        })
        .collect()
}

/// Clamps values into `[Q1 - 1.5*IQR, Q3 + 1.5*IQR]`.
///
/// Quartiles are positional: `Q1 = sorted[n/4]`, `Q3 = sorted[3n/4]` over the
/// finite values. With fewer than four finite values the input is returned
/// unchanged. Missing values keep their position.
pub fn clamp_outliers_iqr(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut finite: Vec<f64> = values
        .iter()
        .flatten()
        .copied()
        .filter(|v| v.is_finite())
        .collect();

    if finite.len() < 4 {
        return values.to_vec();
    }

    finite.sort_by(|a, b| a.total_cmp(b));
    let n = finite.len();
    let q1 = finite[n / 4];
    let q3 = finite[(n * 3) / 4];
    let iqr = (q3 - q1).max(IQR_EPSILON);
    let (lo, hi) = (q1 - 1.5 * iqr, q3 + 1.5 * iqr);

    values
        .iter()
        .map(|v| v.map(|x| x.clamp(lo, hi)))
        .collect()
}

/// Rounds the exact binary value of `value` half-to-even at `places`
/// decimals. Non-finite values pass through.
pub fn round_to(value: f64, places: u32) -> f64 {
    Decimal::from_f64_retain(value)
        .map(|d| d.round_dp_with_strategy(places, RoundingStrategy::MidpointNearestEven))
        .and_then(|d| d.to_string().parse::<f64>().ok())
        .unwrap_or(value)
}

/// `numerator / denominator`, or 0.0 when the denominator is zero.
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}
