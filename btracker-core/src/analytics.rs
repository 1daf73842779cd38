//! Price analytics — per-day metrics, yearly summary, and a histogram of
//! daily moves, all computed from a history table.
//!
//! Every function here is pure: table in, rows out. Dollar amounts and
//! percentages are exact decimals; rounding happens only on export.

use crate::domain::{Bar, SortOrder, Table};
use crate::error::DataError;
use chrono::{Datelike, Duration, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Number of weekly closes averaged by the long moving average.
pub const MOVING_AVERAGE_WEEKS: i64 = 200;

/// Default histogram bucket width, in percent.
pub const DEFAULT_BUCKET_PCT: Decimal = Decimal::ONE;

/// A move from one value to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Change {
    pub amount: Decimal,
    /// `amount` as a percentage of the starting value; `None` when the
    /// starting value is zero.
    pub percent: Option<Decimal>,
}

impl Change {
    pub fn between(from: Decimal, to: Decimal) -> Self {
        let amount = to - from;
        let percent = amount
            .checked_div(from)
            .map(|ratio| ratio * Decimal::ONE_HUNDRED);
        Self { amount, percent }
    }
}

/// Metrics for one day of the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayMetrics {
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    /// Mean of the last 200 weekly closes, `None` until the table reaches
    /// back 199 weeks.
    pub moving_average: Option<Decimal>,
    /// Moving average against the previous day's moving average.
    pub moving_average_change: Option<Change>,
    /// Close against the close 200 weeks earlier.
    pub long_change: Option<Change>,
    /// High minus low, as a percentage of the low.
    pub swing: Change,
    /// Close against the previous day's close.
    pub day_change: Option<Change>,
}

/// One calendar year of the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearSummary {
    pub year: i32,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub open: Decimal,
    pub close: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    /// Year's first open to its last close.
    pub change: Change,
    pub days: usize,
}

/// Count of daily changes with percent in `[lower, upper)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistogramBucket {
    pub lower: Decimal,
    pub upper: Decimal,
    pub count: usize,
}

/// Everything the analytics report shows.
#[derive(Debug, Clone, Serialize)]
pub struct PriceAnalytics {
    /// In the table's order.
    pub days: Vec<DayMetrics>,
    /// Oldest year first.
    pub years: Vec<YearSummary>,
    pub histogram: Vec<HistogramBucket>,
}

/// Compute the full report with the default histogram bucket width.
pub fn analyze(table: &Table) -> Result<PriceAnalytics, DataError> {
    let days = day_metrics(table);
    let histogram = day_change_histogram(&days, DEFAULT_BUCKET_PCT)?;
    Ok(PriceAnalytics {
        years: yearly_summary(table),
        days,
        histogram,
    })
}

/// Per-day metrics, returned in the table's order.
pub fn day_metrics(table: &Table) -> Vec<DayMetrics> {
    let bars = table.to_ascending();
    let mut out: Vec<DayMetrics> = Vec::with_capacity(bars.len());

    for (i, bar) in bars.iter().enumerate() {
        let previous = i
            .checked_sub(1)
            .map(|p| (out[p].close, out[p].moving_average));
        let moving_average = weekly_moving_average(&bars[..=i], bar.date);
        let moving_average_change = match (previous.and_then(|(_, ma)| ma), moving_average) {
            (Some(before), Some(now)) => Some(Change::between(before, now)),
            _ => None,
        };
        let long_ago = bar.date - Duration::weeks(MOVING_AVERAGE_WEEKS);

        out.push(DayMetrics {
            date: bar.date,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            moving_average,
            moving_average_change,
            long_change: close_at_or_before(&bars[..=i], long_ago)
                .map(|then| Change::between(then, bar.close)),
            swing: Change::between(bar.low, bar.high),
            day_change: previous.map(|(close, _)| Change::between(close, bar.close)),
        });
    }

    if table.order() == SortOrder::NewestFirst {
        out.reverse();
    }
    out
}

/// Mean of the closes at `date`, `date - 1w`, ..., `date - 199w`, each taken
/// from the latest bar on or before that day. `bars` is ascending.
fn weekly_moving_average(bars: &[Bar], date: NaiveDate) -> Option<Decimal> {
    let mut sum = Decimal::ZERO;
    for week in 0..MOVING_AVERAGE_WEEKS {
        sum += close_at_or_before(bars, date - Duration::weeks(week))?;
    }
    Some(sum / Decimal::from(MOVING_AVERAGE_WEEKS))
}

fn close_at_or_before(bars: &[Bar], date: NaiveDate) -> Option<Decimal> {
    let idx = bars.partition_point(|b| b.date <= date);
    idx.checked_sub(1).map(|i| bars[i].close)
}

/// Per-year open, close, range, and change, oldest year first.
pub fn yearly_summary(table: &Table) -> Vec<YearSummary> {
    let mut years: Vec<YearSummary> = Vec::new();
    for bar in table.to_ascending() {
        match years.last_mut() {
            Some(y) if y.year == bar.date.year() => {
                y.last_date = bar.date;
                y.close = bar.close;
                y.high = y.high.max(bar.high);
                y.low = y.low.min(bar.low);
                y.days += 1;
            }
            _ => years.push(YearSummary {
                year: bar.date.year(),
                first_date: bar.date,
                last_date: bar.date,
                open: bar.open,
                close: bar.close,
                high: bar.high,
                low: bar.low,
                change: Change::between(bar.open, bar.close),
                days: 1,
            }),
        }
        if let Some(y) = years.last_mut() {
            y.change = Change::between(y.open, y.close);
        }
    }
    years
}

/// Histogram of daily percent changes in buckets `width` percent wide.
///
/// Buckets run contiguously from the lowest to the highest populated one,
/// so empty buckets inside the range are reported with a zero count.
pub fn day_change_histogram(
    days: &[DayMetrics],
    width: Decimal,
) -> Result<Vec<HistogramBucket>, DataError> {
    if width <= Decimal::ZERO {
        return Err(DataError::Config(format!(
            "histogram bucket width must be positive, got {width}"
        )));
    }

    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for pct in days
        .iter()
        .filter_map(|d| d.day_change.and_then(|c| c.percent))
    {
        let bucket = (pct / width)
            .floor()
            .to_i64()
            .ok_or_else(|| DataError::Other(format!("daily change {pct}% out of range")))?;
        *counts.entry(bucket).or_default() += 1;
    }

    let (Some(&first), Some(&last)) = (counts.keys().next(), counts.keys().next_back()) else {
        return Ok(Vec::new());
    };
    Ok((first..=last)
        .map(|k| HistogramBucket {
            lower: Decimal::from(k) * width,
            upper: Decimal::from(k + 1) * width,
            count: counts.get(&k).copied().unwrap_or(0),
        })
        .collect())
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export per-day metrics as CSV. Prices and amounts are rounded to cents,
/// percentages to two places; undefined metrics are empty cells.
pub fn export_day_metrics_csv(days: &[DayMetrics]) -> Result<String, DataError> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "Date",
        "Open",
        "High",
        "Low",
        "Close",
        "200WMA",
        "200WMAChange",
        "200WMAChangePct",
        "200WeekChange",
        "200WeekChangePct",
        "SwingChange",
        "SwingChangePct",
        "DayChange",
        "DayChangePct",
    ])?;

    for d in days {
        let mut record = vec![
            d.date.format("%Y-%m-%d").to_string(),
            cents(d.open),
            cents(d.high),
            cents(d.low),
            cents(d.close),
            d.moving_average.map(cents).unwrap_or_default(),
        ];
        for change in [d.moving_average_change, d.long_change, Some(d.swing), d.day_change] {
            record.extend(change_cells(change));
        }
        wtr.write_record(&record)?;
    }

    finish(wtr)
}

/// Export the yearly summary as CSV.
pub fn export_yearly_summary_csv(years: &[YearSummary]) -> Result<String, DataError> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "Year", "Days", "Open", "High", "Low", "Close", "Change", "ChangePct",
    ])?;

    for y in years {
        let mut record = vec![
            y.year.to_string(),
            y.days.to_string(),
            cents(y.open),
            cents(y.high),
            cents(y.low),
            cents(y.close),
        ];
        record.extend(change_cells(Some(y.change)));
        wtr.write_record(&record)?;
    }

    finish(wtr)
}

fn cents(value: Decimal) -> String {
    value.round_dp(2).to_string()
}

fn change_cells(change: Option<Change>) -> [String; 2] {
    match change {
        Some(c) => [cents(c.amount), c.percent.map(cents).unwrap_or_default()],
        None => [String::new(), String::new()],
    }
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String, DataError> {
    let data = wtr
        .into_inner()
        .map_err(|e| DataError::Other(format!("failed to flush analytics writer: {e}")))?;
    String::from_utf8(data).map_err(|e| DataError::Other(format!("analytics output is not UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn bar(date: NaiveDate, open: i64, high: i64, low: i64, close: i64) -> Bar {
        Bar {
            date,
            open: Decimal::from(open),
            high: Decimal::from(high),
            low: Decimal::from(low),
            close: Decimal::from(close),
            adj_close: Decimal::from(close),
            volume: 1,
        }
    }

    fn flat(date: NaiveDate, close: i64) -> Bar {
        bar(date, close, close, close, close)
    }

    /// One bar per week, ending on `last`, oldest first.
    fn weekly(last: NaiveDate, weeks: i64, close: i64) -> Vec<Bar> {
        (0..weeks)
            .rev()
            .map(|w| flat(last - Duration::weeks(w), close))
            .collect()
    }

    #[test]
    fn change_between_values() {
        let c = Change::between(Decimal::from(80), Decimal::from(100));
        assert_eq!(c.amount, Decimal::from(20));
        assert_eq!(c.percent, Some(Decimal::from(25)));
    }

    #[test]
    fn change_from_zero_has_no_percent() {
        let c = Change::between(Decimal::ZERO, Decimal::from(5));
        assert_eq!(c.amount, Decimal::from(5));
        assert_eq!(c.percent, None);
    }

    #[test]
    fn moving_average_needs_199_weeks_of_history() {
        let last = d(2024, 1, 5);
        let short = Table::new(weekly(last, 199, 10), SortOrder::OldestFirst).unwrap();
        let days = day_metrics(&short);
        assert!(days.iter().all(|m| m.moving_average.is_none()));
        assert!(days.iter().all(|m| m.long_change.is_none()));

        let enough = Table::new(weekly(last, 200, 10), SortOrder::OldestFirst).unwrap();
        let days = day_metrics(&enough);
        assert_eq!(days.last().unwrap().moving_average, Some(Decimal::from(10)));
        assert!(days[..199].iter().all(|m| m.moving_average.is_none()));
        // 200 weekly bars span 199 weeks, so nothing is 200 weeks back yet
        assert!(days.last().unwrap().long_change.is_none());
    }

    #[test]
    fn moving_average_uses_latest_close_on_or_before_each_week() {
        let last = d(2024, 1, 5);
        let mut bars = weekly(last, 200, 10);
        // Newest week closes at 210, lifting the mean by 1
        bars.last_mut().unwrap().close = Decimal::from(210);
        bars.reverse();
        let table = Table::new(bars, SortOrder::NewestFirst).unwrap();

        let days = day_metrics(&table);
        let newest = &days[0];
        assert_eq!(newest.date, last);
        assert_eq!(newest.moving_average, Some(Decimal::from(11)));
    }

    #[test]
    fn moving_average_change_compares_consecutive_days() {
        let last = d(2024, 1, 5);
        let mut bars = weekly(last, 200, 10);
        bars.push(flat(last + Duration::weeks(1), 210));
        let days = day_metrics(&Table::new(bars, SortOrder::OldestFirst).unwrap());

        let newest = days.last().unwrap();
        assert_eq!(newest.moving_average, Some(Decimal::from(11)));
        let change = newest.moving_average_change.unwrap();
        assert_eq!(change.amount, Decimal::ONE);
        assert_eq!(change.percent, Some(Decimal::from(10)));
        assert_eq!(newest.long_change.unwrap().amount, Decimal::from(200));
    }

    #[test]
    fn swing_and_day_change() {
        let table = Table::new(
            vec![bar(d(2024, 1, 5), 100, 110, 90, 105), bar(d(2024, 1, 4), 95, 101, 94, 100)],
            SortOrder::NewestFirst,
        )
        .unwrap();
        let days = day_metrics(&table);

        assert_eq!(days[0].date, d(2024, 1, 5));
        assert_eq!(days[0].swing.amount, Decimal::from(20));
        assert_eq!(days[0].day_change.unwrap().amount, Decimal::from(5));
        assert_eq!(days[0].day_change.unwrap().percent, Some(Decimal::from(5)));
        assert!(days[1].day_change.is_none());
    }

    #[test]
    fn yearly_summary_spans_calendar_years() {
        let table = Table::new(
            vec![
                bar(d(2023, 12, 30), 50, 60, 40, 55),
                bar(d(2023, 12, 31), 55, 70, 52, 60),
                bar(d(2024, 1, 1), 60, 65, 45, 48),
            ],
            SortOrder::OldestFirst,
        )
        .unwrap();
        let years = yearly_summary(&table);

        assert_eq!(years.len(), 2);
        let y2023 = &years[0];
        assert_eq!((y2023.year, y2023.days), (2023, 2));
        assert_eq!((y2023.high, y2023.low), (Decimal::from(70), Decimal::from(40)));
        assert_eq!(y2023.change.amount, Decimal::from(10));
        assert_eq!(y2023.change.percent, Some(Decimal::from(20)));
        assert_eq!(years[1].last_date, d(2024, 1, 1));
    }

    #[test]
    fn histogram_buckets_are_contiguous() {
        let table = Table::new(
            vec![
                flat(d(2024, 1, 1), 100),
                flat(d(2024, 1, 2), 103), // +3%
                flat(d(2024, 1, 3), 103), // 0%
            ],
            SortOrder::OldestFirst,
        )
        .unwrap();
        let days = day_metrics(&table);
        let buckets = day_change_histogram(&days, Decimal::ONE).unwrap();

        assert_eq!(buckets.first().unwrap().lower, Decimal::ZERO);
        assert_eq!(buckets.last().unwrap().upper, Decimal::from(4));
        let counts: Vec<usize> = buckets.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![1, 0, 0, 1]);
    }

    #[test]
    fn histogram_rejects_non_positive_width() {
        assert!(matches!(
            day_change_histogram(&[], Decimal::ZERO),
            Err(DataError::Config(_))
        ));
        assert!(day_change_histogram(&[], Decimal::ONE).unwrap().is_empty());
    }

    #[test]
    fn csv_leaves_undefined_metrics_blank() {
        let table = Table::new(vec![bar(d(2024, 1, 4), 95, 101, 94, 100)], SortOrder::NewestFirst)
            .unwrap();
        let csv = export_day_metrics_csv(&day_metrics(&table)).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert!(lines[0].starts_with("Date,Open,High,Low,Close,200WMA,"));
        assert_eq!(lines[1], "2024-01-04,95,101,94,100,,,,,,7,7.45,,");
    }

    #[test]
    fn analyze_on_empty_table_is_empty() {
        let report = analyze(&Table::empty(SortOrder::NewestFirst)).unwrap();
        assert!(report.days.is_empty());
        assert!(report.years.is_empty());
        assert!(report.histogram.is_empty());
    }
}
