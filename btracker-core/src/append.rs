//! Time-series appender — merges a fetched window into an existing table.
//!
//! Rules, applied to the window's bars in increasing-date order against the
//! table's current newest retained date `n`:
//! - `date < n`: already present, skipped
//! - `date == n`: the stored bar for `n` is provisional and is replaced
//! - `date > n`: inserted as the new newest bar
//!
//! The merge is pure: it never touches storage. Gaps between the table and
//! the window are reported, never backfilled.

use crate::domain::{Bar, FetchWindow, RawBar, Table};
use crate::error::DataError;
use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;
use tracing::{debug, warn};

/// Outcome counts for one merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Window bars older than the table's newest date.
    pub skipped: usize,
    /// Boundary bars that replaced a stored bar for the same date.
    pub replaced: usize,
    /// Replacements whose values differ from the stored bar.
    pub revised: usize,
    /// Bars newer than anything in the table.
    pub inserted: usize,
    pub newest_before: NaiveDate,
    pub newest_after: NaiveDate,
    /// Calendar days missing between the table's newest date and the
    /// window's oldest bar, when the window does not reach back far enough.
    pub gap_days: Option<i64>,
}

impl MergeReport {
    /// True if the merged table differs from the input table.
    pub fn changed(&self) -> bool {
        self.inserted > 0 || self.revised > 0
    }
}

/// Merged table plus what happened to produce it.
#[derive(Debug, Clone)]
pub struct Merged {
    pub table: Table,
    pub report: MergeReport,
}

/// Merge `window` into `table`, returning a new table in the same order.
///
/// # Errors
/// - [`DataError::EmptyTable`] if `table` has no rows
/// - [`DataError::MalformedBar`] if any window bar fails validation; nothing
///   is merged in that case
pub fn merge(table: &Table, window: &FetchWindow) -> Result<Merged, DataError> {
    let newest_before = table.newest().ok_or(DataError::EmptyTable)?.date;

    let mut incoming = window
        .bars
        .iter()
        .map(RawBar::validate)
        .collect::<Result<Vec<Bar>, _>>()?;
    incoming.sort_by_key(|b| b.date);
    // A date fetched twice resolves to its last occurrence either way; keep
    // only that one so the report counts each date once.
    incoming.reverse();
    incoming.dedup_by_key(|b| b.date);
    incoming.reverse();

    let gap_days = incoming
        .first()
        .map(|b| (b.date - newest_before).num_days() - 1)
        .filter(|&missing| missing > 0);
    if let Some(missing) = gap_days {
        warn!(
            symbol = %window.symbol,
            newest = %newest_before,
            missing,
            "fetch window does not reach the table's newest date; gap left unfilled"
        );
    }

    let mut bars = table.to_ascending();
    let mut report = MergeReport {
        skipped: 0,
        replaced: 0,
        revised: 0,
        inserted: 0,
        newest_before,
        newest_after: newest_before,
        gap_days,
    };

    for bar in incoming {
        let Some(newest) = bars.last().map(|b| b.date) else {
            return Err(DataError::EmptyTable);
        };
        match bar.date.cmp(&newest) {
            Ordering::Less => {
                debug!(date = %bar.date, "already present, skipping");
                report.skipped += 1;
            }
            Ordering::Equal => {
                debug!(date = %bar.date, "boundary day, replacing stored bar");
                if bars.pop().as_ref() != Some(&bar) {
                    report.revised += 1;
                }
                bars.push(bar);
                report.replaced += 1;
            }
            Ordering::Greater => {
                debug!(date = %bar.date, "new bar");
                bars.push(bar);
                report.inserted += 1;
            }
        }
    }

    if let Some(last) = bars.last() {
        report.newest_after = last.date;
    }

    Ok(Merged {
        table: Table::from_ascending(bars, table.order()),
        report,
    })
}
