//! Update orchestrator — load, fetch, merge, save for one symbol.

use crate::append::{merge, MergeReport};
use crate::data::provider::{lookback_days, DataProvider};
use crate::data::store::TableStore;
use crate::error::DataError;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

/// Summary of one update run.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateSummary {
    pub symbol: String,
    pub provider: String,
    pub lookback_days: u32,
    pub fetched: usize,
    pub report: MergeReport,
    pub rows: usize,
    /// False when nothing changed or on a dry run.
    pub saved: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOptions {
    /// Merge and report without writing the table back.
    pub dry_run: bool,
}

/// Bring the stored table for `symbol` up to `today`.
///
/// The store is only written after a successful merge that changed the
/// table, so any failure leaves the persisted file as it was.
pub fn run_update(
    provider: &dyn DataProvider,
    store: &dyn TableStore,
    symbol: &str,
    today: NaiveDate,
    opts: UpdateOptions,
) -> Result<UpdateSummary, DataError> {
    let table = store.load()?;
    let newest = table.newest().ok_or(DataError::EmptyTable)?.date;
    let lookback = lookback_days(newest, today);
    info!(symbol, %newest, %today, lookback, "updating table");

    let window = provider.fetch_daily_bars(symbol, lookback)?;
    let fetched = window.len();
    let merged = merge(&table, &window)?;

    let saved = merged.report.changed() && !opts.dry_run;
    if saved {
        store.save(&merged.table)?;
    }

    info!(
        symbol,
        skipped = merged.report.skipped,
        replaced = merged.report.replaced,
        inserted = merged.report.inserted,
        newest = %merged.report.newest_after,
        saved,
        "update complete"
    );

    Ok(UpdateSummary {
        symbol: symbol.to_string(),
        provider: provider.name().to_string(),
        lookback_days: lookback,
        fetched,
        rows: merged.table.len(),
        report: merged.report,
        saved,
    })
}
