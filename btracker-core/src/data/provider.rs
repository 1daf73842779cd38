//! Market-data provider trait.
//!
//! Abstracts over data sources so the update flow can run against Yahoo
//! Finance in production and a fixture in tests.

use crate::domain::FetchWindow;
use crate::error::DataError;
use chrono::NaiveDate;

/// Source of daily bars.
///
/// Implementations must return bars whose dates are already normalized to
/// calendar days in a single zone.
pub trait DataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch the trailing `lookback_days` of daily bars for `symbol`.
    fn fetch_daily_bars(&self, symbol: &str, lookback_days: u32) -> Result<FetchWindow, DataError>;
}

/// Days to request so the window reaches back to, and includes, `newest`.
///
/// The boundary day is always refetched because its stored bar may have been
/// written before the session closed.
pub fn lookback_days(newest: NaiveDate, today: NaiveDate) -> u32 {
    let span = (today - newest).num_days() + 1;
    u32::try_from(span.max(1)).unwrap_or(u32::MAX)
}
