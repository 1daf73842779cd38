//! Structured error type shared by every layer of the crate.
//!
//! Errors are reported synchronously and never retried here. Recovery policy
//! (re-fetching after a transient provider failure) belongs to the caller.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("table is empty: no reference date to merge against")]
    EmptyTable,

    #[error("malformed bar{}: {reason}", fmt_date(.date))]
    MalformedBar {
        date: Option<NaiveDate>,
        reason: String,
    },

    #[error("date normalization failed: {0}")]
    DateNormalization(String),

    #[error("table is not sorted {expected}: {previous} followed by {next}")]
    UnorderedTable {
        expected: &'static str,
        previous: NaiveDate,
        next: NaiveDate,
    },

    #[error("duplicate date in table: {0}")]
    DuplicateDate(NaiveDate),

    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("data error: {0}")]
    Other(String),
}

impl DataError {
    pub(crate) fn malformed(date: Option<NaiveDate>, reason: impl Into<String>) -> Self {
        DataError::MalformedBar {
            date,
            reason: reason.into(),
        }
    }
}

fn fmt_date(date: &Option<NaiveDate>) -> String {
    match date {
        Some(d) => format!(" on {d}"),
        None => String::new(),
    }
}
