//! btracker core — daily bar table maintenance.
//!
//! This crate keeps a flat-file history of daily price bars current:
//! - Domain types (bars, tables, fetch windows)
//! - The appender that merges a fetched window into a table
//! - Date and volume normalization
//! - Table codecs and the file-backed store
//! - Market-data provider trait and a Yahoo Finance implementation
//! - Update orchestration and TOML configuration
//! - Price analytics over a loaded table

pub mod analytics;
pub mod append;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod update;

pub use analytics::{analyze, PriceAnalytics};
pub use append::{merge, MergeReport, Merged};
pub use config::UpdateConfig;
pub use domain::{Bar, FetchWindow, RawBar, RawVolume, SortOrder, Table};
pub use error::DataError;
pub use update::{run_update, UpdateOptions, UpdateSummary};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types that cross the CLI boundary are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<Bar>();
        require_sync::<Bar>();
        require_send::<Table>();
        require_sync::<Table>();
        require_send::<FetchWindow>();
        require_sync::<FetchWindow>();
        require_send::<DataError>();
        require_sync::<DataError>();
        require_send::<data::FileTableStore>();
        require_sync::<data::FileTableStore>();
        require_send::<data::YahooProvider>();
        require_sync::<data::YahooProvider>();
    }
}
