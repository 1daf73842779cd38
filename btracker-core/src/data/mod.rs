//! Market data ingestion and table persistence

pub mod codec;
pub mod normalize;
pub mod provider;
pub mod store;
pub mod volume;
pub mod yahoo;

pub use codec::{ColumnLayout, DelimitedCodec, Delimiter, TableCodec};
pub use normalize::DateNormalizer;
pub use provider::{lookback_days, DataProvider};
pub use store::{FileTableStore, TableStore};
pub use volume::normalize_volume;
pub use yahoo::YahooProvider;
