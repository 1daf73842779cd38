//! Update configuration, loaded from TOML.
//!
//! ```toml
//! symbol = "BTC-USD"
//! table_path = "resources/data/historical_data.tsv"
//! timezone = "UTC"
//!
//! [format]
//! delimiter = "tab"
//! layout = "split-date"
//! order = "newest-first"
//!
//! [provider]
//! base_url = "https://query2.finance.yahoo.com"
//! timeout_secs = 30
//! ```

use crate::data::codec::{ColumnLayout, DelimitedCodec, Delimiter};
use crate::data::normalize::DateNormalizer;
use crate::data::store::FileTableStore;
use crate::data::yahoo::{YahooProvider, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};
use crate::domain::SortOrder;
use crate::error::DataError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateConfig {
    #[serde(default = "default_symbol")]
    pub symbol: String,

    #[serde(default = "default_table_path")]
    pub table_path: PathBuf,

    /// IANA zone for calendar-day normalization. `None` uses the
    /// provider's exchange zone.
    #[serde(default)]
    pub timezone: Option<String>,

    #[serde(default)]
    pub format: FormatConfig,

    #[serde(default)]
    pub provider: ProviderConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormatConfig {
    #[serde(default)]
    pub delimiter: Delimiter,
    #[serde(default)]
    pub layout: ColumnLayout,
    #[serde(default)]
    pub order: SortOrder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_symbol() -> String {
    "BTC-USD".into()
}

fn default_table_path() -> PathBuf {
    PathBuf::from("resources/data/historical_data.tsv")
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.into()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            table_path: default_table_path(),
            timezone: None,
            format: FormatConfig::default(),
            provider: ProviderConfig::default(),
        }
    }
}

impl UpdateConfig {
    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, DataError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DataError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    /// Parse a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, DataError> {
        let config: Self =
            toml::from_str(content).map_err(|e| DataError::Config(format!("parse TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DataError> {
        if self.symbol.trim().is_empty() {
            return Err(DataError::Config("symbol must not be empty".into()));
        }
        if self.provider.timeout_secs == 0 {
            return Err(DataError::Config("provider.timeout_secs must be positive".into()));
        }
        self.normalizer()?;
        Ok(())
    }

    /// The configured zone override, if any.
    pub fn normalizer(&self) -> Result<Option<DateNormalizer>, DataError> {
        self.timezone
            .as_deref()
            .map(DateNormalizer::from_tz_name)
            .transpose()
    }

    /// Calendar date of `now` in the zone bar dates are normalized to:
    /// the override when set, otherwise UTC. UTC is never behind an
    /// Americas exchange, so the boundary day stays inside the lookback.
    pub fn today_at(&self, now: DateTime<Utc>) -> Result<NaiveDate, DataError> {
        Ok(self.normalizer()?.unwrap_or_default().date_at(now))
    }

    pub fn today(&self) -> Result<NaiveDate, DataError> {
        self.today_at(Utc::now())
    }

    pub fn codec(&self) -> Result<DelimitedCodec, DataError> {
        let codec = DelimitedCodec::new(self.format.delimiter, self.format.layout);
        Ok(match self.normalizer()? {
            Some(n) => codec.with_normalizer(n),
            None => codec,
        })
    }

    pub fn store(&self) -> Result<FileTableStore, DataError> {
        Ok(FileTableStore::new(
            &self.table_path,
            Box::new(self.codec()?),
            self.format.order,
        ))
    }

    pub fn provider(&self) -> Result<YahooProvider, DataError> {
        let provider = YahooProvider::with_options(
            &self.provider.base_url,
            Duration::from_secs(self.provider.timeout_secs),
        )?;
        Ok(match self.normalizer()? {
            Some(n) => provider.with_timezone(n),
            None => provider,
        })
    }
}
