//! Bar — one trading day's record, and its unvalidated form.

use crate::data::volume::{checked_volume, normalize_volume};
use crate::error::DataError;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Daily OHLCV bar. `date` is the natural key of a [`Table`](super::Table).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    /// Equals `close` when the source has no adjustment data.
    pub adj_close: Decimal,
    pub volume: u64,
}

/// Volume as it arrives from a provider or a table file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RawVolume {
    Count(i64),
    Text(String),
}

impl RawVolume {
    pub fn normalize(&self) -> Result<u64, DataError> {
        match self {
            RawVolume::Count(n) => checked_volume(*n),
            RawVolume::Text(s) => normalize_volume(s),
        }
    }
}

/// Bar before validation. Providers and codecs produce these; the appender
/// and the store turn them into [`Bar`]s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBar {
    pub date: NaiveDate,
    pub open: Option<Decimal>,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
    pub close: Option<Decimal>,
    pub adj_close: Option<Decimal>,
    pub volume: Option<RawVolume>,
}

impl RawBar {
    /// Validate every required field.
    pub fn validate(&self) -> Result<Bar, DataError> {
        let date = self.date;
        let require = |value: Option<Decimal>, name: &str| {
            value.ok_or_else(|| DataError::malformed(Some(date), format!("missing {name}")))
        };

        let open = require(self.open, "open")?;
        let high = require(self.high, "high")?;
        let low = require(self.low, "low")?;
        let close = require(self.close, "close")?;
        let volume = match &self.volume {
            Some(v) => v.normalize().map_err(|e| match e {
                DataError::MalformedBar { reason, .. } => DataError::malformed(Some(date), reason),
                other => other,
            })?,
            None => return Err(DataError::malformed(Some(date), "missing volume")),
        };

        Ok(Bar {
            date,
            open,
            high,
            low,
            close,
            adj_close: self.adj_close.unwrap_or(close),
            volume,
        })
    }
}

impl From<&Bar> for RawBar {
    fn from(bar: &Bar) -> Self {
        RawBar {
            date: bar.date,
            open: Some(bar.open),
            high: Some(bar.high),
            low: Some(bar.low),
            close: Some(bar.close),
            adj_close: Some(bar.adj_close),
            volume: Some(
                i64::try_from(bar.volume)
                    .map_or_else(|_| RawVolume::Text(bar.volume.to_string()), RawVolume::Count),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> RawBar {
        RawBar {
            date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            open: Some(Decimal::new(1005, 1)),
            high: Some(Decimal::new(10325, 2)),
            low: Some(Decimal::new(990, 1)),
            close: Some(Decimal::new(10175, 2)),
            adj_close: None,
            volume: Some(RawVolume::Text("1,234,567".into())),
        }
    }

    #[test]
    fn validate_defaults_adj_close_to_close() {
        let bar = raw().validate().unwrap();
        assert_eq!(bar.adj_close, bar.close);
        assert_eq!(bar.volume, 1_234_567);
    }

    #[test]
    fn validate_rejects_missing_price() {
        let mut r = raw();
        r.close = None;
        let err = r.validate().unwrap_err();
        assert!(matches!(
            err,
            DataError::MalformedBar { date: Some(_), ref reason } if reason == "missing close"
        ));
    }

    #[test]
    fn validate_rejects_negative_volume_with_date() {
        let mut r = raw();
        r.volume = Some(RawVolume::Count(-10));
        match r.validate().unwrap_err() {
            DataError::MalformedBar { date, .. } => assert_eq!(date, Some(r.date)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn validate_rejects_missing_volume() {
        let mut r = raw();
        r.volume = None;
        assert!(r.validate().is_err());
    }

    #[test]
    fn bar_to_raw_roundtrips() {
        let bar = raw().validate().unwrap();
        assert_eq!(RawBar::from(&bar).validate().unwrap(), bar);
    }
}
