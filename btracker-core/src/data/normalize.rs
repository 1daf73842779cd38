//! Date normalization to calendar-day granularity in a single time zone.
//!
//! Providers report bar times as Unix timestamps or offset datetimes; table
//! files hold plain dates or split month/day/year columns. Everything is
//! reduced to a `NaiveDate` in one configured zone before merging.

use crate::error::DataError;
use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateNormalizer {
    tz: Tz,
}

impl Default for DateNormalizer {
    fn default() -> Self {
        Self::new(Tz::UTC)
    }
}

impl DateNormalizer {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Build from an IANA zone name such as `America/New_York`.
    pub fn from_tz_name(name: &str) -> Result<Self, DataError> {
        name.parse::<Tz>()
            .map(Self::new)
            .map_err(|e| DataError::DateNormalization(format!("unknown time zone {name:?}: {e}")))
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    /// Calendar date of a Unix timestamp (seconds) in this zone.
    pub fn date_from_timestamp(&self, secs: i64) -> Result<NaiveDate, DataError> {
        DateTime::from_timestamp(secs, 0)
            .map(|utc| utc.with_timezone(&self.tz).date_naive())
            .ok_or_else(|| DataError::DateNormalization(format!("invalid timestamp: {secs}")))
    }

    /// Calendar date of `now` in this zone.
    pub fn date_at(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.tz).date_naive()
    }

    /// Today's date in this zone, the same calendar bar dates are kept in.
    pub fn today(&self) -> NaiveDate {
        self.date_at(Utc::now())
    }

    /// Parse a date or datetime string.
    ///
    /// Accepted forms:
    /// - `2024-01-05`
    /// - `2024-01-05T00:00:00-05:00`, `2024-01-05 00:00:00-05:00` (instant, moved into this zone)
    /// - `2024-01-05 09:30:00` (wall time in this zone; must exist and be unambiguous)
    pub fn parse(&self, text: &str) -> Result<NaiveDate, DataError> {
        let text = text.trim();

        if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
            return Ok(date);
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Ok(dt.with_timezone(&self.tz).date_naive());
        }
        for fmt in ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%z"] {
            if let Ok(dt) = DateTime::parse_from_str(text, fmt) {
                return Ok(dt.with_timezone(&self.tz).date_naive());
            }
        }

        for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
                return self.local_date(naive, text);
            }
        }

        Err(DataError::DateNormalization(format!(
            "unrecognized date: {text:?}"
        )))
    }

    /// Parse the split `Month Day Year` columns of the history file
    /// (`Jan`, `5`, `2024`).
    pub fn parse_month_day_year(
        &self,
        month: &str,
        day: &str,
        year: &str,
    ) -> Result<NaiveDate, DataError> {
        let joined = format!("{} {} {}", month.trim(), day.trim(), year.trim());
        NaiveDate::parse_from_str(&joined, "%b %d %Y")
            .or_else(|_| NaiveDate::parse_from_str(&joined, "%B %d %Y"))
            .map_err(|_| DataError::DateNormalization(format!("unrecognized date: {joined:?}")))
    }

    fn local_date(&self, naive: NaiveDateTime, text: &str) -> Result<NaiveDate, DataError> {
        match self.tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) => Ok(dt.date_naive()),
            LocalResult::Ambiguous(_, _) => Err(DataError::DateNormalization(format!(
                "ambiguous local time {text:?} in {}",
                self.tz
            ))),
            LocalResult::None => Err(DataError::DateNormalization(format!(
                "nonexistent local time {text:?} in {}",
                self.tz
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn timestamp_is_converted_to_exchange_date() {
        // 2024-01-05 03:00 UTC is still Jan 4 in New York
        let ts = 1_704_423_600;
        let ny = DateNormalizer::from_tz_name("America/New_York").unwrap();
        assert_eq!(ny.date_from_timestamp(ts).unwrap(), d(2024, 1, 4));
        assert_eq!(DateNormalizer::default().date_from_timestamp(ts).unwrap(), d(2024, 1, 5));
    }

    #[test]
    fn today_follows_the_bar_zone_not_the_host() {
        // 2024-01-07 00:30 UTC is still Jan 6 in Los Angeles and New York
        let now = DateTime::from_timestamp(1_704_587_400, 0).unwrap();
        assert_eq!(DateNormalizer::default().date_at(now), d(2024, 1, 7));
        let ny = DateNormalizer::from_tz_name("America/New_York").unwrap();
        assert_eq!(ny.date_at(now), d(2024, 1, 6));
        let tokyo = DateNormalizer::from_tz_name("Asia/Tokyo").unwrap();
        assert_eq!(tokyo.date_at(now), d(2024, 1, 7));
    }

    #[test]
    fn unknown_zone_is_rejected() {
        assert!(matches!(
            DateNormalizer::from_tz_name("Mars/Olympus"),
            Err(DataError::DateNormalization(_))
        ));
    }

    #[test]
    fn parses_plain_and_offset_dates() {
        let utc = DateNormalizer::default();
        assert_eq!(utc.parse("2024-01-05").unwrap(), d(2024, 1, 5));
        assert_eq!(utc.parse("2024-01-05T23:30:00-05:00").unwrap(), d(2024, 1, 6));
        assert_eq!(utc.parse("2024-01-05 00:00:00+00:00").unwrap(), d(2024, 1, 5));
    }

    #[test]
    fn naive_wall_time_in_dst_gap_is_rejected() {
        let ny = DateNormalizer::from_tz_name("America/New_York").unwrap();
        assert_eq!(ny.parse("2024-03-10 12:00:00").unwrap(), d(2024, 3, 10));
        assert!(ny.parse("2024-03-10 02:30:00").is_err());
        assert!(ny.parse("2024-11-03 01:30:00").is_err());
    }

    #[test]
    fn parses_split_columns() {
        let n = DateNormalizer::default();
        assert_eq!(n.parse_month_day_year("Jan", "5", "2024").unwrap(), d(2024, 1, 5));
        assert_eq!(n.parse_month_day_year("March", "31", "2023").unwrap(), d(2023, 3, 31));
        assert!(n.parse_month_day_year("Feb", "30", "2024").is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(DateNormalizer::default().parse("yesterday").is_err());
    }
}
