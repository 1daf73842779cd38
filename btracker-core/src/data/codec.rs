//! Table codecs — the physical file format, kept apart from merge logic.
//!
//! The history file has been written tab-, pipe-, and comma-delimited, with
//! either split `Month/Day/Year` columns or a single `Date` column. A
//! [`TableCodec`] hides those choices from the store and the appender.

use super::normalize::DateNormalizer;
use crate::domain::{Bar, RawBar, RawVolume};
use crate::error::DataError;
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Parse and format a whole table file.
pub trait TableCodec: Send + Sync {
    /// Parse file contents into unvalidated bars, in file order.
    fn parse(&self, text: &str) -> Result<Vec<RawBar>, DataError>;

    /// Format bars, in the order given, as complete file contents.
    fn format(&self, bars: &[Bar]) -> Result<String, DataError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Delimiter {
    #[default]
    Tab,
    Pipe,
    Comma,
}

impl Delimiter {
    pub fn byte(self) -> u8 {
        match self {
            Delimiter::Tab => b'\t',
            Delimiter::Pipe => b'|',
            Delimiter::Comma => b',',
        }
    }
}

impl FromStr for Delimiter {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tab" | "tsv" | "\t" => Ok(Delimiter::Tab),
            "pipe" | "|" => Ok(Delimiter::Pipe),
            "comma" | "csv" | "," => Ok(Delimiter::Comma),
            other => Err(DataError::Config(format!(
                "unknown delimiter '{other}'. Valid: tab, pipe, comma"
            ))),
        }
    }
}

/// Column layout of the file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColumnLayout {
    /// `Month Day Year Open High Low Close AdjClose Volume`, month as `Jan`.
    #[default]
    SplitDate,
    /// `Date Open High Low Close AdjClose Volume`, date as `YYYY-MM-DD`.
    IsoDate,
}

impl ColumnLayout {
    fn header(self) -> &'static [&'static str] {
        match self {
            ColumnLayout::SplitDate => &[
                "Month", "Day", "Year", "Open", "High", "Low", "Close", "AdjClose", "Volume",
            ],
            ColumnLayout::IsoDate => &[
                "Date", "Open", "High", "Low", "Close", "AdjClose", "Volume",
            ],
        }
    }
}

impl FromStr for ColumnLayout {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "split-date" | "split" => Ok(ColumnLayout::SplitDate),
            "iso-date" | "iso" => Ok(ColumnLayout::IsoDate),
            other => Err(DataError::Config(format!(
                "unknown layout '{other}'. Valid: split-date, iso-date"
            ))),
        }
    }
}

/// Delimited text codec built on the `csv` crate.
#[derive(Debug, Clone)]
pub struct DelimitedCodec {
    delimiter: Delimiter,
    layout: ColumnLayout,
    normalizer: DateNormalizer,
}

impl DelimitedCodec {
    pub fn new(delimiter: Delimiter, layout: ColumnLayout) -> Self {
        Self {
            delimiter,
            layout,
            normalizer: DateNormalizer::default(),
        }
    }

    /// The tab-separated split-date history file.
    pub fn tsv() -> Self {
        Self::new(Delimiter::Tab, ColumnLayout::SplitDate)
    }

    pub fn pipe() -> Self {
        Self::new(Delimiter::Pipe, ColumnLayout::SplitDate)
    }

    pub fn csv() -> Self {
        Self::new(Delimiter::Comma, ColumnLayout::IsoDate)
    }

    /// Zone used to reduce datetime cells to calendar dates.
    pub fn with_normalizer(mut self, normalizer: DateNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn delimiter(&self) -> Delimiter {
        self.delimiter
    }

    pub fn layout(&self) -> ColumnLayout {
        self.layout
    }
}

/// Column positions resolved from a header row.
struct Columns {
    date: DateColumns,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    adj_close: Option<usize>,
    volume: usize,
}

enum DateColumns {
    Split { month: usize, day: usize, year: usize },
    Single(usize),
}

/// Lowercase and drop separators so `Adj Close`, `adj_close`, `AdjClose` match.
fn header_key(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

impl Columns {
    fn resolve(headers: &csv::StringRecord, layout: ColumnLayout) -> Result<Self, DataError> {
        let keys: Vec<String> = headers.iter().map(header_key).collect();
        let find = |name: &str| keys.iter().position(|k| k == name);
        let require = |name: &str| {
            find(name).ok_or_else(|| DataError::malformed(None, format!("missing column '{name}'")))
        };

        let date = match layout {
            ColumnLayout::SplitDate => DateColumns::Split {
                month: require("month")?,
                day: require("day")?,
                year: require("year")?,
            },
            ColumnLayout::IsoDate => DateColumns::Single(require("date")?),
        };

        Ok(Self {
            date,
            open: require("open")?,
            high: require("high")?,
            low: require("low")?,
            close: require("close")?,
            adj_close: find("adjclose"),
            volume: require("volume")?,
        })
    }
}

fn cell(record: &csv::StringRecord, idx: usize) -> Option<&str> {
    record.get(idx).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_price(text: Option<&str>, date: NaiveDate, name: &str) -> Result<Option<Decimal>, DataError> {
    let Some(text) = text else {
        return Ok(None);
    };
    let cleaned: String = text.chars().filter(|c| *c != ',').collect();
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .map(Some)
        .map_err(|_| DataError::malformed(Some(date), format!("{name} is not a number: {text:?}")))
}

impl DelimitedCodec {
    fn parse_date(&self, record: &csv::StringRecord, date: &DateColumns) -> Result<NaiveDate, DataError> {
        let missing = || DataError::malformed(None, "missing date");
        match *date {
            DateColumns::Split { month, day, year } => self.normalizer.parse_month_day_year(
                cell(record, month).ok_or_else(missing)?,
                cell(record, day).ok_or_else(missing)?,
                cell(record, year).ok_or_else(missing)?,
            ),
            DateColumns::Single(idx) => self.normalizer.parse(cell(record, idx).ok_or_else(missing)?),
        }
    }
}

impl TableCodec for DelimitedCodec {
    fn parse(&self, text: &str) -> Result<Vec<RawBar>, DataError> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(self.delimiter.byte())
            .has_headers(true)
            .from_reader(text.as_bytes());

        let columns = Columns::resolve(rdr.headers()?, self.layout)?;
        let mut bars = Vec::new();

        for record in rdr.records() {
            let record = record?;
            let date = self.parse_date(&record, &columns.date)?;
            bars.push(RawBar {
                date,
                open: parse_price(cell(&record, columns.open), date, "open")?,
                high: parse_price(cell(&record, columns.high), date, "high")?,
                low: parse_price(cell(&record, columns.low), date, "low")?,
                close: parse_price(cell(&record, columns.close), date, "close")?,
                adj_close: match columns.adj_close {
                    Some(idx) => parse_price(cell(&record, idx), date, "adj close")?,
                    None => None,
                },
                volume: cell(&record, columns.volume).map(|v| RawVolume::Text(v.to_string())),
            });
        }

        Ok(bars)
    }

    fn format(&self, bars: &[Bar]) -> Result<String, DataError> {
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(self.delimiter.byte())
            .from_writer(vec![]);

        wtr.write_record(self.layout.header())?;

        for b in bars {
            let prices = [
                b.open.to_string(),
                b.high.to_string(),
                b.low.to_string(),
                b.close.to_string(),
                b.adj_close.to_string(),
                b.volume.to_string(),
            ];
            match self.layout {
                ColumnLayout::SplitDate => {
                    let date = [
                        b.date.format("%b").to_string(),
                        b.date.day().to_string(),
                        b.date.year().to_string(),
                    ];
                    wtr.write_record(date.iter().chain(prices.iter()))?;
                }
                ColumnLayout::IsoDate => {
                    let date = [b.date.format("%Y-%m-%d").to_string()];
                    wtr.write_record(date.iter().chain(prices.iter()))?;
                }
            }
        }

        let data = wtr
            .into_inner()
            .map_err(|e| DataError::Other(format!("failed to flush table writer: {e}")))?;
        String::from_utf8(data).map_err(|e| DataError::Other(format!("table output is not UTF-8: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TSV: &str = "Month\tDay\tYear\tOpen\tHigh\tLow\tClose\tAdjClose\tVolume\n\
                       Jan\t6\t2024\t101.5\t104\t100.25\t102\t102\t\"1,234,567\"\n\
                       Jan\t5\t2024\t100\t102.5\t99\t101.5\t101.5\t987654\n";

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn parses_split_date_tsv() {
        let bars = DelimitedCodec::tsv().parse(TSV).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, d(6));
        assert_eq!(bars[0].low, Some(Decimal::new(10025, 2)));
        let first = bars[0].validate().unwrap();
        assert_eq!(first.volume, 1_234_567);
    }

    #[test]
    fn header_lookup_ignores_order_and_spelling() {
        let text = "date,volume,close,adj close,low,high,open\n2024-01-05,10,3,3,1,4,2\n";
        let bars = DelimitedCodec::csv().parse(text).unwrap();
        let bar = bars[0].validate().unwrap();
        assert_eq!(bar.open, Decimal::new(2, 0));
        assert_eq!(bar.high, Decimal::new(4, 0));
        assert_eq!(bar.volume, 10);
    }

    #[test]
    fn missing_adj_close_column_is_allowed() {
        let text = "Date|Open|High|Low|Close|Volume\n2024-01-05|1|2|0.5|1.5|7\n";
        let codec = DelimitedCodec::new(Delimiter::Pipe, ColumnLayout::IsoDate);
        let bar = codec.parse(text).unwrap()[0].validate().unwrap();
        assert_eq!(bar.adj_close, bar.close);
    }

    #[test]
    fn missing_required_column_is_malformed() {
        let text = "Date,Open,High,Low,Volume\n2024-01-05,1,2,0.5,7\n";
        assert!(matches!(
            DelimitedCodec::csv().parse(text),
            Err(DataError::MalformedBar { .. })
        ));
    }

    #[test]
    fn empty_cell_becomes_missing_field() {
        let text = "Date,Open,High,Low,Close,Volume\n2024-01-05,1,2,,1.5,7\n";
        let bars = DelimitedCodec::csv().parse(text).unwrap();
        assert_eq!(bars[0].low, None);
        assert!(bars[0].validate().is_err());
    }

    #[test]
    fn bad_date_is_a_normalization_error() {
        let text = "Date,Open,High,Low,Close,Volume\nsoon,1,2,1,1.5,7\n";
        assert!(matches!(
            DelimitedCodec::csv().parse(text),
            Err(DataError::DateNormalization(_))
        ));
    }

    #[test]
    fn format_then_parse_is_lossless() {
        let codec = DelimitedCodec::tsv();
        let bars: Vec<Bar> = codec
            .parse(TSV)
            .unwrap()
            .iter()
            .map(|r| r.validate().unwrap())
            .collect();

        let text = codec.format(&bars).unwrap();
        assert!(text.starts_with("Month\tDay\tYear\tOpen"));
        assert!(text.contains("Jan\t6\t2024\t101.5\t104\t100.25\t102\t102\t1234567"));

        let back: Vec<Bar> = codec
            .parse(&text)
            .unwrap()
            .iter()
            .map(|r| r.validate().unwrap())
            .collect();
        assert_eq!(back, bars);
    }

    #[test]
    fn delimiter_and_layout_parse_from_names() {
        assert_eq!("pipe".parse::<Delimiter>().unwrap(), Delimiter::Pipe);
        assert_eq!("TSV".parse::<Delimiter>().unwrap(), Delimiter::Tab);
        assert_eq!("iso-date".parse::<ColumnLayout>().unwrap(), ColumnLayout::IsoDate);
        assert!("semicolon".parse::<Delimiter>().is_err());
    }
}
