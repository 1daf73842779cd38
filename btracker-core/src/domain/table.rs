//! Table — the deduplicated, sorted history of bars for one instrument.

use super::bar::{Bar, RawBar};
use crate::error::DataError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction a table is kept in. Fixed when the table is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    /// Most recent bar first, as the tracked history file is kept.
    #[default]
    NewestFirst,
    OldestFirst,
}

impl SortOrder {
    /// True if `a` must come strictly before `b` in this order.
    fn precedes(self, a: NaiveDate, b: NaiveDate) -> bool {
        match self {
            SortOrder::NewestFirst => a > b,
            SortOrder::OldestFirst => a < b,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            SortOrder::NewestFirst => "newest-first",
            SortOrder::OldestFirst => "oldest-first",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Ordered bars with no two sharing a date.
///
/// Invariants, checked by [`Table::new`]:
/// - no duplicate `date`
/// - dates strictly monotonic in [`Table::order`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    bars: Vec<Bar>,
    order: SortOrder,
}

impl Table {
    pub fn new(bars: Vec<Bar>, order: SortOrder) -> Result<Self, DataError> {
        for pair in bars.windows(2) {
            let (prev, next) = (pair[0].date, pair[1].date);
            if prev == next {
                return Err(DataError::DuplicateDate(next));
            }
            if !order.precedes(prev, next) {
                return Err(DataError::UnorderedTable {
                    expected: order.describe(),
                    previous: prev,
                    next,
                });
            }
        }
        Ok(Self { bars, order })
    }

    /// Build from bars held oldest-to-newest with unique dates.
    pub(crate) fn from_ascending(mut bars: Vec<Bar>, order: SortOrder) -> Self {
        debug_assert!(bars.windows(2).all(|w| w[0].date < w[1].date));
        if order == SortOrder::NewestFirst {
            bars.reverse();
        }
        Self { bars, order }
    }

    /// Bars oldest-to-newest regardless of the table's order.
    pub(crate) fn to_ascending(&self) -> Vec<Bar> {
        let mut bars = self.bars.clone();
        if self.order == SortOrder::NewestFirst {
            bars.reverse();
        }
        bars
    }

    pub fn empty(order: SortOrder) -> Self {
        Self {
            bars: Vec::new(),
            order,
        }
    }

    /// Bars in table order.
    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn order(&self) -> SortOrder {
        self.order
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn newest(&self) -> Option<&Bar> {
        match self.order {
            SortOrder::NewestFirst => self.bars.first(),
            SortOrder::OldestFirst => self.bars.last(),
        }
    }

    pub fn oldest(&self) -> Option<&Bar> {
        match self.order {
            SortOrder::NewestFirst => self.bars.last(),
            SortOrder::OldestFirst => self.bars.first(),
        }
    }

    /// `(oldest, newest)` dates, or `None` for an empty table.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((self.oldest()?.date, self.newest()?.date))
    }

    pub fn get(&self, date: NaiveDate) -> Option<&Bar> {
        let found = match self.order {
            SortOrder::OldestFirst => self.bars.binary_search_by(|b| b.date.cmp(&date)),
            SortOrder::NewestFirst => self.bars.binary_search_by(|b| date.cmp(&b.date)),
        };
        found.ok().map(|i| &self.bars[i])
    }

    pub fn into_bars(self) -> Vec<Bar> {
        self.bars
    }
}

/// A freshly fetched, possibly overlapping run of bars for one symbol.
///
/// Bars are normally oldest-to-newest, as market-data APIs return them, and
/// are still unvalidated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchWindow {
    pub symbol: String,
    pub bars: Vec<RawBar>,
}

impl FetchWindow {
    pub fn new(symbol: impl Into<String>, bars: Vec<RawBar>) -> Self {
        Self {
            symbol: symbol.into(),
            bars,
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}
