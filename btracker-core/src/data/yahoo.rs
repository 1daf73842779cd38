//! Yahoo Finance data provider.
//!
//! Fetches daily OHLCV bars from Yahoo's v8 chart API. Bar timestamps are
//! reduced to calendar dates in the exchange's own zone (or a configured
//! override), so a bar stamped late in the evening UTC lands on the trading
//! day it belongs to.
//!
//! One request per call. A failed request is reported, not retried.

use super::normalize::DateNormalizer;
use super::provider::DataProvider;
use crate::domain::{FetchWindow, RawBar, RawVolume};
use crate::error::DataError;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_BASE_URL: &str = "https://query2.finance.yahoo.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    exchange_timezone_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<i64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

/// Yahoo Finance data provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    base_url: String,
    tz_override: Option<DateNormalizer>,
}

impl YahooProvider {
    pub fn new() -> Result<Self, DataError> {
        Self::with_options(DEFAULT_BASE_URL, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_options(base_url: &str, timeout: Duration) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            tz_override: None,
        })
    }

    /// Normalize dates in this zone instead of the exchange's.
    pub fn with_timezone(mut self, normalizer: DateNormalizer) -> Self {
        self.tz_override = Some(normalizer);
        self
    }

    /// Build the chart API URL for a symbol and trailing range.
    fn chart_url(&self, symbol: &str, lookback_days: u32) -> String {
        format!(
            "{}/v8/finance/chart/{symbol}?range={lookback_days}d&interval=1d&includeAdjustedClose=true",
            self.base_url
        )
    }

    /// Parse a chart API body into RawBars, normalizing dates.
    fn parse_response(
        symbol: &str,
        body: &str,
        tz_override: Option<DateNormalizer>,
    ) -> Result<Vec<RawBar>, DataError> {
        let resp: ChartResponse = serde_json::from_str(body).map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
        })?;

        let result = resp.chart.result.ok_or_else(|| {
            if let Some(err) = resp.chart.error {
                if err.code == "Not Found" {
                    DataError::SymbolNotFound {
                        symbol: symbol.to_string(),
                    }
                } else {
                    DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
                }
            } else {
                DataError::ResponseFormatChanged("empty result with no error".into())
            }
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;

        let normalizer = match tz_override {
            Some(n) => n,
            None => match data.meta.and_then(|m| m.exchange_timezone_name) {
                Some(name) => DateNormalizer::from_tz_name(&name)?,
                None => {
                    warn!(symbol, "response has no exchange time zone, using UTC");
                    DateNormalizer::default()
                }
            },
        };

        // An empty range comes back with no timestamp array at all.
        let Some(timestamps) = data.timestamp else {
            return Ok(Vec::new());
        };

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

        let adj_closes = data
            .indicators
            .adjclose
            .and_then(|v| v.into_iter().next())
            .map(|a| a.adjclose);

        let mut bars = Vec::with_capacity(timestamps.len());

        for (i, &ts) in timestamps.iter().enumerate() {
            let date = normalizer.date_from_timestamp(ts)?;

            let open = price_at(&quote.open, i)?;
            let high = price_at(&quote.high, i)?;
            let low = price_at(&quote.low, i)?;
            let close = price_at(&quote.close, i)?;
            let volume = quote.volume.get(i).copied().flatten();
            let adj_close = match &adj_closes {
                Some(v) => price_at(v, i)?,
                None => None,
            };

            // Holidays and non-trading days come back with every field null
            if open.is_none()
                && high.is_none()
                && low.is_none()
                && close.is_none()
                && volume.is_none()
            {
                debug!(symbol, %date, "dropping empty row");
                continue;
            }

            bars.push(RawBar {
                date,
                open,
                high,
                low,
                close,
                adj_close,
                volume: volume.map(RawVolume::Count),
            });
        }

        Ok(bars)
    }
}

fn price_at(values: &[Option<f64>], i: usize) -> Result<Option<Decimal>, DataError> {
    values
        .get(i)
        .copied()
        .flatten()
        .map(|f| {
            Decimal::from_f64(f).ok_or_else(|| {
                DataError::ResponseFormatChanged(format!("price {f} not representable"))
            })
        })
        .transpose()
}

impl DataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch_daily_bars(&self, symbol: &str, lookback_days: u32) -> Result<FetchWindow, DataError> {
        let url = self.chart_url(symbol, lookback_days);
        debug!(%url, "requesting chart");

        let resp = self.client.get(&url).send().map_err(|e| {
            DataError::NetworkUnreachable(e.to_string())
        })?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(DataError::AuthenticationRequired(
                "Yahoo Finance requires authentication".into(),
            ));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(DataError::RateLimited {
                retry_after_secs: retry_after,
            });
        }
        if !status.is_success() {
            return Err(DataError::Other(format!("HTTP {status} for {symbol}")));
        }

        let body = resp
            .text()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;
        let bars = Self::parse_response(symbol, &body, self.tz_override)?;
        info!(symbol, lookback_days, bars = bars.len(), "fetched daily bars");

        Ok(FetchWindow::new(symbol, bars))
    }
}
