//! Volume normalization.
//!
//! Providers and older table files disagree on how volume is written:
//! plain integers, integers with thousands separators (`1,234,567`), or
//! dataframe-style floats (`1234567.0`). Everything is reduced to a `u64`
//! before it is compared or stored.

use crate::error::DataError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Parse a formatted volume string into an integer share/unit count.
pub fn normalize_volume(text: &str) -> Result<u64, DataError> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '_' | ' '))
        .collect();

    if cleaned.is_empty() {
        return Err(DataError::malformed(None, "volume is empty"));
    }

    if let Ok(v) = cleaned.parse::<u64>() {
        return Ok(v);
    }

    let value = Decimal::from_str(&cleaned)
        .map_err(|_| DataError::malformed(None, format!("volume is not a number: {text:?}")))?;
    if value.is_sign_negative() && !value.is_zero() {
        return Err(DataError::malformed(None, format!("negative volume: {text}")));
    }
    if !value.fract().is_zero() {
        return Err(DataError::malformed(None, format!("fractional volume: {text}")));
    }
    value
        .to_u64()
        .ok_or_else(|| DataError::malformed(None, format!("volume out of range: {text}")))
}

/// Convert a signed count from a provider into a volume.
pub fn checked_volume(count: i64) -> Result<u64, DataError> {
    u64::try_from(count).map_err(|_| DataError::malformed(None, format!("negative volume: {count}")))
}
