//! Epoch-seconds conversion for recorder timestamps
//!
//! Home Assistant stores `last_updated_ts` as fractional Unix seconds. The
//! integer part is whole seconds, the fractional part is kept to the
//! microsecond. The sink stores `DATETIME(6)`, so anything finer would make a
//! stored watermark compare below the reading it came from.

use chrono::{DateTime, TimeDelta, Timelike, Utc};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TimestampError {
    #[error("invalid float for timestamp: NaN")]
    NotANumber,
    #[error("timestamp {0} is outside the representable range")]
    OutOfRange(f64),
}

/// Convert a nullable epoch-seconds value into a UTC timestamp
///
/// `None` stays `None`. NaN and values chrono cannot represent are errors.
pub fn epoch_to_datetime(value: Option<f64>) -> Result<Option<DateTime<Utc>>, TimestampError> {
    let Some(value) = value else {
        return Ok(None);
    };

    if value.is_nan() {
        return Err(TimestampError::NotANumber);
    }
    if !value.is_finite() || value.abs() >= i64::MAX as f64 {
        return Err(TimestampError::OutOfRange(value));
    }

    let seconds = value.trunc();
    let nanos = ((value - seconds) * 1e9) as i64;

    DateTime::from_timestamp(seconds as i64, 0)
        .and_then(|base| base.checked_add_signed(TimeDelta::nanoseconds(nanos)))
        .and_then(truncate_to_micros)
        .map(Some)
        .ok_or(TimestampError::OutOfRange(value))
}

/// Drop sub-microsecond digits the same way a `DATETIME(6)` write does
fn truncate_to_micros(ts: DateTime<Utc>) -> Option<DateTime<Utc>> {
    ts.with_nanosecond(ts.nanosecond() / 1_000 * 1_000)
}

/// Truncate a timestamp to the start of its wall-clock minute
pub fn minute_bucket(ts: DateTime<Utc>) -> DateTime<Utc> {
    let excess = TimeDelta::seconds(i64::from(ts.second()))
        + TimeDelta::nanoseconds(i64::from(ts.nanosecond()));
    ts - excess
}
