//! Timestamp and duration semantics.
//!
//! Timestamps follow protobuf semantics (seconds + nanos since the Unix
//! epoch, year range 0001..9999); durations are capped at ±10,000 years.
//! Text forms are RFC-3339 for timestamps and the Go duration syntax
//! (`1h2m3.5s`) for durations.

use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, FixedOffset, Offset, TimeZone, Utc};
use chrono_tz::Tz;

use super::error::{EvalError, EvalResult};

/// Seconds of `0001-01-01T00:00:00Z`.
const MIN_TIMESTAMP_SECONDS: i64 = -62_135_596_800;
/// Seconds of `9999-12-31T23:59:59Z`.
const MAX_TIMESTAMP_SECONDS: i64 = 253_402_300_799;
/// Protobuf duration bound: ±10,000 years.
const MAX_DURATION_SECONDS: i64 = 315_576_000_000;

pub fn parse_timestamp(text: &str) -> EvalResult<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(text).map_err(|_| {
        EvalError::bad_format(format!(
            "Failed to parse timestamp: invalid timestamp \"{text}\""
        ))
    })?;

    let utc = parsed.with_timezone(&Utc);
    validate_timestamp(utc)
}

pub fn validate_timestamp(ts: DateTime<Utc>) -> EvalResult<DateTime<Utc>> {
    let seconds = ts.timestamp();
    if !(MIN_TIMESTAMP_SECONDS..=MAX_TIMESTAMP_SECONDS).contains(&seconds) {
        return Err(EvalError::bad_format(format!(
            "timestamp out of range: year {}",
            ts.year()
        )));
    }
    Ok(ts)
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)
}

/// Go-style duration syntax: an optional sign followed by one or more
/// `<decimal><unit>` groups with units `ns`, `us`/`µs`, `ms`, `s`, `m`, `h`.
pub fn parse_duration(text: &str) -> EvalResult<Duration> {
    let bad = || {
        EvalError::bad_format(format!(
            "Failed to parse duration: invalid duration \"{text}\""
        ))
    };

    let mut rest = text;
    let negative = match rest.chars().next() {
        Some('-') => {
            rest = &rest[1..];
            true
        }
        Some('+') => {
            rest = &rest[1..];
            false
        }
        _ => false,
    };

    if rest == "0" {
        return Ok(Duration::zero());
    }
    if rest.is_empty() {
        return Err(bad());
    }

    let mut total_nanos: i128 = 0;
    while !rest.is_empty() {
        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .ok_or_else(bad)?;
        if digits_end == 0 {
            return Err(bad());
        }
        let (number, after_number) = rest.split_at(digits_end);
        let value = f64::from_str(number).map_err(|_| bad())?;

        let (unit_nanos, after_unit) = if let Some(tail) = after_number.strip_prefix("ns") {
            (1f64, tail)
        } else if let Some(tail) = after_number.strip_prefix("us") {
            (1_000f64, tail)
        } else if let Some(tail) = after_number.strip_prefix("µs") {
            (1_000f64, tail)
        } else if let Some(tail) = after_number.strip_prefix("ms") {
            (1_000_000f64, tail)
        } else if let Some(tail) = after_number.strip_prefix('s') {
            (1_000_000_000f64, tail)
        } else if let Some(tail) = after_number.strip_prefix('m') {
            (60f64 * 1_000_000_000f64, tail)
        } else if let Some(tail) = after_number.strip_prefix('h') {
            (3_600f64 * 1_000_000_000f64, tail)
        } else {
            return Err(bad());
        };

        total_nanos += (value * unit_nanos) as i128;
        rest = after_unit;
    }

    if negative {
        total_nanos = -total_nanos;
    }

    let max_nanos = MAX_DURATION_SECONDS as i128 * 1_000_000_000;
    if total_nanos.abs() > max_nanos {
        return Err(EvalError::new(
            super::error::ErrorKind::NumericOverflow,
            format!("duration out of range: \"{text}\""),
        ));
    }

    Ok(Duration::nanoseconds(total_nanos as i64))
}

/// Durations print as fractional seconds, e.g. `3.5s` or `-7506s`.
pub fn format_duration(duration: &Duration) -> String {
    let nanos = duration.num_nanoseconds().unwrap_or_else(|| {
        // Outside i64 nanos the sub-second part is irrelevant.
        duration.num_seconds().saturating_mul(1_000_000_000)
    });

    let seconds = nanos / 1_000_000_000;
    let fraction = (nanos % 1_000_000_000).unsigned_abs();
    if fraction == 0 {
        return format!("{seconds}s");
    }

    let sign = if nanos < 0 && seconds == 0 { "-" } else { "" };
    let digits = format!("{fraction:09}");
    let digits = digits.trim_end_matches('0');
    format!("{sign}{seconds}.{digits}s")
}

pub fn checked_duration(duration: Duration) -> EvalResult<Duration> {
    if duration.num_seconds().abs() > MAX_DURATION_SECONDS {
        return Err(EvalError::numeric_overflow());
    }
    Ok(duration)
}

pub fn add_timestamp_duration(ts: DateTime<Utc>, d: Duration) -> EvalResult<DateTime<Utc>> {
    ts.checked_add_signed(d)
        .ok_or_else(EvalError::numeric_overflow)
        .and_then(validate_timestamp)
}

pub fn sub_timestamp_duration(ts: DateTime<Utc>, d: Duration) -> EvalResult<DateTime<Utc>> {
    ts.checked_sub_signed(d)
        .ok_or_else(EvalError::numeric_overflow)
        .and_then(validate_timestamp)
}

pub fn sub_timestamps(left: DateTime<Utc>, right: DateTime<Utc>) -> EvalResult<Duration> {
    checked_duration(left.signed_duration_since(right))
}

pub fn add_durations(left: Duration, right: Duration) -> EvalResult<Duration> {
    left.checked_add(&right)
        .ok_or_else(EvalError::numeric_overflow)
        .and_then(checked_duration)
}

pub fn sub_durations(left: Duration, right: Duration) -> EvalResult<Duration> {
    left.checked_sub(&right)
        .ok_or_else(EvalError::numeric_overflow)
        .and_then(checked_duration)
}

pub fn negate_duration(duration: Duration) -> EvalResult<Duration> {
    Duration::zero()
        .checked_sub(&duration)
        .ok_or_else(EvalError::numeric_overflow)
}

/// Resolve a time-zone argument: empty/`UTC`, a fixed `(+|-)HH:MM` offset, or
/// an IANA name such as `America/New_York`. Named zones are resolved to the
/// fixed offset in effect at the given instant.
pub fn resolve_zone(name: &str, at: &DateTime<Utc>) -> EvalResult<FixedOffset> {
    if name.is_empty() || name == "UTC" || name == "Z" {
        return Ok(FixedOffset::east_opt(0).unwrap());
    }

    if name.starts_with('+') || name.starts_with('-') {
        return parse_fixed_offset(name)
            .ok_or_else(|| EvalError::invalid_argument(format!("invalid time zone: {name}")));
    }

    let tz = Tz::from_str(name)
        .map_err(|_| EvalError::invalid_argument(format!("invalid time zone: {name}")))?;
    Ok(tz.offset_from_utc_datetime(&at.naive_utc()).fix())
}

fn parse_fixed_offset(name: &str) -> Option<FixedOffset> {
    let (sign, rest) = name.split_at(1);
    let (hours, minutes) = rest.split_once(':')?;
    let hours = hours.parse::<i32>().ok()?;
    let minutes = minutes.parse::<i32>().ok()?;
    if hours > 18 || minutes > 59 {
        return None;
    }

    let seconds = hours * 3600 + minutes * 60;
    let seconds = if sign == "-" { -seconds } else { seconds };
    FixedOffset::east_opt(seconds)
}
