//! Time component accessors with an optional IANA time-zone argument.

use chrono::{Datelike, Timelike};

use crate::values::{time, EvalError, Value};

type Component = fn(&chrono::DateTime<chrono::FixedOffset>) -> i64;

fn timestamp_component(args: &[Value], function: &str, component: Component) -> Value {
    let (ts, zone) = match args {
        [Value::Timestamp(ts)] => (ts, ""),
        [Value::Timestamp(ts), Value::String(zone)] => (ts, zone.as_str()),
        _ => return Value::Error(EvalError::overload_not_found(function)),
    };

    let offset = match time::resolve_zone(zone, ts) {
        Ok(offset) => offset,
        Err(error) => return Value::Error(error),
    };
    let local = ts.with_timezone(&offset);
    Value::Int(component(&local))
}

pub fn get_full_year(args: &[Value]) -> Value {
    timestamp_component(args, "getFullYear", |local| local.year() as i64)
}

/// Months are 0-based, January is 0.
pub fn get_month(args: &[Value]) -> Value {
    timestamp_component(args, "getMonth", |local| local.month0() as i64)
}

/// 0-based day of year.
pub fn get_day_of_year(args: &[Value]) -> Value {
    timestamp_component(args, "getDayOfYear", |local| (local.ordinal0()) as i64)
}

/// 0-based day of month.
pub fn get_day_of_month(args: &[Value]) -> Value {
    timestamp_component(args, "getDayOfMonth", |local| local.day0() as i64)
}

/// 1-based day of month.
pub fn get_date(args: &[Value]) -> Value {
    timestamp_component(args, "getDate", |local| local.day() as i64)
}

/// Days since Sunday, Sunday is 0.
pub fn get_day_of_week(args: &[Value]) -> Value {
    timestamp_component(args, "getDayOfWeek", |local| {
        local.weekday().num_days_from_sunday() as i64
    })
}

pub fn get_hours(args: &[Value]) -> Value {
    // On durations, `getHours` reports the whole-hour count instead.
    if let [Value::Duration(duration)] = args {
        return Value::Int(duration.num_hours());
    }
    timestamp_component(args, "getHours", |local| local.hour() as i64)
}

pub fn get_minutes(args: &[Value]) -> Value {
    if let [Value::Duration(duration)] = args {
        return Value::Int(duration.num_minutes());
    }
    timestamp_component(args, "getMinutes", |local| local.minute() as i64)
}

pub fn get_seconds(args: &[Value]) -> Value {
    if let [Value::Duration(duration)] = args {
        return Value::Int(duration.num_seconds());
    }
    timestamp_component(args, "getSeconds", |local| local.second() as i64)
}

pub fn get_milliseconds(args: &[Value]) -> Value {
    if let [Value::Duration(duration)] = args {
        return Value::Int(duration.num_milliseconds() % 1000);
    }
    timestamp_component(args, "getMilliseconds", |local| {
        (local.nanosecond() / 1_000_000) as i64
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(text: &str) -> Value {
        Value::Timestamp(time::parse_timestamp(text).unwrap())
    }

    #[test]
    fn test_components_in_utc() {
        let value = ts("2023-07-04T10:30:45.123Z");
        assert_eq!(get_full_year(&[value.clone()]), Value::Int(2023));
        assert_eq!(get_month(&[value.clone()]), Value::Int(6));
        assert_eq!(get_date(&[value.clone()]), Value::Int(4));
        assert_eq!(get_day_of_month(&[value.clone()]), Value::Int(3));
        assert_eq!(get_hours(&[value.clone()]), Value::Int(10));
        assert_eq!(get_minutes(&[value.clone()]), Value::Int(30));
        assert_eq!(get_seconds(&[value.clone()]), Value::Int(45));
        assert_eq!(get_milliseconds(&[value.clone()]), Value::Int(123));
        // 2023-07-04 was a Tuesday.
        assert_eq!(get_day_of_week(&[value]), Value::Int(2));
    }

    #[test]
    fn test_components_with_zone() {
        let value = ts("2023-01-01T02:00:00Z");
        // UTC-5 pushes the timestamp into the previous year.
        assert_eq!(
            get_full_year(&[value.clone(), Value::string("America/New_York")]),
            Value::Int(2022)
        );
        assert_eq!(
            get_hours(&[value.clone(), Value::string("+03:00")]),
            Value::Int(5)
        );
        assert!(get_hours(&[value, Value::string("Bad/Zone")]).is_error());
    }

    #[test]
    fn test_duration_components() {
        let duration = Value::Duration(chrono::Duration::seconds(3723));
        assert_eq!(get_hours(&[duration.clone()]), Value::Int(1));
        assert_eq!(get_minutes(&[duration.clone()]), Value::Int(62));
        assert_eq!(get_seconds(&[duration]), Value::Int(3723));
    }
}
