//! Type conversion functions. Numeric conversions reject overflow instead of
//! saturating or wrapping.

use crate::values::{time, EvalError, Value};

fn no_such_overload(function: &str, args: &[Value]) -> Value {
    let rendered = args
        .iter()
        .map(|arg| arg.type_of().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    Value::Error(EvalError::overload_not_found(&format!(
        "{function}' applied to '({rendered})"
    )))
}

pub fn to_int(args: &[Value]) -> Value {
    match args {
        [Value::Int(value)] => Value::Int(*value),
        [Value::Uint(value)] => {
            if *value > i64::MAX as u64 {
                return Value::Error(EvalError::numeric_overflow());
            }
            Value::Int(*value as i64)
        }
        [Value::Double(value)] => {
            // Reject conversions whose truncation falls outside the range.
            if value.is_nan() || *value >= 9.223372036854776e18 || *value < -9.223372036854776e18 {
                return Value::Error(EvalError::numeric_overflow());
            }
            Value::Int(value.trunc() as i64)
        }
        [Value::String(text)] => match text.parse::<i64>() {
            Ok(value) => Value::Int(value),
            Err(_) => Value::Error(EvalError::bad_format(format!(
                "cannot convert string to int: {text:?}"
            ))),
        },
        [Value::Timestamp(ts)] => Value::Int(ts.timestamp()),
        [Value::Duration(duration)] => Value::Int(duration.num_seconds()),
        _ => no_such_overload("int", args),
    }
}

pub fn to_uint(args: &[Value]) -> Value {
    match args {
        [Value::Uint(value)] => Value::Uint(*value),
        [Value::Int(value)] => {
            if *value < 0 {
                return Value::Error(EvalError::numeric_overflow());
            }
            Value::Uint(*value as u64)
        }
        [Value::Double(value)] => {
            if value.is_nan() || *value >= 1.8446744073709552e19 || *value < 0.0 {
                return Value::Error(EvalError::numeric_overflow());
            }
            Value::Uint(value.trunc() as u64)
        }
        [Value::String(text)] => match text.parse::<u64>() {
            Ok(value) => Value::Uint(value),
            Err(_) => Value::Error(EvalError::bad_format(format!(
                "cannot convert string to uint: {text:?}"
            ))),
        },
        _ => no_such_overload("uint", args),
    }
}

pub fn to_double(args: &[Value]) -> Value {
    match args {
        [Value::Double(value)] => Value::Double(*value),
        [Value::Int(value)] => Value::Double(*value as f64),
        [Value::Uint(value)] => Value::Double(*value as f64),
        [Value::String(text)] => match text.parse::<f64>() {
            Ok(value) => Value::Double(value),
            Err(_) => Value::Error(EvalError::bad_format(format!(
                "cannot convert string to double: {text:?}"
            ))),
        },
        _ => no_such_overload("double", args),
    }
}

pub fn to_string_fn(args: &[Value]) -> Value {
    match args {
        [Value::String(text)] => Value::String(text.clone()),
        [Value::Int(value)] => Value::String(value.to_string()),
        [Value::Uint(value)] => Value::String(value.to_string()),
        [Value::Double(value)] => Value::String(value.to_string()),
        [Value::Bool(value)] => Value::String(value.to_string()),
        [Value::Bytes(bytes)] => match String::from_utf8(bytes.clone()) {
            Ok(text) => Value::String(text),
            Err(_) => Value::Error(EvalError::bad_format(
                "bytes are not valid UTF-8".to_string(),
            )),
        },
        [Value::Timestamp(ts)] => Value::String(time::format_timestamp(ts)),
        [Value::Duration(duration)] => Value::String(time::format_duration(duration)),
        _ => no_such_overload("string", args),
    }
}

pub fn to_bytes(args: &[Value]) -> Value {
    match args {
        [Value::Bytes(bytes)] => Value::Bytes(bytes.clone()),
        [Value::String(text)] => Value::Bytes(text.clone().into_bytes()),
        _ => no_such_overload("bytes", args),
    }
}

pub fn to_bool(args: &[Value]) -> Value {
    match args {
        [Value::Bool(value)] => Value::Bool(*value),
        [Value::String(text)] => match text.as_str() {
            "true" | "TRUE" | "True" | "t" | "1" => Value::Bool(true),
            "false" | "FALSE" | "False" | "f" | "0" => Value::Bool(false),
            _ => Value::Error(EvalError::bad_format(format!(
                "cannot convert string to bool: {text:?}"
            ))),
        },
        _ => no_such_overload("bool", args),
    }
}

pub fn to_timestamp(args: &[Value]) -> Value {
    match args {
        [Value::Timestamp(ts)] => Value::Timestamp(*ts),
        [Value::String(text)] => match time::parse_timestamp(text) {
            Ok(ts) => Value::Timestamp(ts),
            Err(error) => Value::Error(error),
        },
        [Value::Int(seconds)] => match chrono::DateTime::from_timestamp(*seconds, 0) {
            Some(ts) => match time::validate_timestamp(ts) {
                Ok(ts) => Value::Timestamp(ts),
                Err(error) => Value::Error(error),
            },
            None => Value::Error(EvalError::numeric_overflow()),
        },
        _ => no_such_overload("timestamp", args),
    }
}

pub fn to_duration(args: &[Value]) -> Value {
    match args {
        [Value::Duration(duration)] => Value::Duration(*duration),
        [Value::String(text)] => match time::parse_duration(text) {
            Ok(duration) => Value::Duration(duration),
            Err(error) => Value::Error(error),
        },
        [Value::Int(seconds)] => match time::checked_duration(chrono::Duration::seconds(*seconds))
        {
            Ok(duration) => Value::Duration(duration),
            Err(error) => Value::Error(error),
        },
        _ => no_such_overload("duration", args),
    }
}

pub fn to_dyn(args: &[Value]) -> Value {
    match args {
        [value] => value.clone(),
        _ => no_such_overload("dyn", args),
    }
}

pub fn to_type(args: &[Value]) -> Value {
    match args {
        [value] => Value::Type(value.type_of()),
        _ => no_such_overload("type", args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_conversions_check_range() {
        assert_eq!(to_int(&[Value::Uint(7)]), Value::Int(7));
        assert!(to_int(&[Value::Uint(u64::MAX)]).is_error());
        assert!(to_uint(&[Value::Int(-1)]).is_error());
        assert!(to_int(&[Value::Double(f64::NAN)]).is_error());
        assert_eq!(to_int(&[Value::Double(3.9)]), Value::Int(3));
    }

    #[test]
    fn test_string_round_trips() {
        assert_eq!(to_int(&[Value::string("-42")]), Value::Int(-42));
        assert_eq!(to_string_fn(&[Value::Int(-42)]), Value::string("-42"));
        assert!(to_int(&[Value::string("forty")]).is_error());
    }

    #[test]
    fn test_timestamp_conversion() {
        let ts = to_timestamp(&[Value::string("2023-01-10T12:00:00Z")]);
        let Value::Timestamp(ts) = ts else {
            panic!("expected timestamp");
        };
        assert_eq!(to_int(&[Value::Timestamp(ts)]), Value::Int(1673352000));
    }

    #[test]
    fn test_duration_conversion() {
        let duration = to_duration(&[Value::string("1h30m")]);
        let Value::Duration(duration) = duration else {
            panic!("expected duration");
        };
        assert_eq!(duration.num_minutes(), 90);
        assert_eq!(
            to_string_fn(&[Value::Duration(duration)]),
            Value::string("5400s")
        );
    }

    #[test]
    fn test_type_conversion() {
        assert_eq!(
            to_type(&[Value::Int(1)]),
            Value::Type(crate::types::CelType::Int)
        );
    }
}
