//! Equality and ordering, including the numeric cross-type total order.
//!
//! Relational comparisons between `int`, `uint` and `double` behave as if
//! both operands were embedded into the rationals: a uint beyond
//! `int64::MAX` is greater than every int, and `NaN` orders with nothing.

use std::cmp::Ordering;

use crate::values::{EvalError, Value};

/// CEL ordering. `None` for incomparable values (including any `NaN`).
pub fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Int(left), Value::Int(right)) => Some(left.cmp(right)),
        (Value::Uint(left), Value::Uint(right)) => Some(left.cmp(right)),
        (Value::Double(left), Value::Double(right)) => left.partial_cmp(right),

        (Value::Int(left), Value::Uint(right)) => Some(compare_int_uint(*left, *right)),
        (Value::Uint(left), Value::Int(right)) => {
            Some(compare_int_uint(*right, *left).reverse())
        }
        (Value::Int(left), Value::Double(right)) => (*left as f64).partial_cmp(right),
        (Value::Double(left), Value::Int(right)) => left.partial_cmp(&(*right as f64)),
        (Value::Uint(left), Value::Double(right)) => (*left as f64).partial_cmp(right),
        (Value::Double(left), Value::Uint(right)) => left.partial_cmp(&(*right as f64)),

        (Value::Bool(left), Value::Bool(right)) => Some(left.cmp(right)),
        (Value::String(left), Value::String(right)) => Some(left.cmp(right)),
        (Value::Bytes(left), Value::Bytes(right)) => Some(left.cmp(right)),
        (Value::Timestamp(left), Value::Timestamp(right)) => Some(left.cmp(right)),
        (Value::Duration(left), Value::Duration(right)) => Some(left.cmp(right)),
        _ => None,
    }
}

fn compare_int_uint(left: i64, right: u64) -> Ordering {
    if left < 0 {
        return Ordering::Less;
    }
    (left as u64).cmp(&right)
}

fn relation(args: &[Value], function: &str, accept: fn(Ordering) -> bool) -> Value {
    let [left, right] = args else {
        return Value::Error(EvalError::overload_not_found(function));
    };
    match compare(left, right) {
        Some(ordering) => Value::Bool(accept(ordering)),
        // NaN (and incomparable types) fail every relational comparison.
        None if nan_involved(left, right) => Value::Bool(false),
        None => Value::Error(EvalError::overload_not_found(function)),
    }
}

fn nan_involved(left: &Value, right: &Value) -> bool {
    matches!(left, Value::Double(value) if value.is_nan())
        || matches!(right, Value::Double(value) if value.is_nan())
}

pub fn less(args: &[Value]) -> Value {
    relation(args, "_<_", Ordering::is_lt)
}

pub fn less_equals(args: &[Value]) -> Value {
    relation(args, "_<=_", Ordering::is_le)
}

pub fn greater(args: &[Value]) -> Value {
    relation(args, "_>_", Ordering::is_gt)
}

pub fn greater_equals(args: &[Value]) -> Value {
    relation(args, "_>=_", Ordering::is_ge)
}

pub fn equals(args: &[Value]) -> Value {
    let [left, right] = args else {
        return Value::Error(EvalError::overload_not_found("_==_"));
    };
    Value::Bool(left == right)
}

pub fn not_equals(args: &[Value]) -> Value {
    let [left, right] = args else {
        return Value::Error(EvalError::overload_not_found("_!=_"));
    };
    Value::Bool(left != right)
}

/// `@in` containment on lists and maps.
pub fn contained_in(args: &[Value]) -> Value {
    match args {
        [needle, Value::List(elements)] => {
            Value::Bool(elements.iter().any(|element| element == needle))
        }
        [needle, Value::Map(map)] => Value::Bool(map.contains_key(needle)),
        _ => Value::Error(EvalError::overload_not_found("@in")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_uint_total_order() {
        // A uint beyond int64::MAX is greater than any int.
        let huge = Value::Uint(u64::MAX);
        assert_eq!(less(&[Value::Int(i64::MAX), huge.clone()]), Value::Bool(true));
        assert_eq!(less(&[Value::Int(-1), Value::Uint(0)]), Value::Bool(true));
        assert_eq!(greater(&[huge, Value::Int(5)]), Value::Bool(true));
    }

    #[test]
    fn test_nan_fails_every_relation() {
        let nan = Value::Double(f64::NAN);
        assert_eq!(less(&[nan.clone(), Value::Double(1.0)]), Value::Bool(false));
        assert_eq!(
            greater_equals(&[nan.clone(), nan.clone()]),
            Value::Bool(false)
        );
        assert_eq!(equals(&[nan.clone(), nan]), Value::Bool(false));
    }

    #[test]
    fn test_cross_type_equality() {
        assert_eq!(equals(&[Value::Int(2), Value::Uint(2)]), Value::Bool(true));
        assert_eq!(
            equals(&[Value::Double(2.0), Value::Int(2)]),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_in_list_and_map() {
        let list = Value::List(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(contained_in(&[Value::Int(2), list]), Value::Bool(true));

        let map: crate::values::MapValue =
            vec![(Value::string("a"), Value::Int(1))].into_iter().collect();
        assert_eq!(
            contained_in(&[Value::string("a"), Value::Map(map)]),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_incomparable_types_error() {
        assert!(less(&[Value::string("a"), Value::Int(1)]).is_error());
    }
}
