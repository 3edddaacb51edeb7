//! Overflow-checked arithmetic. A wrapping result is a runtime error value,
//! never a wraparound.

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

pub fn add(args: &[Value]) -> Value {
    match args {
        [Value::Int(left), Value::Int(right)] => match left.checked_add(*right) {
            Some(sum) => Value::Int(sum),
            None => Value::Error(EvalError::numeric_overflow()),
        },
        [Value::Uint(left), Value::Uint(right)] => match left.checked_add(*right) {
            Some(sum) => Value::Uint(sum),
            None => Value::Error(EvalError::numeric_overflow()),
        },
        [Value::Double(left), Value::Double(right)] => Value::Double(left + right),
        [Value::String(left), Value::String(right)] => {
            Value::String(format!("{left}{right}"))
        }
        [Value::Bytes(left), Value::Bytes(right)] => {
            let mut joined = left.clone();
            joined.extend_from_slice(right);
            Value::Bytes(joined)
        }
        [Value::List(left), Value::List(right)] => {
            let mut joined = left.clone();
            joined.extend(right.iter().cloned());
            Value::List(joined)
        }
        [Value::Timestamp(ts), Value::Duration(duration)] => {
            match time::add_timestamp_duration(*ts, *duration) {
                Ok(sum) => Value::Timestamp(sum),
                Err(error) => Value::Error(error),
            }
        }
        [Value::Duration(duration), Value::Timestamp(ts)] => {
            match time::add_timestamp_duration(*ts, *duration) {
                Ok(sum) => Value::Timestamp(sum),
                Err(error) => Value::Error(error),
            }
        }
        [Value::Duration(left), Value::Duration(right)] => {
            match time::add_durations(*left, *right) {
                Ok(sum) => Value::Duration(sum),
                Err(error) => Value::Error(error),
            }
        }
        _ => no_such_overload("_+_", args),
    }
}

pub fn subtract(args: &[Value]) -> Value {
    match args {
        [Value::Int(left), Value::Int(right)] => match left.checked_sub(*right) {
            Some(difference) => Value::Int(difference),
            None => Value::Error(EvalError::numeric_overflow()),
        },
        [Value::Uint(left), Value::Uint(right)] => match left.checked_sub(*right) {
            Some(difference) => Value::Uint(difference),
            None => Value::Error(EvalError::numeric_overflow()),
        },
        [Value::Double(left), Value::Double(right)] => Value::Double(left - right),
        [Value::Timestamp(left), Value::Timestamp(right)] => {
            match time::sub_timestamps(*left, *right) {
                Ok(difference) => Value::Duration(difference),
                Err(error) => Value::Error(error),
            }
        }
        [Value::Timestamp(ts), Value::Duration(duration)] => {
            match time::sub_timestamp_duration(*ts, *duration) {
                Ok(difference) => Value::Timestamp(difference),
                Err(error) => Value::Error(error),
            }
        }
        [Value::Duration(left), Value::Duration(right)] => {
            match time::sub_durations(*left, *right) {
                Ok(difference) => Value::Duration(difference),
                Err(error) => Value::Error(error),
            }
        }
        _ => no_such_overload("_-_", args),
    }
}

pub fn multiply(args: &[Value]) -> Value {
    match args {
        [Value::Int(left), Value::Int(right)] => match left.checked_mul(*right) {
            Some(product) => Value::Int(product),
            None => Value::Error(EvalError::numeric_overflow()),
        },
        [Value::Uint(left), Value::Uint(right)] => match left.checked_mul(*right) {
            Some(product) => Value::Uint(product),
            None => Value::Error(EvalError::numeric_overflow()),
        },
        [Value::Double(left), Value::Double(right)] => Value::Double(left * right),
        _ => no_such_overload("_*_", args),
    }
}

pub fn divide(args: &[Value]) -> Value {
    match args {
        [Value::Int(left), Value::Int(right)] => {
            if *right == 0 {
                return Value::Error(EvalError::divide_by_zero());
            }
            match left.checked_div(*right) {
                Some(quotient) => Value::Int(quotient),
                None => Value::Error(EvalError::numeric_overflow()),
            }
        }
        [Value::Uint(left), Value::Uint(right)] => {
            if *right == 0 {
                return Value::Error(EvalError::divide_by_zero());
            }
            Value::Uint(left / right)
        }
        // IEEE-754: double division by zero yields an infinity.
        [Value::Double(left), Value::Double(right)] => Value::Double(left / right),
        _ => no_such_overload("_/_", args),
    }
}

pub fn modulo(args: &[Value]) -> Value {
    match args {
        [Value::Int(left), Value::Int(right)] => {
            if *right == 0 {
                return Value::Error(EvalError::modulus_by_zero());
            }
            match left.checked_rem(*right) {
                Some(remainder) => Value::Int(remainder),
                None => Value::Error(EvalError::numeric_overflow()),
            }
        }
        [Value::Uint(left), Value::Uint(right)] => {
            if *right == 0 {
                return Value::Error(EvalError::modulus_by_zero());
            }
            Value::Uint(left % right)
        }
        _ => no_such_overload("_%_", args),
    }
}

pub fn negate(args: &[Value]) -> Value {
    match args {
        [Value::Int(value)] => match value.checked_neg() {
            Some(negated) => Value::Int(negated),
            None => Value::Error(EvalError::numeric_overflow()),
        },
        [Value::Double(value)] => Value::Double(-value),
        [Value::Duration(value)] => match time::negate_duration(*value) {
            Ok(negated) => Value::Duration(negated),
            Err(error) => Value::Error(error),
        },
        _ => no_such_overload("-_", args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::ErrorKind;

    #[test]
    fn test_int_overflow_is_an_error() {
        let result = add(&[Value::Int(i64::MAX), Value::Int(1)]);
        let Value::Error(error) = result else {
            panic!("expected error");
        };
        assert_eq!(error.kind, ErrorKind::NumericOverflow);
    }

    #[test]
    fn test_uint_subtraction_underflow() {
        let result = subtract(&[Value::Uint(1), Value::Uint(2)]);
        assert!(result.is_error());
    }

    #[test]
    fn test_divide_by_zero() {
        let Value::Error(error) = divide(&[Value::Int(1), Value::Int(0)]) else {
            panic!("expected error");
        };
        assert_eq!(error.kind, ErrorKind::DivideByZero);

        // Doubles follow IEEE-754 instead.
        assert_eq!(
            divide(&[Value::Double(1.0), Value::Double(0.0)]),
            Value::Double(f64::INFINITY)
        );
    }

    #[test]
    fn test_string_and_list_concat() {
        assert_eq!(
            add(&[Value::string("foo"), Value::string("bar")]),
            Value::string("foobar")
        );
        assert_eq!(
            add(&[
                Value::List(vec![Value::Int(1)]),
                Value::List(vec![Value::Int(2)]),
            ]),
            Value::List(vec![Value::Int(1), Value::Int(2)])
        );
    }

    #[test]
    fn test_min_int_negation_overflows() {
        assert!(negate(&[Value::Int(i64::MIN)]).is_error());
    }

    #[test]
    fn test_mixed_types_have_no_overload() {
        assert!(add(&[Value::Int(1), Value::Uint(2)]).is_error());
    }
}
