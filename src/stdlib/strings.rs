//! String and aggregate built-ins: `size`, `contains`, `startsWith`,
//! `endsWith`, `matches`, and indexing.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::values::{EvalError, Value};

/// Process-wide cache of compiled patterns, shared with the regex extension
/// and the regex-literal validator. Expressions reuse a small set of literal
/// patterns, and compilation dwarfs the lock.
static REGEX_CACHE: Lazy<RwLock<HashMap<String, Arc<Regex>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

pub(crate) fn compile_regex(pattern: &str) -> Result<Arc<Regex>, regex::Error> {
    if let Ok(cache) = REGEX_CACHE.read() {
        if let Some(found) = cache.get(pattern) {
            return Ok(found.clone());
        }
    }

    let compiled = Arc::new(Regex::new(pattern)?);
    if let Ok(mut cache) = REGEX_CACHE.write() {
        cache.insert(pattern.to_string(), compiled.clone());
    }
    Ok(compiled)
}

/// `size` counts unicode code points for strings and octets for bytes.
pub fn size(args: &[Value]) -> Value {
    match args {
        [Value::String(text)] => Value::Int(text.chars().count() as i64),
        [Value::Bytes(bytes)] => Value::Int(bytes.len() as i64),
        [Value::List(elements)] => Value::Int(elements.len() as i64),
        [Value::Map(map)] => Value::Int(map.len() as i64),
        _ => Value::Error(EvalError::overload_not_found("size")),
    }
}

pub fn contains(args: &[Value]) -> Value {
    match args {
        [Value::String(text), Value::String(needle)] => {
            Value::Bool(text.contains(needle.as_str()))
        }
        _ => Value::Error(EvalError::overload_not_found("contains")),
    }
}

pub fn starts_with(args: &[Value]) -> Value {
    match args {
        [Value::String(text), Value::String(prefix)] => {
            Value::Bool(text.starts_with(prefix.as_str()))
        }
        _ => Value::Error(EvalError::overload_not_found("startsWith")),
    }
}

pub fn ends_with(args: &[Value]) -> Value {
    match args {
        [Value::String(text), Value::String(suffix)] => {
            Value::Bool(text.ends_with(suffix.as_str()))
        }
        _ => Value::Error(EvalError::overload_not_found("endsWith")),
    }
}

pub fn matches(args: &[Value]) -> Value {
    match args {
        [Value::String(text), Value::String(pattern)] => match compile_regex(pattern) {
            Ok(re) => Value::Bool(re.is_match(text)),
            Err(error) => Value::Error(EvalError::invalid_argument(format!(
                "invalid regular expression: {error}"
            ))),
        },
        _ => Value::Error(EvalError::overload_not_found("matches")),
    }
}

/// `_[_]` on lists and maps.
pub fn index(args: &[Value]) -> Value {
    match args {
        [Value::List(elements), index_value] => {
            let index = match index_value {
                Value::Int(index) => *index,
                Value::Uint(index) if *index <= i64::MAX as u64 => *index as i64,
                Value::Double(index) if index.fract() == 0.0 => *index as i64,
                _ => return Value::Error(EvalError::overload_not_found("_[_]")),
            };
            if index < 0 || index as usize >= elements.len() {
                return Value::Error(EvalError::invalid_argument(format!(
                    "index out of bounds: {index}"
                )));
            }
            elements[index as usize].clone()
        }
        [Value::Map(map), key] => match map.get(key) {
            Some(value) => value.clone(),
            None => Value::Error(EvalError::no_such_key(key)),
        },
        _ => Value::Error(EvalError::overload_not_found("_[_]")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::ErrorKind;

    #[test]
    fn test_size_counts_code_points() {
        assert_eq!(size(&[Value::string("héllo")]), Value::Int(5));
        assert_eq!(size(&[Value::Bytes(vec![1, 2, 3])]), Value::Int(3));
    }

    #[test]
    fn test_string_predicates() {
        assert_eq!(
            contains(&[Value::string("hello"), Value::string("ell")]),
            Value::Bool(true)
        );
        assert_eq!(
            starts_with(&[Value::string("hello"), Value::string("he")]),
            Value::Bool(true)
        );
        assert_eq!(
            ends_with(&[Value::string("hello"), Value::string("lo")]),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_matches_regex() {
        assert_eq!(
            matches(&[Value::string("cel rocks"), Value::string("^cel")]),
            Value::Bool(true)
        );
        assert!(matches(&[Value::string("x"), Value::string("(")]).is_error());
    }

    #[test]
    fn test_regex_cache_reuses_compilations() {
        let first = compile_regex("cache-me-[0-9]+").unwrap();
        let second = compile_regex("cache-me-[0-9]+").unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        assert!(compile_regex("(").is_err());
    }

    #[test]
    fn test_list_index_bounds() {
        let list = Value::List(vec![Value::Int(10), Value::Int(20)]);
        assert_eq!(index(&[list.clone(), Value::Int(1)]), Value::Int(20));
        assert!(index(&[list, Value::Int(2)]).is_error());
    }

    #[test]
    fn test_map_missing_key() {
        let map: crate::values::MapValue =
            vec![(Value::string("a"), Value::Int(1))].into_iter().collect();
        let Value::Error(error) = index(&[Value::Map(map), Value::string("b")]) else {
            panic!("expected error");
        };
        assert_eq!(error.kind, ErrorKind::NoSuchKey);
    }
}
