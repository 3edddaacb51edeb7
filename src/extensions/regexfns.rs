//! Regex extension, namespaced under `regex.*`.
//!
//! `regex.replace` honors an optional replacement count where a negative
//! count means unlimited and zero means none; `\N` in the replacement text
//! references capture group N.

use std::sync::Arc;

use regex::Regex;

use crate::checker::env::{FunctionDecl, Overload};
use crate::registry::FunctionRegistry;
use crate::stdlib::strings::compile_regex;
use crate::types::CelType;
use crate::values::{EvalError, MapValue, Value};

pub fn declarations() -> Vec<FunctionDecl> {
    let string = CelType::String;

    vec![
        FunctionDecl::new(
            "regex.replace",
            vec![
                Overload::global(
                    "regex_replace",
                    vec![string.clone(), string.clone(), string.clone()],
                    string.clone(),
                ),
                Overload::global(
                    "regex_replace_count",
                    vec![string.clone(), string.clone(), string.clone(), CelType::Int],
                    string.clone(),
                ),
            ],
        ),
        FunctionDecl::new(
            "regex.extract",
            vec![Overload::global(
                "regex_extract",
                vec![string.clone(), string.clone()],
                CelType::optional_of(string.clone()),
            )],
        ),
        FunctionDecl::new(
            "regex.extractAll",
            vec![Overload::global(
                "regex_extract_all",
                vec![string.clone(), string.clone()],
                CelType::list_of(string.clone()),
            )],
        ),
        FunctionDecl::new(
            "regex.captureAll",
            vec![Overload::global(
                "regex_capture_all",
                vec![string.clone(), string.clone()],
                CelType::list_of(string.clone()),
            )],
        ),
        FunctionDecl::new(
            "regex.captureAllNamed",
            vec![Overload::global(
                "regex_capture_all_named",
                vec![string.clone(), string.clone()],
                CelType::map_of(string.clone(), string),
            )],
        ),
    ]
}

pub fn register(registry: &mut FunctionRegistry) {
    registry.register("regex.replace", replace);
    registry.register("regex.extract", extract);
    registry.register("regex.extractAll", extract_all);
    registry.register("regex.captureAll", capture_all);
    registry.register("regex.captureAllNamed", capture_all_named);
}

fn compile(pattern: &str) -> Result<Arc<Regex>, Value> {
    compile_regex(pattern).map_err(|error| {
        Value::Error(EvalError::invalid_argument(format!(
            "invalid regular expression: {error}"
        )))
    })
}

/// Rewrite `\N` group references into the engine's `${N}` form and escape
/// bare `$`.
fn rewrite_replacement(replacement: &str) -> String {
    let mut out = String::with_capacity(replacement.len());
    let mut chars = replacement.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '$' => out.push_str("$$"),
            '\\' => match chars.peek() {
                Some(digit) if digit.is_ascii_digit() => {
                    out.push_str("${");
                    out.push(*digit);
                    chars.next();
                    out.push('}');
                }
                Some('\\') => {
                    out.push('\\');
                    chars.next();
                }
                _ => out.push('\\'),
            },
            other => out.push(other),
        }
    }
    out
}

fn replace(args: &[Value]) -> Value {
    let (text, pattern, replacement, count) = match args {
        [Value::String(text), Value::String(pattern), Value::String(replacement)] => {
            (text, pattern, replacement, -1i64)
        }
        [Value::String(text), Value::String(pattern), Value::String(replacement), Value::Int(count)] => {
            (text, pattern, replacement, *count)
        }
        _ => return Value::Error(EvalError::overload_not_found("regex.replace")),
    };

    let re = match compile(pattern) {
        Ok(re) => re,
        Err(error) => return error,
    };
    let replacement = rewrite_replacement(replacement);

    let replaced = if count < 0 {
        re.replace_all(text, replacement.as_str()).into_owned()
    } else if count == 0 {
        // The regex engine treats a replacen limit of 0 as unlimited.
        text.to_string()
    } else {
        re.replacen(text, count as usize, replacement.as_str())
            .into_owned()
    };
    Value::String(replaced)
}

/// First match as an optional: the first capture group when one exists,
/// otherwise the whole match.
fn extract(args: &[Value]) -> Value {
    let [Value::String(text), Value::String(pattern)] = args else {
        return Value::Error(EvalError::overload_not_found("regex.extract"));
    };
    let re = match compile(pattern) {
        Ok(re) => re,
        Err(error) => return error,
    };

    match re.captures(text) {
        Some(captures) => {
            let matched = captures
                .get(1)
                .or_else(|| captures.get(0))
                .map(|group| group.as_str())
                .unwrap_or_default();
            Value::optional_of(Value::string(matched))
        }
        None => Value::optional_none(),
    }
}

fn extract_all(args: &[Value]) -> Value {
    let [Value::String(text), Value::String(pattern)] = args else {
        return Value::Error(EvalError::overload_not_found("regex.extractAll"));
    };
    let re = match compile(pattern) {
        Ok(re) => re,
        Err(error) => return error,
    };

    let matches = re
        .captures_iter(text)
        .filter_map(|captures| {
            captures
                .get(1)
                .or_else(|| captures.get(0))
                .map(|group| Value::string(group.as_str()))
        })
        .collect();
    Value::List(matches)
}

/// Every capture group of every match, in match order.
fn capture_all(args: &[Value]) -> Value {
    let [Value::String(text), Value::String(pattern)] = args else {
        return Value::Error(EvalError::overload_not_found("regex.captureAll"));
    };
    let re = match compile(pattern) {
        Ok(re) => re,
        Err(error) => return error,
    };

    let mut groups = vec![];
    for captures in re.captures_iter(text) {
        if captures.len() == 1 {
            if let Some(whole) = captures.get(0) {
                groups.push(Value::string(whole.as_str()));
            }
            continue;
        }
        for group in captures.iter().skip(1).flatten() {
            groups.push(Value::string(group.as_str()));
        }
    }
    Value::List(groups)
}

/// Named capture groups folded into a map; later matches overwrite earlier
/// bindings of the same name.
fn capture_all_named(args: &[Value]) -> Value {
    let [Value::String(text), Value::String(pattern)] = args else {
        return Value::Error(EvalError::overload_not_found("regex.captureAllNamed"));
    };
    let re = match compile(pattern) {
        Ok(re) => re,
        Err(error) => return error,
    };

    let names: Vec<&str> = re.capture_names().flatten().collect();
    let mut map = MapValue::new();
    for captures in re.captures_iter(text) {
        for name in &names {
            if let Some(group) = captures.name(name) {
                map.insert(Value::string(*name), Value::string(group.as_str()));
            }
        }
    }
    Value::Map(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_with_count() {
        assert_eq!(
            replace(&[
                Value::string("banana"),
                Value::string("a"),
                Value::string("x"),
                Value::Int(2),
            ]),
            Value::string("bxnxna")
        );
        // Negative count replaces every occurrence.
        assert_eq!(
            replace(&[
                Value::string("banana"),
                Value::string("a"),
                Value::string("x"),
                Value::Int(-1),
            ]),
            Value::string("bxnxnx")
        );
        assert_eq!(
            replace(&[
                Value::string("banana"),
                Value::string("a"),
                Value::string("x"),
                Value::Int(0),
            ]),
            Value::string("banana")
        );
    }

    #[test]
    fn test_replace_group_reference() {
        assert_eq!(
            replace(&[
                Value::string("ab"),
                Value::string("(a)(b)"),
                Value::string(r"\2\1"),
            ]),
            Value::string("ba")
        );
    }

    #[test]
    fn test_extract() {
        assert_eq!(
            extract(&[Value::string("id=42"), Value::string(r"id=(\d+)")]),
            Value::optional_of(Value::string("42"))
        );
        assert_eq!(
            extract(&[Value::string("none"), Value::string(r"id=(\d+)")]),
            Value::optional_none()
        );
    }

    #[test]
    fn test_extract_all() {
        assert_eq!(
            extract_all(&[Value::string("a1 b2"), Value::string(r"[a-z](\d)")]),
            Value::List(vec![Value::string("1"), Value::string("2")])
        );
    }

    #[test]
    fn test_capture_all_named() {
        let result = capture_all_named(&[
            Value::string("Name: John, Age:30"),
            Value::string(r"Name: (?P<Name>.*), Age:(?P<Age>\d+)"),
        ]);
        let expected: MapValue = vec![
            (Value::string("Name"), Value::string("John")),
            (Value::string("Age"), Value::string("30")),
        ]
        .into_iter()
        .collect();
        assert_eq!(result, Value::Map(expected));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(replace(&[
            Value::string("x"),
            Value::string("("),
            Value::string("y"),
        ])
        .is_error());
    }
}
