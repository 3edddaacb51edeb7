//! String helper extension: `charAt`, `indexOf`, `lastIndexOf`,
//! `lowerAscii`, `upperAscii`, `replace`, `split`, `join`, `substring`,
//! `trim`. Index arguments count unicode code points.

use crate::checker::env::{FunctionDecl, Overload};
use crate::registry::FunctionRegistry;
use crate::types::CelType;
use crate::values::{EvalError, Value};

pub fn declarations() -> Vec<FunctionDecl> {
    let string = CelType::String;
    let int = CelType::Int;
    let list_string = CelType::list_of(CelType::String);

    vec![
        FunctionDecl::new(
            "charAt",
            vec![Overload::member(
                "string_char_at",
                vec![string.clone(), int.clone()],
                string.clone(),
            )],
        ),
        FunctionDecl::new(
            "indexOf",
            vec![
                Overload::member(
                    "string_index_of",
                    vec![string.clone(), string.clone()],
                    int.clone(),
                ),
                Overload::member(
                    "string_index_of_offset",
                    vec![string.clone(), string.clone(), int.clone()],
                    int.clone(),
                ),
            ],
        ),
        FunctionDecl::new(
            "lastIndexOf",
            vec![
                Overload::member(
                    "string_last_index_of",
                    vec![string.clone(), string.clone()],
                    int.clone(),
                ),
                Overload::member(
                    "string_last_index_of_offset",
                    vec![string.clone(), string.clone(), int.clone()],
                    int.clone(),
                ),
            ],
        ),
        FunctionDecl::new(
            "lowerAscii",
            vec![Overload::member(
                "string_lower_ascii",
                vec![string.clone()],
                string.clone(),
            )],
        ),
        FunctionDecl::new(
            "upperAscii",
            vec![Overload::member(
                "string_upper_ascii",
                vec![string.clone()],
                string.clone(),
            )],
        ),
        FunctionDecl::new(
            "replace",
            vec![
                Overload::member(
                    "string_replace",
                    vec![string.clone(), string.clone(), string.clone()],
                    string.clone(),
                ),
                Overload::member(
                    "string_replace_count",
                    vec![string.clone(), string.clone(), string.clone(), int.clone()],
                    string.clone(),
                ),
            ],
        ),
        FunctionDecl::new(
            "split",
            vec![
                Overload::member(
                    "string_split",
                    vec![string.clone(), string.clone()],
                    list_string.clone(),
                ),
                Overload::member(
                    "string_split_count",
                    vec![string.clone(), string.clone(), int.clone()],
                    list_string.clone(),
                ),
            ],
        ),
        FunctionDecl::new(
            "join",
            vec![
                Overload::member("list_join", vec![list_string.clone()], string.clone()),
                Overload::member(
                    "list_join_separator",
                    vec![list_string, string.clone()],
                    string.clone(),
                ),
            ],
        ),
        FunctionDecl::new(
            "substring",
            vec![
                Overload::member(
                    "string_substring",
                    vec![string.clone(), int.clone()],
                    string.clone(),
                ),
                Overload::member(
                    "string_substring_range",
                    vec![string.clone(), int.clone(), int],
                    string.clone(),
                ),
            ],
        ),
        FunctionDecl::new(
            "trim",
            vec![Overload::member(
                "string_trim",
                vec![string.clone()],
                string,
            )],
        ),
    ]
}

pub fn register(registry: &mut FunctionRegistry) {
    registry.register("charAt", char_at);
    registry.register("indexOf", index_of);
    registry.register("lastIndexOf", last_index_of);
    registry.register("lowerAscii", lower_ascii);
    registry.register("upperAscii", upper_ascii);
    registry.register("replace", replace);
    registry.register("split", split);
    registry.register("join", join);
    registry.register("substring", substring);
    registry.register("trim", trim);
}

fn char_at(args: &[Value]) -> Value {
    let [Value::String(text), Value::Int(index)] = args else {
        return Value::Error(EvalError::overload_not_found("charAt"));
    };
    let length = text.chars().count() as i64;
    if *index < 0 || *index > length {
        return Value::Error(EvalError::invalid_argument(format!(
            "index out of range: {index}"
        )));
    }
    if *index == length {
        return Value::string("");
    }
    Value::String(
        text.chars()
            .nth(*index as usize)
            .map(String::from)
            .unwrap_or_default(),
    )
}

/// Code-point index of a byte offset within `text`.
fn char_index(text: &str, byte_offset: usize) -> i64 {
    text[..byte_offset].chars().count() as i64
}

fn byte_offset(text: &str, char_offset: i64) -> Option<usize> {
    if char_offset < 0 {
        return None;
    }
    if char_offset == 0 {
        return Some(0);
    }
    let mut count = 0i64;
    for (offset, _) in text.char_indices() {
        if count == char_offset {
            return Some(offset);
        }
        count += 1;
    }
    if count == char_offset {
        return Some(text.len());
    }
    None
}

fn index_of(args: &[Value]) -> Value {
    let (text, needle, start) = match args {
        [Value::String(text), Value::String(needle)] => (text, needle, 0i64),
        [Value::String(text), Value::String(needle), Value::Int(start)] => {
            (text, needle, *start)
        }
        _ => return Value::Error(EvalError::overload_not_found("indexOf")),
    };

    let Some(from) = byte_offset(text, start) else {
        return Value::Error(EvalError::invalid_argument(format!(
            "index out of range: {start}"
        )));
    };
    match text[from..].find(needle.as_str()) {
        Some(offset) => Value::Int(char_index(text, from + offset)),
        None => Value::Int(-1),
    }
}

fn last_index_of(args: &[Value]) -> Value {
    let (text, needle, end) = match args {
        [Value::String(text), Value::String(needle)] => (text, needle, None),
        [Value::String(text), Value::String(needle), Value::Int(end)] => {
            (text, needle, Some(*end))
        }
        _ => return Value::Error(EvalError::overload_not_found("lastIndexOf")),
    };

    let upto = match end {
        Some(end) => match byte_offset(text, end) {
            Some(upto) => upto,
            None => {
                return Value::Error(EvalError::invalid_argument(format!(
                    "index out of range: {end}"
                )))
            }
        },
        None => text.len(),
    };
    match text[..upto].rfind(needle.as_str()) {
        Some(offset) => Value::Int(char_index(text, offset)),
        None => Value::Int(-1),
    }
}

fn lower_ascii(args: &[Value]) -> Value {
    match args {
        [Value::String(text)] => Value::String(text.to_ascii_lowercase()),
        _ => Value::Error(EvalError::overload_not_found("lowerAscii")),
    }
}

fn upper_ascii(args: &[Value]) -> Value {
    match args {
        [Value::String(text)] => Value::String(text.to_ascii_uppercase()),
        _ => Value::Error(EvalError::overload_not_found("upperAscii")),
    }
}

fn replace(args: &[Value]) -> Value {
    let (text, old, new, limit) = match args {
        [Value::String(text), Value::String(old), Value::String(new)] => {
            (text, old, new, -1i64)
        }
        [Value::String(text), Value::String(old), Value::String(new), Value::Int(limit)] => {
            (text, old, new, *limit)
        }
        _ => return Value::Error(EvalError::overload_not_found("replace")),
    };

    let replaced = if limit < 0 {
        text.replace(old.as_str(), new)
    } else {
        text.replacen(old.as_str(), new, limit as usize)
    };
    Value::String(replaced)
}

fn split(args: &[Value]) -> Value {
    let (text, separator, limit) = match args {
        [Value::String(text), Value::String(separator)] => (text, separator, -1i64),
        [Value::String(text), Value::String(separator), Value::Int(limit)] => {
            (text, separator, *limit)
        }
        _ => return Value::Error(EvalError::overload_not_found("split")),
    };

    let pieces: Vec<&str> = if limit < 0 {
        text.split(separator.as_str()).collect()
    } else if limit == 0 {
        vec![]
    } else {
        text.splitn(limit as usize, separator.as_str()).collect()
    };
    Value::List(pieces.into_iter().map(Value::string).collect())
}

fn join(args: &[Value]) -> Value {
    let (elements, separator) = match args {
        [Value::List(elements)] => (elements, ""),
        [Value::List(elements), Value::String(separator)] => (elements, separator.as_str()),
        _ => return Value::Error(EvalError::overload_not_found("join")),
    };

    let mut pieces = vec![];
    for element in elements {
        let Value::String(text) = element else {
            return Value::Error(EvalError::invalid_argument(
                "join requires a list of strings",
            ));
        };
        pieces.push(text.clone());
    }
    Value::String(pieces.join(separator))
}

fn substring(args: &[Value]) -> Value {
    let (text, start, end) = match args {
        [Value::String(text), Value::Int(start)] => (text, *start, None),
        [Value::String(text), Value::Int(start), Value::Int(end)] => {
            (text, *start, Some(*end))
        }
        _ => return Value::Error(EvalError::overload_not_found("substring")),
    };

    let Some(from) = byte_offset(text, start) else {
        return Value::Error(EvalError::invalid_argument(format!(
            "index out of range: {start}"
        )));
    };
    let to = match end {
        Some(end) => match byte_offset(text, end) {
            Some(to) if to >= from => to,
            _ => {
                return Value::Error(EvalError::invalid_argument(format!(
                    "invalid substring range: {start}..{end}"
                )))
            }
        },
        None => text.len(),
    };
    Value::string(&text[from..to])
}

fn trim(args: &[Value]) -> Value {
    match args {
        [Value::String(text)] => Value::string(text.trim()),
        _ => Value::Error(EvalError::overload_not_found("trim")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_at_and_substring_count_code_points() {
        assert_eq!(
            char_at(&[Value::string("héllo"), Value::Int(1)]),
            Value::string("é")
        );
        assert_eq!(
            substring(&[Value::string("héllo"), Value::Int(1), Value::Int(3)]),
            Value::string("él")
        );
    }

    #[test]
    fn test_index_of() {
        assert_eq!(
            index_of(&[Value::string("hello hello"), Value::string("hello"), Value::Int(1)]),
            Value::Int(6)
        );
        assert_eq!(
            index_of(&[Value::string("hello"), Value::string("z")]),
            Value::Int(-1)
        );
        assert_eq!(
            last_index_of(&[Value::string("hello hello"), Value::string("hello")]),
            Value::Int(6)
        );
    }

    #[test]
    fn test_replace_with_limit() {
        assert_eq!(
            replace(&[
                Value::string("banana"),
                Value::string("a"),
                Value::string("x"),
                Value::Int(2),
            ]),
            Value::string("bxnxna")
        );
        assert_eq!(
            replace(&[
                Value::string("banana"),
                Value::string("a"),
                Value::string("x"),
            ]),
            Value::string("bxnxnx")
        );
    }

    #[test]
    fn test_split_and_join() {
        let pieces = split(&[Value::string("a,b,c"), Value::string(",")]);
        assert_eq!(
            pieces,
            Value::List(vec![
                Value::string("a"),
                Value::string("b"),
                Value::string("c"),
            ])
        );
        assert_eq!(
            join(&[pieces, Value::string("-")]),
            Value::string("a-b-c")
        );
    }

    #[test]
    fn test_ascii_case() {
        assert_eq!(
            upper_ascii(&[Value::string("cel é")]),
            Value::string("CEL é")
        );
        assert_eq!(
            lower_ascii(&[Value::string("CEL É")]),
            Value::string("cel É")
        );
    }
}
