//! Set algebra over lists, namespaced under `sets.*`. Duplicates and order
//! are ignored.

use crate::checker::env::{FunctionDecl, Overload};
use crate::registry::FunctionRegistry;
use crate::types::CelType;
use crate::values::{EvalError, Value};

pub fn declarations() -> Vec<FunctionDecl> {
    let list_a = || CelType::list_of(CelType::type_param("A"));
    let pair = |id: &str| {
        vec![Overload::global(
            id,
            vec![list_a(), list_a()],
            CelType::Bool,
        )]
    };

    vec![
        FunctionDecl::new("sets.contains", pair("sets_contains")),
        FunctionDecl::new("sets.equivalent", pair("sets_equivalent")),
        FunctionDecl::new("sets.intersects", pair("sets_intersects")),
    ]
}

pub fn register(registry: &mut FunctionRegistry) {
    registry.register("sets.contains", contains);
    registry.register("sets.equivalent", equivalent);
    registry.register("sets.intersects", intersects);
}

fn lists<'a>(args: &'a [Value], function: &str) -> Result<(&'a [Value], &'a [Value]), Value> {
    match args {
        [Value::List(left), Value::List(right)] => Ok((left, right)),
        _ => Err(Value::Error(EvalError::overload_not_found(function))),
    }
}

fn subset(subset: &[Value], superset: &[Value]) -> bool {
    subset
        .iter()
        .all(|needle| superset.iter().any(|element| element == needle))
}

fn contains(args: &[Value]) -> Value {
    match lists(args, "sets.contains") {
        Ok((left, right)) => Value::Bool(subset(right, left)),
        Err(error) => error,
    }
}

fn equivalent(args: &[Value]) -> Value {
    match lists(args, "sets.equivalent") {
        Ok((left, right)) => Value::Bool(subset(left, right) && subset(right, left)),
        Err(error) => error,
    }
}

fn intersects(args: &[Value]) -> Value {
    match lists(args, "sets.intersects") {
        Ok((left, right)) => Value::Bool(
            left.iter()
                .any(|needle| right.iter().any(|element| element == needle)),
        ),
        Err(error) => error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(values: &[i64]) -> Value {
        Value::List(values.iter().map(|value| Value::Int(*value)).collect())
    }

    #[test]
    fn test_contains() {
        assert_eq!(contains(&[list(&[1, 2, 3]), list(&[2, 3])]), Value::Bool(true));
        assert_eq!(contains(&[list(&[1]), list(&[2])]), Value::Bool(false));
        // The empty set is a subset of everything.
        assert_eq!(contains(&[list(&[]), list(&[])]), Value::Bool(true));
    }

    #[test]
    fn test_equivalent_ignores_order_and_duplicates() {
        assert_eq!(
            equivalent(&[list(&[1, 2, 2]), list(&[2, 1])]),
            Value::Bool(true)
        );
        assert_eq!(equivalent(&[list(&[1]), list(&[1, 2])]), Value::Bool(false));
    }

    #[test]
    fn test_intersects() {
        assert_eq!(intersects(&[list(&[1, 2]), list(&[2, 3])]), Value::Bool(true));
        assert_eq!(intersects(&[list(&[1]), list(&[3])]), Value::Bool(false));
    }
}
