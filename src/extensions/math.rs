//! Math helper extension, namespaced under `math.*`.

use crate::checker::env::{FunctionDecl, Overload};
use crate::registry::FunctionRegistry;
use crate::stdlib::comparisons::compare;
use crate::types::CelType;
use crate::values::{EvalError, Value};

pub fn declarations() -> Vec<FunctionDecl> {
    let numeric_pair = |id: &str| {
        vec![
            Overload::global(format!("{id}_int64"), vec![CelType::Int, CelType::Int], CelType::Int),
            Overload::global(
                format!("{id}_uint64"),
                vec![CelType::Uint, CelType::Uint],
                CelType::Uint,
            ),
            Overload::global(
                format!("{id}_double"),
                vec![CelType::Double, CelType::Double],
                CelType::Double,
            ),
            Overload::global(
                format!("{id}_dyn"),
                vec![CelType::Dyn, CelType::Dyn],
                CelType::Dyn,
            ),
            Overload::global(
                format!("{id}_list"),
                vec![CelType::list_of(CelType::type_param("A"))],
                CelType::type_param("A"),
            ),
        ]
    };

    let double_unary = |name: &str, id: &str| {
        FunctionDecl::new(
            name,
            vec![Overload::global(
                id,
                vec![CelType::Double],
                CelType::Double,
            )],
        )
    };
    let double_predicate = |name: &str, id: &str| {
        FunctionDecl::new(
            name,
            vec![Overload::global(id, vec![CelType::Double], CelType::Bool)],
        )
    };

    vec![
        FunctionDecl::new("math.greatest", numeric_pair("math_greatest")),
        FunctionDecl::new("math.least", numeric_pair("math_least")),
        double_unary("math.ceil", "math_ceil"),
        double_unary("math.floor", "math_floor"),
        double_unary("math.round", "math_round"),
        double_unary("math.trunc", "math_trunc"),
        FunctionDecl::new(
            "math.abs",
            vec![
                Overload::global("math_abs_int64", vec![CelType::Int], CelType::Int),
                Overload::global("math_abs_uint64", vec![CelType::Uint], CelType::Uint),
                Overload::global("math_abs_double", vec![CelType::Double], CelType::Double),
            ],
        ),
        FunctionDecl::new(
            "math.sign",
            vec![
                Overload::global("math_sign_int64", vec![CelType::Int], CelType::Int),
                Overload::global("math_sign_uint64", vec![CelType::Uint], CelType::Uint),
                Overload::global("math_sign_double", vec![CelType::Double], CelType::Double),
            ],
        ),
        double_predicate("math.isNaN", "math_is_nan"),
        double_predicate("math.isInf", "math_is_inf"),
        double_predicate("math.isFinite", "math_is_finite"),
    ]
}

pub fn register(registry: &mut FunctionRegistry) {
    registry.register("math.greatest", greatest);
    registry.register("math.least", least);
    registry.register("math.ceil", |args: &[Value]| double_map(args, f64::ceil));
    registry.register("math.floor", |args: &[Value]| double_map(args, f64::floor));
    registry.register("math.round", |args: &[Value]| double_map(args, f64::round));
    registry.register("math.trunc", |args: &[Value]| double_map(args, f64::trunc));
    registry.register("math.abs", abs);
    registry.register("math.sign", sign);
    registry.register("math.isNaN", |args: &[Value]| {
        double_predicate(args, f64::is_nan)
    });
    registry.register("math.isInf", |args: &[Value]| {
        double_predicate(args, f64::is_infinite)
    });
    registry.register("math.isFinite", |args: &[Value]| {
        double_predicate(args, f64::is_finite)
    });
}

fn double_map(args: &[Value], apply: fn(f64) -> f64) -> Value {
    match args {
        [Value::Double(value)] => Value::Double(apply(*value)),
        _ => Value::Error(EvalError::overload_not_found("math function")),
    }
}

fn double_predicate(args: &[Value], test: fn(f64) -> bool) -> Value {
    match args {
        [Value::Double(value)] => Value::Bool(test(*value)),
        _ => Value::Error(EvalError::overload_not_found("math predicate")),
    }
}

fn pick(args: &[Value], function: &str, keep_left: fn(std::cmp::Ordering) -> bool) -> Value {
    let candidates: Vec<&Value> = match args {
        [Value::List(elements)] => elements.iter().collect(),
        _ => args.iter().collect(),
    };
    if candidates.is_empty() {
        return Value::Error(EvalError::invalid_argument(format!(
            "{function} requires at least one argument"
        )));
    }

    let mut best = candidates[0];
    for candidate in &candidates[1..] {
        match compare(candidate, best) {
            Some(ordering) if keep_left(ordering) => best = candidate,
            Some(_) => {}
            None => {
                return Value::Error(EvalError::invalid_argument(format!(
                    "{function} requires comparable numeric arguments"
                )))
            }
        }
    }
    best.clone()
}

fn greatest(args: &[Value]) -> Value {
    pick(args, "math.greatest", std::cmp::Ordering::is_gt)
}

fn least(args: &[Value]) -> Value {
    pick(args, "math.least", std::cmp::Ordering::is_lt)
}

fn abs(args: &[Value]) -> Value {
    match args {
        [Value::Int(value)] => match value.checked_abs() {
            Some(absolute) => Value::Int(absolute),
            None => Value::Error(EvalError::numeric_overflow()),
        },
        [Value::Uint(value)] => Value::Uint(*value),
        [Value::Double(value)] => Value::Double(value.abs()),
        _ => Value::Error(EvalError::overload_not_found("math.abs")),
    }
}

fn sign(args: &[Value]) -> Value {
    match args {
        [Value::Int(value)] => Value::Int(value.signum()),
        [Value::Uint(value)] => Value::Uint(if *value == 0 { 0 } else { 1 }),
        [Value::Double(value)] => {
            if value.is_nan() {
                Value::Double(f64::NAN)
            } else if *value == 0.0 {
                Value::Double(0.0)
            } else {
                Value::Double(value.signum())
            }
        }
        _ => Value::Error(EvalError::overload_not_found("math.sign")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greatest_and_least() {
        assert_eq!(greatest(&[Value::Int(3), Value::Int(7)]), Value::Int(7));
        assert_eq!(
            least(&[Value::List(vec![Value::Int(5), Value::Int(-2), Value::Int(9)])]),
            Value::Int(-2)
        );
        // Cross-type numeric comparison works through the shared ordering.
        assert_eq!(
            greatest(&[Value::Int(3), Value::Double(3.5)]),
            Value::Double(3.5)
        );
    }

    #[test]
    fn test_abs_overflow() {
        assert!(abs(&[Value::Int(i64::MIN)]).is_error());
        assert_eq!(abs(&[Value::Int(-4)]), Value::Int(4));
    }

    #[test]
    fn test_rounding() {
        assert_eq!(
            double_map(&[Value::Double(1.5)], f64::round),
            Value::Double(2.0)
        );
        assert_eq!(
            double_map(&[Value::Double(-1.2)], f64::ceil),
            Value::Double(-1.0)
        );
    }

    #[test]
    fn test_sign() {
        assert_eq!(sign(&[Value::Int(-9)]), Value::Int(-1));
        assert_eq!(sign(&[Value::Uint(4)]), Value::Uint(1));
    }
}
