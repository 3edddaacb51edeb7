//! The optional type extension: `optional.of`/`ofNonZeroValue`/`none`, value
//! accessors, the `optMap`/`optFlatMap` macros, and declarations for the
//! parser-reserved `optional_select`/`optional_index` lowered forms.

use crate::ast::{Comprehension, Expr, ExprKind};
use crate::checker::env::{FunctionDecl, Overload};
use crate::parser::macros::{MacroContext, MacroRegistry, MacroResult};
use crate::registry::FunctionRegistry;
use crate::types::CelType;
use crate::values::{EvalError, Value};

pub fn declarations() -> Vec<FunctionDecl> {
    let opt_a = || CelType::optional_of(CelType::type_param("A"));
    let opt_b = || CelType::optional_of(CelType::type_param("B"));
    let param_a = || CelType::type_param("A");
    let param_b = || CelType::type_param("B");

    vec![
        FunctionDecl::new(
            "optional.of",
            vec![Overload::global("optional_of", vec![param_a()], opt_a())],
        ),
        FunctionDecl::new(
            "optional.ofNonZeroValue",
            vec![Overload::global(
                "optional_of_non_zero_value",
                vec![param_a()],
                opt_a(),
            )],
        ),
        FunctionDecl::new(
            "optional.none",
            vec![Overload::global(
                "optional_none",
                vec![],
                CelType::optional_of(CelType::Dyn),
            )],
        ),
        FunctionDecl::new(
            "hasValue",
            vec![Overload::member(
                "optional_has_value",
                vec![opt_a()],
                CelType::Bool,
            )],
        ),
        FunctionDecl::new(
            "value",
            vec![Overload::member("optional_value", vec![opt_a()], param_a())],
        ),
        FunctionDecl::new(
            "or",
            vec![Overload::member(
                "optional_or_optional",
                vec![opt_a(), opt_a()],
                opt_a(),
            )],
        ),
        FunctionDecl::new(
            "orValue",
            vec![Overload::member(
                "optional_or_value",
                vec![opt_a(), param_a()],
                param_a(),
            )],
        ),
        FunctionDecl::new(
            "optional_select",
            vec![
                Overload::global(
                    "map_optional_select",
                    vec![CelType::map_of(param_a(), param_b()), param_a()],
                    opt_b(),
                ),
                Overload::global(
                    "optional_optional_select",
                    vec![
                        CelType::optional_of(param_a()),
                        CelType::String,
                    ],
                    CelType::optional_of(CelType::Dyn),
                ),
                Overload::global(
                    "dyn_optional_select",
                    vec![CelType::Dyn, CelType::String],
                    CelType::optional_of(CelType::Dyn),
                ),
            ],
        ),
        FunctionDecl::new(
            "optional_index",
            vec![
                Overload::global(
                    "list_optional_index",
                    vec![CelType::list_of(param_a()), CelType::Int],
                    opt_a(),
                ),
                Overload::global(
                    "map_optional_index",
                    vec![CelType::map_of(param_a(), param_b()), param_a()],
                    opt_b(),
                ),
                Overload::global(
                    "optional_optional_index",
                    vec![CelType::optional_of(param_a()), CelType::Dyn],
                    CelType::optional_of(CelType::Dyn),
                ),
                Overload::global(
                    "dyn_optional_index",
                    vec![CelType::Dyn, CelType::Dyn],
                    CelType::optional_of(CelType::Dyn),
                ),
            ],
        ),
    ]
}

pub fn register(registry: &mut FunctionRegistry) {
    registry.register("optional.of", |args: &[Value]| match args {
        [value] => Value::optional_of(value.clone()),
        _ => Value::Error(EvalError::overload_not_found("optional.of")),
    });
    registry.register("optional.ofNonZeroValue", |args: &[Value]| match args {
        [value] if value.is_zero_value() => Value::optional_none(),
        [value] => Value::optional_of(value.clone()),
        _ => Value::Error(EvalError::overload_not_found("optional.ofNonZeroValue")),
    });
    registry.register("optional.none", |args: &[Value]| match args {
        [] => Value::optional_none(),
        _ => Value::Error(EvalError::overload_not_found("optional.none")),
    });
    registry.register("hasValue", |args: &[Value]| match args {
        [Value::Optional(inner)] => Value::Bool(inner.is_some()),
        _ => Value::Error(EvalError::overload_not_found("hasValue")),
    });
    registry.register("value", |args: &[Value]| match args {
        [Value::Optional(Some(inner))] => (**inner).clone(),
        [Value::Optional(None)] => Value::Error(EvalError::invalid_argument(
            "optional.none() dereference",
        )),
        _ => Value::Error(EvalError::overload_not_found("value")),
    });
    registry.register("or", |args: &[Value]| match args {
        [Value::Optional(Some(inner)), Value::Optional(_)] => {
            Value::optional_of((**inner).clone())
        }
        [Value::Optional(None), other @ Value::Optional(_)] => other.clone(),
        _ => Value::Error(EvalError::overload_not_found("or")),
    });
    registry.register("orValue", |args: &[Value]| match args {
        [Value::Optional(Some(inner)), _] => (**inner).clone(),
        [Value::Optional(None), fallback] => fallback.clone(),
        _ => Value::Error(EvalError::overload_not_found("orValue")),
    });
}

pub fn register_macros(macros: &mut MacroRegistry) {
    macros.register("optMap", Some(2), true, expand_opt_map);
    macros.register("optFlatMap", Some(2), true, expand_opt_flat_map);
}

/// `t.optMap(v, e)` → `t.hasValue() ? optional.of(bind(v, t.value(), e)) :
/// optional.none()`.
fn expand_opt_map(ctx: &mut MacroContext<'_>, target: Option<Expr>, args: Vec<Expr>) -> MacroResult {
    expand_opt(ctx, target, args, true)
}

/// `t.optFlatMap(v, e)` where `e` is itself optional; no extra wrapping.
fn expand_opt_flat_map(
    ctx: &mut MacroContext<'_>,
    target: Option<Expr>,
    args: Vec<Expr>,
) -> MacroResult {
    expand_opt(ctx, target, args, false)
}

fn expand_opt(
    ctx: &mut MacroContext<'_>,
    target: Option<Expr>,
    args: Vec<Expr>,
    wrap: bool,
) -> MacroResult {
    let mut args = args;
    let body = args.pop().expect("arity checked by registry");
    let var = match &args[0].kind {
        ExprKind::Ident(name) => name.clone(),
        _ => return Err("optMap() variable must be a simple name".to_string()),
    };
    let target = target.expect("receiver macro");
    let target_copy = ctx.refresh_ids(&target);

    let has_value = ctx.member_call("hasValue", target, vec![]);
    let value = ctx.member_call("value", target_copy, vec![]);

    let iter_range = ctx.list(vec![]);
    let loop_cond = ctx.constant(crate::ast::Constant::Bool(false));
    let loop_step = ctx.ident(&var);
    let bound = ctx.build(ExprKind::Comprehension(Box::new(Comprehension {
        iter_var: "#unused".to_string(),
        iter_range,
        accu_var: var,
        accu_init: value,
        loop_cond,
        loop_step,
        result: body,
    })));

    let then_branch = if wrap {
        ctx.call("optional.of", vec![bound])
    } else {
        bound
    };
    let else_branch = ctx.call("optional.none", vec![]);

    Ok(Some(ctx.call(
        "_?_:_",
        vec![has_value, then_branch, else_branch],
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_bindings() {
        let mut registry = FunctionRegistry::new();
        register(&mut registry);

        let of = registry.find("optional.of").unwrap();
        let wrapped = of.as_ref()(&[Value::Int(4)]);
        assert_eq!(wrapped, Value::optional_of(Value::Int(4)));

        let has_value = registry.find("hasValue").unwrap();
        assert_eq!(has_value.as_ref()(&[wrapped.clone()]), Value::Bool(true));
        assert_eq!(has_value.as_ref()(&[Value::optional_none()]), Value::Bool(false));

        let or_value = registry.find("orValue").unwrap();
        assert_eq!(or_value.as_ref()(&[wrapped, Value::Int(0)]), Value::Int(4));
        assert_eq!(
            or_value.as_ref()(&[Value::optional_none(), Value::Int(0)]),
            Value::Int(0)
        );
    }

    #[test]
    fn test_of_non_zero_value() {
        let mut registry = FunctionRegistry::new();
        register(&mut registry);
        let of = registry.find("optional.ofNonZeroValue").unwrap();

        assert_eq!(of.as_ref()(&[Value::Int(0)]), Value::optional_none());
        assert_eq!(of.as_ref()(&[Value::Int(3)]), Value::optional_of(Value::Int(3)));
    }

    #[test]
    fn test_value_of_none_is_an_error() {
        let mut registry = FunctionRegistry::new();
        register(&mut registry);
        let value = registry.find("value").unwrap();

        assert!(value.as_ref()(&[Value::optional_none()]).is_error());
    }
}
