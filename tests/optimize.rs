use std::sync::Arc;

use cel_core::optimizer::{CommonSubexprElimination, ConstantFolding, OptimizerPass};
use cel_core::parser::parse;
use cel_core::registry::FunctionRegistry;
use cel_core::source::Source;
use cel_core::unparser::unparse;
use cel_core::{CelEnv, CelType, EmptyActivation, MapActivation, Value};

fn fold(input: &str) -> String {
    let ast = parse(Source::from_text(input)).expect("parse");
    let pass = ConstantFolding::new(Arc::new(FunctionRegistry::standard()));
    let folded = pass.run(ast);
    unparse(&folded.expr, &folded.source_info)
}

fn cse(input: &str) -> String {
    let ast = parse(Source::from_text(input)).expect("parse");
    let rewritten = CommonSubexprElimination.run(ast);
    unparse(&rewritten.expr, &rewritten.source_info)
}

#[test]
fn constant_folding_scenario() {
    assert_eq!(fold("1 + 2 + 3 == x"), "6 == x");
}

#[test]
fn constant_folding_keeps_error_subtrees() {
    assert_eq!(fold("x == 1 / 0"), "x == 1 / 0");
    assert_eq!(fold("x == int('nope')"), "x == int(\"nope\")");
}

#[test]
fn constant_folding_handles_macros_and_strings() {
    assert_eq!(fold("'a' + 'b' == s"), "\"ab\" == s");
    assert_eq!(fold("[1, 2, 3].exists(i, i == 2) && x"), "true && x");
}

#[test]
fn cse_scenario() {
    assert_eq!(
        cse("request.auth.claims.group == 'admin' || request.auth.claims.group == 'user'"),
        "cel.@block([request.auth.claims.group], \
         @index0 == \"admin\" || @index0 == \"user\")"
    );
}

#[test]
fn cse_leaves_single_occurrences_alone() {
    assert_eq!(cse("a.b + c.d"), "a.b + c.d");
}

#[test]
fn optimized_compile_still_evaluates() {
    let env = CelEnv::builder()
        .declare_variable("x", CelType::Int)
        .build()
        .unwrap();

    let program = env.compile_optimized("1 + 2 + 3 == x").unwrap();
    let activation = MapActivation::new().bind("x", Value::Int(6));
    assert_eq!(program.eval(&activation).unwrap(), Value::Bool(true));
    assert_eq!(program.unparse(), "6 == x");
}

#[test]
fn cse_rewrites_compile_and_evaluate() {
    let env = CelEnv::builder()
        .declare_variable("request", CelType::map_of(CelType::String, CelType::Dyn))
        .build()
        .unwrap();

    let program = env
        .compile_optimized(
            "request.auth.claims.group == 'admin' || request.auth.claims.group == 'user'",
        )
        .unwrap();
    assert!(program.unparse().starts_with("cel.@block"));

    let claims: cel_core::values::MapValue =
        vec![(Value::string("group"), Value::string("admin"))]
            .into_iter()
            .collect();
    let auth: cel_core::values::MapValue =
        vec![(Value::string("claims"), Value::Map(claims))]
            .into_iter()
            .collect();
    let request: cel_core::values::MapValue =
        vec![(Value::string("auth"), Value::Map(auth))]
            .into_iter()
            .collect();
    let activation = MapActivation::new().bind("request", Value::Map(request));
    assert_eq!(program.eval(&activation).unwrap(), Value::Bool(true));
}

#[test]
fn folding_preserves_runtime_division_error() {
    let env = CelEnv::standard();
    let program = env.compile_optimized("10 / (3 - 3) == 1").unwrap();
    assert!(program.eval(&EmptyActivation).is_err());
}
