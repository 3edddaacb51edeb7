use cel_core::values::MessageValue;
use cel_core::{
    Attribute, AttributePattern, CelEnv, CelType, DeclaredTypeProvider, EmptyActivation,
    ErrorKind, FunctionDecl, MapActivation, Overload, ResolverRegistry, Value,
};

fn standard() -> CelEnv {
    CelEnv::standard()
}

fn eval_standard(expr: &str) -> Result<Value, cel_core::EvalError> {
    standard()
        .compile(expr)
        .unwrap_or_else(|issues| panic!("compile of {expr:?} failed:\n{issues}"))
        .eval(&EmptyActivation)
}

#[test]
fn short_circuit_absorption() {
    // false && error -> false, true || error -> true
    assert_eq!(eval_standard("false && 1 / 0 == 0").unwrap(), Value::Bool(false));
    assert_eq!(eval_standard("true || 1 / 0 == 0").unwrap(), Value::Bool(true));

    // The commuted forms absorb too.
    assert_eq!(eval_standard("1 / 0 == 0 && false").unwrap(), Value::Bool(false));
    assert_eq!(eval_standard("1 / 0 == 0 || true").unwrap(), Value::Bool(true));

    // true && error -> error, false || error -> error
    assert_eq!(
        eval_standard("true && 1 / 0 == 0").unwrap_err().kind,
        ErrorKind::DivideByZero
    );
    assert_eq!(
        eval_standard("false || 1 / 0 == 0").unwrap_err().kind,
        ErrorKind::DivideByZero
    );
    // error && error -> error
    assert!(eval_standard("1 / 0 == 0 && 1 % 0 == 0").is_err());
}

#[test]
fn ternary_evaluates_only_the_selected_branch() {
    assert_eq!(eval_standard("true ? 1 : 1 / 0").unwrap(), Value::Int(1));
    assert_eq!(eval_standard("false ? 1 / 0 : 2").unwrap(), Value::Int(2));
}

#[test]
fn comprehension_macros_evaluate() {
    assert_eq!(eval_standard("[1, 2, 3].all(x, x > 0)").unwrap(), Value::Bool(true));
    assert_eq!(eval_standard("[1, 2, 3].all(x, x > 1)").unwrap(), Value::Bool(false));
    assert_eq!(eval_standard("[1, 2, 3].exists(x, x == 2)").unwrap(), Value::Bool(true));
    assert_eq!(
        eval_standard("[1, 2, 2].exists_one(x, x == 2)").unwrap(),
        Value::Bool(false)
    );
    assert_eq!(
        eval_standard("[1, 2, 3].map(x, x * 2)").unwrap(),
        Value::List(vec![Value::Int(2), Value::Int(4), Value::Int(6)])
    );
    assert_eq!(
        eval_standard("[1, 2, 3, 4].filter(x, x % 2 == 0)").unwrap(),
        Value::List(vec![Value::Int(2), Value::Int(4)])
    );
    assert_eq!(
        eval_standard("[1, 2].map(x, x > 1, x * 10)").unwrap(),
        Value::List(vec![Value::Int(20)])
    );
}

#[test]
fn map_comprehension_iterates_keys_in_insertion_order() {
    assert_eq!(
        eval_standard("{'b': 1, 'a': 2}.map(k, k)").unwrap(),
        Value::List(vec![Value::string("b"), Value::string("a")])
    );
}

#[test]
fn cel_bind_introduces_a_local() {
    assert_eq!(eval_standard("cel.bind(v, 2 + 3, v * v)").unwrap(), Value::Int(25));
}

#[test]
fn exists_short_circuits_past_errors() {
    // The `exists` loop condition stops once the accumulator is true, so
    // the error element is never reached.
    assert_eq!(
        eval_standard("[1, 0, 2].exists(x, 4 / x == 4)").unwrap(),
        Value::Bool(true)
    );
}

#[test]
fn message_scenario_evaluates_true() {
    let provider = DeclaredTypeProvider::new().add_message(
        "google.rpc.context.AttributeContext.Request",
        vec![("host", CelType::String)],
    );
    let env = CelEnv::builder()
        .container("google.rpc.context.AttributeContext")
        .declare_variable(
            "msg",
            CelType::Message("google.rpc.context.AttributeContext.Request".into()),
        )
        .declare_function(FunctionDecl::new(
            "getThree",
            vec![Overload::global("get_three", vec![], CelType::Int)],
        ))
        .bind_function("getThree", |_args| Value::Int(3))
        .type_provider(provider)
        .build()
        .unwrap();

    let program = env.compile("msg == Request{} && 3 == getThree()").unwrap();
    let activation = MapActivation::new().bind(
        "msg",
        Value::Message(MessageValue::new(
            "google.rpc.context.AttributeContext.Request",
        )),
    );
    assert_eq!(program.eval(&activation).unwrap(), Value::Bool(true));
}

#[test]
fn unbound_function_fails_with_overload_not_found() {
    let env = CelEnv::builder()
        .declare_function(FunctionDecl::new(
            "getThree",
            vec![Overload::global("get_three", vec![], CelType::Int)],
        ))
        .build()
        .unwrap();

    let program = env.compile("getThree() == 3").unwrap();
    let error = program.eval(&EmptyActivation).unwrap_err();
    assert_eq!(error.kind, ErrorKind::OverloadNotFound);
    assert!(error.message.contains("getThree"), "{error}");
}

#[test]
fn struct_field_comprehension_scenario() {
    let provider = DeclaredTypeProvider::new().add_message(
        "cel.test.TestAllTypes",
        vec![("single_int64", CelType::Int)],
    );
    let env = CelEnv::builder()
        .container("cel.test")
        .type_provider(provider)
        .build()
        .unwrap();

    let program = env
        .compile("[TestAllTypes{single_int64: 1}.single_int64, 2].exists(x, x == 2)")
        .unwrap();
    assert_eq!(program.eval(&EmptyActivation).unwrap(), Value::Bool(true));
}

#[test]
fn unset_message_fields_have_defaults_and_has_is_false() {
    let provider = DeclaredTypeProvider::new().add_message(
        "test.Msg",
        vec![("name", CelType::String), ("count", CelType::Int)],
    );
    let env = CelEnv::builder()
        .declare_variable("m", CelType::Message("test.Msg".into()))
        .type_provider(provider)
        .build()
        .unwrap();

    let activation = MapActivation::new().bind(
        "m",
        Value::Message(MessageValue::new("test.Msg")),
    );
    assert_eq!(
        env.compile("m.name").unwrap().eval(&activation).unwrap(),
        Value::string("")
    );
    assert_eq!(
        env.compile("has(m.name)").unwrap().eval(&activation).unwrap(),
        Value::Bool(false)
    );
}

#[test]
fn unknown_attributes_propagate_and_union() {
    let env = CelEnv::builder()
        .declare_variable("a", CelType::Int)
        .declare_variable("b", CelType::Int)
        .build()
        .unwrap();

    let activation = MapActivation::new()
        .declare_unknown(AttributePattern::new("a"))
        .declare_unknown(AttributePattern::new("b"));

    let program = env.compile("a + b").unwrap();
    let Value::Unknown(set) = program.eval(&activation).unwrap() else {
        panic!("expected unknown result");
    };
    assert_eq!(set.len(), 2);
    assert!(set.contains(&Attribute::new("a")));
    assert!(set.contains(&Attribute::new("b")));
}

#[test]
fn short_circuit_wins_over_unknown() {
    let env = CelEnv::builder()
        .declare_variable("u", CelType::Bool)
        .build()
        .unwrap();
    let activation = MapActivation::new().declare_unknown(AttributePattern::new("u"));

    assert_eq!(
        env.compile("true || u").unwrap().eval(&activation).unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        env.compile("false && u").unwrap().eval(&activation).unwrap(),
        Value::Bool(false)
    );
    // Without a short circuit the unknown flows through.
    assert!(env
        .compile("true && u")
        .unwrap()
        .eval(&activation)
        .unwrap()
        .is_unknown());
}

#[test]
fn qualified_unknown_patterns_match_extensions() {
    let env = CelEnv::builder()
        .declare_variable(
            "request",
            CelType::map_of(CelType::String, CelType::Dyn),
        )
        .build()
        .unwrap();
    let activation = MapActivation::new()
        .declare_unknown(AttributePattern::new("request").select("auth"));

    let program = env.compile("request.auth.claims == {}").unwrap();
    let Value::Unknown(set) = program.eval(&activation).unwrap() else {
        panic!("expected unknown result");
    };
    assert_eq!(
        set.attributes()[0],
        Attribute::new("request").select("auth").select("claims")
    );
}

#[test]
fn iterative_reevaluation_resolves_unknowns() {
    let env = CelEnv::builder()
        .declare_variable("x", CelType::Int)
        .build()
        .unwrap();
    let activation = MapActivation::new().declare_unknown(AttributePattern::new("x"));
    let program = env.compile("x + 1").unwrap();

    let mut resolvers = ResolverRegistry::new();
    resolvers.register(AttributePattern::new("x"), |_: &Attribute| {
        Ok(Value::Int(41))
    });

    assert_eq!(
        program.eval_with_resolvers(&activation, &resolvers).unwrap(),
        Value::Int(42)
    );
}

#[test]
fn reevaluation_without_resolver_fails() {
    let env = CelEnv::builder()
        .declare_variable("x", CelType::Int)
        .build()
        .unwrap();
    let activation = MapActivation::new().declare_unknown(AttributePattern::new("x"));
    let program = env.compile("x + 1").unwrap();

    let resolvers = ResolverRegistry::new();
    let error = program
        .eval_with_resolvers(&activation, &resolvers)
        .unwrap_err();
    assert_eq!(error.kind, ErrorKind::AttributeNotFound);
}

#[test]
fn unknown_monotonicity_under_partial_resolution() {
    let env = CelEnv::builder()
        .declare_variable("a", CelType::Int)
        .declare_variable("b", CelType::Int)
        .build()
        .unwrap();
    let program = env.compile("a + b").unwrap();

    let both_unknown = MapActivation::new()
        .declare_unknown(AttributePattern::new("a"))
        .declare_unknown(AttributePattern::new("b"));
    let Value::Unknown(full) = program.eval(&both_unknown).unwrap() else {
        panic!("expected unknown");
    };

    // Resolving one attribute strictly shrinks the unknown set.
    let one_resolved = MapActivation::new()
        .bind("a", Value::Int(1))
        .declare_unknown(AttributePattern::new("b"));
    let Value::Unknown(smaller) = program.eval(&one_resolved).unwrap() else {
        panic!("expected unknown");
    };
    assert!(smaller.len() < full.len());
    assert!(smaller.contains(&Attribute::new("b")));
}

#[test]
fn observer_sees_postorder_values_and_skips_short_circuits() {
    let env = standard();
    let program = env.compile("false && 1 / 0 == 0").unwrap();

    let mut events = vec![];
    let mut observer = |id: i64, value: &Value| {
        events.push((id, value.clone()));
    };
    program
        .eval_with_observer(&EmptyActivation, &mut observer)
        .unwrap();

    // Only the `false` literal and the `&&` node evaluate.
    assert_eq!(events.len(), 2);
    assert_eq!(events.last().unwrap().1, Value::Bool(false));
}

#[test]
fn optional_syntax_evaluates() {
    let env = CelEnv::builder()
        .with_extension(cel_core::Extension::Optional)
        .declare_variable("m", CelType::map_of(CelType::String, CelType::Int))
        .build()
        .unwrap();

    let activation = MapActivation::new().bind("m", {
        let map: cel_core::values::MapValue =
            vec![(Value::string("a"), Value::Int(1))].into_iter().collect();
        Value::Map(map)
    });

    assert_eq!(
        env.compile("m.?a.orValue(0)").unwrap().eval(&activation).unwrap(),
        Value::Int(1)
    );
    assert_eq!(
        env.compile("m.?missing.orValue(0)")
            .unwrap()
            .eval(&activation)
            .unwrap(),
        Value::Int(0)
    );
    assert_eq!(
        env.compile("[1, ?m[?'missing'], 2]")
            .unwrap()
            .eval(&activation)
            .unwrap(),
        Value::List(vec![Value::Int(1), Value::Int(2)])
    );
    assert_eq!(
        env.compile("optional.of(3).optMap(v, v * 2).orValue(0)")
            .unwrap()
            .eval(&activation)
            .unwrap(),
        Value::Int(6)
    );
}

#[test]
fn enum_constants_compare_as_ints() {
    let provider = DeclaredTypeProvider::new()
        .add_enum("test.Color", vec![("RED", 0), ("GREEN", 1)]);
    let env = CelEnv::builder().type_provider(provider).build().unwrap();

    assert_eq!(
        env.compile("test.Color.GREEN == 1")
            .unwrap()
            .eval(&EmptyActivation)
            .unwrap(),
        Value::Bool(true)
    );
}

#[test]
fn comprehension_iteration_budget() {
    let mut options = cel_core::EvalOptions::default();
    options.comprehension_iteration_limit = Some(10);
    let env = CelEnv::builder().eval_options(options).build().unwrap();

    let program = env
        .compile("[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11].all(x, x > 0)")
        .unwrap();
    let error = program.eval(&EmptyActivation).unwrap_err();
    assert_eq!(error.kind, ErrorKind::IterationBudgetExceeded);
}
