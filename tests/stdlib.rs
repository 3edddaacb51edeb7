use cel_core::{CelEnv, CelType, EmptyActivation, ErrorKind, Extension, Value};

fn eval(expr: &str) -> Result<Value, cel_core::EvalError> {
    CelEnv::standard()
        .compile(expr)
        .unwrap_or_else(|issues| panic!("compile of {expr:?} failed:\n{issues}"))
        .eval(&EmptyActivation)
}

fn eval_ext(expr: &str) -> Result<Value, cel_core::EvalError> {
    CelEnv::builder()
        .with_extension(Extension::Strings)
        .with_extension(Extension::Math)
        .with_extension(Extension::Sets)
        .with_extension(Extension::Regex)
        .with_extension(Extension::Optional)
        .build()
        .unwrap()
        .compile(expr)
        .unwrap_or_else(|issues| panic!("compile of {expr:?} failed:\n{issues}"))
        .eval(&EmptyActivation)
}

#[test]
fn arithmetic_is_overflow_checked() {
    assert_eq!(eval("1 + 2 * 3").unwrap(), Value::Int(7));
    assert_eq!(
        eval("9223372036854775807 + 1").unwrap_err().kind,
        ErrorKind::NumericOverflow
    );
    assert_eq!(
        eval("0u - 1u").unwrap_err().kind,
        ErrorKind::NumericOverflow
    );
    assert_eq!(eval("7 / 2").unwrap(), Value::Int(3));
    assert_eq!(eval("7 % 2").unwrap(), Value::Int(1));
    assert_eq!(eval("1 / 0").unwrap_err().kind, ErrorKind::DivideByZero);
}

#[test]
fn numeric_total_order_across_types() {
    assert_eq!(
        eval("9223372036854775807 < 9223372036854775808u").unwrap(),
        Value::Bool(true)
    );
    assert_eq!(eval("-1 < 0u").unwrap(), Value::Bool(true));
    assert_eq!(eval("2u < 2.5").unwrap(), Value::Bool(true));
    assert_eq!(eval("1 == 1u").unwrap(), Value::Bool(true));
    assert_eq!(eval("1.0 == 1").unwrap(), Value::Bool(true));
    // NaN compares false with everything.
    assert_eq!(eval("0.0 / 0.0 < 1.0").unwrap(), Value::Bool(false));
    assert_eq!(eval("0.0 / 0.0 == 0.0 / 0.0").unwrap(), Value::Bool(false));
}

#[test]
fn string_and_bytes_builtins() {
    assert_eq!(eval("size('héllo')").unwrap(), Value::Int(5));
    assert_eq!(eval("'héllo'.size()").unwrap(), Value::Int(5));
    assert_eq!(eval("size(b'ab') == 2").unwrap(), Value::Bool(true));
    assert_eq!(eval("'a' + 'b'").unwrap(), Value::string("ab"));
    assert_eq!(
        eval("'hello'.contains('ell') && 'hello'.startsWith('he') && 'hello'.endsWith('lo')")
            .unwrap(),
        Value::Bool(true)
    );
    assert_eq!(eval("'cel'.matches('^c.l$')").unwrap(), Value::Bool(true));
}

#[test]
fn containers_and_indexing() {
    assert_eq!(eval("[1, 2, 3][1]").unwrap(), Value::Int(2));
    assert_eq!(eval("{'a': 1}['a']").unwrap(), Value::Int(1));
    assert_eq!(eval("{'a': 1}['b']").unwrap_err().kind, ErrorKind::NoSuchKey);
    assert_eq!(eval("[1, 2][5]").unwrap_err().kind, ErrorKind::InvalidArgument);
    assert_eq!(eval("2 in [1, 2]").unwrap(), Value::Bool(true));
    assert_eq!(eval("'b' in {'a': 1}").unwrap(), Value::Bool(false));
    assert_eq!(eval("size([1, 2, 3])").unwrap(), Value::Int(3));
    assert_eq!(eval("size({'a': 1})").unwrap(), Value::Int(1));
    assert_eq!(eval("[1] + [2]").unwrap(), Value::List(vec![Value::Int(1), Value::Int(2)]));
}

#[test]
fn conversions_reject_overflow() {
    assert_eq!(eval("int(42u)").unwrap(), Value::Int(42));
    assert_eq!(
        eval("int(18446744073709551615u)").unwrap_err().kind,
        ErrorKind::NumericOverflow
    );
    assert_eq!(eval("uint(3)").unwrap(), Value::Uint(3));
    assert_eq!(eval("uint(-1)").unwrap_err().kind, ErrorKind::NumericOverflow);
    assert_eq!(eval("double('2.5')").unwrap(), Value::Double(2.5));
    assert_eq!(eval("string(42) + 'u'").unwrap(), Value::string("42u"));
    assert_eq!(eval("int('12')").unwrap(), Value::Int(12));
    assert_eq!(eval("bytes('ab') == b'ab'").unwrap(), Value::Bool(true));
    assert_eq!(eval("bool('true')").unwrap(), Value::Bool(true));
}

#[test]
fn type_conversion_and_type_values() {
    assert_eq!(eval("type(1) == int").unwrap(), Value::Bool(true));
    assert_eq!(eval("type('x') == string").unwrap(), Value::Bool(true));
    assert_eq!(eval("type(type(1)) == type").unwrap(), Value::Bool(true));
    assert_eq!(eval("dyn(1) == 1").unwrap(), Value::Bool(true));
}

#[test]
fn timestamp_and_duration_arithmetic() {
    assert_eq!(
        eval("timestamp('2023-01-10T12:00:00Z') + duration('1h') == \
              timestamp('2023-01-10T13:00:00Z')")
        .unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        eval("timestamp('2023-01-10T12:00:00Z') - timestamp('2023-01-10T10:30:00Z') == \
              duration('1h30m')")
        .unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        eval("duration('1h') + duration('30m') == duration('90m')").unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        eval("timestamp('2023-01-10T12:30:45Z').getHours()").unwrap(),
        Value::Int(12)
    );
    assert_eq!(
        eval("timestamp('2023-01-10T12:30:45Z').getHours('+02:00')").unwrap(),
        Value::Int(14)
    );
    assert_eq!(
        eval("timestamp('2023-07-01T01:00:00Z').getDate('America/New_York')").unwrap(),
        Value::Int(30)
    );
    assert_eq!(eval("duration('90m').getMinutes()").unwrap(), Value::Int(90));
    assert_eq!(
        eval("timestamp('2023-01-10T12:00:00Z').getDayOfWeek()").unwrap(),
        Value::Int(2)
    );
}

#[test]
fn string_extension_functions() {
    assert_eq!(
        eval_ext("'a,b,c'.split(',').join('-')").unwrap(),
        Value::string("a-b-c")
    );
    assert_eq!(eval_ext("'hello'.substring(1, 3)").unwrap(), Value::string("el"));
    assert_eq!(
        eval_ext("'banana'.replace('a', 'x', 2)").unwrap(),
        Value::string("bxnxna")
    );
    assert_eq!(eval_ext("'  pad  '.trim()").unwrap(), Value::string("pad"));
    assert_eq!(eval_ext("'cel'.upperAscii()").unwrap(), Value::string("CEL"));
    assert_eq!(eval_ext("'abcabc'.indexOf('c', 3)").unwrap(), Value::Int(5));
    assert_eq!(eval_ext("'abc'.charAt(1)").unwrap(), Value::string("b"));
}

#[test]
fn math_extension_functions() {
    assert_eq!(eval_ext("math.greatest(1, 2)").unwrap(), Value::Int(2));
    assert_eq!(eval_ext("math.least([3, 1, 2])").unwrap(), Value::Int(1));
    assert_eq!(eval_ext("math.ceil(1.2)").unwrap(), Value::Double(2.0));
    assert_eq!(eval_ext("math.abs(-3)").unwrap(), Value::Int(3));
    assert_eq!(eval_ext("math.sign(-2.5)").unwrap(), Value::Double(-1.0));
    assert_eq!(eval_ext("math.isNaN(0.0 / 0.0)").unwrap(), Value::Bool(true));
}

#[test]
fn sets_extension_functions() {
    assert_eq!(
        eval_ext("sets.contains([1, 2, 3], [2, 3])").unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        eval_ext("sets.equivalent([1, 2, 2], [2, 1])").unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        eval_ext("sets.intersects([1], [2])").unwrap(),
        Value::Bool(false)
    );
}

#[test]
fn regex_extension_scenarios() {
    assert_eq!(
        eval_ext("regex.replace('banana', 'a', 'x', 2)").unwrap(),
        Value::string("bxnxna")
    );
    assert_eq!(
        eval_ext("regex.replace('banana', 'a', 'x', -1)").unwrap(),
        Value::string("bxnxnx")
    );
    assert_eq!(
        eval_ext("regex.replace('banana', 'a', 'x', 0)").unwrap(),
        Value::string("banana")
    );
    assert_eq!(
        eval_ext("regex.extract('id=42', 'id=(\\\\d+)').orValue('')").unwrap(),
        Value::string("42")
    );
    assert_eq!(
        eval_ext("regex.extractAll('a1 b2', '[a-z](\\\\d)')").unwrap(),
        Value::List(vec![Value::string("1"), Value::string("2")])
    );
    let named = eval_ext(
        "regex.captureAllNamed('Name: John, Age:30', \
         'Name: (?P<Name>.*), Age:(?P<Age>\\\\d+)')",
    )
    .unwrap();
    let expected: cel_core::values::MapValue = vec![
        (Value::string("Name"), Value::string("John")),
        (Value::string("Age"), Value::string("30")),
    ]
    .into_iter()
    .collect();
    assert_eq!(named, Value::Map(expected));
}

#[test]
fn enum_like_heterogeneous_equality() {
    // Values of different runtime numeric types are equal by value.
    assert_eq!(eval("dyn(1) == 1u").unwrap(), Value::Bool(true));
    assert_eq!(eval("dyn([1, 2]) == [1.0, 2.0]").unwrap(), Value::Bool(true));
}

#[test]
fn standard_env_type_checks_strictly() {
    let env = CelEnv::standard();
    // No silent numeric widening at check time.
    assert!(env.compile("1 + 1u").is_err());
    assert!(env.compile("1.0 + 1").is_err());
    assert_eq!(
        env.compile("1 < 1u").unwrap().result_type(),
        CelType::Bool
    );
}
