//! The standard environment: overload declarations for the checker and the
//! matching runtime bindings.
//!
//! The set mirrors the baseline environment dump: logical operators,
//! overflow-checked arithmetic, relations over every comparable pair,
//! containment, size, conversions, string predicates and time accessors.

pub mod arithmetic;
pub mod comparisons;
pub mod conversions;
pub mod strings;
pub mod timefns;

use once_cell::sync::Lazy;

use crate::checker::env::{FunctionDecl, Overload};
use crate::registry::FunctionRegistry;
use crate::types::CelType;
use crate::values::Value;

/// The declaration table is built once per process; environments clone the
/// entries they merge.
static STANDARD_DECLARATIONS: Lazy<Vec<FunctionDecl>> = Lazy::new(build_standard_declarations);

pub fn standard_declarations() -> Vec<FunctionDecl> {
    STANDARD_DECLARATIONS.clone()
}

fn param_a() -> CelType {
    CelType::type_param("A")
}

fn param_b() -> CelType {
    CelType::type_param("B")
}

fn type_short_name(t: &CelType) -> &'static str {
    match t {
        CelType::Bool => "bool",
        CelType::Int => "int64",
        CelType::Uint => "uint64",
        CelType::Double => "double",
        CelType::String => "string",
        CelType::Bytes => "bytes",
        CelType::Timestamp => "timestamp",
        CelType::Duration => "duration",
        _ => "dyn",
    }
}

/// Identifiers for the built-in types, declared as `type` values so that
/// expressions like `type(1) == int` check.
pub fn standard_variables() -> Vec<(String, CelType)> {
    let entries = [
        ("bool", CelType::Bool),
        ("int", CelType::Int),
        ("uint", CelType::Uint),
        ("double", CelType::Double),
        ("string", CelType::String),
        ("bytes", CelType::Bytes),
        ("list", CelType::list_of(CelType::Dyn)),
        ("map", CelType::map_of(CelType::Dyn, CelType::Dyn)),
        ("null_type", CelType::Null),
        ("type", CelType::type_of(CelType::Dyn)),
        ("dyn", CelType::Dyn),
    ];

    entries
        .into_iter()
        .map(|(name, t)| (name.to_string(), CelType::type_of(t)))
        .collect()
}

/// Relational overloads: every numeric cross-type pair plus the remaining
/// comparable types.
fn relation_overloads(prefix: &str) -> Vec<Overload> {
    let numeric = [CelType::Int, CelType::Uint, CelType::Double];
    let mut overloads = vec![];

    for left in &numeric {
        for right in &numeric {
            overloads.push(Overload::global(
                format!("{prefix}_{}_{}", type_short_name(left), type_short_name(right)),
                vec![left.clone(), right.clone()],
                CelType::Bool,
            ));
        }
    }

    for t in [
        CelType::Bool,
        CelType::String,
        CelType::Bytes,
        CelType::Timestamp,
        CelType::Duration,
    ] {
        overloads.push(Overload::global(
            format!("{prefix}_{}", type_short_name(&t)),
            vec![t.clone(), t],
            CelType::Bool,
        ));
    }

    overloads
}

/// Conversion declarations; `id_suffix` is the overload-id spelling of the
/// target type (e.g. the public `int` converts via `*_to_int64`).
fn conversion_overloads(
    name: &str,
    id_suffix: &str,
    sources: &[CelType],
    result: CelType,
) -> FunctionDecl {
    let overloads = sources
        .iter()
        .map(|source| {
            Overload::global(
                format!("{}_to_{id_suffix}", type_short_name(source)),
                vec![source.clone()],
                result.clone(),
            )
        })
        .collect();
    FunctionDecl::new(name, overloads)
}

fn timestamp_accessor(name: &str, id: &str, on_duration: bool) -> FunctionDecl {
    let mut overloads = vec![
        Overload::member(
            format!("timestamp_{id}"),
            vec![CelType::Timestamp],
            CelType::Int,
        ),
        Overload::member(
            format!("timestamp_{id}_with_tz"),
            vec![CelType::Timestamp, CelType::String],
            CelType::Int,
        ),
    ];
    if on_duration {
        overloads.push(Overload::member(
            format!("duration_{id}"),
            vec![CelType::Duration],
            CelType::Int,
        ));
    }
    FunctionDecl::new(name, overloads)
}

fn build_standard_declarations() -> Vec<FunctionDecl> {
    vec![
        FunctionDecl::new(
            "_?_:_",
            vec![Overload::global(
                "conditional",
                vec![CelType::Bool, param_a(), param_a()],
                param_a(),
            )],
        ),
        FunctionDecl::new(
            "_&&_",
            vec![Overload::global(
                "logical_and",
                vec![CelType::Bool, CelType::Bool],
                CelType::Bool,
            )],
        ),
        FunctionDecl::new(
            "_||_",
            vec![Overload::global(
                "logical_or",
                vec![CelType::Bool, CelType::Bool],
                CelType::Bool,
            )],
        ),
        FunctionDecl::new(
            "!_",
            vec![Overload::global(
                "logical_not",
                vec![CelType::Bool],
                CelType::Bool,
            )],
        ),
        FunctionDecl::new(
            crate::parser::NOT_STRICTLY_FALSE,
            vec![Overload::global(
                "not_strictly_false",
                vec![CelType::Bool],
                CelType::Bool,
            )],
        ),
        FunctionDecl::new(
            "_==_",
            vec![Overload::global(
                "equals",
                vec![param_a(), param_a()],
                CelType::Bool,
            )],
        ),
        FunctionDecl::new(
            "_!=_",
            vec![Overload::global(
                "not_equals",
                vec![param_a(), param_a()],
                CelType::Bool,
            )],
        ),
        FunctionDecl::new("_<_", relation_overloads("less")),
        FunctionDecl::new("_<=_", relation_overloads("less_equals")),
        FunctionDecl::new("_>_", relation_overloads("greater")),
        FunctionDecl::new("_>=_", relation_overloads("greater_equals")),
        FunctionDecl::new(
            "_+_",
            vec![
                Overload::global("add_int64", vec![CelType::Int, CelType::Int], CelType::Int),
                Overload::global(
                    "add_uint64",
                    vec![CelType::Uint, CelType::Uint],
                    CelType::Uint,
                ),
                Overload::global(
                    "add_double",
                    vec![CelType::Double, CelType::Double],
                    CelType::Double,
                ),
                Overload::global(
                    "add_string",
                    vec![CelType::String, CelType::String],
                    CelType::String,
                ),
                Overload::global(
                    "add_bytes",
                    vec![CelType::Bytes, CelType::Bytes],
                    CelType::Bytes,
                ),
                Overload::global(
                    "add_list",
                    vec![
                        CelType::list_of(param_a()),
                        CelType::list_of(param_a()),
                    ],
                    CelType::list_of(param_a()),
                ),
                Overload::global(
                    "add_timestamp_duration",
                    vec![CelType::Timestamp, CelType::Duration],
                    CelType::Timestamp,
                ),
                Overload::global(
                    "add_duration_timestamp",
                    vec![CelType::Duration, CelType::Timestamp],
                    CelType::Timestamp,
                ),
                Overload::global(
                    "add_duration_duration",
                    vec![CelType::Duration, CelType::Duration],
                    CelType::Duration,
                ),
            ],
        ),
        FunctionDecl::new(
            "_-_",
            vec![
                Overload::global(
                    "subtract_int64",
                    vec![CelType::Int, CelType::Int],
                    CelType::Int,
                ),
                Overload::global(
                    "subtract_uint64",
                    vec![CelType::Uint, CelType::Uint],
                    CelType::Uint,
                ),
                Overload::global(
                    "subtract_double",
                    vec![CelType::Double, CelType::Double],
                    CelType::Double,
                ),
                Overload::global(
                    "subtract_timestamp_timestamp",
                    vec![CelType::Timestamp, CelType::Timestamp],
                    CelType::Duration,
                ),
                Overload::global(
                    "subtract_timestamp_duration",
                    vec![CelType::Timestamp, CelType::Duration],
                    CelType::Timestamp,
                ),
                Overload::global(
                    "subtract_duration_duration",
                    vec![CelType::Duration, CelType::Duration],
                    CelType::Duration,
                ),
            ],
        ),
        FunctionDecl::new(
            "_*_",
            vec![
                Overload::global(
                    "multiply_int64",
                    vec![CelType::Int, CelType::Int],
                    CelType::Int,
                ),
                Overload::global(
                    "multiply_uint64",
                    vec![CelType::Uint, CelType::Uint],
                    CelType::Uint,
                ),
                Overload::global(
                    "multiply_double",
                    vec![CelType::Double, CelType::Double],
                    CelType::Double,
                ),
            ],
        ),
        FunctionDecl::new(
            "_/_",
            vec![
                Overload::global(
                    "divide_int64",
                    vec![CelType::Int, CelType::Int],
                    CelType::Int,
                ),
                Overload::global(
                    "divide_uint64",
                    vec![CelType::Uint, CelType::Uint],
                    CelType::Uint,
                ),
                Overload::global(
                    "divide_double",
                    vec![CelType::Double, CelType::Double],
                    CelType::Double,
                ),
            ],
        ),
        FunctionDecl::new(
            "_%_",
            vec![
                Overload::global(
                    "modulo_int64",
                    vec![CelType::Int, CelType::Int],
                    CelType::Int,
                ),
                Overload::global(
                    "modulo_uint64",
                    vec![CelType::Uint, CelType::Uint],
                    CelType::Uint,
                ),
            ],
        ),
        FunctionDecl::new(
            "-_",
            vec![
                Overload::global("negate_int64", vec![CelType::Int], CelType::Int),
                Overload::global("negate_double", vec![CelType::Double], CelType::Double),
                Overload::global("negate_duration", vec![CelType::Duration], CelType::Duration),
            ],
        ),
        FunctionDecl::new(
            "_[_]",
            vec![
                Overload::global(
                    "index_list",
                    vec![CelType::list_of(param_a()), CelType::Int],
                    param_a(),
                ),
                Overload::global(
                    "index_map",
                    vec![CelType::map_of(param_a(), param_b()), param_a()],
                    param_b(),
                ),
            ],
        ),
        FunctionDecl::new(
            "@in",
            vec![
                Overload::global(
                    "in_list",
                    vec![param_a(), CelType::list_of(param_a())],
                    CelType::Bool,
                ),
                Overload::global(
                    "in_map",
                    vec![param_a(), CelType::map_of(param_a(), param_b())],
                    CelType::Bool,
                ),
            ],
        ),
        FunctionDecl::new(
            "size",
            vec![
                Overload::global("size_string", vec![CelType::String], CelType::Int),
                Overload::global("size_bytes", vec![CelType::Bytes], CelType::Int),
                Overload::global(
                    "size_list",
                    vec![CelType::list_of(param_a())],
                    CelType::Int,
                ),
                Overload::global(
                    "size_map",
                    vec![CelType::map_of(param_a(), param_b())],
                    CelType::Int,
                ),
                Overload::member("string_size", vec![CelType::String], CelType::Int),
                Overload::member("bytes_size", vec![CelType::Bytes], CelType::Int),
                Overload::member(
                    "list_size",
                    vec![CelType::list_of(param_a())],
                    CelType::Int,
                ),
                Overload::member(
                    "map_size",
                    vec![CelType::map_of(param_a(), param_b())],
                    CelType::Int,
                ),
            ],
        ),
        FunctionDecl::new(
            "contains",
            vec![Overload::member(
                "contains_string",
                vec![CelType::String, CelType::String],
                CelType::Bool,
            )],
        ),
        FunctionDecl::new(
            "startsWith",
            vec![Overload::member(
                "starts_with_string",
                vec![CelType::String, CelType::String],
                CelType::Bool,
            )],
        ),
        FunctionDecl::new(
            "endsWith",
            vec![Overload::member(
                "ends_with_string",
                vec![CelType::String, CelType::String],
                CelType::Bool,
            )],
        ),
        FunctionDecl::new(
            "matches",
            vec![
                Overload::global(
                    "matches",
                    vec![CelType::String, CelType::String],
                    CelType::Bool,
                ),
                Overload::member(
                    "matches_string",
                    vec![CelType::String, CelType::String],
                    CelType::Bool,
                ),
            ],
        ),
        conversion_overloads(
            "int",
            "int64",
            &[
                CelType::Int,
                CelType::Uint,
                CelType::Double,
                CelType::String,
                CelType::Timestamp,
                CelType::Duration,
            ],
            CelType::Int,
        ),
        conversion_overloads(
            "uint",
            "uint64",
            &[CelType::Uint, CelType::Int, CelType::Double, CelType::String],
            CelType::Uint,
        ),
        conversion_overloads(
            "double",
            "double",
            &[CelType::Double, CelType::Int, CelType::Uint, CelType::String],
            CelType::Double,
        ),
        conversion_overloads(
            "string",
            "string",
            &[
                CelType::String,
                CelType::Int,
                CelType::Uint,
                CelType::Double,
                CelType::Bool,
                CelType::Bytes,
                CelType::Timestamp,
                CelType::Duration,
            ],
            CelType::String,
        ),
        conversion_overloads(
            "bytes",
            "bytes",
            &[CelType::Bytes, CelType::String],
            CelType::Bytes,
        ),
        conversion_overloads("bool", "bool", &[CelType::Bool, CelType::String], CelType::Bool),
        conversion_overloads(
            "timestamp",
            "timestamp",
            &[CelType::Timestamp, CelType::String, CelType::Int],
            CelType::Timestamp,
        ),
        conversion_overloads(
            "duration",
            "duration",
            &[CelType::Duration, CelType::String, CelType::Int],
            CelType::Duration,
        ),
        FunctionDecl::new(
            "dyn",
            vec![Overload::global("to_dyn", vec![param_a()], CelType::Dyn)],
        ),
        FunctionDecl::new(
            "type",
            vec![Overload::global(
                "type",
                vec![param_a()],
                CelType::type_of(param_a()),
            )],
        ),
        timestamp_accessor("getFullYear", "full_year", false),
        timestamp_accessor("getMonth", "month", false),
        timestamp_accessor("getDayOfYear", "day_of_year", false),
        timestamp_accessor("getDayOfMonth", "day_of_month", false),
        timestamp_accessor("getDate", "date", false),
        timestamp_accessor("getDayOfWeek", "day_of_week", false),
        timestamp_accessor("getHours", "hours", true),
        timestamp_accessor("getMinutes", "minutes", true),
        timestamp_accessor("getSeconds", "seconds", true),
        timestamp_accessor("getMilliseconds", "milliseconds", true),
    ]
}

pub fn register_standard(registry: &mut FunctionRegistry) {
    registry.register("_+_", arithmetic::add);
    registry.register("_-_", arithmetic::subtract);
    registry.register("_*_", arithmetic::multiply);
    registry.register("_/_", arithmetic::divide);
    registry.register("_%_", arithmetic::modulo);
    registry.register("-_", arithmetic::negate);

    registry.register("_==_", comparisons::equals);
    registry.register("_!=_", comparisons::not_equals);
    registry.register("_<_", comparisons::less);
    registry.register("_<=_", comparisons::less_equals);
    registry.register("_>_", comparisons::greater);
    registry.register("_>=_", comparisons::greater_equals);
    registry.register("@in", comparisons::contained_in);

    registry.register("!_", |args: &[Value]| match args {
        [Value::Bool(value)] => Value::Bool(!value),
        _ => Value::Error(crate::values::EvalError::overload_not_found("!_")),
    });
    registry.register(
        crate::parser::NOT_STRICTLY_FALSE,
        |args: &[Value]| match args {
            [Value::Bool(false)] => Value::Bool(false),
            _ => Value::Bool(true),
        },
    );

    registry.register("size", strings::size);
    registry.register("contains", strings::contains);
    registry.register("startsWith", strings::starts_with);
    registry.register("endsWith", strings::ends_with);
    registry.register("matches", strings::matches);
    registry.register("_[_]", strings::index);

    registry.register("int", conversions::to_int);
    registry.register("uint", conversions::to_uint);
    registry.register("double", conversions::to_double);
    registry.register("string", conversions::to_string_fn);
    registry.register("bytes", conversions::to_bytes);
    registry.register("bool", conversions::to_bool);
    registry.register("timestamp", conversions::to_timestamp);
    registry.register("duration", conversions::to_duration);
    registry.register("dyn", conversions::to_dyn);
    registry.register("type", conversions::to_type);

    registry.register("getFullYear", timefns::get_full_year);
    registry.register("getMonth", timefns::get_month);
    registry.register("getDayOfYear", timefns::get_day_of_year);
    registry.register("getDayOfMonth", timefns::get_day_of_month);
    registry.register("getDate", timefns::get_date);
    registry.register("getDayOfWeek", timefns::get_day_of_week);
    registry.register("getHours", timefns::get_hours);
    registry.register("getMinutes", timefns::get_minutes);
    registry.register("getSeconds", timefns::get_seconds);
    registry.register("getMilliseconds", timefns::get_milliseconds);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declarations_cover_bindings() {
        let decls = standard_declarations();
        let names: Vec<&str> = decls.iter().map(|decl| decl.name.as_str()).collect();

        for required in [
            "_?_:_", "_&&_", "_||_", "!_", "_==_", "_<_", "_+_", "_[_]", "@in", "size",
            "matches", "int", "uint", "double", "string", "timestamp", "duration", "type",
            "getHours",
        ] {
            assert!(names.contains(&required), "missing declaration: {required}");
        }
    }

    #[test]
    fn test_relation_overload_count() {
        // 9 numeric pairs + 5 same-type comparables.
        assert_eq!(relation_overloads("less").len(), 14);
    }

    #[test]
    fn test_standard_variables_are_types() {
        let vars = standard_variables();
        let int_decl = vars.iter().find(|(name, _)| name == "int").unwrap();
        assert_eq!(int_decl.1, CelType::type_of(CelType::Int));
    }
}
