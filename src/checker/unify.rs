//! Assignability and type-parameter unification.
//!
//! Overload resolution accumulates substitutions for type parameters while
//! testing argument assignability; the lattice keeps `dyn` assignable in both
//! directions and never widens numeric types silently.

use std::collections::HashMap;

use crate::types::CelType;

pub type Substitution = HashMap<String, CelType>;

/// Resolve type parameters through the substitution, recursively.
pub fn substitute(sub: &Substitution, t: &CelType) -> CelType {
    match t {
        CelType::TypeParam(name) => match sub.get(name) {
            Some(bound) => substitute(sub, bound),
            None => t.clone(),
        },
        CelType::List(element) => CelType::list_of(substitute(sub, element)),
        CelType::Map(key, value) => {
            CelType::map_of(substitute(sub, key), substitute(sub, value))
        }
        CelType::TypeOf(inner) => CelType::type_of(substitute(sub, inner)),
        CelType::Wrapper(inner) => CelType::Wrapper(Box::new(substitute(sub, inner))),
        CelType::Opaque(name, params) => CelType::Opaque(
            name.clone(),
            params.iter().map(|param| substitute(sub, param)).collect(),
        ),
        _ => t.clone(),
    }
}

/// Whether `source` can be assigned where `target` is expected, extending the
/// substitution with any type-parameter bindings the match requires.
pub fn is_assignable(sub: &mut Substitution, target: &CelType, source: &CelType) -> bool {
    let target = substitute(sub, target);
    let source = substitute(sub, source);

    if target == source {
        return true;
    }

    match (&target, &source) {
        // dyn is assignable in both directions; error suppresses cascades.
        (CelType::Dyn, _) | (_, CelType::Dyn) => true,
        (CelType::Error, _) | (_, CelType::Error) => true,

        (CelType::TypeParam(name), _) => {
            if occurs_in(name, &source) {
                return false;
            }
            sub.insert(name.clone(), source);
            true
        }
        (_, CelType::TypeParam(name)) => {
            if occurs_in(name, &target) {
                return false;
            }
            sub.insert(name.clone(), target);
            true
        }

        // Wrappers admit null and their primitive; a wrapper value fits where
        // its primitive is expected.
        (CelType::Wrapper(_), CelType::Null) => true,
        (CelType::Wrapper(inner), _) => is_assignable(sub, inner, &source),
        (_, CelType::Wrapper(inner)) => is_assignable(sub, &target, inner),

        // Null is a valid message and optional value.
        (CelType::Message(_), CelType::Null) => true,
        (CelType::Opaque(name, _), CelType::Null) if name == "optional_type" => true,

        // Enums carry their underlying integer.
        (CelType::Int, CelType::Enum(_)) | (CelType::Enum(_), CelType::Int) => true,

        (CelType::List(target_element), CelType::List(source_element)) => {
            is_assignable(sub, target_element, source_element)
        }
        (CelType::Map(target_key, target_value), CelType::Map(source_key, source_value)) => {
            is_assignable(sub, target_key, source_key)
                && is_assignable(sub, target_value, source_value)
        }
        (CelType::TypeOf(target_inner), CelType::TypeOf(source_inner)) => {
            is_assignable(sub, target_inner, source_inner)
        }
        (CelType::Opaque(target_name, target_params), CelType::Opaque(source_name, source_params)) => {
            target_name == source_name
                && target_params.len() == source_params.len()
                && target_params
                    .iter()
                    .zip(source_params)
                    .all(|(target_param, source_param)| {
                        is_assignable(sub, target_param, source_param)
                    })
        }

        _ => false,
    }
}

fn occurs_in(name: &str, t: &CelType) -> bool {
    match t {
        CelType::TypeParam(other) => name == other,
        CelType::List(element) => occurs_in(name, element),
        CelType::Map(key, value) => occurs_in(name, key) || occurs_in(name, value),
        CelType::TypeOf(inner) | CelType::Wrapper(inner) => occurs_in(name, inner),
        CelType::Opaque(_, params) => params.iter().any(|param| occurs_in(name, param)),
        _ => false,
    }
}

/// Least upper bound used for candidate result types and branch joins:
/// agreement keeps the type, disagreement collapses to `dyn`.
pub fn join(left: &CelType, right: &CelType) -> CelType {
    if left == right {
        return left.clone();
    }
    if matches!(left, CelType::Error) {
        return right.clone();
    }
    if matches!(right, CelType::Error) {
        return left.clone();
    }
    CelType::Dyn
}
