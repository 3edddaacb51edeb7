//! Static attribute paths for unknown-pattern matching.
//!
//! A select/index chain rooted at an identifier with constant qualifiers has
//! a static attribute; the evaluator tests it against declared unknown
//! patterns (and the re-evaluation overlay) before concrete evaluation.

use crate::ast::{Constant, Expr, ExprKind};
use crate::checker::Reference;
use crate::values::{Attribute, Qualifier};

/// The static attribute of an expression, when it has one. The `resolve`
/// callback maps the root identifier through the reference map so container
/// resolution is honored.
pub fn static_attribute(
    expr: &Expr,
    reference_of: &dyn Fn(&Expr) -> Option<Reference>,
) -> Option<Attribute> {
    match &expr.kind {
        ExprKind::Ident(name) => {
            let resolved = match reference_of(expr) {
                Some(Reference::Variable(resolved)) => resolved,
                _ => name.clone(),
            };
            Some(Attribute::new(resolved))
        }
        ExprKind::Select {
            operand,
            field,
            test_only: false,
        } => Some(static_attribute(operand, reference_of)?.select(field.clone())),
        ExprKind::Call {
            function,
            target: None,
            args,
        } if function == "_[_]" && args.len() == 2 => {
            let base = static_attribute(&args[0], reference_of)?;
            let qualifier = constant_qualifier(&args[1])?;
            Some(base.key(qualifier))
        }
        _ => None,
    }
}

fn constant_qualifier(expr: &Expr) -> Option<Qualifier> {
    let ExprKind::Const(constant) = &expr.kind else {
        return None;
    };
    match constant {
        Constant::String(key) => Some(Qualifier::StringKey(key.clone())),
        Constant::Int(key) => Some(Qualifier::IntKey(*key)),
        Constant::Uint(key) => Some(Qualifier::UintKey(*key)),
        Constant::Bool(key) => Some(Qualifier::BoolKey(*key)),
        _ => None,
    }
}
