//! Constant folding: evaluate maximal closed subtrees and replace them with
//! their literal result.
//!
//! A subtree folds only when it has no free identifiers and no impure calls,
//! and only when evaluation yields a scalar. Subtrees that error at fold
//! time (division by zero, overflow, bad timestamp text) stay untouched so
//! the runtime error semantics are preserved.

use std::collections::HashMap;
use std::sync::Arc;

use crate::ast::{renumber, Constant, Expr, ExprKind, ParsedAst, SourceInfo};
use crate::checker::CheckedAst;
use crate::interpreter::{EmptyActivation, EvalOptions, Interpreter};
use crate::registry::FunctionRegistry;
use crate::source::Source;
use crate::types::DeclaredTypeProvider;
use crate::values::{provider::DynValueProvider, Value};

use super::OptimizerPass;

/// Functions whose results depend on more than their arguments.
const IMPURE_FUNCTIONS: &[&str] = &["now"];

pub struct ConstantFolding {
    registry: Arc<FunctionRegistry>,
}

impl ConstantFolding {
    pub fn new(registry: Arc<FunctionRegistry>) -> ConstantFolding {
        ConstantFolding { registry }
    }

    fn try_fold(&self, expr: &Expr) -> Option<Constant> {
        let mut bound = vec![];
        if !is_closed(expr, &mut bound) {
            return None;
        }

        // Evaluate the subtree in an empty environment.
        let checked = CheckedAst {
            expr: expr.clone(),
            source_info: SourceInfo::new(Source::from_text("")),
            type_map: HashMap::new(),
            reference_map: HashMap::new(),
        };
        let types = Arc::new(DeclaredTypeProvider::new());
        let provider = DynValueProvider::new(types.clone());
        let options = EvalOptions::default();
        let resolved = HashMap::new();
        let interpreter = Interpreter::new(
            &checked,
            &EmptyActivation,
            &self.registry,
            &provider,
            &types,
            &options,
            &resolved,
            None,
        );

        match interpreter.run() {
            Ok(Value::Null) => Some(Constant::Null),
            Ok(Value::Bool(value)) => Some(Constant::Bool(value)),
            Ok(Value::Int(value)) => Some(Constant::Int(value)),
            Ok(Value::Uint(value)) => Some(Constant::Uint(value)),
            Ok(Value::Double(value)) => Some(Constant::Double(value)),
            Ok(Value::String(value)) => Some(Constant::String(value)),
            Ok(Value::Bytes(value)) => Some(Constant::Bytes(value)),
            // Aggregates keep their literal form; errors keep the original
            // subtree so they still surface at runtime.
            Ok(_) | Err(_) => None,
        }
    }

    /// Folded nodes take fresh ids so stale macro-call records (keyed by the
    /// replaced subtree's ids) drop out during renumbering.
    fn fold(&self, expr: Expr, next_id: &mut i64) -> Expr {
        if matches!(expr.kind, ExprKind::Const(_)) {
            return expr;
        }
        if let Some(constant) = self.try_fold(&expr) {
            *next_id += 1;
            return Expr::new(*next_id, ExprKind::Const(constant));
        }

        let mut expr = expr;
        for child in expr.children_mut() {
            let folded = self.fold(child.clone(), next_id);
            *child = folded;
        }
        expr
    }
}

impl OptimizerPass for ConstantFolding {
    fn run(&self, ast: ParsedAst) -> ParsedAst {
        let mut ast = ast;
        let mut next_id = ast.expr.max_id();
        ast.expr = self.fold(ast.expr, &mut next_id);
        renumber(&mut ast);
        ast
    }
}

/// No free identifiers, no impure calls, no message construction.
fn is_closed(expr: &Expr, bound: &mut Vec<String>) -> bool {
    match &expr.kind {
        ExprKind::Const(_) => true,
        ExprKind::Ident(name) => bound.iter().any(|candidate| candidate == name),
        ExprKind::Select {
            operand,
            test_only: false,
            ..
        } => is_closed(operand, bound),
        ExprKind::Select { .. } => false,
        ExprKind::Call {
            function,
            target,
            args,
        } => {
            if IMPURE_FUNCTIONS.contains(&function.as_str()) {
                return false;
            }
            if let Some(target) = target {
                if !is_closed(target, bound) {
                    return false;
                }
            }
            args.iter().all(|arg| is_closed(arg, bound))
        }
        ExprKind::List { elements, .. } => {
            elements.iter().all(|element| is_closed(element, bound))
        }
        ExprKind::Map { entries } => entries
            .iter()
            .all(|entry| is_closed(&entry.key, bound) && is_closed(&entry.value, bound)),
        // Message construction depends on the value provider.
        ExprKind::Struct { .. } => false,
        ExprKind::Comprehension(comprehension) => {
            if !is_closed(&comprehension.iter_range, bound)
                || !is_closed(&comprehension.accu_init, bound)
            {
                return false;
            }
            bound.push(comprehension.accu_var.clone());
            bound.push(comprehension.iter_var.clone());
            let body_closed = is_closed(&comprehension.loop_cond, bound)
                && is_closed(&comprehension.loop_step, bound);
            bound.pop();
            let result_closed = body_closed && is_closed(&comprehension.result, bound);
            bound.pop();
            result_closed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::unparser::unparse;

    fn fold_text(input: &str) -> String {
        let ast = parse(Source::from_text(input)).expect("parse");
        let pass = ConstantFolding::new(Arc::new(FunctionRegistry::standard()));
        let folded = pass.run(ast);
        unparse(&folded.expr, &folded.source_info)
    }

    #[test]
    fn test_folds_closed_arithmetic() {
        assert_eq!(fold_text("1 + 2 + 3 == x"), "6 == x");
    }

    #[test]
    fn test_folds_string_functions() {
        assert_eq!(fold_text("'hello'.startsWith('he')"), "true");
    }

    #[test]
    fn test_folds_closed_comprehensions() {
        assert_eq!(fold_text("[1, 2, 3].all(i, i > 0)"), "true");
    }

    #[test]
    fn test_keeps_free_variables() {
        assert_eq!(fold_text("x + 1"), "x + 1");
    }

    #[test]
    fn test_keeps_runtime_errors() {
        // Division by zero must keep its runtime semantics.
        assert_eq!(fold_text("1 / 0"), "1 / 0");
        assert_eq!(fold_text("x == 1 / 0"), "x == 1 / 0");
    }

    #[test]
    fn test_folds_inside_aggregates() {
        assert_eq!(fold_text("[1 + 1, x]"), "[2, x]");
    }
}
