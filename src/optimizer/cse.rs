//! Common subexpression elimination.
//!
//! Syntactically identical, side-effect-free subtrees are hoisted into a
//! `cel.@block([sub1, sub2, …], body)` wrapper and the body rewritten to
//! reference them as `@index0`, `@index1`, ….

use std::collections::{HashMap, HashSet};

use crate::ast::{renumber, Expr, ExprKind, ParsedAst};

use super::OptimizerPass;

#[derive(Debug, Clone, Copy, Default)]
pub struct CommonSubexprElimination;

impl OptimizerPass for CommonSubexprElimination {
    fn run(&self, ast: ParsedAst) -> ParsedAst {
        let mut ast = ast;

        // Identifiers bound by any comprehension in the program; subtrees
        // mentioning them cannot be hoisted past their binding scope.
        let mut comprehension_vars = HashSet::new();
        collect_comprehension_vars(&ast.expr, &mut comprehension_vars);

        let mut occurrences: HashMap<String, usize> = HashMap::new();
        count_subtrees(&ast.expr, &comprehension_vars, &mut occurrences);

        // Maximal repeated subtrees, in first-occurrence order.
        let mut shared = vec![];
        collect_shared(&ast.expr, &occurrences, &comprehension_vars, &mut shared);
        if shared.is_empty() {
            return ast;
        }

        let mut next_id = ast.expr.max_id();
        let mut body = ast.expr.clone();
        for (index, key) in shared.iter().enumerate() {
            replace_by_key(&mut body, key, &format!("@index{index}"), &mut next_id);
        }

        let subexprs = shared
            .iter()
            .map(|key| {
                find_by_key(&ast.expr, key)
                    .cloned()
                    .expect("shared subtree must exist")
            })
            .collect::<Vec<_>>();

        next_id += 1;
        let list = Expr::new(
            next_id,
            ExprKind::List {
                elements: subexprs,
                optional_indices: vec![],
            },
        );
        next_id += 1;
        ast.expr = Expr::new(
            next_id,
            ExprKind::Call {
                function: "cel.@block".to_string(),
                target: None,
                args: vec![list, body],
            },
        );

        renumber(&mut ast);
        ast
    }
}

/// Structural fingerprint ignoring ids.
fn structure_key(expr: &Expr) -> String {
    let mut key = String::new();
    write_key(expr, &mut key);
    key
}

fn write_key(expr: &Expr, out: &mut String) {
    match &expr.kind {
        ExprKind::Const(constant) => out.push_str(&format!("c:{constant:?};")),
        ExprKind::Ident(name) => out.push_str(&format!("i:{name};")),
        ExprKind::Select {
            operand,
            field,
            test_only,
        } => {
            out.push_str(&format!("s:{field}:{test_only}("));
            write_key(operand, out);
            out.push(')');
        }
        ExprKind::Call {
            function,
            target,
            args,
        } => {
            out.push_str(&format!("f:{function}("));
            if let Some(target) = target {
                write_key(target, out);
                out.push('|');
            }
            for arg in args {
                write_key(arg, out);
            }
            out.push(')');
        }
        ExprKind::List {
            elements,
            optional_indices,
        } => {
            out.push_str(&format!("l:{optional_indices:?}("));
            for element in elements {
                write_key(element, out);
            }
            out.push(')');
        }
        ExprKind::Map { entries } => {
            out.push_str("m(");
            for entry in entries {
                out.push_str(if entry.optional { "?" } else { "" });
                write_key(&entry.key, out);
                out.push(':');
                write_key(&entry.value, out);
            }
            out.push(')');
        }
        ExprKind::Struct {
            message_name,
            fields,
        } => {
            out.push_str(&format!("t:{message_name}("));
            for field in fields {
                out.push_str(&format!("{}:", field.name));
                write_key(&field.value, out);
            }
            out.push(')');
        }
        ExprKind::Comprehension(comprehension) => {
            out.push_str(&format!(
                "h:{}:{}(",
                comprehension.iter_var, comprehension.accu_var
            ));
            for child in expr.children() {
                write_key(child, out);
            }
            out.push(')');
        }
    }
}

fn collect_comprehension_vars(expr: &Expr, vars: &mut HashSet<String>) {
    if let ExprKind::Comprehension(comprehension) = &expr.kind {
        vars.insert(comprehension.iter_var.clone());
        vars.insert(comprehension.accu_var.clone());
    }
    for child in expr.children() {
        collect_comprehension_vars(child, vars);
    }
}

/// A subtree is worth sharing when it is bigger than a bare leaf and does
/// not mention a comprehension-bound name it does not itself bind.
fn is_candidate(expr: &Expr, comprehension_vars: &HashSet<String>) -> bool {
    if matches!(expr.kind, ExprKind::Const(_) | ExprKind::Ident(_)) {
        return false;
    }
    !mentions_free(expr, comprehension_vars)
}

fn mentions_free(expr: &Expr, vars: &HashSet<String>) -> bool {
    match &expr.kind {
        ExprKind::Ident(name) => vars.contains(name),
        ExprKind::Comprehension(comprehension) => {
            if mentions_free(&comprehension.iter_range, vars)
                || mentions_free(&comprehension.accu_init, vars)
            {
                return true;
            }
            let mut body_vars = vars.clone();
            body_vars.remove(&comprehension.iter_var);
            body_vars.remove(&comprehension.accu_var);
            if mentions_free(&comprehension.loop_cond, &body_vars)
                || mentions_free(&comprehension.loop_step, &body_vars)
            {
                return true;
            }
            let mut result_vars = vars.clone();
            result_vars.remove(&comprehension.accu_var);
            mentions_free(&comprehension.result, &result_vars)
        }
        _ => expr
            .children()
            .iter()
            .any(|child| mentions_free(child, vars)),
    }
}

fn count_subtrees(
    expr: &Expr,
    comprehension_vars: &HashSet<String>,
    occurrences: &mut HashMap<String, usize>,
) {
    if is_candidate(expr, comprehension_vars) {
        *occurrences.entry(structure_key(expr)).or_insert(0) += 1;
    }
    for child in expr.children() {
        count_subtrees(child, comprehension_vars, occurrences);
    }
}

/// Pre-order walk picking repeated subtrees; children of a picked subtree
/// are not considered, which keeps the picks maximal.
fn collect_shared(
    expr: &Expr,
    occurrences: &HashMap<String, usize>,
    comprehension_vars: &HashSet<String>,
    shared: &mut Vec<String>,
) {
    if is_candidate(expr, comprehension_vars) {
        let key = structure_key(expr);
        if occurrences.get(&key).copied().unwrap_or(0) >= 2 {
            if !shared.contains(&key) {
                shared.push(key);
            }
            return;
        }
    }
    for child in expr.children() {
        collect_shared(child, occurrences, comprehension_vars, shared);
    }
}

fn replace_by_key(expr: &mut Expr, key: &str, index_name: &str, next_id: &mut i64) {
    if structure_key(expr) == key {
        *next_id += 1;
        *expr = Expr::new(*next_id, ExprKind::Ident(index_name.to_string()));
        return;
    }
    for child in expr.children_mut() {
        replace_by_key(child, key, index_name, next_id);
    }
}

fn find_by_key<'a>(expr: &'a Expr, key: &str) -> Option<&'a Expr> {
    if structure_key(expr) == key {
        return Some(expr);
    }
    expr.children()
        .into_iter()
        .find_map(|child| find_by_key(child, key))
}
