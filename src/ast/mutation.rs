use std::collections::HashMap;

use super::{Expr, ExprId, ExprKind, ParsedAst};

/// Rewrite every id in the tree to a dense 1-based sequence assigned in
/// pre-order (parent before child, left to right). The position and
/// macro-call side tables are rewritten through the same mapping so they stay
/// consistent with the renumbered nodes.
pub fn renumber(ast: &mut ParsedAst) {
    let mut mapping = HashMap::new();
    let mut next_id: ExprId = 0;
    assign_ids(&mut ast.expr, &mut mapping, &mut next_id);

    let positions = std::mem::take(ast.source_info.positions_mut());
    *ast.source_info.positions_mut() = positions
        .into_iter()
        .filter_map(|(id, offset)| mapping.get(&id).map(|new_id| (*new_id, offset)))
        .collect();

    let macro_calls = std::mem::take(ast.source_info.macro_calls_mut());
    *ast.source_info.macro_calls_mut() = macro_calls
        .into_iter()
        .filter_map(|(id, mut call)| {
            let new_id = *mapping.get(&id)?;
            remap_ids(&mut call, &mapping, &mut next_id);
            Some((new_id, call))
        })
        .collect();
}

fn assign_ids(expr: &mut Expr, mapping: &mut HashMap<ExprId, ExprId>, next_id: &mut ExprId) {
    *next_id += 1;
    mapping.insert(expr.id, *next_id);
    expr.id = *next_id;

    for child in expr.children_mut() {
        assign_ids(child, mapping, next_id);
    }
}

/// Remap ids in a detached subtree (a macro-call record). Ids without a
/// mapping belong to nodes that only exist pre-expansion; they receive fresh
/// ids past the end of the dense range.
fn remap_ids(expr: &mut Expr, mapping: &HashMap<ExprId, ExprId>, next_id: &mut ExprId) {
    match mapping.get(&expr.id) {
        Some(new_id) => expr.id = *new_id,
        None => {
            *next_id += 1;
            expr.id = *next_id;
        }
    }

    for child in expr.children_mut() {
        remap_ids(child, mapping, next_id);
    }
}

/// Replace the subtree rooted at `target_id` with `replacement`, then
/// renumber the whole tree to rule out id collisions. Macro-call records
/// whose expansion root was inside the replaced subtree are dropped.
pub fn replace_subtree(ast: &mut ParsedAst, target_id: ExprId, replacement: Expr) -> bool {
    let removed = collect_ids(find(&ast.expr, target_id));
    if removed.is_empty() {
        return false;
    }

    replace_in(&mut ast.expr, target_id, replacement);

    ast.source_info
        .macro_calls_mut()
        .retain(|id, _| !removed.contains(id));
    ast.source_info
        .positions_mut()
        .retain(|id, _| !removed.contains(id));

    renumber(ast);
    true
}

fn find<'a>(expr: &'a Expr, id: ExprId) -> Option<&'a Expr> {
    if expr.id == id {
        return Some(expr);
    }
    expr.children().into_iter().find_map(|child| find(child, id))
}

fn collect_ids(expr: Option<&Expr>) -> Vec<ExprId> {
    let Some(expr) = expr else {
        return vec![];
    };

    let mut ids = vec![expr.id];
    for child in expr.children() {
        ids.extend(collect_ids(Some(child)));
    }
    ids
}

fn replace_in(expr: &mut Expr, target_id: ExprId, replacement: Expr) -> bool {
    for child in expr.children_mut() {
        if child.id == target_id {
            *child = replacement;
            return true;
        }
        if replace_in(child, target_id, replacement.clone()) {
            return true;
        }
    }

    if expr.id == target_id {
        *expr = replacement;
        return true;
    }

    false
}

/// Rename every free occurrence of the identifier `from` to `to`. Occurrences
/// shadowed by a comprehension variable of the same name are left alone.
pub fn mangle_ident(expr: &mut Expr, from: &str, to: &str) {
    match &mut expr.kind {
        ExprKind::Ident(name) => {
            if name == from {
                *name = to.to_string();
            }
        }
        ExprKind::Comprehension(comprehension) => {
            mangle_ident(&mut comprehension.iter_range, from, to);
            mangle_ident(&mut comprehension.accu_init, from, to);
            let shadowed =
                comprehension.iter_var == from || comprehension.accu_var == from;
            if !shadowed {
                mangle_ident(&mut comprehension.loop_cond, from, to);
                mangle_ident(&mut comprehension.loop_step, from, to);
                mangle_ident(&mut comprehension.result, from, to);
            }
        }
        _ => {
            for child in expr.children_mut() {
                mangle_ident(child, from, to);
            }
        }
    }
}
