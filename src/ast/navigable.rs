use std::collections::HashMap;

use super::{Expr, ExprId};

/// Structural navigation over an immutable tree.
///
/// Nodes carry no back-pointers; the parent index is computed once from the
/// tree and keyed by node id, so the view stays valid for as long as the tree
/// it borrows from.
pub struct NavigableAst<'a> {
    nodes: HashMap<ExprId, &'a Expr>,
    parents: HashMap<ExprId, ExprId>,
    /// Pre-order (parent before child, left to right).
    order: Vec<ExprId>,
}

impl<'a> NavigableAst<'a> {
    pub fn new(root: &'a Expr) -> NavigableAst<'a> {
        let mut view = NavigableAst {
            nodes: HashMap::new(),
            parents: HashMap::new(),
            order: vec![],
        };
        view.index(root, None);
        view
    }

    fn index(&mut self, expr: &'a Expr, parent: Option<ExprId>) {
        self.nodes.insert(expr.id, expr);
        self.order.push(expr.id);
        if let Some(parent) = parent {
            self.parents.insert(expr.id, parent);
        }

        for child in expr.children() {
            self.index(child, Some(expr.id));
        }
    }

    pub fn node(&self, id: ExprId) -> Option<&'a Expr> {
        self.nodes.get(&id).copied()
    }

    pub fn parent(&self, id: ExprId) -> Option<&'a Expr> {
        self.parents.get(&id).and_then(|parent| self.node(*parent))
    }

    pub fn children(&self, id: ExprId) -> Vec<&'a Expr> {
        self.node(id).map(|expr| expr.children()).unwrap_or_default()
    }

    /// All nodes strictly below `id`, in pre-order.
    pub fn descendants(&self, id: ExprId) -> Vec<&'a Expr> {
        let mut out = vec![];
        if let Some(expr) = self.node(id) {
            for child in expr.children() {
                out.push(child);
                out.extend(self.descendants(child.id));
            }
        }
        out
    }

    /// Every node in the tree, parent before child, left to right.
    pub fn all_nodes(&self) -> Vec<&'a Expr> {
        self.order
            .iter()
            .filter_map(|id| self.node(*id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ExprKind;

    fn sample() -> Expr {
        // a.b + c
        Expr::new(
            4,
            ExprKind::Call {
                function: "_+_".into(),
                target: None,
                args: vec![
                    Expr::new(
                        2,
                        ExprKind::Select {
                            operand: Box::new(Expr::new(1, ExprKind::Ident("a".into()))),
                            field: "b".into(),
                            test_only: false,
                        },
                    ),
                    Expr::new(3, ExprKind::Ident("c".into())),
                ],
            },
        )
    }

    #[test]
    fn test_parent_lookup() {
        let root = sample();
        let nav = NavigableAst::new(&root);

        assert_eq!(nav.parent(1).map(|expr| expr.id), Some(2));
        assert_eq!(nav.parent(2).map(|expr| expr.id), Some(4));
        assert!(nav.parent(4).is_none());
    }

    #[test]
    fn test_descendants_preorder() {
        let root = sample();
        let nav = NavigableAst::new(&root);

        let ids = nav
            .descendants(4)
            .iter()
            .map(|expr| expr.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![2, 1, 3]);
    }
}
