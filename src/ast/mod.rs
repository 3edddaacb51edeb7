//! The expression tree shared by parser, checker and evaluator.
//!
//! Nodes are a closed sum discriminated by [`ExprKind`]; every node carries a
//! unique positive id that the side tables (positions, macro calls, type map,
//! reference map) are keyed by. The tree is immutable after parse; the
//! mutation helpers in [`mutation`] produce renumbered copies instead of
//! editing in place.

mod mutation;
mod navigable;

pub use self::mutation::*;
pub use self::navigable::*;

use std::collections::HashMap;

use crate::source::Source;

pub type ExprId = i64;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Expr {
    pub id: ExprId,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ExprKind {
    Const(Constant),
    Ident(String),
    Select {
        operand: Box<Expr>,
        field: String,
        /// `true` for the `has(x.f)` form.
        test_only: bool,
    },
    Call {
        function: String,
        /// Present for receiver-style calls.
        target: Option<Box<Expr>>,
        args: Vec<Expr>,
    },
    List {
        elements: Vec<Expr>,
        /// Indices into `elements` marked with the optional-entry syntax.
        optional_indices: Vec<usize>,
    },
    Map {
        entries: Vec<MapEntry>,
    },
    Struct {
        message_name: String,
        fields: Vec<StructField>,
    },
    Comprehension(Box<Comprehension>),
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MapEntry {
    pub key: Expr,
    pub value: Expr,
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StructField {
    pub name: String,
    pub value: Expr,
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Comprehension {
    pub iter_var: String,
    pub iter_range: Expr,
    pub accu_var: String,
    pub accu_init: Expr,
    pub loop_cond: Expr,
    pub loop_step: Expr,
    pub result: Expr,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Constant {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
}

impl Expr {
    pub fn new(id: ExprId, kind: ExprKind) -> Expr {
        Expr { id, kind }
    }

    /// Direct children in stable left-to-right order.
    pub fn children(&self) -> Vec<&Expr> {
        match &self.kind {
            ExprKind::Const(_) | ExprKind::Ident(_) => vec![],
            ExprKind::Select { operand, .. } => vec![operand],
            ExprKind::Call { target, args, .. } => {
                let mut children = vec![];
                if let Some(target) = target {
                    children.push(target.as_ref());
                }
                children.extend(args.iter());
                children
            }
            ExprKind::List { elements, .. } => elements.iter().collect(),
            ExprKind::Map { entries } => entries
                .iter()
                .flat_map(|entry| [&entry.key, &entry.value])
                .collect(),
            ExprKind::Struct { fields, .. } => {
                fields.iter().map(|field| &field.value).collect()
            }
            ExprKind::Comprehension(comprehension) => vec![
                &comprehension.iter_range,
                &comprehension.accu_init,
                &comprehension.loop_cond,
                &comprehension.loop_step,
                &comprehension.result,
            ],
        }
    }

    pub fn children_mut(&mut self) -> Vec<&mut Expr> {
        match &mut self.kind {
            ExprKind::Const(_) | ExprKind::Ident(_) => vec![],
            ExprKind::Select { operand, .. } => vec![operand.as_mut()],
            ExprKind::Call { target, args, .. } => {
                let mut children = vec![];
                if let Some(target) = target {
                    children.push(target.as_mut());
                }
                children.extend(args.iter_mut());
                children
            }
            ExprKind::List { elements, .. } => elements.iter_mut().collect(),
            ExprKind::Map { entries } => entries
                .iter_mut()
                .flat_map(|entry| [&mut entry.key, &mut entry.value])
                .collect(),
            ExprKind::Struct { fields, .. } => {
                fields.iter_mut().map(|field| &mut field.value).collect()
            }
            ExprKind::Comprehension(comprehension) => vec![
                &mut comprehension.iter_range,
                &mut comprehension.accu_init,
                &mut comprehension.loop_cond,
                &mut comprehension.loop_step,
                &mut comprehension.result,
            ],
        }
    }

    /// Structural equality that ignores node ids.
    pub fn structure_eq(&self, other: &Expr) -> bool {
        match (&self.kind, &other.kind) {
            (ExprKind::Const(left), ExprKind::Const(right)) => left == right,
            (ExprKind::Ident(left), ExprKind::Ident(right)) => left == right,
            (
                ExprKind::Select {
                    operand: left_op,
                    field: left_field,
                    test_only: left_test,
                },
                ExprKind::Select {
                    operand: right_op,
                    field: right_field,
                    test_only: right_test,
                },
            ) => {
                left_field == right_field
                    && left_test == right_test
                    && left_op.structure_eq(right_op)
            }
            (
                ExprKind::Call {
                    function: left_fn,
                    target: left_target,
                    args: left_args,
                },
                ExprKind::Call {
                    function: right_fn,
                    target: right_target,
                    args: right_args,
                },
            ) => {
                left_fn == right_fn
                    && match (left_target, right_target) {
                        (None, None) => true,
                        (Some(left), Some(right)) => left.structure_eq(right),
                        _ => false,
                    }
                    && left_args.len() == right_args.len()
                    && left_args
                        .iter()
                        .zip(right_args)
                        .all(|(left, right)| left.structure_eq(right))
            }
            (
                ExprKind::List {
                    elements: left_elements,
                    optional_indices: left_optional,
                },
                ExprKind::List {
                    elements: right_elements,
                    optional_indices: right_optional,
                },
            ) => {
                left_optional == right_optional
                    && left_elements.len() == right_elements.len()
                    && left_elements
                        .iter()
                        .zip(right_elements)
                        .all(|(left, right)| left.structure_eq(right))
            }
            (ExprKind::Map { entries: left }, ExprKind::Map { entries: right }) => {
                left.len() == right.len()
                    && left.iter().zip(right).all(|(left, right)| {
                        left.optional == right.optional
                            && left.key.structure_eq(&right.key)
                            && left.value.structure_eq(&right.value)
                    })
            }
            (
                ExprKind::Struct {
                    message_name: left_name,
                    fields: left_fields,
                },
                ExprKind::Struct {
                    message_name: right_name,
                    fields: right_fields,
                },
            ) => {
                left_name == right_name
                    && left_fields.len() == right_fields.len()
                    && left_fields.iter().zip(right_fields).all(|(left, right)| {
                        left.name == right.name
                            && left.optional == right.optional
                            && left.value.structure_eq(&right.value)
                    })
            }
            (ExprKind::Comprehension(left), ExprKind::Comprehension(right)) => {
                left.iter_var == right.iter_var
                    && left.accu_var == right.accu_var
                    && left.iter_range.structure_eq(&right.iter_range)
                    && left.accu_init.structure_eq(&right.accu_init)
                    && left.loop_cond.structure_eq(&right.loop_cond)
                    && left.loop_step.structure_eq(&right.loop_step)
                    && left.result.structure_eq(&right.result)
            }
            _ => false,
        }
    }

    /// Largest id used anywhere in this subtree.
    pub fn max_id(&self) -> ExprId {
        self.children()
            .iter()
            .map(|child| child.max_id())
            .fold(self.id, ExprId::max)
    }

    /// Depth of the subtree, counting this node as 1.
    pub fn depth(&self) -> usize {
        1 + self
            .children()
            .iter()
            .map(|child| child.depth())
            .max()
            .unwrap_or(0)
    }
}

/// Positional and macro metadata produced alongside the tree.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SourceInfo {
    source: Source,
    /// Byte offset of every node, keyed by id.
    positions: HashMap<ExprId, usize>,
    /// Pre-expansion call forms, keyed by the id of the expansion root.
    macro_calls: HashMap<ExprId, Expr>,
}

impl SourceInfo {
    pub fn new(source: Source) -> SourceInfo {
        SourceInfo {
            source,
            positions: HashMap::new(),
            macro_calls: HashMap::new(),
        }
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn set_position(&mut self, id: ExprId, offset: usize) {
        self.positions.insert(id, offset);
    }

    pub fn position(&self, id: ExprId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    pub fn set_macro_call(&mut self, id: ExprId, call: Expr) {
        self.macro_calls.insert(id, call);
    }

    pub fn macro_call(&self, id: ExprId) -> Option<&Expr> {
        self.macro_calls.get(&id)
    }

    pub fn macro_calls(&self) -> &HashMap<ExprId, Expr> {
        &self.macro_calls
    }

    pub(crate) fn positions_mut(&mut self) -> &mut HashMap<ExprId, usize> {
        &mut self.positions
    }

    pub(crate) fn macro_calls_mut(&mut self) -> &mut HashMap<ExprId, Expr> {
        &mut self.macro_calls
    }
}

/// Output of a successful parse.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ParsedAst {
    pub expr: Expr,
    pub source_info: SourceInfo,
}

impl ParsedAst {
    pub fn navigate(&self) -> NavigableAst<'_> {
        NavigableAst::new(&self.expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(id: ExprId, name: &str) -> Expr {
        Expr::new(id, ExprKind::Ident(name.into()))
    }

    #[test]
    fn test_children_order() {
        let call = Expr::new(
            3,
            ExprKind::Call {
                function: "_+_".into(),
                target: None,
                args: vec![ident(1, "a"), ident(2, "b")],
            },
        );

        let ids = call
            .children()
            .iter()
            .map(|child| child.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_structure_eq_ignores_ids() {
        let left = Expr::new(
            1,
            ExprKind::Select {
                operand: Box::new(ident(2, "a")),
                field: "b".into(),
                test_only: false,
            },
        );
        let right = Expr::new(
            7,
            ExprKind::Select {
                operand: Box::new(ident(9, "a")),
                field: "b".into(),
                test_only: false,
            },
        );

        assert!(left.structure_eq(&right));
    }

    #[test]
    fn test_max_id_and_depth() {
        let call = Expr::new(
            2,
            ExprKind::Call {
                function: "!_".into(),
                target: None,
                args: vec![ident(5, "flag")],
            },
        );

        assert_eq!(call.max_id(), 5);
        assert_eq!(call.depth(), 2);
    }
}
