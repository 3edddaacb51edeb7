//! AST + environment → typed AST.
//!
//! A post-order walk assigns every node a type and resolves identifiers and
//! call overloads into the reference map. Checking continues past
//! recoverable errors so one pass surfaces as many issues as possible; an
//! `Error` type suppresses cascading reports downstream.

pub mod env;
pub mod unify;

pub use self::env::{Env, EnvBuilder, FunctionDecl, Overload, ProtoTypeMask};

use std::collections::HashMap;

use crate::ast::{Constant, Expr, ExprId, ExprKind, NavigableAst, ParsedAst, SourceInfo};
use crate::issues::Issues;
use crate::types::{CelType, TypeProvider};

use self::unify::{is_assignable, join, substitute, Substitution};

/// How an identifier or call site was resolved.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Reference {
    Variable(String),
    Overloads(Vec<String>),
    /// Enum constants resolve directly to their integer value.
    Constant(Constant),
}

/// Output of a successful check: the parsed tree plus type and reference
/// side tables.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CheckedAst {
    pub expr: Expr,
    pub source_info: SourceInfo,
    pub type_map: HashMap<ExprId, CelType>,
    pub reference_map: HashMap<ExprId, Reference>,
}

impl CheckedAst {
    pub fn result_type(&self) -> CelType {
        self.type_map
            .get(&self.expr.id)
            .cloned()
            .unwrap_or(CelType::Dyn)
    }

    pub fn navigate(&self) -> NavigableAst<'_> {
        NavigableAst::new(&self.expr)
    }
}

pub fn check(ast: ParsedAst, env: &Env) -> Result<CheckedAst, Issues> {
    let mut checker = Checker {
        env,
        source_info: &ast.source_info,
        issues: Issues::new(ast.source_info.source().clone()),
        type_map: HashMap::new(),
        reference_map: HashMap::new(),
        scopes: vec![],
        fresh: 0,
    };

    checker.check_expr(&ast.expr);
    log::debug!(
        "checked expression: result type {}, {} issue(s)",
        checker
            .type_map
            .get(&ast.expr.id)
            .cloned()
            .unwrap_or(CelType::Dyn),
        checker.issues.items().len()
    );

    if checker.issues.is_empty() {
        let type_map = checker.type_map;
        let reference_map = checker.reference_map;
        Ok(CheckedAst {
            expr: ast.expr,
            source_info: ast.source_info,
            type_map,
            reference_map,
        })
    } else {
        Err(checker.issues)
    }
}

struct Checker<'a> {
    env: &'a Env,
    source_info: &'a SourceInfo,
    issues: Issues,
    type_map: HashMap<ExprId, CelType>,
    reference_map: HashMap<ExprId, Reference>,
    /// Comprehension-local declarations; innermost last.
    scopes: Vec<HashMap<String, CelType>>,
    fresh: u32,
}

impl Checker<'_> {
    fn offset(&self, expr: &Expr) -> usize {
        self.source_info.position(expr.id).unwrap_or(0)
    }

    fn report(&mut self, expr: &Expr, message: impl Into<String>) {
        let offset = self.offset(expr);
        self.issues.report(message, offset);
    }

    fn set_type(&mut self, expr: &Expr, t: CelType) -> CelType {
        self.type_map.insert(expr.id, t.clone());
        t
    }

    fn lookup_scope(&self, name: &str) -> Option<CelType> {
        self.scopes
            .iter()
            .rev()
            .find_map(|frame| frame.get(name).cloned())
    }

    fn check_expr(&mut self, expr: &Expr) -> CelType {
        let t = match &expr.kind {
            ExprKind::Const(constant) => constant_type(constant),
            ExprKind::Ident(_) => self.check_ident(expr),
            ExprKind::Select { .. } => self.check_select(expr),
            ExprKind::Call { .. } => self.check_call(expr),
            ExprKind::List { .. } => self.check_list(expr),
            ExprKind::Map { .. } => self.check_map(expr),
            ExprKind::Struct { .. } => self.check_struct(expr),
            ExprKind::Comprehension(_) => self.check_comprehension(expr),
        };
        self.set_type(expr, t)
    }

    fn check_ident(&mut self, expr: &Expr) -> CelType {
        let ExprKind::Ident(name) = &expr.kind else {
            unreachable!("check_ident on non-ident");
        };

        if let Some(t) = self.lookup_scope(name) {
            self.reference_map
                .insert(expr.id, Reference::Variable(name.clone()));
            return t;
        }

        self.resolve_name(expr, name).unwrap_or_else(|| {
            self.report(
                expr,
                format!(
                    "undeclared reference to '{}' (in container '{}')",
                    name,
                    self.env.container()
                ),
            );
            CelType::Error
        })
    }

    /// Environment resolution shared by idents and qualified select chains:
    /// variables, then enum constants, then type names.
    fn resolve_name(&mut self, expr: &Expr, name: &str) -> Option<CelType> {
        if let Some((resolved, t)) = self.env.find_variable(name) {
            self.reference_map
                .insert(expr.id, Reference::Variable(resolved));
            return Some(t);
        }
        if let Some((_, number)) = self.env.find_enum_constant(name) {
            self.reference_map
                .insert(expr.id, Reference::Constant(Constant::Int(number as i64)));
            return Some(CelType::Int);
        }
        if let Some((resolved, t)) = self.env.find_type(name) {
            self.reference_map
                .insert(expr.id, Reference::Variable(resolved));
            return Some(CelType::type_of(t));
        }
        None
    }

    fn check_select(&mut self, expr: &Expr) -> CelType {
        let ExprKind::Select {
            operand,
            field,
            test_only,
        } = &expr.kind
        else {
            unreachable!("check_select on non-select");
        };

        // A select chain may actually be a qualified name; whole-name
        // resolution wins over field selection unless the root is shadowed
        // by a comprehension variable.
        if !test_only {
            if let Some(name) = qualified_name(expr) {
                let root = root_variable(expr);
                let shadowed = root
                    .map(|root| self.lookup_scope(root).is_some())
                    .unwrap_or(false);
                if !shadowed {
                    if let Some(t) = self.resolve_name(expr, &name) {
                        return t;
                    }
                }
            }
        }

        let operand_type = self.check_expr(operand);
        let result = self.select_field_type(expr, &operand_type, field);
        if *test_only {
            return CelType::Bool;
        }
        result
    }

    fn select_field_type(&mut self, expr: &Expr, operand_type: &CelType, field: &str) -> CelType {
        match operand_type {
            CelType::Dyn | CelType::TypeParam(_) | CelType::Error => CelType::Dyn,
            CelType::Map(key, value) => {
                let mut sub = Substitution::new();
                if !is_assignable(&mut sub, key, &CelType::String) {
                    self.report(
                        expr,
                        format!("cannot select field '{field}' from map with key type '{key}'"),
                    );
                    return CelType::Error;
                }
                value.as_ref().clone()
            }
            CelType::Message(name) => {
                if !self.env.field_visible(name, field) {
                    self.report(expr, format!("field '{field}' is not visible in '{name}'"));
                    return CelType::Error;
                }
                match self.env.provider().find_field(name, field) {
                    Some(info) => info.field_type,
                    None => {
                        self.report(expr, format!("undefined field '{field}'"));
                        CelType::Error
                    }
                }
            }
            CelType::Wrapper(_) | CelType::Null => {
                self.report(
                    expr,
                    format!("type '{operand_type}' does not support field selection"),
                );
                CelType::Error
            }
            other => {
                self.report(
                    expr,
                    format!("type '{other}' does not support field selection"),
                );
                CelType::Error
            }
        }
    }

    fn check_call(&mut self, expr: &Expr) -> CelType {
        let ExprKind::Call {
            function,
            target,
            args,
        } = &expr.kind
        else {
            unreachable!("check_call on non-call");
        };

        // The CSE rewrite wraps programs in `cel.@block([subs], body)`;
        // each sub binds an `@index<n>` name visible to the body.
        if function == "cel.@block" && target.is_none() && args.len() == 2 {
            if let ExprKind::List { elements, .. } = &args[0].kind {
                let mut frame = HashMap::new();
                for (index, sub) in elements.iter().enumerate() {
                    let sub_type = self.check_expr(sub);
                    frame.insert(format!("@index{index}"), sub_type);
                }
                self.set_type(&args[0], CelType::list_of(CelType::Dyn));
                self.scopes.push(frame);
                let result = self.check_expr(&args[1]);
                self.scopes.pop();
                return result;
            }
        }

        // A receiver call whose target is a pure name may really be a
        // namespaced global function, e.g. `math.greatest(...)`.
        if let Some(target_expr) = target {
            if let Some(qualifier) = qualified_name(target_expr) {
                let shadowed = root_variable(target_expr)
                    .map(|root| self.lookup_scope(root).is_some())
                    .unwrap_or(false);
                let full = format!("{qualifier}.{function}");
                if !shadowed && self.env.find_function(&full).is_some() {
                    let arg_types = args
                        .iter()
                        .map(|arg| self.check_expr(arg))
                        .collect::<Vec<_>>();
                    return self.resolve_overloads(expr, &full, None, &arg_types);
                }
            }
        }

        let target_type = target.as_ref().map(|target| self.check_expr(target));
        let arg_types = args
            .iter()
            .map(|arg| self.check_expr(arg))
            .collect::<Vec<_>>();

        self.resolve_overloads(expr, function, target_type, &arg_types)
    }

    fn resolve_overloads(
        &mut self,
        expr: &Expr,
        function: &str,
        target_type: Option<CelType>,
        arg_types: &[CelType],
    ) -> CelType {
        let Some((_, decl)) = self.env.find_function(function) else {
            self.report(
                expr,
                format!(
                    "undeclared reference to '{}' (in container '{}')",
                    function,
                    self.env.container()
                ),
            );
            return CelType::Error;
        };
        let overloads = decl.overloads.clone();

        let is_member = target_type.is_some();
        let mut all_args = vec![];
        if let Some(target_type) = &target_type {
            all_args.push(target_type.clone());
        }
        all_args.extend(arg_types.iter().cloned());

        // An argument that already failed to check poisons the call without
        // a second report.
        if all_args.iter().any(|t| matches!(t, CelType::Error)) {
            return CelType::Error;
        }

        let mut candidate_ids = vec![];
        let mut result_type: Option<CelType> = None;

        for overload in &overloads {
            if overload.is_member != is_member || overload.params.len() != all_args.len() {
                continue;
            }

            let (params, result) = self.instantiate(overload);
            let mut sub = Substitution::new();
            let matches = params
                .iter()
                .zip(&all_args)
                .all(|(param, arg)| is_assignable(&mut sub, param, arg));
            if !matches {
                continue;
            }

            candidate_ids.push(overload.id.clone());
            let resolved_result = substitute(&sub, &result);
            result_type = Some(match result_type {
                Some(previous) => join(&previous, &resolved_result),
                None => resolved_result,
            });
        }

        if candidate_ids.is_empty() {
            let rendered = all_args
                .iter()
                .map(CelType::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            let applied = if is_member {
                let mut parts = all_args.iter().map(CelType::to_string);
                let receiver = parts.next().unwrap_or_default();
                format!("'{receiver}.({})'", parts.collect::<Vec<_>>().join(", "))
            } else {
                format!("'({rendered})'")
            };
            self.report(
                expr,
                format!("found no matching overload for '{function}' applied to {applied}"),
            );
            return CelType::Error;
        }

        self.reference_map
            .insert(expr.id, Reference::Overloads(candidate_ids));
        result_type.unwrap_or(CelType::Dyn)
    }

    /// Give every type parameter in the overload a call-site-unique name so
    /// substitutions from different call sites cannot collide.
    fn instantiate(&mut self, overload: &Overload) -> (Vec<CelType>, CelType) {
        self.fresh += 1;
        let tag = self.fresh;
        let params = overload
            .params
            .iter()
            .map(|param| rename_params(param, tag))
            .collect();
        let result = rename_params(&overload.result, tag);
        (params, result)
    }

    fn check_list(&mut self, expr: &Expr) -> CelType {
        let ExprKind::List {
            elements,
            optional_indices,
        } = &expr.kind
        else {
            unreachable!("check_list on non-list");
        };

        if elements.is_empty() {
            // An empty literal stays parametric so a comprehension step can
            // still pin its element type.
            self.fresh += 1;
            return CelType::list_of(CelType::type_param(format!("@elem{}", self.fresh)));
        }

        self.fresh += 1;
        let element_param = CelType::type_param(format!("@elem{}", self.fresh));
        let mut sub = Substitution::new();
        let mut collapsed = false;

        for (index, element) in elements.iter().enumerate() {
            let mut element_type = self.check_expr(element);
            if optional_indices.contains(&index) {
                element_type = self.unwrap_optional_entry(element, element_type);
            }
            if !is_assignable(&mut sub, &element_param, &element_type) {
                collapsed = true;
            }
        }

        if collapsed {
            return CelType::list_of(CelType::Dyn);
        }
        CelType::list_of(substitute(&sub, &element_param))
    }

    fn unwrap_optional_entry(&mut self, expr: &Expr, entry_type: CelType) -> CelType {
        match entry_type {
            CelType::Opaque(name, mut params) if name == "optional_type" => {
                params.pop().unwrap_or(CelType::Dyn)
            }
            CelType::Dyn | CelType::Error => CelType::Dyn,
            other => {
                self.report(
                    expr,
                    format!("expected optional value for optional entry, found '{other}'"),
                );
                CelType::Error
            }
        }
    }

    fn check_map(&mut self, expr: &Expr) -> CelType {
        let ExprKind::Map { entries } = &expr.kind else {
            unreachable!("check_map on non-map");
        };

        if entries.is_empty() {
            return CelType::map_of(CelType::Dyn, CelType::Dyn);
        }

        self.fresh += 1;
        let key_param = CelType::type_param(format!("@mapk{}", self.fresh));
        let value_param = CelType::type_param(format!("@mapv{}", self.fresh));
        let mut sub = Substitution::new();
        let mut keys_collapsed = false;
        let mut values_collapsed = false;

        for entry in entries {
            let key_type = self.check_expr(&entry.key);
            if !is_assignable(&mut sub, &key_param, &key_type) {
                keys_collapsed = true;
            }

            let mut value_type = self.check_expr(&entry.value);
            if entry.optional {
                value_type = self.unwrap_optional_entry(&entry.value, value_type);
            }
            if !is_assignable(&mut sub, &value_param, &value_type) {
                values_collapsed = true;
            }
        }

        let key_type = if keys_collapsed {
            CelType::Dyn
        } else {
            substitute(&sub, &key_param)
        };
        let value_type = if values_collapsed {
            CelType::Dyn
        } else {
            substitute(&sub, &value_param)
        };
        CelType::map_of(key_type, value_type)
    }

    fn check_struct(&mut self, expr: &Expr) -> CelType {
        let ExprKind::Struct {
            message_name,
            fields,
        } = &expr.kind
        else {
            unreachable!("check_struct on non-struct");
        };

        let Some((resolved, found)) = self.env.find_type(message_name) else {
            self.report(
                expr,
                format!(
                    "undeclared reference to '{}' (in container '{}')",
                    message_name,
                    self.env.container()
                ),
            );
            // Check field values anyway for more diagnostics.
            for field in fields {
                self.check_expr(&field.value);
            }
            return CelType::Error;
        };

        self.reference_map
            .insert(expr.id, Reference::Variable(resolved.clone()));

        let CelType::Message(resolved_name) = &found else {
            // Well-known construction adapts to the mapped CEL type; field
            // shapes are fixed by protobuf, not the provider.
            for field in fields {
                self.check_expr(&field.value);
            }
            return found;
        };

        for field in fields {
            let value_type = self.check_expr(&field.value);
            let Some(info) = self.env.provider().find_field(resolved_name, &field.name) else {
                self.report(expr, format!("undefined field '{}'", field.name));
                continue;
            };

            let mut sub = Substitution::new();
            let assignable = if field.optional {
                is_assignable(
                    &mut sub,
                    &CelType::optional_of(info.field_type.clone()),
                    &value_type,
                ) || is_assignable(&mut sub, &info.field_type, &value_type)
            } else {
                is_assignable(&mut sub, &info.field_type, &value_type)
            };
            if !assignable {
                self.report(
                    expr,
                    format!(
                        "expected type of field '{}' is '{}' but provided type is '{}'",
                        field.name, info.field_type, value_type
                    ),
                );
            }
        }

        found
    }

    fn check_comprehension(&mut self, expr: &Expr) -> CelType {
        let ExprKind::Comprehension(comprehension) = &expr.kind else {
            unreachable!("check_comprehension on non-comprehension");
        };

        let range_type = self.check_expr(&comprehension.iter_range);
        let iter_type = match &range_type {
            CelType::List(element) => element.as_ref().clone(),
            CelType::Map(key, _) => key.as_ref().clone(),
            CelType::Dyn | CelType::TypeParam(_) | CelType::Error => CelType::Dyn,
            other => {
                self.report(
                    &comprehension.iter_range,
                    format!("expression of type '{other}' cannot be range of a comprehension"),
                );
                CelType::Dyn
            }
        };

        let accu_type = self.check_expr(&comprehension.accu_init);

        self.scopes.push(HashMap::from([(
            comprehension.accu_var.clone(),
            accu_type.clone(),
        )]));
        self.scopes.push(HashMap::from([(
            comprehension.iter_var.clone(),
            iter_type,
        )]));

        let cond_type = self.check_expr(&comprehension.loop_cond);
        let mut sub = Substitution::new();
        if !is_assignable(&mut sub, &CelType::Bool, &cond_type) {
            self.report(
                &comprehension.loop_cond,
                format!("expected bool comprehension condition, found '{cond_type}'"),
            );
        }

        let step_type = self.check_expr(&comprehension.loop_step);
        // The loop step pins parametric accumulators (e.g. an empty list
        // init); otherwise the accumulator keeps the join of both.
        let accu_joined = if accu_type.has_type_params() {
            step_type
        } else {
            join(&accu_type, &step_type)
        };
        self.scopes.pop();
        if let Some(frame) = self.scopes.last_mut() {
            frame.insert(comprehension.accu_var.clone(), accu_joined);
        }

        let result_type = self.check_expr(&comprehension.result);
        self.scopes.pop();

        result_type
    }
}

fn constant_type(constant: &Constant) -> CelType {
    match constant {
        Constant::Null => CelType::Null,
        Constant::Bool(_) => CelType::Bool,
        Constant::Int(_) => CelType::Int,
        Constant::Uint(_) => CelType::Uint,
        Constant::Double(_) => CelType::Double,
        Constant::String(_) => CelType::String,
        Constant::Bytes(_) => CelType::Bytes,
    }
}

/// Rewrite overload type parameters with a call-site tag.
fn rename_params(t: &CelType, tag: u32) -> CelType {
    match t {
        CelType::TypeParam(name) => CelType::type_param(format!("{name}@{tag}")),
        CelType::List(element) => CelType::list_of(rename_params(element, tag)),
        CelType::Map(key, value) => {
            CelType::map_of(rename_params(key, tag), rename_params(value, tag))
        }
        CelType::TypeOf(inner) => CelType::type_of(rename_params(inner, tag)),
        CelType::Wrapper(inner) => CelType::Wrapper(Box::new(rename_params(inner, tag))),
        CelType::Opaque(name, params) => CelType::Opaque(
            name.clone(),
            params.iter().map(|param| rename_params(param, tag)).collect(),
        ),
        other => other.clone(),
    }
}

fn qualified_name(expr: &Expr) -> Option<String> {
    match &expr.kind {
        ExprKind::Ident(name) => Some(name.clone()),
        ExprKind::Select {
            operand,
            field,
            test_only: false,
        } => Some(format!("{}.{field}", qualified_name(operand)?)),
        _ => None,
    }
}

fn root_variable(expr: &Expr) -> Option<&str> {
    match &expr.kind {
        ExprKind::Ident(name) => Some(name),
        ExprKind::Select { operand, .. } => root_variable(operand),
        _ => None,
    }
}
