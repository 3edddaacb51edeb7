//! The tree-walking evaluator.
//!
//! Identifiers resolve through the activation (with the reference map
//! applied first, so container-qualified names and enum constants behave),
//! calls dispatch through the function registry, and the short-circuit
//! operators implement CEL's commutative error absorption. Unknown values
//! union as they meet; comprehension locals live on a binding stack.

pub mod activation;
pub mod attributes;
pub mod resolver;

pub use self::activation::{
    Activation, EmptyActivation, HierarchicalActivation, MapActivation, Resolution,
};
pub use self::resolver::{run_fixed_point, AttributeResolver, ResolverRegistry};

use std::collections::HashMap;

use crate::ast::{Constant, Expr, ExprId, ExprKind};
use crate::checker::{CheckedAst, Reference};
use crate::parser::NOT_STRICTLY_FALSE;
use crate::registry::FunctionRegistry;
use crate::types::{CelType, DeclaredTypeProvider, TypeProvider};
use crate::values::{
    provider::ValueProvider, Attribute, EvalError, EvalResult, MapValue, UnknownSet, Value,
};

#[derive(Debug, Clone)]
pub struct EvalOptions {
    /// Total comprehension step budget per evaluation; `None` is unbounded.
    pub comprehension_iteration_limit: Option<usize>,
    /// Cap on iterative re-evaluation rounds.
    pub reeval_round_limit: usize,
}

impl Default for EvalOptions {
    fn default() -> Self {
        EvalOptions {
            comprehension_iteration_limit: None,
            reeval_round_limit: 10,
        }
    }
}

/// Post-order observer: called with every node id and its computed value.
/// Short-circuited branches never evaluate, so they produce no events.
pub type EvalObserver<'a> = &'a mut dyn FnMut(ExprId, &Value);

pub struct Interpreter<'a, 'o> {
    checked: &'a CheckedAst,
    activation: &'a dyn Activation,
    registry: &'a FunctionRegistry,
    provider: &'a dyn ValueProvider,
    types: &'a DeclaredTypeProvider,
    options: &'a EvalOptions,
    /// Attributes resolved by prior re-evaluation rounds.
    resolved: &'a HashMap<Attribute, Value>,
    /// Comprehension bindings, innermost last.
    locals: Vec<(String, Value)>,
    iterations: usize,
    observer: Option<EvalObserver<'o>>,
}

impl<'a, 'o> Interpreter<'a, 'o> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        checked: &'a CheckedAst,
        activation: &'a dyn Activation,
        registry: &'a FunctionRegistry,
        provider: &'a dyn ValueProvider,
        types: &'a DeclaredTypeProvider,
        options: &'a EvalOptions,
        resolved: &'a HashMap<Attribute, Value>,
        observer: Option<EvalObserver<'o>>,
    ) -> Interpreter<'a, 'o> {
        Interpreter {
            checked,
            activation,
            registry,
            provider,
            types,
            options,
            resolved,
            locals: vec![],
            iterations: 0,
            observer,
        }
    }

    /// Evaluate to completion. A terminal error value becomes the failure
    /// outcome; unknowns are returned as values for the caller to inspect.
    pub fn run(mut self) -> EvalResult<Value> {
        let root = self.checked.expr.clone();
        let value = self.eval_expr(&root);
        match value {
            Value::Error(error) => Err(error),
            other => Ok(other),
        }
    }

    fn reference(&self, expr: &Expr) -> Option<&Reference> {
        self.checked.reference_map.get(&expr.id)
    }

    fn lookup_local(&self, name: &str) -> Option<Value> {
        self.locals
            .iter()
            .rev()
            .find(|(local, _)| local == name)
            .map(|(_, value)| value.clone())
    }

    fn eval_expr(&mut self, expr: &Expr) -> Value {
        let value = match &expr.kind {
            ExprKind::Const(constant) => const_value(constant),
            ExprKind::Ident(name) => self.eval_ident(expr, name),
            ExprKind::Select {
                operand,
                field,
                test_only,
            } => self.eval_select(expr, operand, field, *test_only),
            ExprKind::Call {
                function,
                target,
                args,
            } => self.eval_call(expr, function, target.as_deref(), args),
            ExprKind::List {
                elements,
                optional_indices,
            } => self.eval_list(elements, optional_indices),
            ExprKind::Map { entries } => self.eval_map(entries),
            ExprKind::Struct {
                message_name,
                fields,
            } => self.eval_struct(expr, message_name, fields),
            ExprKind::Comprehension(comprehension) => self.eval_comprehension(comprehension),
        };

        if let Some(observer) = self.observer.as_mut() {
            observer(expr.id, &value);
        }
        value
    }

    /// Overlay from prior rounds wins; otherwise a pattern match marks the
    /// attribute unknown.
    fn overlay_or_unknown(&self, attribute: &Attribute) -> Option<Value> {
        if let Some(value) = self.resolved.get(attribute) {
            return Some(value.clone());
        }
        if self
            .activation
            .unknown_patterns()
            .iter()
            .any(|pattern| pattern.matches(attribute))
        {
            return Some(Value::unknown(attribute.clone()));
        }
        None
    }

    fn static_attribute(&self, expr: &Expr) -> Option<Attribute> {
        let reference_of =
            |expr: &Expr| -> Option<Reference> { self.checked.reference_map.get(&expr.id).cloned() };
        attributes::static_attribute(expr, &reference_of)
    }

    fn eval_ident(&mut self, expr: &Expr, name: &str) -> Value {
        if let Some(value) = self.lookup_local(name) {
            return value;
        }

        if let Some(Reference::Constant(constant)) = self.reference(expr) {
            return const_value(&constant.clone());
        }

        let resolved_name = match self.reference(expr) {
            Some(Reference::Variable(resolved)) => resolved.clone(),
            _ => name.to_string(),
        };
        self.resolve_variable(expr, &resolved_name)
    }

    fn resolve_variable(&mut self, expr: &Expr, name: &str) -> Value {
        let attribute = Attribute::new(name);
        if let Some(value) = self.overlay_or_unknown(&attribute) {
            return value;
        }

        match self.activation.resolve(name) {
            Resolution::Value(value) => value,
            Resolution::Unknown(attribute) => Value::unknown(attribute),
            Resolution::Missing => match self.type_ident(name) {
                Some(value) => value,
                None => Value::Error(EvalError::unknown_ident(name).at(expr.id)),
            },
        }
    }

    /// Identifiers naming types evaluate to type values.
    fn type_ident(&self, name: &str) -> Option<Value> {
        let builtin = match name {
            "bool" => Some(CelType::Bool),
            "int" => Some(CelType::Int),
            "uint" => Some(CelType::Uint),
            "double" => Some(CelType::Double),
            "string" => Some(CelType::String),
            "bytes" => Some(CelType::Bytes),
            "list" => Some(CelType::list_of(CelType::Dyn)),
            "map" => Some(CelType::map_of(CelType::Dyn, CelType::Dyn)),
            "null_type" => Some(CelType::Null),
            "type" => Some(CelType::type_of(CelType::Dyn)),
            "dyn" => Some(CelType::Dyn),
            _ => None,
        };
        if let Some(found) = builtin {
            return Some(Value::Type(found));
        }
        self.types.find_type(name).map(Value::Type)
    }

    fn eval_select(
        &mut self,
        expr: &Expr,
        operand: &Expr,
        field: &str,
        test_only: bool,
    ) -> Value {
        // The checker may have resolved the whole chain as a qualified name.
        match self.reference(expr).cloned() {
            Some(Reference::Constant(constant)) => return const_value(&constant),
            Some(Reference::Variable(resolved)) => {
                return self.resolve_variable(expr, &resolved);
            }
            _ => {}
        }

        if let Some(attribute) = self.static_attribute(expr) {
            if let Some(value) = self.overlay_or_unknown(&attribute) {
                return value;
            }
        }

        let operand_value = self.eval_expr(operand);
        match operand_value {
            Value::Unknown(_) | Value::Error(_) => operand_value,
            Value::Map(map) => {
                let key = Value::string(field);
                match map.get(&key) {
                    Some(value) => {
                        if test_only {
                            Value::Bool(true)
                        } else {
                            value.clone()
                        }
                    }
                    None => {
                        if test_only {
                            Value::Bool(false)
                        } else {
                            Value::Error(EvalError::no_such_key(field).at(expr.id))
                        }
                    }
                }
            }
            Value::Message(message) => {
                if test_only {
                    Value::Bool(message.has_field(field))
                } else {
                    match self.provider.get_field(&message, field) {
                        Value::Error(error) => Value::Error(error.at(expr.id)),
                        value => value,
                    }
                }
            }
            other => Value::Error(
                EvalError::invalid_argument(format!(
                    "type '{}' does not support field selection",
                    other.type_of()
                ))
                .at(expr.id),
            ),
        }
    }

    fn eval_call(
        &mut self,
        expr: &Expr,
        function: &str,
        target: Option<&Expr>,
        args: &[Expr],
    ) -> Value {
        match function {
            "_&&_" => return self.eval_logic(expr, args, true),
            "_||_" => return self.eval_logic(expr, args, false),
            "_?_:_" => return self.eval_ternary(args),
            NOT_STRICTLY_FALSE => {
                let value = self.eval_expr(&args[0]);
                return Value::Bool(!matches!(value, Value::Bool(false)));
            }
            "optional_select" | "optional_index" => {
                return self.eval_optional_access(expr, args);
            }
            // CSE blocks: evaluate the shared subexpressions once, bind them
            // as `@index<n>`, then evaluate the body.
            "cel.@block" if target.is_none() && args.len() == 2 => {
                if let ExprKind::List { elements, .. } = &args[0].kind {
                    let elements = elements.clone();
                    let body = args[1].clone();
                    let depth = self.locals.len();
                    for (index, sub) in elements.iter().enumerate() {
                        let value = self.eval_expr(sub);
                        self.locals.push((format!("@index{index}"), value));
                    }
                    let result = self.eval_expr(&body);
                    self.locals.truncate(depth);
                    return result;
                }
            }
            _ => {}
        }

        // A receiver call on a pure name may be a namespaced global, e.g.
        // `math.greatest(...)`.
        if let Some(target_expr) = target {
            if let Some(qualifier) = qualified_name(target_expr) {
                let full = format!("{qualifier}.{function}");
                let shadowed = root_variable(target_expr)
                    .map(|root| self.lookup_local(root).is_some())
                    .unwrap_or(false);
                if !shadowed && self.registry.is_bound(&full) {
                    let values = args.iter().map(|arg| self.eval_expr(arg)).collect::<Vec<_>>();
                    return self.finish_call(expr, &full, values);
                }
            }
        }

        let mut values = vec![];
        if let Some(target_expr) = target {
            values.push(self.eval_expr(target_expr));
        }
        for arg in args {
            values.push(self.eval_expr(arg));
        }
        self.finish_call(expr, function, values)
    }

    /// Unknowns union across all arguments; otherwise the left-most error
    /// propagates; otherwise dispatch.
    fn finish_call(&mut self, expr: &Expr, function: &str, values: Vec<Value>) -> Value {
        let mut unknowns: Option<UnknownSet> = None;
        for value in &values {
            if let Value::Unknown(set) = value {
                unknowns = Some(match unknowns {
                    Some(merged) => merged.union(set),
                    None => set.clone(),
                });
            }
        }
        if let Some(unknowns) = unknowns {
            return Value::Unknown(unknowns);
        }

        for value in &values {
            if value.is_error() {
                return value.clone();
            }
        }

        match self.registry.find(function) {
            Some(binding) => {
                log::trace!("dispatching '{function}' with {} argument(s)", values.len());
                match binding.as_ref()(&values) {
                    Value::Error(error) => Value::Error(error.at(expr.id)),
                    value => value,
                }
            }
            None => Value::Error(EvalError::overload_not_found(function).at(expr.id)),
        }
    }

    fn eval_logic(&mut self, expr: &Expr, args: &[Expr], is_and: bool) -> Value {
        let absorbing = Value::Bool(!is_and);

        let left = self.eval_expr(&args[0]);
        if left == absorbing {
            return absorbing;
        }
        let right = self.eval_expr(&args[1]);
        if right == absorbing {
            return absorbing;
        }

        match (&left, &right) {
            (Value::Unknown(left_set), Value::Unknown(right_set)) => {
                Value::Unknown(left_set.clone().union(right_set))
            }
            (Value::Unknown(_), _) => left,
            (_, Value::Unknown(_)) => right,
            (Value::Error(_), _) => left,
            (_, Value::Error(_)) => right,
            (Value::Bool(left_bool), Value::Bool(right_bool)) => {
                if is_and {
                    Value::Bool(*left_bool && *right_bool)
                } else {
                    Value::Bool(*left_bool || *right_bool)
                }
            }
            _ => Value::Error(
                EvalError::overload_not_found(if is_and { "_&&_" } else { "_||_" })
                    .at(expr.id),
            ),
        }
    }

    fn eval_ternary(&mut self, args: &[Expr]) -> Value {
        let condition = self.eval_expr(&args[0]);
        match condition {
            Value::Bool(true) => self.eval_expr(&args[1]),
            Value::Bool(false) => self.eval_expr(&args[2]),
            Value::Unknown(_) | Value::Error(_) => condition,
            _ => Value::Error(EvalError::overload_not_found("_?_:_")),
        }
    }

    /// `a.?b` / `a[?k]`: an optional-typed view of selection and indexing.
    fn eval_optional_access(&mut self, expr: &Expr, args: &[Expr]) -> Value {
        let target = self.eval_expr(&args[0]);
        if matches!(target, Value::Unknown(_) | Value::Error(_)) {
            return target;
        }
        let key = self.eval_expr(&args[1]);
        if matches!(key, Value::Unknown(_) | Value::Error(_)) {
            return key;
        }

        let target = match target {
            Value::Optional(None) => return Value::optional_none(),
            Value::Optional(Some(inner)) => *inner,
            other => other,
        };

        match (&target, &key) {
            (Value::Map(map), _) => match map.get(&key) {
                Some(value) => Value::optional_of(value.clone()),
                None => Value::optional_none(),
            },
            (Value::List(elements), Value::Int(index)) => {
                if *index >= 0 && (*index as usize) < elements.len() {
                    Value::optional_of(elements[*index as usize].clone())
                } else {
                    Value::optional_none()
                }
            }
            (Value::Message(message), Value::String(field)) => {
                if message.has_field(field) {
                    Value::optional_of(self.provider.get_field(message, field))
                } else {
                    Value::optional_none()
                }
            }
            _ => Value::Error(
                EvalError::invalid_argument(format!(
                    "optional access unsupported for '{}'",
                    target.type_of()
                ))
                .at(expr.id),
            ),
        }
    }

    fn eval_list(&mut self, elements: &[Expr], optional_indices: &[usize]) -> Value {
        let mut values = vec![];
        let mut unknowns: Option<UnknownSet> = None;

        for (index, element) in elements.iter().enumerate() {
            let value = self.eval_expr(element);
            match value {
                Value::Unknown(set) => {
                    unknowns = Some(match unknowns {
                        Some(merged) => merged.union(&set),
                        None => set,
                    });
                }
                Value::Error(_) => return value,
                Value::Optional(inner) if optional_indices.contains(&index) => {
                    if let Some(inner) = inner {
                        values.push(*inner);
                    }
                }
                other if optional_indices.contains(&index) => {
                    return Value::Error(EvalError::invalid_argument(format!(
                        "optional list entry must be optional, found '{}'",
                        other.type_of()
                    )));
                }
                other => values.push(other),
            }
        }

        match unknowns {
            Some(unknowns) => Value::Unknown(unknowns),
            None => Value::List(values),
        }
    }

    fn eval_map(&mut self, entries: &[crate::ast::MapEntry]) -> Value {
        let mut map = MapValue::new();
        let mut unknowns: Option<UnknownSet> = None;

        for entry in entries {
            let key = self.eval_expr(&entry.key);
            let value = self.eval_expr(&entry.value);

            for evaluated in [&key, &value] {
                if let Value::Unknown(set) = evaluated {
                    unknowns = Some(match unknowns.take() {
                        Some(merged) => merged.union(set),
                        None => set.clone(),
                    });
                }
            }
            if unknowns.is_some() {
                continue;
            }
            if key.is_error() {
                return key;
            }
            if value.is_error() {
                return value;
            }

            if !key.is_valid_key() {
                return Value::Error(EvalError::invalid_argument(format!(
                    "unsupported map key type: '{}'",
                    key.type_of()
                )));
            }
            if map.contains_key(&key) {
                return Value::Error(EvalError::invalid_argument(format!(
                    "repeated map key: {key}"
                )));
            }

            if entry.optional {
                match value {
                    Value::Optional(Some(inner)) => map.insert(key, *inner),
                    Value::Optional(None) => {}
                    other => {
                        return Value::Error(EvalError::invalid_argument(format!(
                            "optional map entry must be optional, found '{}'",
                            other.type_of()
                        )))
                    }
                }
            } else {
                map.insert(key, value);
            }
        }

        match unknowns {
            Some(unknowns) => Value::Unknown(unknowns),
            None => Value::Map(map),
        }
    }

    fn eval_struct(
        &mut self,
        expr: &Expr,
        message_name: &str,
        fields: &[crate::ast::StructField],
    ) -> Value {
        let resolved_name = match self.reference(expr) {
            Some(Reference::Variable(resolved)) => resolved.clone(),
            _ => message_name.to_string(),
        };

        let mut values = vec![];
        let mut unknowns: Option<UnknownSet> = None;
        for field in fields {
            let value = self.eval_expr(&field.value);
            match value {
                Value::Unknown(set) => {
                    unknowns = Some(match unknowns {
                        Some(merged) => merged.union(&set),
                        None => set,
                    });
                }
                Value::Error(_) => return value,
                Value::Optional(inner) if field.optional => {
                    if let Some(inner) = inner {
                        values.push((field.name.clone(), *inner));
                    }
                }
                other if field.optional => {
                    return Value::Error(EvalError::invalid_argument(format!(
                        "optional field '{}' must be optional, found '{}'",
                        field.name,
                        other.type_of()
                    )));
                }
                other => values.push((field.name.clone(), other)),
            }
        }
        if let Some(unknowns) = unknowns {
            return Value::Unknown(unknowns);
        }

        match self.provider.new_message(&resolved_name, values) {
            Ok(value) => value,
            Err(error) => Value::Error(error.at(expr.id)),
        }
    }

    fn eval_comprehension(&mut self, comprehension: &crate::ast::Comprehension) -> Value {
        let range = self.eval_expr(&comprehension.iter_range);
        let items: Vec<Value> = match range {
            Value::List(elements) => elements,
            Value::Map(map) => map.keys().cloned().collect(),
            Value::Unknown(_) | Value::Error(_) => return range,
            other => {
                return Value::Error(EvalError::invalid_argument(format!(
                    "expression of type '{}' cannot be range of a comprehension",
                    other.type_of()
                )))
            }
        };

        let accu = self.eval_expr(&comprehension.accu_init);
        if accu.is_error() {
            return accu;
        }
        self.locals.push((comprehension.accu_var.clone(), accu));
        let accu_slot = self.locals.len() - 1;

        for item in items {
            if let Some(limit) = self.options.comprehension_iteration_limit {
                self.iterations += 1;
                if self.iterations > limit {
                    self.locals.pop();
                    return Value::Error(EvalError::iteration_budget());
                }
            }

            self.locals.push((comprehension.iter_var.clone(), item));

            let condition = self.eval_expr(&comprehension.loop_cond);
            match condition {
                Value::Bool(true) => {}
                Value::Bool(false) => {
                    self.locals.pop();
                    break;
                }
                other => {
                    // Unknown or error conditions end the loop and carry
                    // through as the accumulator.
                    self.locals[accu_slot].1 = other;
                    self.locals.pop();
                    break;
                }
            }

            let stepped = self.eval_expr(&comprehension.loop_step);
            self.locals[accu_slot].1 = stepped;
            self.locals.pop();
        }

        let result = self.eval_expr(&comprehension.result);
        self.locals.pop();
        result
    }
}

fn const_value(constant: &Constant) -> Value {
    match constant {
        Constant::Null => Value::Null,
        Constant::Bool(value) => Value::Bool(*value),
        Constant::Int(value) => Value::Int(*value),
        Constant::Uint(value) => Value::Uint(*value),
        Constant::Double(value) => Value::Double(*value),
        Constant::String(value) => Value::String(value.clone()),
        Constant::Bytes(value) => Value::Bytes(value.clone()),
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
