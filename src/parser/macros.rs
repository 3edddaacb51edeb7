//! Parse-time macros and their comprehension expansions.
//!
//! Macros rewrite a call node into another expression while the parser still
//! owns the id source; the pre-expansion call is retained in the source
//! info's macro-call table so unparsing can round-trip the original text.

use crate::ast::{Comprehension, Constant, Expr, ExprId, ExprKind, SourceInfo};

/// Hidden accumulator identifier used by comprehension expansions.
pub const ACCU_VAR: &str = "@result";
/// Guard function for `all`/`exists` loop conditions.
pub const NOT_STRICTLY_FALSE: &str = "@not_strictly_false";

pub struct IdSource {
    next: ExprId,
}

impl IdSource {
    pub fn new() -> IdSource {
        IdSource { next: 0 }
    }

    pub fn next_id(&mut self) -> ExprId {
        self.next += 1;
        self.next
    }
}

impl Default for IdSource {
    fn default() -> Self {
        IdSource::new()
    }
}

/// Node-building helper handed to macro expanders. Every node it creates is
/// positioned at the macro call's offset.
pub struct MacroContext<'a> {
    pub ids: &'a mut IdSource,
    pub source_info: &'a mut SourceInfo,
    pub offset: usize,
}

impl MacroContext<'_> {
    pub fn build(&mut self, kind: ExprKind) -> Expr {
        let id = self.ids.next_id();
        self.source_info.set_position(id, self.offset);
        Expr::new(id, kind)
    }

    pub fn ident(&mut self, name: &str) -> Expr {
        self.build(ExprKind::Ident(name.to_string()))
    }

    pub fn constant(&mut self, constant: Constant) -> Expr {
        self.build(ExprKind::Const(constant))
    }

    pub fn call(&mut self, function: &str, args: Vec<Expr>) -> Expr {
        self.build(ExprKind::Call {
            function: function.to_string(),
            target: None,
            args,
        })
    }

    pub fn list(&mut self, elements: Vec<Expr>) -> Expr {
        self.build(ExprKind::List {
            elements,
            optional_indices: vec![],
        })
    }

    pub fn member_call(&mut self, function: &str, target: Expr, args: Vec<Expr>) -> Expr {
        self.build(ExprKind::Call {
            function: function.to_string(),
            target: Some(Box::new(target)),
            args,
        })
    }

    /// Deep copy with fresh ids, for expansions that need an argument twice.
    pub fn refresh_ids(&mut self, expr: &Expr) -> Expr {
        let mut copy = expr.clone();
        self.renumber_copy(&mut copy);
        copy
    }

    fn renumber_copy(&mut self, expr: &mut Expr) {
        expr.id = self.ids.next_id();
        self.source_info.set_position(expr.id, self.offset);
        for child in expr.children_mut() {
            self.renumber_copy(child);
        }
    }
}

/// Expansion outcome: `None` means "not actually this macro", in which case
/// the parser falls back to an ordinary call.
pub type MacroResult = Result<Option<Expr>, String>;

pub type MacroExpander = fn(&mut MacroContext<'_>, Option<Expr>, Vec<Expr>) -> MacroResult;

#[derive(Clone)]
pub struct Macro {
    pub function: String,
    /// `None` accepts any arity.
    pub arg_count: Option<usize>,
    pub is_receiver: bool,
    pub expander: MacroExpander,
}

#[derive(Clone, Default)]
pub struct MacroRegistry {
    macros: Vec<Macro>,
}

impl MacroRegistry {
    pub fn empty() -> MacroRegistry {
        MacroRegistry::default()
    }

    /// The eight built-in macros.
    pub fn standard() -> MacroRegistry {
        let mut registry = MacroRegistry::empty();
        registry.register("has", Some(1), false, expand_has);
        registry.register("all", Some(2), true, expand_all);
        registry.register("exists", Some(2), true, expand_exists);
        registry.register("exists_one", Some(2), true, expand_exists_one);
        registry.register("map", Some(2), true, expand_map);
        registry.register("map", Some(3), true, expand_map);
        registry.register("filter", Some(2), true, expand_filter);
        registry.register("bind", Some(3), true, expand_bind);
        registry
    }

    pub fn register(
        &mut self,
        function: &str,
        arg_count: Option<usize>,
        is_receiver: bool,
        expander: MacroExpander,
    ) {
        self.macros.push(Macro {
            function: function.to_string(),
            arg_count,
            is_receiver,
            expander,
        });
    }

    pub fn find(&self, function: &str, arg_count: usize, is_receiver: bool) -> Option<&Macro> {
        self.macros.iter().find(|candidate| {
            candidate.function == function
                && candidate.is_receiver == is_receiver
                && candidate.arg_count.map(|count| count == arg_count).unwrap_or(true)
        })
    }
}

fn iter_var_name(arg: &Expr) -> Result<String, String> {
    match &arg.kind {
        ExprKind::Ident(name) if name != ACCU_VAR => Ok(name.clone()),
        ExprKind::Ident(_) => Err("iteration variable overwrites accumulator".to_string()),
        _ => Err("argument must be a simple name".to_string()),
    }
}

fn expand_has(_ctx: &mut MacroContext<'_>, _target: Option<Expr>, args: Vec<Expr>) -> MacroResult {
    let mut args = args;
    let arg = args.remove(0);
    match arg.kind {
        ExprKind::Select {
            operand,
            field,
            test_only: false,
        } => Ok(Some(Expr::new(
            arg.id,
            ExprKind::Select {
                operand,
                field,
                test_only: true,
            },
        ))),
        _ => Err("invalid argument to has() macro".to_string()),
    }
}

fn expand_all(ctx: &mut MacroContext<'_>, target: Option<Expr>, args: Vec<Expr>) -> MacroResult {
    let mut args = args;
    let predicate = args.pop().expect("arity checked by registry");
    let iter_var = iter_var_name(&args[0])?;
    let target = target.expect("receiver macro");

    let accu_init = ctx.constant(Constant::Bool(true));
    let accu_ref = ctx.ident(ACCU_VAR);
    let loop_cond = ctx.call(NOT_STRICTLY_FALSE, vec![accu_ref]);
    let step_accu = ctx.ident(ACCU_VAR);
    let loop_step = ctx.call("_&&_", vec![step_accu, predicate]);
    let result = ctx.ident(ACCU_VAR);

    Ok(Some(ctx.build(ExprKind::Comprehension(Box::new(
        Comprehension {
            iter_var,
            iter_range: target,
            accu_var: ACCU_VAR.to_string(),
            accu_init,
            loop_cond,
            loop_step,
            result,
        },
    )))))
}

fn expand_exists(ctx: &mut MacroContext<'_>, target: Option<Expr>, args: Vec<Expr>) -> MacroResult {
    let mut args = args;
    let predicate = args.pop().expect("arity checked by registry");
    let iter_var = iter_var_name(&args[0])?;
    let target = target.expect("receiver macro");

    let accu_init = ctx.constant(Constant::Bool(false));
    let accu_ref = ctx.ident(ACCU_VAR);
    let negated = ctx.call("!_", vec![accu_ref]);
    let loop_cond = ctx.call(NOT_STRICTLY_FALSE, vec![negated]);
    let step_accu = ctx.ident(ACCU_VAR);
    let loop_step = ctx.call("_||_", vec![step_accu, predicate]);
    let result = ctx.ident(ACCU_VAR);

    Ok(Some(ctx.build(ExprKind::Comprehension(Box::new(
        Comprehension {
            iter_var,
            iter_range: target,
            accu_var: ACCU_VAR.to_string(),
            accu_init,
            loop_cond,
            loop_step,
            result,
        },
    )))))
}

fn expand_exists_one(
    ctx: &mut MacroContext<'_>,
    target: Option<Expr>,
    args: Vec<Expr>,
) -> MacroResult {
    let mut args = args;
    let predicate = args.pop().expect("arity checked by registry");
    let iter_var = iter_var_name(&args[0])?;
    let target = target.expect("receiver macro");

    let accu_init = ctx.constant(Constant::Int(0));
    let loop_cond = ctx.constant(Constant::Bool(true));
    let step_accu = ctx.ident(ACCU_VAR);
    let one = ctx.constant(Constant::Int(1));
    let incremented = ctx.call("_+_", vec![step_accu, one]);
    let kept = ctx.ident(ACCU_VAR);
    let loop_step = ctx.call("_?_:_", vec![predicate, incremented, kept]);
    let result_accu = ctx.ident(ACCU_VAR);
    let result_one = ctx.constant(Constant::Int(1));
    let result = ctx.call("_==_", vec![result_accu, result_one]);

    Ok(Some(ctx.build(ExprKind::Comprehension(Box::new(
        Comprehension {
            iter_var,
            iter_range: target,
            accu_var: ACCU_VAR.to_string(),
            accu_init,
            loop_cond,
            loop_step,
            result,
        },
    )))))
}

/// `x.map(v, e)` and `x.map(v, p, e)`.
fn expand_map(ctx: &mut MacroContext<'_>, target: Option<Expr>, args: Vec<Expr>) -> MacroResult {
    let mut args = args;
    let transform = args.pop().expect("arity checked by registry");
    let filter = if args.len() == 2 { Some(args.pop().expect("len checked")) } else { None };
    let iter_var = iter_var_name(&args[0])?;
    let target = target.expect("receiver macro");

    let accu_init = ctx.list(vec![]);
    let loop_cond = ctx.constant(Constant::Bool(true));
    let step_accu = ctx.ident(ACCU_VAR);
    let singleton = ctx.list(vec![transform]);
    let appended = ctx.call("_+_", vec![step_accu, singleton]);
    let loop_step = match filter {
        Some(filter) => {
            let kept = ctx.ident(ACCU_VAR);
            ctx.call("_?_:_", vec![filter, appended, kept])
        }
        None => appended,
    };
    let result = ctx.ident(ACCU_VAR);

    Ok(Some(ctx.build(ExprKind::Comprehension(Box::new(
        Comprehension {
            iter_var,
            iter_range: target,
            accu_var: ACCU_VAR.to_string(),
            accu_init,
            loop_cond,
            loop_step,
            result,
        },
    )))))
}

fn expand_filter(ctx: &mut MacroContext<'_>, target: Option<Expr>, args: Vec<Expr>) -> MacroResult {
    let mut args = args;
    let predicate = args.pop().expect("arity checked by registry");
    let iter_var = iter_var_name(&args[0])?;
    let target = target.expect("receiver macro");

    let accu_init = ctx.list(vec![]);
    let loop_cond = ctx.constant(Constant::Bool(true));
    let step_accu = ctx.ident(ACCU_VAR);
    let element = ctx.ident(&iter_var);
    let singleton = ctx.list(vec![element]);
    let appended = ctx.call("_+_", vec![step_accu, singleton]);
    let kept = ctx.ident(ACCU_VAR);
    let loop_step = ctx.call("_?_:_", vec![predicate, appended, kept]);
    let result = ctx.ident(ACCU_VAR);

    Ok(Some(ctx.build(ExprKind::Comprehension(Box::new(
        Comprehension {
            iter_var,
            iter_range: target,
            accu_var: ACCU_VAR.to_string(),
            accu_init,
            loop_cond,
            loop_step,
            result,
        },
    )))))
}

/// `cel.bind(var, init, expr)` introduces a local binding through the same
/// comprehension machinery; the loop body never runs.
fn expand_bind(ctx: &mut MacroContext<'_>, target: Option<Expr>, args: Vec<Expr>) -> MacroResult {
    match target.as_ref().map(|expr| &expr.kind) {
        Some(ExprKind::Ident(name)) if name == "cel" => {}
        _ => return Ok(None),
    }

    let mut args = args;
    let body = args.pop().expect("arity checked by registry");
    let init = args.pop().expect("arity checked by registry");
    let var = match &args[0].kind {
        ExprKind::Ident(name) => name.clone(),
        _ => return Err("cel.bind() variable must be a simple name".to_string()),
    };

    let iter_range = ctx.list(vec![]);
    let loop_cond = ctx.constant(Constant::Bool(false));
    let loop_step = ctx.ident(&var);
    Ok(Some(ctx.build(ExprKind::Comprehension(Box::new(
        Comprehension {
            iter_var: "#unused".to_string(),
            iter_range,
            accu_var: var,
            accu_init: init,
            loop_cond,
            loop_step,
            result: body,
        },
    )))))
}
