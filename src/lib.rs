//! Core of a Common Expression Language implementation: parser, type
//! checker and tree-walking evaluator over a shared value model.
//!
//! The pipeline is parse → check → (optimize) → evaluate. A [`CelEnv`]
//! holds the immutable configuration (declarations, macros, providers,
//! function bindings); a compiled [`Program`] is immutable and may be
//! evaluated concurrently from independent activations.

pub mod ast;
pub mod checker;
pub mod extensions;
pub mod interpreter;
pub mod issues;
pub mod lexer;
pub mod optimizer;
pub mod parser;
pub mod registry;
pub mod source;
pub mod stdlib;
pub mod types;
pub mod unparser;
pub mod validators;
pub mod values;

use std::collections::HashMap;
use std::sync::Arc;

pub use crate::ast::ParsedAst;
pub use crate::checker::{CheckedAst, Env, FunctionDecl, Overload, ProtoTypeMask, Reference};
pub use crate::extensions::Extension;
pub use crate::interpreter::{
    Activation, EmptyActivation, EvalObserver, EvalOptions, MapActivation, ResolverRegistry,
};
pub use crate::issues::{Issue, Issues, Severity};
pub use crate::parser::{MacroRegistry, ParserOptions};
pub use crate::registry::FunctionRegistry;
pub use crate::source::Source;
pub use crate::types::{CelType, DeclaredTypeProvider, TypeProvider};
pub use crate::values::{
    Attribute, AttributePattern, ErrorKind, EvalError, EvalResult, Value,
};

use crate::interpreter::Interpreter;
use crate::optimizer::{CommonSubexprElimination, ConstantFolding, OptimizerPass};
use crate::values::provider::DynValueProvider;

/// An immutable, shareable CEL environment.
#[derive(Clone)]
pub struct CelEnv {
    env: Env,
    registry: Arc<FunctionRegistry>,
    macros: MacroRegistry,
    parser_options: ParserOptions,
    eval_options: EvalOptions,
}

pub struct CelEnvBuilder {
    container: String,
    variables: Vec<(String, CelType)>,
    functions: Vec<FunctionDecl>,
    masks: Vec<ProtoTypeMask>,
    provider: DeclaredTypeProvider,
    extensions: Vec<Extension>,
    parser_options: ParserOptions,
    eval_options: EvalOptions,
    registry: FunctionRegistry,
}

impl CelEnv {
    pub fn builder() -> CelEnvBuilder {
        CelEnvBuilder {
            container: String::new(),
            variables: vec![],
            functions: vec![],
            masks: vec![],
            provider: DeclaredTypeProvider::new(),
            extensions: vec![],
            parser_options: ParserOptions::default(),
            eval_options: EvalOptions::default(),
            registry: FunctionRegistry::standard(),
        }
    }

    /// The standard environment with no extra declarations.
    pub fn standard() -> CelEnv {
        CelEnv::builder().build().expect("standard env must build")
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    pub fn parse(&self, text: &str) -> Result<ParsedAst, Issues> {
        parser::parse_with(Source::from_text(text), &self.parser_options, &self.macros)
    }

    pub fn check(&self, ast: ParsedAst) -> Result<CheckedAst, Issues> {
        checker::check(ast, &self.env)
    }

    /// Parse, check and validate; the result is ready to evaluate.
    pub fn compile(&self, text: &str) -> Result<Program, Issues> {
        let parsed = self.parse(text)?;
        let checked = self.check(parsed)?;

        let issues = validators::validate(&checked, &validators::standard_validators());
        if !issues.is_empty() {
            return Err(issues);
        }

        Ok(self.program(checked))
    }

    /// Compile with constant folding and common-subexpression elimination
    /// applied between parse and check.
    pub fn compile_optimized(&self, text: &str) -> Result<Program, Issues> {
        let parsed = self.parse(text)?;
        let folding = ConstantFolding::new(self.registry.clone());
        let passes: [&dyn OptimizerPass; 2] = [&folding, &CommonSubexprElimination];
        let optimized = optimizer::optimize(parsed, &passes);
        let checked = self.check(optimized)?;
        Ok(self.program(checked))
    }

    pub fn program(&self, checked: CheckedAst) -> Program {
        Program {
            checked,
            registry: self.registry.clone(),
            types: self.env.provider().clone(),
            options: self.eval_options.clone(),
        }
    }
}

impl CelEnvBuilder {
    pub fn container(mut self, container: impl Into<String>) -> CelEnvBuilder {
        self.container = container.into();
        self
    }

    pub fn declare_variable(mut self, name: impl Into<String>, t: CelType) -> CelEnvBuilder {
        self.variables.push((name.into(), t));
        self
    }

    pub fn declare_function(mut self, decl: FunctionDecl) -> CelEnvBuilder {
        self.functions.push(decl);
        self
    }

    pub fn type_provider(mut self, provider: DeclaredTypeProvider) -> CelEnvBuilder {
        self.provider = provider;
        self
    }

    pub fn proto_type_mask(mut self, mask: ProtoTypeMask) -> CelEnvBuilder {
        self.masks.push(mask);
        self
    }

    pub fn with_extension(mut self, extension: Extension) -> CelEnvBuilder {
        self.extensions.push(extension);
        self
    }

    /// Bind (or rebind) a runtime function by name.
    pub fn bind_function<F>(mut self, name: impl Into<String>, function: F) -> CelEnvBuilder
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        self.registry.register(name, function);
        self
    }

    pub fn parser_options(mut self, options: ParserOptions) -> CelEnvBuilder {
        self.parser_options = options;
        self
    }

    pub fn eval_options(mut self, options: EvalOptions) -> CelEnvBuilder {
        self.eval_options = options;
        self
    }

    pub fn build(mut self) -> Result<CelEnv, String> {
        let mut macros = MacroRegistry::standard();

        for extension in &self.extensions {
            for decl in extension.declarations() {
                self.functions.push(decl);
            }
            extension.register(&mut self.registry);
            extension.register_macros(&mut macros);
            if extension.enables_optional_syntax() {
                self.parser_options.enable_optional_syntax = true;
            }
        }

        let mut env_builder = Env::builder()
            .container(self.container)
            .type_provider(self.provider);
        for (name, t) in self.variables {
            env_builder = env_builder.declare_variable(name, t);
        }
        for decl in self.functions {
            env_builder = env_builder.declare_function(decl);
        }
        for mask in self.masks {
            env_builder = env_builder.proto_type_mask(mask);
        }

        Ok(CelEnv {
            env: env_builder.build()?,
            registry: Arc::new(self.registry),
            macros,
            parser_options: self.parser_options,
            eval_options: self.eval_options,
        })
    }
}

/// A compiled expression. Immutable; safe to evaluate concurrently from
/// multiple activations.
#[derive(Clone)]
pub struct Program {
    checked: CheckedAst,
    registry: Arc<FunctionRegistry>,
    types: Arc<DeclaredTypeProvider>,
    options: EvalOptions,
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("checked", &self.checked)
            .field("options", &self.options)
            .finish()
    }
}

impl Program {
    pub fn checked(&self) -> &CheckedAst {
        &self.checked
    }

    pub fn result_type(&self) -> CelType {
        self.checked.result_type()
    }

    pub fn unparse(&self) -> String {
        unparser::unparse(&self.checked.expr, &self.checked.source_info)
    }

    pub fn eval(&self, activation: &dyn Activation) -> EvalResult<Value> {
        let resolved = HashMap::new();
        self.eval_internal(activation, &resolved, None)
    }

    pub fn eval_with_observer(
        &self,
        activation: &dyn Activation,
        observer: EvalObserver<'_>,
    ) -> EvalResult<Value> {
        let resolved = HashMap::new();
        self.eval_internal(activation, &resolved, Some(observer))
    }

    /// Iterative re-evaluation: unknowns reported by the activation are fed
    /// through the registered resolvers round by round until the result is
    /// concrete, a resolver fails, no progress is made, or the round cap is
    /// hit.
    pub fn eval_with_resolvers(
        &self,
        activation: &dyn Activation,
        resolvers: &ResolverRegistry,
    ) -> EvalResult<Value> {
        interpreter::run_fixed_point(
            |resolved| self.eval_internal(activation, resolved, None),
            resolvers,
            self.options.reeval_round_limit,
        )
    }

    fn eval_internal(
        &self,
        activation: &dyn Activation,
        resolved: &HashMap<Attribute, Value>,
        observer: Option<EvalObserver<'_>>,
    ) -> EvalResult<Value> {
        let provider = DynValueProvider::new(self.types.clone());
        let interpreter = Interpreter::new(
            &self.checked,
            activation,
            &self.registry,
            &provider,
            &self.types,
            &self.options,
            resolved,
            observer,
        );
        interpreter.run()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_and_eval() {
        let env = CelEnv::standard();
        let program = env.compile("1 + 2 == 3").unwrap();

        assert_eq!(program.result_type(), CelType::Bool);
        assert_eq!(
            program.eval(&EmptyActivation).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_variables_through_activation() {
        let env = CelEnv::builder()
            .declare_variable("name", CelType::String)
            .build()
            .unwrap();
        let program = env.compile("'Hello ' + name").unwrap();

        let activation = MapActivation::new().bind("name", Value::string("World"));
        assert_eq!(
            program.eval(&activation).unwrap(),
            Value::string("Hello World")
        );
    }

    #[test]
    fn test_compile_reports_issues() {
        let env = CelEnv::standard();
        let issues = env.compile("'foo' + 1").unwrap_err();
        assert!(issues.to_string().contains("no matching overload"));
    }
}
