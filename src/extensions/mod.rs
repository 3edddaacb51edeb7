//! Extension libraries: registered onto an environment, not part of the
//! required core surface.
//!
//! Each extension contributes checker declarations, runtime bindings, and in
//! the optional extension's case parse-time macros and the optional syntax.

pub mod math;
pub mod optional;
pub mod regexfns;
pub mod sets;
pub mod strings;

use crate::checker::env::FunctionDecl;
use crate::parser::MacroRegistry;
use crate::registry::FunctionRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extension {
    Strings,
    Math,
    Sets,
    Regex,
    Optional,
}

impl Extension {
    pub fn declarations(&self) -> Vec<FunctionDecl> {
        match self {
            Extension::Strings => strings::declarations(),
            Extension::Math => math::declarations(),
            Extension::Sets => sets::declarations(),
            Extension::Regex => regexfns::declarations(),
            Extension::Optional => optional::declarations(),
        }
    }

    pub fn register(&self, registry: &mut FunctionRegistry) {
        match self {
            Extension::Strings => strings::register(registry),
            Extension::Math => math::register(registry),
            Extension::Sets => sets::register(registry),
            Extension::Regex => regexfns::register(registry),
            Extension::Optional => optional::register(registry),
        }
    }

    pub fn register_macros(&self, macros: &mut MacroRegistry) {
        if let Extension::Optional = self {
            optional::register_macros(macros);
        }
    }

    /// Whether this extension turns on the parser's optional syntax.
    pub fn enables_optional_syntax(&self) -> bool {
        matches!(self, Extension::Optional)
    }
}
