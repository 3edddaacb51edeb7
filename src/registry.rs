//! Runtime function bindings.
//!
//! The checker works from overload declarations (`checker::env`); the
//! evaluator dispatches by function name into this registry. Implementations
//! receive pre-evaluated, error-free arguments (receiver first for member
//! calls) and perform their own runtime type dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use crate::values::Value;

pub type FunctionImpl = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;

#[derive(Clone, Default)]
pub struct FunctionRegistry {
    bindings: HashMap<String, FunctionImpl>,
}

impl FunctionRegistry {
    pub fn new() -> FunctionRegistry {
        FunctionRegistry::default()
    }

    /// All standard-library bindings.
    pub fn standard() -> FunctionRegistry {
        let mut registry = FunctionRegistry::new();
        crate::stdlib::register_standard(&mut registry);
        registry
    }

    pub fn register<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        self.bindings.insert(name.into(), Arc::new(function));
    }

    pub fn find(&self, name: &str) -> Option<&FunctionImpl> {
        self.bindings.get(name)
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_dispatch() {
        let mut registry = FunctionRegistry::new();
        registry.register("answer", |_args| Value::Int(42));

        let found = registry.find("answer").unwrap();
        assert_eq!(found.as_ref()(&[]), Value::Int(42));
        assert!(!registry.is_bound("missing"));
    }
}
