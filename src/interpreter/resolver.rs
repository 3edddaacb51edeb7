//! Unknown-attribute resolvers and the iterative re-evaluation driver.
//!
//! The driver is a plain fixed point: evaluate, resolve every attribute the
//! result is unknown on, fold the resolutions back in, and go again. All
//! resolutions of round *k* complete (or fail) before round *k+1* starts;
//! a resolver failure short-circuits the whole run.

use std::collections::HashMap;
use std::sync::Arc;

use crate::values::{Attribute, AttributePattern, ErrorKind, EvalError, EvalResult, Value};

pub trait AttributeResolver: Send + Sync {
    fn resolve(&self, attribute: &Attribute) -> EvalResult<Value>;
}

impl<F> AttributeResolver for F
where
    F: Fn(&Attribute) -> EvalResult<Value> + Send + Sync,
{
    fn resolve(&self, attribute: &Attribute) -> EvalResult<Value> {
        self(attribute)
    }
}

/// Resolvers registered against attribute patterns. First matching pattern
/// wins.
#[derive(Clone, Default)]
pub struct ResolverRegistry {
    entries: Vec<(AttributePattern, Arc<dyn AttributeResolver>)>,
}

impl ResolverRegistry {
    pub fn new() -> ResolverRegistry {
        ResolverRegistry::default()
    }

    pub fn register(
        &mut self,
        pattern: AttributePattern,
        resolver: impl AttributeResolver + 'static,
    ) {
        self.entries.push((pattern, Arc::new(resolver)));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find(&self, attribute: &Attribute) -> Option<&Arc<dyn AttributeResolver>> {
        self.entries
            .iter()
            .find(|(pattern, _)| pattern.matches(attribute))
            .map(|(_, resolver)| resolver)
    }
}

/// Drive `evaluate` to a fixed point. Stops with success on a concrete
/// value; with failure when an attribute has no resolver, when a round makes
/// no progress, or when the round cap is hit.
pub fn run_fixed_point<F>(
    mut evaluate: F,
    resolvers: &ResolverRegistry,
    round_limit: usize,
) -> EvalResult<Value>
where
    F: FnMut(&HashMap<Attribute, Value>) -> EvalResult<Value>,
{
    let mut resolved: HashMap<Attribute, Value> = HashMap::new();
    let mut prior = None;

    for round in 0..round_limit {
        let value = evaluate(&resolved)?;
        let Value::Unknown(unknowns) = value else {
            return Ok(value);
        };

        if prior.as_ref() == Some(&unknowns) {
            return Err(EvalError::new(
                ErrorKind::AttributeNotFound,
                format!("no progress resolving {unknowns}"),
            ));
        }

        log::debug!(
            "re-evaluation round {}: {} unresolved attribute(s)",
            round + 1,
            unknowns.len()
        );

        for attribute in unknowns.attributes() {
            let Some(resolver) = resolvers.find(attribute) else {
                return Err(EvalError::new(
                    ErrorKind::AttributeNotFound,
                    format!("no resolver registered for '{attribute}'"),
                ));
            };
            let value = resolver.resolve(attribute)?;
            resolved.insert(attribute.clone(), value);
        }

        prior = Some(unknowns);
    }

    Err(EvalError::new(
        ErrorKind::IterationBudgetExceeded,
        "re-evaluation round limit exceeded",
    ))
}
