//! Activations bind variable names to values for a single evaluation.

use std::collections::HashMap;

use crate::values::{Attribute, AttributePattern, Value};

/// Outcome of a variable lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Value(Value),
    /// The variable itself is declared unknown.
    Unknown(Attribute),
    Missing,
}

pub trait Activation {
    fn resolve(&self, name: &str) -> Resolution;

    /// Attribute patterns declared unknown for this evaluation.
    fn unknown_patterns(&self) -> &[AttributePattern] {
        &[]
    }
}

/// The empty activation; every lookup misses.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyActivation;

impl Activation for EmptyActivation {
    fn resolve(&self, _name: &str) -> Resolution {
        Resolution::Missing
    }
}

/// A map-backed activation, optionally carrying unknown-attribute patterns.
#[derive(Debug, Clone, Default)]
pub struct MapActivation {
    values: HashMap<String, Value>,
    patterns: Vec<AttributePattern>,
}

impl MapActivation {
    pub fn new() -> MapActivation {
        MapActivation::default()
    }

    pub fn bind(mut self, name: impl Into<String>, value: Value) -> MapActivation {
        self.values.insert(name.into(), value);
        self
    }

    pub fn declare_unknown(mut self, pattern: AttributePattern) -> MapActivation {
        self.patterns.push(pattern);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }
}

impl Activation for MapActivation {
    fn resolve(&self, name: &str) -> Resolution {
        match self.values.get(name) {
            Some(value) => Resolution::Value(value.clone()),
            None => Resolution::Missing,
        }
    }

    fn unknown_patterns(&self) -> &[AttributePattern] {
        &self.patterns
    }
}

impl FromIterator<(String, Value)> for MapActivation {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> MapActivation {
        MapActivation {
            values: iter.into_iter().collect(),
            patterns: vec![],
        }
    }
}

/// Child-over-parent chaining; the child shadows the parent and the unknown
/// patterns of both apply.
pub struct HierarchicalActivation<'a> {
    parent: &'a dyn Activation,
    child: &'a dyn Activation,
    merged_patterns: Vec<AttributePattern>,
}

impl<'a> HierarchicalActivation<'a> {
    pub fn new(
        parent: &'a dyn Activation,
        child: &'a dyn Activation,
    ) -> HierarchicalActivation<'a> {
        let mut merged_patterns = parent.unknown_patterns().to_vec();
        merged_patterns.extend(child.unknown_patterns().iter().cloned());
        HierarchicalActivation {
            parent,
            child,
            merged_patterns,
        }
    }
}

impl Activation for HierarchicalActivation<'_> {
    fn resolve(&self, name: &str) -> Resolution {
        match self.child.resolve(name) {
            Resolution::Missing => self.parent.resolve(name),
            found => found,
        }
    }

    fn unknown_patterns(&self) -> &[AttributePattern] {
        &self.merged_patterns
    }
}
