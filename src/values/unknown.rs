//! Unknown attributes as first-class values.
//!
//! An attribute is a qualified access path from a root variable; a pattern is
//! the same grammar with wildcards. Unknowns carry attribute sets and union
//! as they flow through operators.

use std::fmt::Display;

#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Qualifier {
    Field(String),
    StringKey(String),
    IntKey(i64),
    UintKey(u64),
    BoolKey(bool),
}

impl Display for Qualifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Qualifier::Field(name) => write!(f, ".{name}"),
            Qualifier::StringKey(key) => write!(f, "[{key:?}]"),
            Qualifier::IntKey(key) => write!(f, "[{key}]"),
            Qualifier::UintKey(key) => write!(f, "[{key}u]"),
            Qualifier::BoolKey(key) => write!(f, "[{key}]"),
        }
    }
}

/// A fully qualified access path `root (.field | [key])*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Attribute {
    pub variable: String,
    pub qualifiers: Vec<Qualifier>,
}

impl Attribute {
    pub fn new(variable: impl Into<String>) -> Attribute {
        Attribute {
            variable: variable.into(),
            qualifiers: vec![],
        }
    }

    pub fn select(mut self, field: impl Into<String>) -> Attribute {
        self.qualifiers.push(Qualifier::Field(field.into()));
        self
    }

    pub fn key(mut self, qualifier: Qualifier) -> Attribute {
        self.qualifiers.push(qualifier);
        self
    }
}

impl Display for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.variable)?;
        for qualifier in &self.qualifiers {
            write!(f, "{qualifier}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PatternQualifier {
    Wildcard,
    Exact(Qualifier),
}

/// An attribute path with `*` wildcards allowed at any qualifier position.
///
/// A pattern marks an attribute unknown when the pattern's variable matches
/// and its qualifiers are a (wildcard-aware) prefix of the attribute's.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AttributePattern {
    pub variable: String,
    pub qualifiers: Vec<PatternQualifier>,
}

impl AttributePattern {
    pub fn new(variable: impl Into<String>) -> AttributePattern {
        AttributePattern {
            variable: variable.into(),
            qualifiers: vec![],
        }
    }

    pub fn select(mut self, field: impl Into<String>) -> AttributePattern {
        self.qualifiers
            .push(PatternQualifier::Exact(Qualifier::Field(field.into())));
        self
    }

    pub fn key(mut self, qualifier: Qualifier) -> AttributePattern {
        self.qualifiers.push(PatternQualifier::Exact(qualifier));
        self
    }

    pub fn wildcard(mut self) -> AttributePattern {
        self.qualifiers.push(PatternQualifier::Wildcard);
        self
    }

    pub fn matches(&self, attribute: &Attribute) -> bool {
        if self.variable != attribute.variable {
            return false;
        }
        if self.qualifiers.len() > attribute.qualifiers.len() {
            return false;
        }

        self.qualifiers
            .iter()
            .zip(&attribute.qualifiers)
            .all(|(pattern, qualifier)| match pattern {
                PatternQualifier::Wildcard => true,
                PatternQualifier::Exact(exact) => exact == qualifier,
            })
    }
}

/// The attribute set carried by an `Unknown` value. Kept sorted-free but
/// deduplicated; union is the only combining operation.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct UnknownSet {
    attributes: Vec<Attribute>,
}

impl UnknownSet {
    pub fn of(attribute: Attribute) -> UnknownSet {
        UnknownSet {
            attributes: vec![attribute],
        }
    }

    pub fn insert(&mut self, attribute: Attribute) {
        if !self.attributes.contains(&attribute) {
            self.attributes.push(attribute);
        }
    }

    pub fn union(mut self, other: &UnknownSet) -> UnknownSet {
        for attribute in &other.attributes {
            self.insert(attribute.clone());
        }
        self
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn contains(&self, attribute: &Attribute) -> bool {
        self.attributes.contains(attribute)
    }
}

impl PartialEq for UnknownSet {
    fn eq(&self, other: &Self) -> bool {
        self.attributes.len() == other.attributes.len()
            && self
                .attributes
                .iter()
                .all(|attribute| other.attributes.contains(attribute))
    }
}

impl Eq for UnknownSet {}

impl Display for UnknownSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered = self
            .attributes
            .iter()
            .map(Attribute::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "unknown{{{rendered}}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_prefix_match() {
        let pattern = AttributePattern::new("request").select("auth");
        let attribute = Attribute::new("request")
            .select("auth")
            .select("claims");

        assert!(pattern.matches(&attribute));
        assert!(!pattern.matches(&Attribute::new("request").select("host")));
        assert!(!pattern.matches(&Attribute::new("request")));
    }

    #[test]
    fn test_wildcard_match() {
        let pattern = AttributePattern::new("claims").wildcard();

        assert!(pattern.matches(&Attribute::new("claims").select("group")));
        assert!(pattern.matches(
            &Attribute::new("claims").key(Qualifier::StringKey("group".into()))
        ));
    }

    #[test]
    fn test_union_deduplicates() {
        let a = Attribute::new("a");
        let left = UnknownSet::of(a.clone());
        let right = UnknownSet::of(a);

        assert_eq!(left.union(&right).len(), 1);
    }

    #[test]
    fn test_set_equality_is_order_free() {
        let mut left = UnknownSet::of(Attribute::new("a"));
        left.insert(Attribute::new("b"));
        let mut right = UnknownSet::of(Attribute::new("b"));
        right.insert(Attribute::new("a"));

        assert_eq!(left, right);
    }

    #[test]
    fn test_attribute_display() {
        let attribute = Attribute::new("request")
            .select("auth")
            .key(Qualifier::StringKey("group".into()));
        assert_eq!(attribute.to_string(), "request.auth[\"group\"]");
    }
}
