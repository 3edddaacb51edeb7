//! Declaration environment: variables, function overloads, container
//! resolution and proto field masks.

use std::collections::HashMap;
use std::sync::Arc;

use crate::types::{CelType, DeclaredTypeProvider, TypeProvider};

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Overload {
    pub id: String,
    /// For member overloads the receiver is `params[0]`.
    pub params: Vec<CelType>,
    pub result: CelType,
    pub is_member: bool,
}

impl Overload {
    pub fn global(id: impl Into<String>, params: Vec<CelType>, result: CelType) -> Overload {
        Overload {
            id: id.into(),
            params,
            result,
            is_member: false,
        }
    }

    pub fn member(id: impl Into<String>, params: Vec<CelType>, result: CelType) -> Overload {
        Overload {
            id: id.into(),
            params,
            result,
            is_member: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    pub overloads: Vec<Overload>,
}

impl FunctionDecl {
    pub fn new(name: impl Into<String>, overloads: Vec<Overload>) -> FunctionDecl {
        FunctionDecl {
            name: name.into(),
            overloads,
        }
    }
}

/// Field visibility mask for a message type. `"*"` admits every field, `"!"`
/// none; with `as_variables` each masked top-level field is additionally
/// injected as a variable declaration.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ProtoTypeMask {
    pub type_name: String,
    pub field_paths: Vec<String>,
    pub as_variables: bool,
}

impl ProtoTypeMask {
    pub fn new(type_name: impl Into<String>, field_paths: Vec<&str>) -> ProtoTypeMask {
        ProtoTypeMask {
            type_name: type_name.into(),
            field_paths: field_paths.into_iter().map(str::to_string).collect(),
            as_variables: false,
        }
    }

    pub fn as_variables(mut self) -> ProtoTypeMask {
        self.as_variables = true;
        self
    }

    fn admits(&self, field: &str) -> bool {
        if self.field_paths.iter().any(|path| path == "!") {
            return false;
        }
        self.field_paths
            .iter()
            .any(|path| path == "*" || path == field || path.starts_with(&format!("{field}.")))
    }
}

/// Immutable checking environment. Built once, shared freely.
#[derive(Clone)]
pub struct Env {
    container: String,
    variables: HashMap<String, CelType>,
    functions: HashMap<String, FunctionDecl>,
    masks: Vec<ProtoTypeMask>,
    provider: Arc<DeclaredTypeProvider>,
}

pub struct EnvBuilder {
    container: String,
    variables: Vec<(String, CelType)>,
    functions: Vec<FunctionDecl>,
    masks: Vec<ProtoTypeMask>,
    provider: Arc<DeclaredTypeProvider>,
    standard: bool,
}

impl Env {
    pub fn builder() -> EnvBuilder {
        EnvBuilder {
            container: String::new(),
            variables: vec![],
            functions: vec![],
            masks: vec![],
            provider: Arc::new(DeclaredTypeProvider::new()),
            standard: true,
        }
    }

    /// The standard environment with no extra declarations.
    pub fn standard() -> Env {
        Env::builder().build().expect("standard env must build")
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn provider(&self) -> &Arc<DeclaredTypeProvider> {
        &self.provider
    }

    /// Candidate resolutions for `name`, most-qualified first. A leading dot
    /// pins the name to the root namespace.
    pub fn resolve_candidates(&self, name: &str) -> Vec<String> {
        if let Some(absolute) = name.strip_prefix('.') {
            return vec![absolute.to_string()];
        }

        let mut candidates = vec![];
        let mut container = self.container.as_str();
        while !container.is_empty() {
            candidates.push(format!("{container}.{name}"));
            container = match container.rfind('.') {
                Some(idx) => &container[..idx],
                None => "",
            };
        }
        candidates.push(name.to_string());
        candidates
    }

    pub fn find_variable(&self, name: &str) -> Option<(String, CelType)> {
        for candidate in self.resolve_candidates(name) {
            if let Some(var_type) = self.variables.get(&candidate) {
                return Some((candidate, var_type.clone()));
            }
        }
        None
    }

    pub fn find_function(&self, name: &str) -> Option<(String, &FunctionDecl)> {
        for candidate in self.resolve_candidates(name) {
            if let Some(decl) = self.functions.get(&candidate) {
                return Some((candidate, decl));
            }
        }
        None
    }

    /// Resolve a qualified name as an enum constant, e.g. `pkg.Color.GREEN`.
    pub fn find_enum_constant(&self, name: &str) -> Option<(String, i32)> {
        for candidate in self.resolve_candidates(name) {
            let Some((enum_name, value_name)) = candidate.rsplit_once('.') else {
                continue;
            };
            if let Some(number) = self.provider.enum_value(enum_name, value_name) {
                return Some((candidate, number));
            }
        }
        None
    }

    pub fn find_type(&self, name: &str) -> Option<(String, CelType)> {
        for candidate in self.resolve_candidates(name) {
            if let Some(found) = self.provider.find_type(&candidate) {
                return Some((candidate, found));
            }
        }
        None
    }

    /// Whether a field of `message` is visible under the registered masks.
    pub fn field_visible(&self, message: &str, field: &str) -> bool {
        let relevant = self
            .masks
            .iter()
            .filter(|mask| mask.type_name == message)
            .collect::<Vec<_>>();
        if relevant.is_empty() {
            return true;
        }
        relevant.iter().any(|mask| mask.admits(field))
    }
}

impl EnvBuilder {
    pub fn container(mut self, container: impl Into<String>) -> EnvBuilder {
        self.container = container.into();
        self
    }

    pub fn declare_variable(mut self, name: impl Into<String>, var_type: CelType) -> EnvBuilder {
        self.variables.push((name.into(), var_type));
        self
    }

    pub fn declare_function(mut self, decl: FunctionDecl) -> EnvBuilder {
        self.functions.push(decl);
        self
    }

    pub fn type_provider(mut self, provider: DeclaredTypeProvider) -> EnvBuilder {
        self.provider = Arc::new(provider);
        self
    }

    pub fn proto_type_mask(mut self, mask: ProtoTypeMask) -> EnvBuilder {
        self.masks.push(mask);
        self
    }

    /// Skip the standard library declarations; used by tests that want a
    /// minimal environment.
    pub fn without_standard_declarations(mut self) -> EnvBuilder {
        self.standard = false;
        self
    }

    pub fn build(self) -> Result<Env, String> {
        let mut variables = HashMap::new();
        let mut functions: HashMap<String, FunctionDecl> = HashMap::new();

        let mut declare = |decl: FunctionDecl, functions: &mut HashMap<String, FunctionDecl>| {
            match functions.get_mut(&decl.name) {
                Some(existing) => existing.overloads.extend(decl.overloads),
                None => {
                    functions.insert(decl.name.clone(), decl);
                }
            }
        };

        if self.standard {
            for (name, var_type) in crate::stdlib::standard_variables() {
                variables.insert(name, var_type);
            }
            for decl in crate::stdlib::standard_declarations() {
                declare(decl, &mut functions);
            }
        }

        for (name, var_type) in self.variables {
            variables.insert(name, var_type);
        }
        for decl in self.functions {
            declare(decl, &mut functions);
        }

        // Masked fields may be promoted to top-level variables.
        for mask in &self.masks {
            if !mask.as_variables {
                continue;
            }
            let fields = self
                .provider
                .message_fields(&mask.type_name)
                .ok_or_else(|| format!("unknown type in proto mask: {}", mask.type_name))?;
            for (field, field_type) in fields {
                if mask.admits(field) {
                    variables.insert(field.clone(), field_type.clone());
                }
            }
        }

        Ok(Env {
            container: self.container,
            variables,
            functions,
            masks: self.masks,
            provider: self.provider,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_candidates() {
        let env = Env::builder()
            .container("a.b")
            .build()
            .unwrap();

        assert_eq!(
            env.resolve_candidates("c"),
            vec!["a.b.c".to_string(), "a.c".to_string(), "c".to_string()]
        );
        assert_eq!(env.resolve_candidates(".c"), vec!["c".to_string()]);
    }

    #[test]
    fn test_variable_resolution_prefers_qualified() {
        let env = Env::builder()
            .container("a.b")
            .declare_variable("a.b.x", CelType::Int)
            .declare_variable("x", CelType::String)
            .build()
            .unwrap();

        assert_eq!(env.find_variable("x"), Some(("a.b.x".into(), CelType::Int)));
    }

    #[test]
    fn test_mask_visibility() {
        let provider = DeclaredTypeProvider::new().add_message(
            "test.Request",
            vec![("host", CelType::String), ("path", CelType::String)],
        );
        let env = Env::builder()
            .type_provider(provider)
            .proto_type_mask(ProtoTypeMask::new("test.Request", vec!["host"]))
            .build()
            .unwrap();

        assert!(env.field_visible("test.Request", "host"));
        assert!(!env.field_visible("test.Request", "path"));
        assert!(env.field_visible("test.Other", "anything"));
    }

    #[test]
    fn test_mask_as_variables() {
        let provider = DeclaredTypeProvider::new().add_message(
            "test.Request",
            vec![("host", CelType::String), ("code", CelType::Int)],
        );
        let env = Env::builder()
            .type_provider(provider)
            .proto_type_mask(ProtoTypeMask::new("test.Request", vec!["*"]).as_variables())
            .build()
            .unwrap();

        assert_eq!(env.find_variable("host").map(|(_, t)| t), Some(CelType::String));
        assert_eq!(env.find_variable("code").map(|(_, t)| t), Some(CelType::Int));
    }

    #[test]
    fn test_bang_mask_hides_everything() {
        let mask = ProtoTypeMask::new("t.T", vec!["!"]);
        assert!(!mask.admits("anything"));
    }

    #[test]
    fn test_enum_constant_resolution() {
        let provider =
            DeclaredTypeProvider::new().add_enum("test.Color", vec![("RED", 0), ("BLUE", 2)]);
        let env = Env::builder().type_provider(provider).build().unwrap();

        assert_eq!(
            env.find_enum_constant("test.Color.BLUE"),
            Some(("test.Color.BLUE".into(), 2))
        );
        assert_eq!(env.find_enum_constant("test.Color.GREEN"), None);
    }
}
