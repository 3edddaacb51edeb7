//! Canonical semantic type representation shared by checker and runtime.
//!
//! Types form a lattice with `dyn` on top: every type is assignable to `dyn`
//! and `dyn` to every type. Primitive wrappers admit `null` in addition to
//! their primitive. Assignability and unification live in
//! `checker::unify`; this module only owns the shape and its display form.

pub mod provider;

pub use self::provider::{DeclaredTypeProvider, FieldInfo, TypeProvider};

use std::fmt::Display;

#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum CelType {
    /// Top of the assignability lattice.
    Dyn,
    Null,
    Bool,
    Int,
    Uint,
    Double,
    String,
    Bytes,
    Timestamp,
    Duration,
    List(Box<CelType>),
    Map(Box<CelType>, Box<CelType>),
    /// The type of a type value, e.g. `type(int)`.
    TypeOf(Box<CelType>),
    /// Protobuf message type, by fully qualified name.
    Message(String),
    /// Protobuf enum type, by fully qualified name.
    Enum(String),
    /// Parametric variable introduced by overload declarations.
    TypeParam(String),
    /// Abstract type with a name and type arguments, e.g. `optional_type(T)`.
    Opaque(String, Vec<CelType>),
    Error,
    /// Well-known wrapper around a primitive; admits `null`.
    Wrapper(Box<CelType>),
}

impl CelType {
    pub fn list_of(element: CelType) -> CelType {
        CelType::List(Box::new(element))
    }

    pub fn map_of(key: CelType, value: CelType) -> CelType {
        CelType::Map(Box::new(key), Box::new(value))
    }

    pub fn optional_of(inner: CelType) -> CelType {
        CelType::Opaque("optional_type".into(), vec![inner])
    }

    pub fn type_of(inner: CelType) -> CelType {
        CelType::TypeOf(Box::new(inner))
    }

    pub fn type_param(name: impl Into<String>) -> CelType {
        CelType::TypeParam(name.into())
    }

    pub fn is_dyn(&self) -> bool {
        matches!(self, CelType::Dyn)
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, CelType::Opaque(name, _) if name == "optional_type")
    }

    /// Whether this type or any component of it is a type parameter.
    pub fn has_type_params(&self) -> bool {
        match self {
            CelType::TypeParam(_) => true,
            CelType::List(element) => element.has_type_params(),
            CelType::Map(key, value) => key.has_type_params() || value.has_type_params(),
            CelType::TypeOf(inner) | CelType::Wrapper(inner) => inner.has_type_params(),
            CelType::Opaque(_, params) => params.iter().any(CelType::has_type_params),
            _ => false,
        }
    }
}

impl Display for CelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CelType::Dyn => write!(f, "dyn"),
            CelType::Null => write!(f, "null_type"),
            CelType::Bool => write!(f, "bool"),
            CelType::Int => write!(f, "int"),
            CelType::Uint => write!(f, "uint"),
            CelType::Double => write!(f, "double"),
            CelType::String => write!(f, "string"),
            CelType::Bytes => write!(f, "bytes"),
            CelType::Timestamp => write!(f, "google.protobuf.Timestamp"),
            CelType::Duration => write!(f, "google.protobuf.Duration"),
            CelType::List(element) => write!(f, "list({element})"),
            CelType::Map(key, value) => write!(f, "map({key}, {value})"),
            CelType::TypeOf(inner) if inner.is_dyn() => write!(f, "type"),
            CelType::TypeOf(inner) => write!(f, "type({inner})"),
            CelType::Message(name) => write!(f, "{name}"),
            CelType::Enum(name) => write!(f, "{name}"),
            CelType::TypeParam(name) => write!(f, "{name}"),
            CelType::Opaque(name, params) => {
                if params.is_empty() {
                    write!(f, "{name}")
                } else {
                    let rendered = params
                        .iter()
                        .map(CelType::to_string)
                        .collect::<Vec<_>>()
                        .join(", ");
                    write!(f, "{name}({rendered})")
                }
            }
            CelType::Error => write!(f, "*error*"),
            CelType::Wrapper(inner) => write!(f, "wrapper({inner})"),
        }
    }
}
