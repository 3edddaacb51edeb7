//! Type providers supply message, field and enum semantics to the checker.
//!
//! Descriptor ingestion is outside this crate; tests and embedders register
//! message shapes directly through [`DeclaredTypeProvider`].

use std::collections::HashMap;

use super::CelType;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FieldInfo {
    pub field_type: CelType,
    pub is_repeated: bool,
    pub is_map: bool,
}

impl FieldInfo {
    pub fn new(field_type: CelType) -> FieldInfo {
        let (is_repeated, is_map) = match &field_type {
            CelType::List(_) => (true, false),
            CelType::Map(_, _) => (false, true),
            _ => (false, false),
        };

        FieldInfo {
            field_type,
            is_repeated,
            is_map,
        }
    }
}

pub trait TypeProvider {
    fn find_type(&self, name: &str) -> Option<CelType>;

    fn find_field(&self, message_name: &str, field_name: &str) -> Option<FieldInfo>;

    fn enum_value(&self, enum_name: &str, value_name: &str) -> Option<i32>;
}

/// Maps the `google.protobuf` well-known names onto their CEL counterparts.
pub fn well_known_type(name: &str) -> Option<CelType> {
    let mapped = match name {
        "google.protobuf.Timestamp" => CelType::Timestamp,
        "google.protobuf.Duration" => CelType::Duration,
        "google.protobuf.Struct" => CelType::map_of(CelType::String, CelType::Dyn),
        "google.protobuf.Value" => CelType::Dyn,
        "google.protobuf.ListValue" => CelType::list_of(CelType::Dyn),
        "google.protobuf.NullValue" => CelType::Null,
        "google.protobuf.Any" => CelType::Dyn,
        "google.protobuf.BoolValue" => CelType::Wrapper(Box::new(CelType::Bool)),
        "google.protobuf.Int32Value" | "google.protobuf.Int64Value" => {
            CelType::Wrapper(Box::new(CelType::Int))
        }
        "google.protobuf.UInt32Value" | "google.protobuf.UInt64Value" => {
            CelType::Wrapper(Box::new(CelType::Uint))
        }
        "google.protobuf.FloatValue" | "google.protobuf.DoubleValue" => {
            CelType::Wrapper(Box::new(CelType::Double))
        }
        "google.protobuf.StringValue" => CelType::Wrapper(Box::new(CelType::String)),
        "google.protobuf.BytesValue" => CelType::Wrapper(Box::new(CelType::Bytes)),
        _ => return None,
    };
    Some(mapped)
}

/// An in-memory provider backed by explicitly declared shapes.
#[derive(Debug, Clone, Default)]
pub struct DeclaredTypeProvider {
    messages: HashMap<String, Vec<(String, CelType)>>,
    enums: HashMap<String, HashMap<String, i32>>,
}

impl DeclaredTypeProvider {
    pub fn new() -> DeclaredTypeProvider {
        DeclaredTypeProvider::default()
    }

    pub fn add_message(
        mut self,
        name: impl Into<String>,
        fields: Vec<(&str, CelType)>,
    ) -> DeclaredTypeProvider {
        self.messages.insert(
            name.into(),
            fields
                .into_iter()
                .map(|(field, field_type)| (field.to_string(), field_type))
                .collect(),
        );
        self
    }

    pub fn add_enum(
        mut self,
        name: impl Into<String>,
        values: Vec<(&str, i32)>,
    ) -> DeclaredTypeProvider {
        self.enums.insert(
            name.into(),
            values
                .into_iter()
                .map(|(value, number)| (value.to_string(), number))
                .collect(),
        );
        self
    }

    pub fn message_fields(&self, name: &str) -> Option<&[(String, CelType)]> {
        self.messages.get(name).map(Vec::as_slice)
    }
}

impl TypeProvider for DeclaredTypeProvider {
    fn find_type(&self, name: &str) -> Option<CelType> {
        if let Some(well_known) = well_known_type(name) {
            return Some(well_known);
        }
        if self.messages.contains_key(name) {
            return Some(CelType::Message(name.to_string()));
        }
        if self.enums.contains_key(name) {
            return Some(CelType::Enum(name.to_string()));
        }
        None
    }

    fn find_field(&self, message_name: &str, field_name: &str) -> Option<FieldInfo> {
        self.messages.get(message_name).and_then(|fields| {
            fields
                .iter()
                .find(|(name, _)| name == field_name)
                .map(|(_, field_type)| FieldInfo::new(field_type.clone()))
        })
    }

    fn enum_value(&self, enum_name: &str, value_name: &str) -> Option<i32> {
        self.enums
            .get(enum_name)
            .and_then(|values| values.get(value_name))
            .copied()
    }
}
