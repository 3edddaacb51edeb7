//! Message construction and field access semantics for the runtime.
//!
//! The checker resolves message shapes through `types::TypeProvider`; this is
//! the runtime half. Construction honors the `google.protobuf` well-known
//! types by adapting them to the corresponding CEL primitive or container.

use std::sync::Arc;

use crate::types::{provider::well_known_type, CelType, DeclaredTypeProvider, TypeProvider};

use super::{
    error::{EvalError, EvalResult},
    time, MapValue, MessageValue, Value,
};

pub trait ValueProvider {
    /// Construct a message value from named field values.
    fn new_message(&self, name: &str, fields: Vec<(String, Value)>) -> EvalResult<Value>;

    /// Field access. Unset primitive fields yield the field's default; unset
    /// message fields yield an empty message (so `has()` stays `false`).
    fn get_field(&self, message: &MessageValue, name: &str) -> Value;
}

/// A value provider backed by the same declared shapes the checker sees.
#[derive(Clone)]
pub struct DynValueProvider {
    types: Arc<DeclaredTypeProvider>,
}

impl DynValueProvider {
    pub fn new(types: Arc<DeclaredTypeProvider>) -> DynValueProvider {
        DynValueProvider { types }
    }

    fn adapt_well_known(
        &self,
        name: &str,
        fields: &[(String, Value)],
    ) -> Option<EvalResult<Value>> {
        let field = |wanted: &str| {
            fields
                .iter()
                .find(|(name, _)| name == wanted)
                .map(|(_, value)| value.clone())
        };

        let adapted = match name {
            "google.protobuf.BoolValue" => field("value").unwrap_or(Value::Bool(false)),
            "google.protobuf.Int32Value" | "google.protobuf.Int64Value" => {
                field("value").unwrap_or(Value::Int(0))
            }
            "google.protobuf.UInt32Value" | "google.protobuf.UInt64Value" => {
                field("value").unwrap_or(Value::Uint(0))
            }
            "google.protobuf.FloatValue" | "google.protobuf.DoubleValue" => {
                field("value").unwrap_or(Value::Double(0.0))
            }
            "google.protobuf.StringValue" => field("value").unwrap_or(Value::string("")),
            "google.protobuf.BytesValue" => field("value").unwrap_or(Value::Bytes(vec![])),
            "google.protobuf.NullValue" => Value::Null,
            "google.protobuf.Struct" => field("fields").unwrap_or(Value::Map(MapValue::new())),
            "google.protobuf.ListValue" => field("values").unwrap_or(Value::List(vec![])),
            "google.protobuf.Value" => fields
                .first()
                .map(|(_, value)| value.clone())
                .unwrap_or(Value::Null),
            "google.protobuf.Timestamp" => {
                let seconds = match field("seconds") {
                    Some(Value::Int(seconds)) => seconds,
                    None => 0,
                    _ => return Some(Err(EvalError::invalid_argument("seconds must be int"))),
                };
                let nanos = match field("nanos") {
                    Some(Value::Int(nanos)) => nanos,
                    None => 0,
                    _ => return Some(Err(EvalError::invalid_argument("nanos must be int"))),
                };
                let Some(ts) =
                    chrono::DateTime::from_timestamp(seconds, nanos.rem_euclid(1_000_000_000) as u32)
                else {
                    return Some(Err(EvalError::bad_format("timestamp out of range")));
                };
                match time::validate_timestamp(ts) {
                    Ok(ts) => Value::Timestamp(ts),
                    Err(error) => return Some(Err(error)),
                }
            }
            "google.protobuf.Duration" => {
                let seconds = match field("seconds") {
                    Some(Value::Int(seconds)) => seconds,
                    None => 0,
                    _ => return Some(Err(EvalError::invalid_argument("seconds must be int"))),
                };
                let nanos = match field("nanos") {
                    Some(Value::Int(nanos)) => nanos,
                    None => 0,
                    _ => return Some(Err(EvalError::invalid_argument("nanos must be int"))),
                };
                let duration =
                    chrono::Duration::seconds(seconds) + chrono::Duration::nanoseconds(nanos);
                match time::checked_duration(duration) {
                    Ok(duration) => Value::Duration(duration),
                    Err(error) => return Some(Err(error)),
                }
            }
            "google.protobuf.Any" => {
                return Some(Err(EvalError::invalid_argument(
                    "google.protobuf.Any requires descriptor support",
                )))
            }
            _ => return None,
        };

        Some(Ok(adapted))
    }

    fn default_for(&self, field_type: &CelType) -> Value {
        match field_type {
            CelType::Bool => Value::Bool(false),
            CelType::Int | CelType::Enum(_) => Value::Int(0),
            CelType::Uint => Value::Uint(0),
            CelType::Double => Value::Double(0.0),
            CelType::String => Value::string(""),
            CelType::Bytes => Value::Bytes(vec![]),
            CelType::List(_) => Value::List(vec![]),
            CelType::Map(_, _) => Value::Map(MapValue::new()),
            CelType::Message(name) => Value::Message(MessageValue::new(name.clone())),
            CelType::Timestamp => {
                Value::Timestamp(chrono::DateTime::from_timestamp(0, 0).unwrap())
            }
            CelType::Duration => Value::Duration(chrono::Duration::zero()),
            // Wrappers and anything dynamic default to null.
            _ => Value::Null,
        }
    }
}

impl ValueProvider for DynValueProvider {
    fn new_message(&self, name: &str, fields: Vec<(String, Value)>) -> EvalResult<Value> {
        if well_known_type(name).is_some() {
            if let Some(adapted) = self.adapt_well_known(name, &fields) {
                return adapted;
            }
        }

        let Some(declared) = self.types.message_fields(name) else {
            return Err(EvalError::new(
                super::error::ErrorKind::AttributeNotFound,
                format!("unknown message type: {name}"),
            ));
        };

        let mut message = MessageValue::new(name);
        for (field, value) in fields {
            if !declared.iter().any(|(name, _)| *name == field) {
                return Err(EvalError::no_such_field(&field));
            }
            message.set_field(field, value);
        }

        Ok(Value::Message(message))
    }

    fn get_field(&self, message: &MessageValue, name: &str) -> Value {
        if let Some(value) = message.field(name) {
            return value.clone();
        }

        match self
            .types
            .message_fields(&message.type_name)
            .and_then(|fields| fields.iter().find(|(field, _)| field == name))
        {
            Some((_, field_type)) => self.default_for(field_type),
            None => Value::Error(EvalError::no_such_field(name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> DynValueProvider {
        let types = DeclaredTypeProvider::new().add_message(
            "test.TestAllTypes",
            vec![
                ("single_int64", CelType::Int),
                ("single_string", CelType::String),
                ("child", CelType::Message("test.TestAllTypes".into())),
            ],
        );
        DynValueProvider::new(Arc::new(types))
    }

    #[test]
    fn test_new_message_checks_fields() {
        let provider = provider();

        let message = provider
            .new_message(
                "test.TestAllTypes",
                vec![("single_int64".into(), Value::Int(1))],
            )
            .unwrap();
        let Value::Message(message) = message else {
            panic!("expected message");
        };
        assert_eq!(message.field("single_int64"), Some(&Value::Int(1)));

        assert!(provider
            .new_message("test.TestAllTypes", vec![("nope".into(), Value::Null)])
            .is_err());
    }

    #[test]
    fn test_unset_field_defaults() {
        let provider = provider();
        let message = MessageValue::new("test.TestAllTypes");

        assert_eq!(
            provider.get_field(&message, "single_string"),
            Value::string("")
        );
        // Unset message fields yield an empty message, not null.
        let Value::Message(child) = provider.get_field(&message, "child") else {
            panic!("expected message");
        };
        assert_eq!(child.type_name, "test.TestAllTypes");
        assert!(provider.get_field(&message, "missing").is_error());
    }

    #[test]
    fn test_wrapper_adaptation() {
        let provider = provider();

        assert_eq!(
            provider
                .new_message(
                    "google.protobuf.Int64Value",
                    vec![("value".into(), Value::Int(42))],
                )
                .unwrap(),
            Value::Int(42)
        );
        assert_eq!(
            provider.new_message("google.protobuf.Struct", vec![]).unwrap(),
            Value::Map(MapValue::new())
        );
    }

    #[test]
    fn test_timestamp_adaptation() {
        let provider = provider();

        let value = provider
            .new_message(
                "google.protobuf.Timestamp",
                vec![("seconds".into(), Value::Int(60))],
            )
            .unwrap();
        assert_eq!(
            value,
            Value::Timestamp(chrono::DateTime::from_timestamp(60, 0).unwrap())
        );
    }
}
