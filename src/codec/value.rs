//! Value tree for the self-describing wire format
//!
//! A `Value` is what crosses the wire in both directions: statement
//! parameters are built from mapped documents, and result rows decode back
//! into plain value trees.

use chrono::{DateTime, SecondsFormat, Utc};

use super::errors::{CodecError, CodecResult};

/// Type tag bytes used by the wire format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Tag {
    Null = 0x00,
    Bool = 0x01,
    Int = 0x02,
    Float = 0x03,
    Decimal = 0x04,
    String = 0x05,
    Timestamp = 0x06,
    List = 0x07,
    Struct = 0x08,
}

impl Tag {
    /// Parses a tag byte, returning `None` for unknown tags
    pub fn from_byte(byte: u8) -> Option<Tag> {
        match byte {
            0x00 => Some(Tag::Null),
            0x01 => Some(Tag::Bool),
            0x02 => Some(Tag::Int),
            0x03 => Some(Tag::Float),
            0x04 => Some(Tag::Decimal),
            0x05 => Some(Tag::String),
            0x06 => Some(Tag::Timestamp),
            0x07 => Some(Tag::List),
            0x08 => Some(Tag::Struct),
            _ => None,
        }
    }
}

/// A single value in the store's self-describing format.
///
/// Struct fields keep their insertion order; the store treats field order as
/// meaningful and so does the query compiler.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Arbitrary-precision decimal as `coefficient * 10^exponent`
    Decimal { coefficient: i64, exponent: i32 },
    String(String),
    /// Point in time, microsecond precision
    Timestamp(DateTime<Utc>),
    List(Vec<Value>),
    Struct(Vec<(String, Value)>),
}

impl Value {
    /// Returns the wire tag for this value
    pub fn tag(&self) -> Tag {
        match self {
            Value::Null => Tag::Null,
            Value::Bool(_) => Tag::Bool,
            Value::Int(_) => Tag::Int,
            Value::Float(_) => Tag::Float,
            Value::Decimal { .. } => Tag::Decimal,
            Value::String(_) => Tag::String,
            Value::Timestamp(_) => Tag::Timestamp,
            Value::List(_) => Tag::List,
            Value::Struct(_) => Tag::Struct,
        }
    }

    /// Returns the kind name for error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Decimal { .. } => "decimal",
            Value::String(_) => "string",
            Value::Timestamp(_) => "timestamp",
            Value::List(_) => "list",
            Value::Struct(_) => "struct",
        }
    }

    /// Looks up a field on a struct value
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Struct(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Converts an untyped JSON tree into a wire value by shape dispatch.
    ///
    /// JSON cannot express timestamps or decimals, so those only arise
    /// through explicit construction; strings stay strings here.
    pub fn from_json(json: &serde_json::Value) -> CodecResult<Value> {
        match json {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Int(i))
                } else if n.is_u64() {
                    // u64 beyond the signed range would round-trip lossily
                    Err(CodecError::UnsupportedShape(format!(
                        "number {} exceeds the signed 64-bit range",
                        n
                    )))
                } else if let Some(f) = n.as_f64() {
                    Ok(Value::Float(f))
                } else {
                    Err(CodecError::UnsupportedShape(format!(
                        "number {} is not representable",
                        n
                    )))
                }
            }
            serde_json::Value::String(s) => Ok(Value::String(s.clone())),
            serde_json::Value::Array(items) => {
                let mut list = Vec::with_capacity(items.len());
                for item in items {
                    list.push(Value::from_json(item)?);
                }
                Ok(Value::List(list))
            }
            serde_json::Value::Object(map) => {
                let mut fields = Vec::with_capacity(map.len());
                for (name, value) in map {
                    fields.push((name.clone(), Value::from_json(value)?));
                }
                Ok(Value::Struct(fields))
            }
        }
    }

    /// Converts a wire value back into a plain JSON tree.
    ///
    /// Timestamps render as RFC 3339 strings; decimals collapse to JSON
    /// numbers.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Decimal {
                coefficient,
                exponent,
            } => {
                let expanded = (*coefficient as f64) * 10f64.powi(*exponent);
                serde_json::Number::from_f64(expanded)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null)
            }
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Timestamp(ts) => {
                serde_json::Value::String(ts.to_rfc3339_opts(SecondsFormat::Micros, true))
            }
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Struct(fields) => {
                let mut map = serde_json::Map::with_capacity(fields.len());
                for (name, value) in fields {
                    map.insert(name.clone(), value.to_json());
                }
                serde_json::Value::Object(map)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tag_byte_roundtrip() {
        for tag in [
            Tag::Null,
            Tag::Bool,
            Tag::Int,
            Tag::Float,
            Tag::Decimal,
            Tag::String,
            Tag::Timestamp,
            Tag::List,
            Tag::Struct,
        ] {
            assert_eq!(Tag::from_byte(tag as u8), Some(tag));
        }
        assert_eq!(Tag::from_byte(0xff), None);
    }

    #[test]
    fn test_from_json_shape_dispatch() {
        let value = Value::from_json(&json!({
            "name": "Alice",
            "age": 30,
            "active": true,
            "score": 1.5,
            "tags": ["a", "b"],
            "extra": null
        }))
        .unwrap();

        assert_eq!(value.field("name"), Some(&Value::String("Alice".into())));
        assert_eq!(value.field("age"), Some(&Value::Int(30)));
        assert_eq!(value.field("active"), Some(&Value::Bool(true)));
        assert_eq!(value.field("score"), Some(&Value::Float(1.5)));
        assert_eq!(
            value.field("tags"),
            Some(&Value::List(vec![
                Value::String("a".into()),
                Value::String("b".into())
            ]))
        );
        assert_eq!(value.field("extra"), Some(&Value::Null));
    }

    #[test]
    fn test_from_json_rejects_oversized_number() {
        let json = json!(u64::MAX);
        let result = Value::from_json(&json);
        assert!(matches!(result, Err(CodecError::UnsupportedShape(_))));
    }

    #[test]
    fn test_to_json_renders_timestamp_rfc3339() {
        let ts = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let json = Value::Timestamp(ts).to_json();
        assert_eq!(json, json!("2024-05-01T12:00:00.000000Z"));
    }

    #[test]
    fn test_struct_field_order_preserved() {
        let value = Value::Struct(vec![
            ("z".into(), Value::Int(1)),
            ("a".into(), Value::Int(2)),
        ]);
        match &value {
            Value::Struct(fields) => {
                assert_eq!(fields[0].0, "z");
                assert_eq!(fields[1].0, "a");
            }
            _ => unreachable!(),
        }
    }
}
