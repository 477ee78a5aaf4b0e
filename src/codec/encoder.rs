//! Binary encoder for wire values
//!
//! Layout per value: one tag byte, then a fixed- or length-prefixed payload.
//! Multi-byte integers are little-endian. Containers prefix their element
//! count and nest recursively.

use super::value::{Tag, Value};

/// Encodes a value tree into the self-describing binary format.
pub fn encode(value: &Value) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64);
    write_value(&mut buf, value);
    buf
}

fn write_value(buf: &mut Vec<u8>, value: &Value) {
    buf.push(value.tag() as u8);
    match value {
        Value::Null => {}
        Value::Bool(b) => buf.push(u8::from(*b)),
        Value::Int(i) => buf.extend_from_slice(&i.to_le_bytes()),
        Value::Float(f) => buf.extend_from_slice(&f.to_le_bytes()),
        Value::Decimal {
            coefficient,
            exponent,
        } => {
            buf.extend_from_slice(&coefficient.to_le_bytes());
            buf.extend_from_slice(&exponent.to_le_bytes());
        }
        Value::String(s) => write_str(buf, s),
        Value::Timestamp(ts) => buf.extend_from_slice(&ts.timestamp_micros().to_le_bytes()),
        Value::List(items) => {
            buf.extend_from_slice(&(items.len() as u32).to_le_bytes());
            for item in items {
                write_value(buf, item);
            }
        }
        Value::Struct(fields) => {
            buf.extend_from_slice(&(fields.len() as u32).to_le_bytes());
            for (name, field_value) in fields {
                write_str(buf, name);
                write_value(buf, field_value);
            }
        }
    }
}

fn write_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}
