//! Binary decoder for wire values
//!
//! The decoder mirrors the encoder recursively, reconstructing a plain value
//! tree from struct and list containers. A freshly-constructed reader is
//! positioned before its first value; `decode` advances it once before
//! dispatching on type, so callers never have to pre-position it.

use chrono::DateTime;

use super::errors::{CodecError, CodecResult};
use super::value::{Tag, Value};

/// Cursor over an encoded value buffer.
///
/// The reader starts positioned before the first value; `advance` consumes
/// the next tag byte and makes it the current kind.
pub struct ValueReader<'a> {
    buf: &'a [u8],
    pos: usize,
    current: Option<Tag>,
}

impl<'a> ValueReader<'a> {
    /// Creates a reader positioned before the first value
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            current: None,
        }
    }

    /// Returns the kind of the current value, if positioned on one
    pub fn kind(&self) -> Option<Tag> {
        self.current
    }

    /// Consumes the next tag byte and makes it current
    pub fn advance(&mut self) -> CodecResult<Tag> {
        let byte = self.read_u8()?;
        let tag = Tag::from_byte(byte).ok_or(CodecError::UnknownTag {
            tag: byte,
            offset: self.pos - 1,
        })?;
        self.current = Some(tag);
        Ok(tag)
    }

    /// Returns true once the buffer is fully consumed
    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn read_u8(&mut self) -> CodecResult<u8> {
        let byte = *self
            .buf
            .get(self.pos)
            .ok_or(CodecError::UnexpectedEof(self.pos))?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_exact(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or(CodecError::UnexpectedEof(self.pos))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u32(&mut self) -> CodecResult<u32> {
        let bytes = self.read_exact(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_i32(&mut self) -> CodecResult<i32> {
        let bytes = self.read_exact(4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_i64(&mut self) -> CodecResult<i64> {
        let bytes = self.read_exact(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(i64::from_le_bytes(raw))
    }

    fn read_f64(&mut self) -> CodecResult<f64> {
        let bytes = self.read_exact(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(f64::from_le_bytes(raw))
    }

    fn read_str(&mut self) -> CodecResult<String> {
        let len = self.read_u32()? as usize;
        let start = self.pos;
        let bytes = self.read_exact(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8(start))
    }
}

/// Decodes the next value from the reader.
///
/// Advances once if the reader has not yet been positioned on a value.
pub fn decode(reader: &mut ValueReader<'_>) -> CodecResult<Value> {
    if reader.kind().is_none() {
        reader.advance()?;
    }
    decode_current(reader)
}

/// Decodes a standalone encoded buffer into a value tree
pub fn decode_bytes(buf: &[u8]) -> CodecResult<Value> {
    let mut reader = ValueReader::new(buf);
    decode(&mut reader)
}

fn decode_current(reader: &mut ValueReader<'_>) -> CodecResult<Value> {
    // advance() has always run by the time we get here
    let tag = reader.current.ok_or(CodecError::UnexpectedEof(reader.pos))?;
    match tag {
        Tag::Null => Ok(Value::Null),
        Tag::Bool => Ok(Value::Bool(reader.read_u8()? != 0)),
        Tag::Int => Ok(Value::Int(reader.read_i64()?)),
        Tag::Float => Ok(Value::Float(reader.read_f64()?)),
        Tag::Decimal => {
            let coefficient = reader.read_i64()?;
            let exponent = reader.read_i32()?;
            Ok(Value::Decimal {
                coefficient,
                exponent,
            })
        }
        Tag::String => Ok(Value::String(reader.read_str()?)),
        Tag::Timestamp => {
            let micros = reader.read_i64()?;
            DateTime::from_timestamp_micros(micros)
                .map(Value::Timestamp)
                .ok_or(CodecError::TimestampOutOfRange(micros))
        }
        Tag::List => {
            let count = reader.read_u32()? as usize;
            let mut items = Vec::with_capacity(count.min(1024));
            for _ in 0..count {
                reader.advance()?;
                items.push(decode_current(reader)?);
            }
            Ok(Value::List(items))
        }
        Tag::Struct => {
            let count = reader.read_u32()? as usize;
            let mut fields = Vec::with_capacity(count.min(1024));
            for _ in 0..count {
                let name = reader.read_str()?;
                reader.advance()?;
                fields.push((name, decode_current(reader)?));
            }
            Ok(Value::Struct(fields))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::encoder::encode;
    use super::*;
    use chrono::Utc;

    fn sample_tree() -> Value {
        Value::Struct(vec![
            ("id".into(), Value::String("a1".into())),
            ("age".into(), Value::Null),
            ("active".into(), Value::Bool(true)),
            ("score".into(), Value::Float(0.25)),
            (
                "balance".into(),
                Value::Decimal {
                    coefficient: 1999,
                    exponent: -2,
                },
            ),
            (
                "tags".into(),
                Value::List(vec![Value::Int(1), Value::String("x".into())]),
            ),
            (
                "address".into(),
                Value::Struct(vec![("city".into(), Value::String("Utrecht".into()))]),
            ),
        ])
    }

    #[test]
    fn test_roundtrip_scalars() {
        for value in [
            Value::Null,
            Value::Bool(false),
            Value::Int(-42),
            Value::Float(3.5),
            Value::Decimal {
                coefficient: 12345,
                exponent: -3,
            },
            Value::String("hello".into()),
        ] {
            assert_eq!(decode_bytes(&encode(&value)).unwrap(), value);
        }
    }

    #[test]
    fn test_roundtrip_timestamp_micros() {
        let ts = DateTime::from_timestamp_micros(Utc::now().timestamp_micros()).unwrap();
        let value = Value::Timestamp(ts);
        assert_eq!(decode_bytes(&encode(&value)).unwrap(), value);
    }

    #[test]
    fn test_roundtrip_nested_tree() {
        let value = sample_tree();
        assert_eq!(decode_bytes(&encode(&value)).unwrap(), value);
    }

    #[test]
    fn test_reader_advances_once_before_dispatch() {
        let bytes = encode(&Value::Int(9));
        let mut reader = ValueReader::new(&bytes);
        assert!(reader.kind().is_none());
        let value = decode(&mut reader).unwrap();
        assert_eq!(value, Value::Int(9));
        assert!(reader.is_exhausted());
    }

    #[test]
    fn test_pre_advanced_reader_is_tolerated() {
        let bytes = encode(&Value::Bool(true));
        let mut reader = ValueReader::new(&bytes);
        reader.advance().unwrap();
        assert_eq!(decode(&mut reader).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let result = decode_bytes(&[0x7f]);
        assert!(matches!(
            result,
            Err(CodecError::UnknownTag { tag: 0x7f, .. })
        ));
    }

    #[test]
    fn test_truncated_buffer_rejected() {
        let mut bytes = encode(&sample_tree());
        bytes.truncate(bytes.len() / 2);
        assert!(matches!(
            decode_bytes(&bytes),
            Err(CodecError::UnexpectedEof(_)) | Err(CodecError::InvalidUtf8(_))
        ));
    }

    #[test]
    fn test_empty_buffer_rejected() {
        assert_eq!(decode_bytes(&[]), Err(CodecError::UnexpectedEof(0)));
    }
}
