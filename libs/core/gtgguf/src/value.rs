use std::fmt::Display;

use crate::{
    codec::{
        read_array, read_len, read_string, read_u32, read_u64, write_string, write_u32, write_u64,
    },
    Error,
};

// -----------------------------------------------------------------------------
// ValueType
// -----------------------------------------------------------------------------
/// Type tag of a metadata value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::FromRepr, strum::Display)]
#[strum(serialize_all = "lowercase")]
#[repr(u32)]
pub enum ValueType {
    U8 = 0,
    I8 = 1,
    U16 = 2,
    I16 = 3,
    U32 = 4,
    I32 = 5,
    F32 = 6,
    Bool = 7,
    String = 8,
    Array = 9,
    U64 = 10,
    I64 = 11,
    F64 = 12,
}

impl ValueType {
    #[inline]
    pub fn from_tag(tag: u32) -> Result<Self, Error> {
        Self::from_repr(tag).ok_or(Error::UnsupportedValueType(tag))
    }

    #[inline]
    pub fn tag(&self) -> u32 {
        *self as u32
    }
}

// -----------------------------------------------------------------------------
// Value
// -----------------------------------------------------------------------------
/// Metadata value.
///
/// Elements of an [Value::Array] must share one type.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    F32(f32),
    Bool(bool),
    String(String),
    Array(Vec<Value>),
    U64(u64),
    I64(i64),
    F64(f64),
}

impl Value {
    #[inline]
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::U8(_) => ValueType::U8,
            Value::I8(_) => ValueType::I8,
            Value::U16(_) => ValueType::U16,
            Value::I16(_) => ValueType::I16,
            Value::U32(_) => ValueType::U32,
            Value::I32(_) => ValueType::I32,
            Value::F32(_) => ValueType::F32,
            Value::Bool(_) => ValueType::Bool,
            Value::String(_) => ValueType::String,
            Value::Array(_) => ValueType::Array,
            Value::U64(_) => ValueType::U64,
            Value::I64(_) => ValueType::I64,
            Value::F64(_) => ValueType::F64,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Unsigned integer value, widened to `u64`.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::U8(v) => Some(*v as u64),
            Value::U16(v) => Some(*v as u64),
            Value::U32(v) => Some(*v as u64),
            Value::U64(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric value, converted to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::U8(v) => Some(*v as f64),
            Value::I8(v) => Some(*v as f64),
            Value::U16(v) => Some(*v as f64),
            Value::I16(v) => Some(*v as f64),
            Value::U32(v) => Some(*v as f64),
            Value::I32(v) => Some(*v as f64),
            Value::F32(v) => Some(*v as f64),
            Value::U64(v) => Some(*v as f64),
            Value::I64(v) => Some(*v as f64),
            Value::F64(v) => Some(*v),
            Value::Bool(_) | Value::String(_) | Value::Array(_) => None,
        }
    }
}

impl From<&str> for Value {
    #[inline]
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    #[inline]
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<u32> for Value {
    #[inline]
    fn from(v: u32) -> Self {
        Value::U32(v)
    }
}

impl From<u64> for Value {
    #[inline]
    fn from(v: u64) -> Self {
        Value::U64(v)
    }
}

impl From<f32> for Value {
    #[inline]
    fn from(v: f32) -> Self {
        Value::F32(v)
    }
}

impl From<f64> for Value {
    #[inline]
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<bool> for Value {
    #[inline]
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::U8(v) => write!(f, "{v}"),
            Value::I8(v) => write!(f, "{v}"),
            Value::U16(v) => write!(f, "{v}"),
            Value::I16(v) => write!(f, "{v}"),
            Value::U32(v) => write!(f, "{v}"),
            Value::I32(v) => write!(f, "{v}"),
            Value::F32(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v:?}"),
            Value::Array(values) => {
                write!(f, "[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Value::U64(v) => write!(f, "{v}"),
            Value::I64(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v}"),
        }
    }
}

//
// encoding
//
impl Value {
    /// Encode the payload without the type tag.
    pub(crate) fn encode(&self, key: &str, buf: &mut Vec<u8>) -> Result<(), Error> {
        match self {
            Value::U8(v) => buf.push(*v),
            Value::I8(v) => buf.extend_from_slice(&v.to_le_bytes()),
            Value::U16(v) => buf.extend_from_slice(&v.to_le_bytes()),
            Value::I16(v) => buf.extend_from_slice(&v.to_le_bytes()),
            Value::U32(v) => write_u32(buf, *v),
            Value::I32(v) => buf.extend_from_slice(&v.to_le_bytes()),
            Value::F32(v) => buf.extend_from_slice(&v.to_le_bytes()),
            Value::Bool(v) => buf.push(u8::from(*v)),
            Value::String(v) => write_string(buf, v),
            Value::Array(values) => {
                // an empty array carries an arbitrary element type
                let elem_type = values.first().map_or(ValueType::U8, Value::value_type);
                if values.iter().any(|v| v.value_type() != elem_type) {
                    return Err(Error::MixedArray {
                        key: key.to_string(),
                    });
                }
                write_u32(buf, elem_type.tag());
                write_u64(buf, values.len() as u64);
                for v in values {
                    v.encode(key, buf)?;
                }
            }
            Value::U64(v) => write_u64(buf, *v),
            Value::I64(v) => buf.extend_from_slice(&v.to_le_bytes()),
            Value::F64(v) => buf.extend_from_slice(&v.to_le_bytes()),
        }
        Ok(())
    }

    pub(crate) fn decode(ty: ValueType, r: &mut &[u8]) -> Result<Self, Error> {
        let value = match ty {
            ValueType::U8 => Value::U8(u8::from_le_bytes(read_array(r)?)),
            ValueType::I8 => Value::I8(i8::from_le_bytes(read_array(r)?)),
            ValueType::U16 => Value::U16(u16::from_le_bytes(read_array(r)?)),
            ValueType::I16 => Value::I16(i16::from_le_bytes(read_array(r)?)),
            ValueType::U32 => Value::U32(read_u32(r)?),
            ValueType::I32 => Value::I32(i32::from_le_bytes(read_array(r)?)),
            ValueType::F32 => Value::F32(f32::from_le_bytes(read_array(r)?)),
            ValueType::Bool => {
                let [b] = read_array(r)?;
                match b {
                    0 => Value::Bool(false),
                    1 => Value::Bool(true),
                    other => return Err(Error::Corrupted(format!("invalid bool {other}"))),
                }
            }
            ValueType::String => Value::String(read_string(r)?),
            ValueType::Array => {
                let elem_type = ValueType::from_tag(read_u32(r)?)?;
                let len = read_len(r, 1)?;
                let mut values = Vec::with_capacity(len);
                for _ in 0..len {
                    values.push(Value::decode(elem_type, r)?);
                }
                Value::Array(values)
            }
            ValueType::U64 => Value::U64(read_u64(r)?),
            ValueType::I64 => Value::I64(i64::from_le_bytes(read_array(r)?)),
            ValueType::F64 => Value::F64(f64::from_le_bytes(read_array(r)?)),
        };
        Ok(value)
    }
}
