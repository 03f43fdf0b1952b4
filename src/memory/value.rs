//! Runtime value representation
//!
//! This module defines the [`Value`] enum, the engine's view of a C rvalue.
//! Objects live in byte-addressed memory; a `Value` is what an expression
//! produces after loading from or computing over that memory.
//!
//! # Value Types
//!
//! - [`Value::Int`]: any integer kind, normalized to its type's width (see
//!   [`IntKind::wrap`]); unsigned 64-bit values keep their bit pattern
//! - [`Value::Float`]: `float` or `double`, held as `f64`
//! - [`Value::Pointer`]: 64-bit address; data and function pointers alike
//! - [`Value::Aggregate`]: the raw bytes of a struct or union
//! - [`Value::Void`]: result of a `void` expression
//!
//! # Encoding
//!
//! [`Value::encode`] and [`Value::decode`] convert between values and their
//! little-endian object representation.

use crate::sema::types::{CType, IntKind};

/// Memory address type (64-bit)
pub type Address = u64;

/// Runtime values in the interpreter
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    Int(i64),
    Float(f64),
    Pointer(Address),
    Aggregate(Vec<u8>),
    #[default]
    Void,
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Pointer(addr) => Some(*addr as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_pointer(&self) -> Option<Address> {
        match self {
            Value::Pointer(addr) => Some(*addr),
            Value::Int(n) => Some(*n as Address),
            _ => None,
        }
    }

    /// C truthiness: nonzero scalars are true
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Pointer(addr) => *addr != 0,
            Value::Aggregate(_) | Value::Void => false,
        }
    }

    /// Object representation of this value as type `ty`, `size` bytes long
    pub fn encode(&self, ty: &CType, size: usize) -> Vec<u8> {
        match (self, ty) {
            (Value::Float(f), CType::Float) => (*f as f32).to_le_bytes().to_vec(),
            (Value::Float(f), _) => f.to_le_bytes().to_vec(),
            (Value::Aggregate(bytes), _) => {
                let mut bytes = bytes.clone();
                bytes.resize(size, 0);
                bytes
            }
            (Value::Void, _) => vec![0; size],
            (scalar, _) => {
                let raw = scalar.as_int().unwrap_or(0);
                raw.to_le_bytes()[..size.min(8)].to_vec()
            }
        }
    }

    /// Load a value of type `ty` from its object representation
    pub fn decode(bytes: &[u8], ty: &CType) -> Value {
        match ty {
            CType::Int(kind) => {
                let mut raw = [0u8; 8];
                let n = bytes.len().min(8);
                raw[..n].copy_from_slice(&bytes[..n]);
                Value::Int(kind.wrap(i64::from_le_bytes(raw)))
            }
            CType::Float => {
                let mut raw = [0u8; 4];
                raw.copy_from_slice(&bytes[..4]);
                Value::Float(f32::from_le_bytes(raw) as f64)
            }
            CType::Double => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&bytes[..8]);
                Value::Float(f64::from_le_bytes(raw))
            }
            CType::Pointer(_) | CType::Function(_) | CType::Array(..) => {
                let mut raw = [0u8; 8];
                let n = bytes.len().min(8);
                raw[..n].copy_from_slice(&bytes[..n]);
                Value::Pointer(u64::from_le_bytes(raw))
            }
            CType::Struct(_) => Value::Aggregate(bytes.to_vec()),
            CType::Void => Value::Void,
        }
    }
}

/// Convert a scalar value from type `from` to type `to` following the C
/// conversion rules
pub fn convert(value: Value, from: &CType, to: &CType) -> Value {
    match to {
        CType::Void => Value::Void,
        CType::Int(kind) => Value::Int(to_integer(&value, *kind)),
        CType::Float => match value {
            Value::Float(f) => Value::Float(f as f32 as f64),
            other => Value::Float(integer_to_float(&other, from) as f32 as f64),
        },
        CType::Double => match value {
            Value::Float(f) => Value::Float(f),
            other => Value::Float(integer_to_float(&other, from)),
        },
        CType::Pointer(_) | CType::Function(_) | CType::Array(..) => match value {
            Value::Float(f) => Value::Pointer(f as u64),
            other => Value::Pointer(other.as_pointer().unwrap_or(0)),
        },
        CType::Struct(_) => value,
    }
}

fn integer_to_float(value: &Value, from: &CType) -> f64 {
    let raw = value.as_int().unwrap_or(0);
    match from.int_kind() {
        Some(kind) if !kind.is_signed() => raw as u64 as f64,
        _ => raw as f64,
    }
}

// Integer sources are already canonical for their kind, so truncation and
// extension both reduce to a wrap
fn to_integer(value: &Value, kind: IntKind) -> i64 {
    match value {
        Value::Float(f) if kind.is_signed() => kind.wrap(*f as i64),
        Value::Float(f) => kind.wrap(*f as u64 as i64),
        other => kind.wrap(other.as_int().unwrap_or(0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_int() {
        let ty = CType::Int(IntKind::Short);
        let bytes = Value::Int(-2).encode(&ty, 2);
        assert_eq!(bytes, vec![0xfe, 0xff]);
        assert_eq!(Value::decode(&bytes, &ty), Value::Int(-2));
        assert_eq!(Value::decode(&bytes, &CType::Int(IntKind::UShort)), Value::Int(65534));
    }

    #[test]
    fn test_float_width() {
        let bytes = Value::Float(1.5).encode(&CType::Float, 4);
        assert_eq!(bytes.len(), 4);
        assert_eq!(Value::decode(&bytes, &CType::Float), Value::Float(1.5));
    }

    #[test]
    fn test_conversions() {
        let int = CType::int();
        assert_eq!(convert(Value::Float(3.9), &CType::Double, &int), Value::Int(3));
        assert_eq!(convert(Value::Int(300), &int, &CType::Int(IntKind::UChar)), Value::Int(44));
        assert_eq!(
            convert(Value::Int(4294967295), &CType::Int(IntKind::UInt), &CType::Double),
            Value::Float(4294967295.0)
        );
        assert_eq!(
            convert(Value::Int(-1), &CType::Int(IntKind::ULong), &CType::Double),
            Value::Float(u64::MAX as f64)
        );
        assert_eq!(convert(Value::Int(0), &int, &int.clone().pointer_to()), Value::Pointer(0));
    }

    #[test]
    fn test_truthiness() {
        assert!(Value::Int(2).is_truthy());
        assert!(!Value::Pointer(0).is_truthy());
        assert!(Value::Float(0.5).is_truthy());
    }
}
