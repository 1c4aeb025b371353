//! Runtime value types for predicates and fetched rows.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A runtime value used as a predicate operand or read back from a row.
///
/// Values coming out of storage are already marshaled by the storage
/// adapter; this enum only describes their shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 32-bit signed integer.
    Int32(i32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 32-bit floating point.
    Float32(f32),
    /// 64-bit floating point.
    Float64(f64),
    /// UTF-8 string.
    String(String),
    /// Binary data.
    Bytes(Vec<u8>),
    /// Timestamp as microseconds since Unix epoch.
    Timestamp(i64),
    /// Reference to another entity by primary key.
    Reference(i64),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int32(i) => Some(*i != 0),
            Value::Int64(i) => Some(*i != 0),
            _ => None,
        }
    }

    /// Try to get as i64.
    ///
    /// Integer-like variants widen; references yield their primary key.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(i) | Value::Timestamp(i) | Value::Reference(i) => Some(*i),
            Value::Int32(i) => Some(*i as i64),
            _ => None,
        }
    }

    /// Try to get as f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float64(f) => Some(*f),
            Value::Float32(f) => Some(*f as f64),
            Value::Int32(i) => Some(*i as f64),
            Value::Int64(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get as string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as bytes reference.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Stringify this value for use as a statement parameter.
    ///
    /// Booleans bind as `1`/`0` because they are stored as integers, bytes
    /// bind as lowercase hex, and null stays distinguishable from the empty
    /// string.
    pub fn to_binding(&self) -> Binding {
        match self {
            Value::Null => Binding::Null,
            Value::Bool(b) => Binding::Text(if *b { "1" } else { "0" }.to_string()),
            Value::Int32(i) => Binding::Text(i.to_string()),
            Value::Int64(i) | Value::Timestamp(i) | Value::Reference(i) => {
                Binding::Text(i.to_string())
            }
            Value::Float32(f) => Binding::Text(f.to_string()),
            Value::Float64(f) => Binding::Text(f.to_string()),
            Value::String(s) => Binding::Text(s.clone()),
            Value::Bytes(b) => Binding::Text(hex::encode(b)),
        }
    }
}

/// A stringified statement parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Binding {
    /// SQL `NULL`.
    Null,
    /// Text parameter.
    Text(String),
}

impl Binding {
    /// Text of the binding, `None` for null.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Binding::Null => None,
            Binding::Text(s) => Some(s),
        }
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Null => f.write_str("NULL"),
            Binding::Text(s) => write!(f, "'{}'", s),
        }
    }
}

// Conversion implementations
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_accessors() {
        assert!(Value::Null.is_null());
        assert!(!Value::Bool(true).is_null());

        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Int64(0).as_bool(), Some(false));
        assert_eq!(Value::Int32(42).as_i64(), Some(42));
        assert_eq!(Value::Reference(7).as_i64(), Some(7));
        assert_eq!(Value::Float32(1.5).as_f64(), Some(1.5));

        assert_eq!(Value::String("hello".into()).as_str(), Some("hello"));
        assert_eq!(Value::Bytes(vec![1, 2, 3]).as_bytes(), Some(&[1, 2, 3][..]));
    }

    #[test]
    fn test_value_conversions() {
        let v: Value = true.into();
        assert_eq!(v, Value::Bool(true));

        let v: Value = "hello".into();
        assert_eq!(v, Value::String("hello".into()));

        let v: Value = None::<i32>.into();
        assert_eq!(v, Value::Null);

        let v: Value = Some(42i64).into();
        assert_eq!(v, Value::Int64(42));
    }

    #[test]
    fn test_binding_policy() {
        assert_eq!(Value::Null.to_binding(), Binding::Null);
        assert_eq!(Value::Bool(true).to_binding(), Binding::Text("1".into()));
        assert_eq!(Value::Bool(false).to_binding(), Binding::Text("0".into()));
        assert_eq!(Value::Int32(-3).to_binding(), Binding::Text("-3".into()));
        assert_eq!(Value::Reference(42).to_binding(), Binding::Text("42".into()));
        assert_eq!(Value::Float64(2.5).to_binding(), Binding::Text("2.5".into()));
        assert_eq!(
            Value::Bytes(vec![0xde, 0xad]).to_binding(),
            Binding::Text("dead".into())
        );
    }

    #[test]
    fn test_null_binding_differs_from_empty_text() {
        let null = Value::Null.to_binding();
        let empty = Value::String(String::new()).to_binding();

        assert_ne!(null, empty);
        assert_eq!(null.as_text(), None);
        assert_eq!(empty.as_text(), Some(""));
    }
}
