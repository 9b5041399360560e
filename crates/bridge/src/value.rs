//! Dynamically typed host values.

use dp_chain_core::{DpError, Result};

/// A value as seen by a dynamically typed caller.
///
/// Integers carry no width; the descriptor they are converted against
/// decides whether they fit.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Absent value.
    Null,
    /// Boolean.
    Bool(bool),
    /// Width-less integer.
    Int(i128),
    /// Double-precision float.
    Float(f64),
    /// Text.
    Str(String),
    /// Homogeneous sequence.
    List(Vec<Value>),
    /// Fixed-arity tuple.
    Tuple(Vec<Value>),
    /// Key-value pairs.
    Dict(Vec<(Value, Value)>),
}

impl Value {
    /// Name of the value's shape, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
        }
    }

    /// The integer, if this is one.
    pub fn as_int(&self) -> Option<i128> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The float, if this is one.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

macro_rules! impl_from_int {
    ($($ty:ty),*) => {$(
        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::Int(v as i128)
            }
        }
    )*};
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32, u64, usize);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<A: Into<Value>, B: Into<Value>> From<(A, B)> for Value {
    fn from((a, b): (A, B)) -> Self {
        Value::Tuple(vec![a.into(), b.into()])
    }
}

impl TryFrom<serde_json::Value> for Value {
    type Error = DpError;

    /// JSON arrays become lists and objects become string-keyed dicts.
    fn try_from(json: serde_json::Value) -> Result<Self> {
        Ok(match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i as i128)
                } else if let Some(u) = n.as_u64() {
                    Value::Int(u as i128)
                } else if let Some(f) = n.as_f64() {
                    Value::Float(f)
                } else {
                    return Err(DpError::type_mismatch(format!("unsupported number {}", n)));
                }
            }
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => Value::List(
                items
                    .into_iter()
                    .map(Value::try_from)
                    .collect::<Result<_>>()?,
            ),
            serde_json::Value::Object(entries) => Value::Dict(
                entries
                    .into_iter()
                    .map(|(k, v)| Ok((Value::Str(k), Value::try_from(v)?)))
                    .collect::<Result<_>>()?,
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_values_convert() {
        let value = Value::try_from(json!({"a": [1, 2.5, "x", null, true]})).unwrap();
        assert_eq!(
            value,
            Value::Dict(vec![(
                Value::Str("a".into()),
                Value::List(vec![
                    Value::Int(1),
                    Value::Float(2.5),
                    Value::Str("x".into()),
                    Value::Null,
                    Value::Bool(true),
                ])
            )])
        );
    }

    #[test]
    fn large_unsigned_json_stays_integral() {
        let value = Value::try_from(json!(u64::MAX)).unwrap();
        assert_eq!(value, Value::Int(u64::MAX as i128));
    }

    #[test]
    fn rust_values_convert() {
        assert_eq!(Value::from((1, 2.0)), Value::Tuple(vec![Value::Int(1), Value::Float(2.0)]));
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(vec!["a", "b"]).kind_name(), "list");
    }
}
