//! Conversion between host values and native handles.
//!
//! Conversions are exact: a value converts only into a descriptor of its own
//! shape, integers only when they fit the width and signedness, and floats
//! never into integers or back.

use std::collections::HashMap;
use std::hash::Hash;

use dp_chain_core::{DpError, Result};

use crate::any::AnyObject;
use crate::typing::{NativeType, TypeDescriptor};
use crate::value::Value;

/// Native types that convert to and from host values.
pub trait HostValue: NativeType + Sized {
    /// Convert from a host value of exactly this shape.
    fn from_value(value: &Value) -> Result<Self>;

    /// Convert back into a host value.
    fn to_value(&self) -> Value;
}

fn mismatch<T: NativeType>(value: &Value) -> DpError {
    DpError::type_mismatch(format!(
        "expected {}, found {}",
        T::descriptor(),
        value.kind_name()
    ))
}

macro_rules! impl_host_int {
    ($($ty:ty),*) => {$(
        impl HostValue for $ty {
            fn from_value(value: &Value) -> Result<Self> {
                match value {
                    Value::Int(v) => <$ty>::try_from(*v).map_err(|_| {
                        DpError::type_mismatch(format!(
                            "{} is out of range for {}",
                            v,
                            stringify!($ty)
                        ))
                    }),
                    other => Err(mismatch::<$ty>(other)),
                }
            }

            fn to_value(&self) -> Value {
                Value::Int(*self as i128)
            }
        }
    )*};
}

impl_host_int!(i8, i16, i32, i64, u8, u16, u32, u64, usize);

impl HostValue for f64 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Float(v) => Ok(*v),
            other => Err(mismatch::<f64>(other)),
        }
    }

    fn to_value(&self) -> Value {
        Value::Float(*self)
    }
}

impl HostValue for f32 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Float(v) => {
                let narrowed = *v as f32;
                if v.is_nan() || narrowed as f64 == *v {
                    Ok(narrowed)
                } else {
                    Err(DpError::type_mismatch(format!(
                        "{} is not exactly representable as f32",
                        v
                    )))
                }
            }
            other => Err(mismatch::<f32>(other)),
        }
    }

    fn to_value(&self) -> Value {
        Value::Float(*self as f64)
    }
}

impl HostValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bool(v) => Ok(*v),
            other => Err(mismatch::<bool>(other)),
        }
    }

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl HostValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Str(v) => Ok(v.clone()),
            other => Err(mismatch::<String>(other)),
        }
    }

    fn to_value(&self) -> Value {
        Value::Str(self.clone())
    }
}

impl<T: HostValue> HostValue for Vec<T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::List(items) => items.iter().map(T::from_value).collect(),
            other => Err(mismatch::<Self>(other)),
        }
    }

    fn to_value(&self) -> Value {
        Value::List(self.iter().map(T::to_value).collect())
    }
}

impl<T: HostValue> HostValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }

    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, T::to_value)
    }
}

impl<K, V> HostValue for HashMap<K, V>
where
    K: HostValue + Eq + Hash + Ord,
    V: HostValue,
{
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Dict(entries) => {
                let mut map = HashMap::with_capacity(entries.len());
                for (k, v) in entries {
                    if map.insert(K::from_value(k)?, V::from_value(v)?).is_some() {
                        return Err(DpError::type_mismatch(format!(
                            "duplicate key {:?} in {}",
                            k,
                            Self::descriptor()
                        )));
                    }
                }
                Ok(map)
            }
            other => Err(mismatch::<Self>(other)),
        }
    }

    /// Entries come back ordered by key.
    fn to_value(&self) -> Value {
        let mut entries: Vec<(&K, &V)> = self.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        Value::Dict(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_value(), v.to_value()))
                .collect(),
        )
    }
}

impl<A: HostValue, B: HostValue> HostValue for (A, B) {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Tuple(items) if items.len() == 2 => {
                Ok((A::from_value(&items[0])?, B::from_value(&items[1])?))
            }
            other => Err(mismatch::<Self>(other)),
        }
    }

    fn to_value(&self) -> Value {
        Value::Tuple(vec![self.0.to_value(), self.1.to_value()])
    }
}

fn native<T: HostValue>(value: &Value) -> Result<AnyObject> {
    Ok(AnyObject::new(T::from_value(value)?))
}

fn unsupported(descriptor: &TypeDescriptor) -> DpError {
    DpError::type_mismatch(format!("values of type {} cannot be passed", descriptor))
}

/// Convert a host value into a native handle of type `descriptor`.
///
/// Supported layouts are primitives, `Vec`, `Option` and `HashMap` of
/// primitives, and tuples of any supported layouts. Pairs of one primitive
/// type become native pairs; other tuples become a sequence of handles.
pub fn to_native(value: &Value, descriptor: &TypeDescriptor) -> Result<AnyObject> {
    use TypeDescriptor::Primitive as P;

    match descriptor {
        P(p) => dispatch_primitive!(*p, T => native::<T>(value)),
        TypeDescriptor::Vec(inner) => match inner.as_ref() {
            P(p) => dispatch_primitive!(*p, T => native::<Vec<T>>(value)),
            _ => Err(unsupported(descriptor)),
        },
        TypeDescriptor::Option(inner) => match inner.as_ref() {
            P(p) => dispatch_primitive!(*p, T => native::<Option<T>>(value)),
            _ => Err(unsupported(descriptor)),
        },
        TypeDescriptor::Tuple(elements) => {
            if let [P(a), P(b)] = elements.as_slice() {
                if a == b {
                    return dispatch_primitive!(*a, T => native::<(T, T)>(value));
                }
            }
            match value {
                Value::Tuple(items) if items.len() == elements.len() => AnyObject::tuple(
                    items
                        .iter()
                        .zip(elements)
                        .map(|(item, element)| to_native(item, element))
                        .collect::<Result<Vec<_>>>()?,
                ),
                other => Err(DpError::type_mismatch(format!(
                    "expected {}, found {}",
                    descriptor,
                    other.kind_name()
                ))),
            }
        }
        TypeDescriptor::HashMap { key, value: entry } => match (key.as_ref(), entry.as_ref()) {
            (P(k), P(v)) => dispatch_hashable!(*k, K => {
                dispatch_primitive!(*v, V => native::<HashMap<K, V>>(value))
            }, else Err(DpError::type_mismatch(format!("{} keys are not hashable", k)))),
            _ => Err(unsupported(descriptor)),
        },
    }
}

/// Convert a native handle back into a host value.
pub fn from_native(object: &AnyObject) -> Result<Value> {
    object.to_value()
}
