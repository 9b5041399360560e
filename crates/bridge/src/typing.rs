//! Type descriptors: the runtime names of the native types a call is
//! specialized to.
//!
//! Descriptors are written in Rust syntax (`i32`, `Vec<String>`,
//! `(f64, f64)`, `HashMap<String, i64>`, `Option<u8>`) and can also be
//! inferred from an example host value.

use std::collections::HashMap;
use std::fmt;

use dp_chain_core::{DpError, Result};

use crate::value::Value;

/// Primitive kinds a descriptor can bottom out in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// `bool`
    Bool,
    /// `String`
    String,
    /// `i8`
    I8,
    /// `i16`
    I16,
    /// `i32`
    I32,
    /// `i64`
    I64,
    /// `u8`
    U8,
    /// `u16`
    U16,
    /// `u32`
    U32,
    /// `u64`
    U64,
    /// `usize`
    Usize,
    /// `f32`
    F32,
    /// `f64`
    F64,
}

impl Primitive {
    /// Every primitive kind.
    pub const ALL: [Primitive; 13] = [
        Primitive::Bool,
        Primitive::String,
        Primitive::I8,
        Primitive::I16,
        Primitive::I32,
        Primitive::I64,
        Primitive::U8,
        Primitive::U16,
        Primitive::U32,
        Primitive::U64,
        Primitive::Usize,
        Primitive::F32,
        Primitive::F64,
    ];

    /// The Rust name of the type.
    pub fn name(&self) -> &'static str {
        match self {
            Primitive::Bool => "bool",
            Primitive::String => "String",
            Primitive::I8 => "i8",
            Primitive::I16 => "i16",
            Primitive::I32 => "i32",
            Primitive::I64 => "i64",
            Primitive::U8 => "u8",
            Primitive::U16 => "u16",
            Primitive::U32 => "u32",
            Primitive::U64 => "u64",
            Primitive::Usize => "usize",
            Primitive::F32 => "f32",
            Primitive::F64 => "f64",
        }
    }

    /// Look up a primitive by Rust name or alias (`int`, `float`, `str`).
    pub fn from_name(name: &str) -> Option<Self> {
        let name = match name {
            "int" => "i32",
            "float" => "f64",
            "str" | "&str" => "String",
            other => other,
        };
        Self::ALL.iter().copied().find(|p| p.name() == name)
    }

    /// Whether this is a fixed-width integer.
    pub fn is_integer(&self) -> bool {
        !matches!(
            self,
            Primitive::Bool | Primitive::String | Primitive::F32 | Primitive::F64
        )
    }

    /// Whether this is a float.
    pub fn is_float(&self) -> bool {
        matches!(self, Primitive::F32 | Primitive::F64)
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A resolved runtime type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeDescriptor {
    /// A primitive.
    Primitive(Primitive),
    /// `Vec<T>`
    Vec(Box<TypeDescriptor>),
    /// `Option<T>`
    Option(Box<TypeDescriptor>),
    /// `(T0, T1, ...)` with at least two elements.
    Tuple(Vec<TypeDescriptor>),
    /// `HashMap<K, V>`
    HashMap {
        /// Key type.
        key: Box<TypeDescriptor>,
        /// Value type.
        value: Box<TypeDescriptor>,
    },
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Primitive(p) => write!(f, "{}", p),
            TypeDescriptor::Vec(inner) => write!(f, "Vec<{}>", inner),
            TypeDescriptor::Option(inner) => write!(f, "Option<{}>", inner),
            TypeDescriptor::Tuple(elements) => {
                f.write_str("(")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", element)?;
                }
                f.write_str(")")
            }
            TypeDescriptor::HashMap { key, value } => write!(f, "HashMap<{}, {}>", key, value),
        }
    }
}

/// Split on commas that are not nested inside `<>` or `()`.
fn split_top_level(s: &str) -> Result<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '<' | '(' => depth += 1,
            '>' | ')' => {
                depth -= 1;
                if depth < 0 {
                    return Err(DpError::unknown_type(format!("unbalanced type name: {}", s)));
                }
            }
            ',' if depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(DpError::unknown_type(format!("unbalanced type name: {}", s)));
    }
    parts.push(&s[start..]);
    Ok(parts)
}

impl TypeDescriptor {
    /// Shorthand for a primitive descriptor.
    pub fn primitive(p: Primitive) -> Self {
        TypeDescriptor::Primitive(p)
    }

    /// Parse a type name.
    pub fn parse(name: &str) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DpError::unknown_type("empty type name"));
        }

        if let Some(inner) = name.strip_prefix('(') {
            let inner = inner
                .strip_suffix(')')
                .ok_or_else(|| DpError::unknown_type(format!("unclosed tuple: {}", name)))?;
            let mut parts = split_top_level(inner)?;
            // allow a trailing comma
            if parts.len() > 1 && parts.last().map_or(false, |p| p.trim().is_empty()) {
                parts.pop();
            }
            if parts.len() < 2 {
                return Err(DpError::unknown_type(format!(
                    "tuples need at least two elements: {}",
                    name
                )));
            }
            return Ok(TypeDescriptor::Tuple(
                parts
                    .into_iter()
                    .map(Self::parse)
                    .collect::<Result<Vec<_>>>()?,
            ));
        }

        if let Some(open) = name.find('<') {
            let args = name[open + 1..]
                .strip_suffix('>')
                .ok_or_else(|| DpError::unknown_type(format!("unclosed generic: {}", name)))?;
            let args = split_top_level(args)?;
            let head = name[..open].trim();
            return match (head, args.as_slice()) {
                ("Vec", [inner]) => Ok(TypeDescriptor::Vec(Box::new(Self::parse(inner)?))),
                ("Option", [inner]) => Ok(TypeDescriptor::Option(Box::new(Self::parse(inner)?))),
                ("HashMap", [key, value]) => Ok(TypeDescriptor::HashMap {
                    key: Box::new(Self::parse(key)?),
                    value: Box::new(Self::parse(value)?),
                }),
                _ => Err(DpError::unknown_type(format!(
                    "unknown generic type or wrong arity: {}",
                    name
                ))),
            };
        }

        Primitive::from_name(name)
            .map(TypeDescriptor::Primitive)
            .ok_or_else(|| DpError::unknown_type(format!("unknown type name: {}", name)))
    }

    /// Infer a descriptor from the shape of an example value.
    ///
    /// Containers are typed by their first element; empty containers and
    /// `Null` cannot be typed.
    pub fn infer(example: &Value) -> Result<Self> {
        Ok(match example {
            Value::Null => {
                return Err(DpError::ambiguous_type("cannot infer a type from null"))
            }
            Value::Bool(_) => TypeDescriptor::Primitive(Primitive::Bool),
            Value::Int(_) => TypeDescriptor::Primitive(Primitive::I32),
            Value::Float(_) => TypeDescriptor::Primitive(Primitive::F64),
            Value::Str(_) => TypeDescriptor::Primitive(Primitive::String),
            Value::List(items) => {
                let first = items.first().ok_or_else(|| {
                    DpError::ambiguous_type("cannot infer the element type of an empty list")
                })?;
                TypeDescriptor::Vec(Box::new(Self::infer(first)?))
            }
            Value::Tuple(items) => {
                if items.len() < 2 {
                    return Err(DpError::unknown_type(
                        "tuples need at least two elements",
                    ));
                }
                TypeDescriptor::Tuple(items.iter().map(Self::infer).collect::<Result<_>>()?)
            }
            Value::Dict(entries) => {
                let (key, value) = entries.first().ok_or_else(|| {
                    DpError::ambiguous_type("cannot infer the key and value types of an empty map")
                })?;
                TypeDescriptor::HashMap {
                    key: Box::new(Self::infer(key)?),
                    value: Box::new(Self::infer(value)?),
                }
            }
        })
    }

    /// Parse `name` if given, otherwise infer from `example`.
    pub fn parse_or_infer(name: Option<&str>, example: &Value) -> Result<Self> {
        match name {
            Some(name) => Self::parse(name),
            None => Self::infer(example),
        }
    }

    /// The primitive kind, or a type mismatch for composites.
    pub fn as_primitive(&self) -> Result<Primitive> {
        match self {
            TypeDescriptor::Primitive(p) => Ok(*p),
            other => Err(DpError::type_mismatch(format!(
                "expected a primitive type, found {}",
                other
            ))),
        }
    }
}

/// Native types with a runtime descriptor.
pub trait NativeType: 'static {
    /// The descriptor naming `Self`.
    fn descriptor() -> TypeDescriptor;
}

macro_rules! impl_native_primitive {
    ($($ty:ty => $variant:ident),*) => {$(
        impl NativeType for $ty {
            fn descriptor() -> TypeDescriptor {
                TypeDescriptor::Primitive(Primitive::$variant)
            }
        }
    )*};
}

impl_native_primitive!(
    bool => Bool, String => String,
    i8 => I8, i16 => I16, i32 => I32, i64 => I64,
    u8 => U8, u16 => U16, u32 => U32, u64 => U64, usize => Usize,
    f32 => F32, f64 => F64
);

impl<T: NativeType> NativeType for Vec<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Vec(Box::new(T::descriptor()))
    }
}

impl<T: NativeType> NativeType for Option<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Option(Box::new(T::descriptor()))
    }
}

impl<K: NativeType, V: NativeType> NativeType for HashMap<K, V> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::HashMap {
            key: Box::new(K::descriptor()),
            value: Box::new(V::descriptor()),
        }
    }
}

impl<A: NativeType, B: NativeType> NativeType for (A, B) {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Tuple(vec![A::descriptor(), B::descriptor()])
    }
}

impl<A: NativeType, B: NativeType, C: NativeType> NativeType for (A, B, C) {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Tuple(vec![A::descriptor(), B::descriptor(), C::descriptor()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dp_chain_core::ErrorKind;
    use proptest::prelude::*;

    #[test]
    fn parses_composites() {
        let parsed = TypeDescriptor::parse("HashMap<String, Vec<(i32, f64)>>").unwrap();
        assert_eq!(parsed, <HashMap<String, Vec<(i32, f64)>>>::descriptor());
        assert_eq!(parsed.to_string(), "HashMap<String, Vec<(i32, f64)>>");
    }

    #[test]
    fn aliases_resolve() {
        assert_eq!(TypeDescriptor::parse("int").unwrap(), i32::descriptor());
        assert_eq!(TypeDescriptor::parse(" float ").unwrap(), f64::descriptor());
        assert_eq!(
            TypeDescriptor::parse("Vec<str>").unwrap(),
            <Vec<String>>::descriptor()
        );
    }

    #[test]
    fn malformed_names_are_unknown() {
        for name in ["", "i33", "Vec<i32", "(i32)", "HashMap<i32>", "Box<i32>", "(i32,, u8)"] {
            let err = TypeDescriptor::parse(name).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::UnknownType, "{}", name);
        }
    }

    #[test]
    fn infers_from_examples() {
        let example = Value::List(vec![Value::Tuple(vec![Value::Int(1), Value::Float(0.5)])]);
        assert_eq!(
            TypeDescriptor::infer(&example).unwrap(),
            <Vec<(i32, f64)>>::descriptor()
        );
        assert_eq!(
            TypeDescriptor::parse_or_infer(Some("u8"), &Value::Float(1.0)).unwrap(),
            u8::descriptor()
        );
    }

    #[test]
    fn empty_containers_are_ambiguous() {
        for example in [Value::List(vec![]), Value::Dict(vec![]), Value::Null] {
            let err = TypeDescriptor::parse_or_infer(None, &example).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::AmbiguousType);
        }
    }

    fn descriptor_strategy() -> impl Strategy<Value = TypeDescriptor> {
        let leaf = proptest::sample::select(Primitive::ALL.to_vec()).prop_map(TypeDescriptor::Primitive);
        leaf.prop_recursive(4, 24, 3, |inner| {
            prop_oneof![
                inner.clone().prop_map(|t| TypeDescriptor::Vec(Box::new(t))),
                inner.clone().prop_map(|t| TypeDescriptor::Option(Box::new(t))),
                proptest::collection::vec(inner.clone(), 2..4).prop_map(TypeDescriptor::Tuple),
                (inner.clone(), inner).prop_map(|(k, v)| TypeDescriptor::HashMap {
                    key: Box::new(k),
                    value: Box::new(v),
                }),
            ]
        })
    }

    proptest! {
        #[test]
        fn format_parse_round_trip(descriptor in descriptor_strategy()) {
            let reparsed = TypeDescriptor::parse(&descriptor.to_string()).unwrap();
            prop_assert_eq!(&reparsed, &descriptor);
            let again = TypeDescriptor::parse(&reparsed.to_string()).unwrap();
            prop_assert_eq!(again, reparsed);
        }
    }
}
