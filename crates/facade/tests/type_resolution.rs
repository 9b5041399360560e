use dp_chain::calls;
use dp_chain::{to_native, ErrorKind, Library, LibraryConfig, TypeDescriptor, Value};
use proptest::prelude::*;

#[test]
fn float_example_under_integer_name_is_a_type_mismatch() {
    let library = Library::new(LibraryConfig::default());
    let err = calls::make_bounded_sum(
        &library,
        &Value::Float(0.0),
        &Value::Float(1.0),
        Some("i32"),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);

    let err = to_native(&Value::Float(3.0), &TypeDescriptor::parse("i64").unwrap()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
}

#[test]
fn empty_containers_cannot_be_inferred() {
    let err = TypeDescriptor::infer(&Value::List(vec![])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AmbiguousType);
    let err = TypeDescriptor::parse_or_infer(None, &Value::Dict(vec![])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AmbiguousType);
    let named = TypeDescriptor::parse_or_infer(Some("Vec<u8>"), &Value::List(vec![])).unwrap();
    assert_eq!(named.to_string(), "Vec<u8>");
}

#[test]
fn malformed_names_are_unknown_types() {
    for name in ["", "Vec<", "Vec<i32", "(i32)", "HashMap<i32>", "i128", "Vec<i32>>"] {
        let err = TypeDescriptor::parse(name).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownType, "{:?}", name);
    }
}

#[test]
fn inference_follows_the_example() {
    let example = Value::Tuple(vec![
        Value::from(vec![1.5]),
        Value::Dict(vec![(Value::from("k"), Value::Int(1))]),
    ]);
    let descriptor = TypeDescriptor::infer(&example).unwrap();
    assert_eq!(descriptor.to_string(), "(Vec<f64>, HashMap<String, i32>)");
}

fn known_names() -> impl Strategy<Value = String> {
    let leaf = prop::sample::select(vec![
        "bool", "String", "i8", "i16", "i32", "i64", "u8", "u16", "u32", "u64", "usize", "f32",
        "f64", "int", "float", "str",
    ])
    .prop_map(str::to_string);
    leaf.prop_recursive(3, 16, 3, |inner| {
        prop_oneof![
            inner.clone().prop_map(|t| format!("Vec<{}>", t)),
            inner.clone().prop_map(|t| format!("Option< {} >", t)),
            (inner.clone(), inner.clone()).prop_map(|(k, v)| format!("HashMap<{},{}>", k, v)),
            prop::collection::vec(inner, 2..4).prop_map(|ts| format!("({})", ts.join(", "))),
        ]
    })
}

proptest! {
    #[test]
    fn formatted_names_parse_back(name in known_names()) {
        let parsed = TypeDescriptor::parse(&name).unwrap();
        let reparsed = TypeDescriptor::parse(&parsed.to_string()).unwrap();
        prop_assert_eq!(reparsed, parsed);
    }
}
