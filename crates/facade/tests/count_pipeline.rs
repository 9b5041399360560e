use dp_chain::calls;
use dp_chain::{
    binary_search_chain, binary_search_param, Library, LibraryConfig, Result, SearchConfig, Step,
    Value,
};

fn library() -> Library {
    Library::new(LibraryConfig::default().with_seed(42))
}

fn rows(k: usize) -> Value {
    Value::from(
        (0..k)
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join("\n"),
    )
}

fn preprocess(library: &Library, distinct: bool) -> Result<Step> {
    let split = calls::make_split_dataframe(library, Some(","), &Value::from(vec!["A", "B"]), None)?;
    let select = calls::make_select_column(library, &Value::from("A"), None, Some("String"))?;
    let count = if distinct {
        calls::make_count_distinct(library, "String", None)?
    } else {
        calls::make_count(library, "String", None)?
    };
    (split >> select) >> count
}

#[test]
fn noisy_count_from_dataframe() {
    let library = library();
    let preprocess = preprocess(&library, false).unwrap();

    let pipeline = binary_search_chain(
        |s: &f64| preprocess.clone() >> calls::make_base_geometric(&library, *s, None, None, None)?,
        &Value::Int(1),
        &Value::Float(1.0),
    )
    .unwrap();

    assert!(pipeline.check(&Value::Int(1), &Value::Float(1.0)).unwrap());
    assert!(pipeline.is_measurement());
    let released = pipeline.invoke(&rows(40)).unwrap();
    assert!(matches!(released, Value::Int(_)), "{:?}", released);
}

#[test]
fn noisy_distinct_count_from_dataframe() {
    let library = library();
    let preprocess = preprocess(&library, true).unwrap();

    let pipeline = binary_search_chain(
        |s: &f64| preprocess.clone() >> calls::make_base_geometric(&library, *s, None, None, None)?,
        &Value::Int(1),
        &Value::Float(1.0),
    )
    .unwrap();

    assert!(pipeline.check(&Value::Int(1), &Value::Float(1.0)).unwrap());
    assert!(pipeline.invoke(&rows(40)).unwrap().as_int().is_some());
}

#[test]
fn calibrated_scale_is_tight() {
    let library = library();
    let preprocess = preprocess(&library, false).unwrap();
    let make_chain =
        |s: &f64| preprocess.clone() >> calls::make_base_geometric(&library, *s, None, None, None)?;
    let (d_in, d_out) = (Value::Int(1), Value::Float(1.0));

    let scale = binary_search_param(make_chain, &d_in, &d_out, None, &SearchConfig::default())
        .unwrap();
    assert_eq!(scale, 1.0);

    let below = f64::from_bits(scale.to_bits() - 1);
    assert!(make_chain(&scale).unwrap().check(&d_in, &d_out).unwrap());
    assert!(!make_chain(&below).unwrap().check(&d_in, &d_out).unwrap());
}

#[test]
fn counts_cover_every_row() {
    let library = library();
    let count = preprocess(&library, false).unwrap();
    assert_eq!(count.invoke(&rows(40)).unwrap(), Value::Int(40));
    let distinct = preprocess(&library, true).unwrap();
    assert_eq!(
        distinct.invoke(&Value::from("a\nb\na\n")).unwrap(),
        Value::Int(2)
    );
}
