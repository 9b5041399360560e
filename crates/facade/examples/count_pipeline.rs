use dp_chain::calls;
use dp_chain::{binary_search_chain, Library, LibraryConfig, Value};

fn main() {
    let library = Library::new(LibraryConfig::default().with_seed(7));
    let data = Value::from("alice,3\nbob,5\ncarol,2\ndave,8\n");

    let preprocess = (calls::make_split_dataframe(
        &library,
        Some(","),
        &Value::from(vec!["name", "visits"]),
        None,
    )
    .expect("split")
        >> calls::make_select_column(&library, &Value::from("name"), None, None).expect("select"))
        >> calls::make_count(&library, "String", None).expect("count");
    let preprocess = preprocess.expect("preprocess");

    let pipeline = binary_search_chain(
        |s: &f64| preprocess.clone() >> calls::make_base_geometric(&library, *s, None, None, None)?,
        &Value::Int(1),
        &Value::Float(1.0),
    )
    .expect("calibrated pipeline");

    println!("exact count: {:?}", preprocess.invoke(&data).expect("count"));
    println!("noisy count: {:?}", pipeline.invoke(&data).expect("release"));
}
