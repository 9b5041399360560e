use dp_chain::calls;
use dp_chain::{Library, LibraryConfig, Value};

fn main() {
    let config = LibraryConfig::from_json(r#"{"seed": 11, "search": {"max_doublings": 64}}"#)
        .expect("config");
    println!("config: {:?}", config);

    let library = Library::new(config);
    let a = calls::make_base_gaussian_zcdp(&library, 2.0, None).expect("gaussian");
    let b = calls::make_base_gaussian_zcdp(&library, 4.0, None).expect("gaussian");
    let both = calls::make_sequential_composition(&library, &[a, b]).expect("composition");

    println!("output type: {}", both.output_carrier());
    println!("rho 0.16 holds: {}", both.check(&Value::Float(1.0), &Value::Float(0.16)).expect("check"));
    println!("release: {:?}", both.invoke(&Value::Float(0.0)).expect("release"));
}
