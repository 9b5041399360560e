use dp_chain::calls;
use dp_chain::{binary_search_param, Library, LibraryConfig, SearchConfig, Value};

fn main() {
    let library = Library::new(LibraryConfig::default());
    let (d_in, d_out) = (Value::Float(1.0), Value::Float(0.5));

    let scale = binary_search_param(
        |s: &f64| calls::make_base_laplace(&library, *s, None),
        &d_in,
        &d_out,
        None,
        &SearchConfig::default(),
    )
    .expect("calibrated scale");

    let laplace = calls::make_base_laplace(&library, scale, None).expect("laplace");
    println!("calibrated scale: {}", scale);
    println!("epsilon 0.5 holds: {}", laplace.check(&d_in, &d_out).expect("check"));
    println!("release of 10.0: {:?}", laplace.invoke(&Value::Float(10.0)).expect("release"));
}
