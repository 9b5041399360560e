//! Constructors over host values.
//!
//! Each wrapper resolves its type arguments (explicit name first, otherwise
//! inferred from an example argument), converts its value arguments into
//! handles of the resolved types, and only then calls into the library.
//! Resolution and conversion failures therefore surface before the library
//! allocates anything.

use dp_chain_bridge::{to_native, Arg, Library, TypeDescriptor, Value};
use dp_chain_core::{DpError, Result};

use crate::step::Step;

/// Element type used when a geometric mechanism's data type is not given.
pub const DEFAULT_GEOMETRIC_TYPE: &str = "i32";

/// Count type used when a count's output type is not given.
pub const DEFAULT_COUNT_TYPE: &str = "i32";

/// Distance type of histograms when none is given.
pub const DEFAULT_HISTOGRAM_DISTANCE_TYPE: &str = "f64";

fn type_arg(descriptor: &TypeDescriptor) -> Arg {
    Arg::Type(descriptor.to_string())
}

fn object_arg(value: &Value, descriptor: &TypeDescriptor) -> Result<Arg> {
    Ok(Arg::Object(to_native(value, descriptor)?))
}

fn pair(element: &TypeDescriptor) -> TypeDescriptor {
    TypeDescriptor::Tuple(vec![element.clone(), element.clone()])
}

fn call(library: &Library, name: &str, args: Vec<Arg>) -> Result<Step> {
    let native = library.call(name, args).unwrap()?;
    Step::from_output(library, native)
}

/// Split text into one string per line.
pub fn make_split_lines(library: &Library) -> Result<Step> {
    call(library, "make_split_lines", Vec::new())
}

/// Split lines of delimited text into named columns.
///
/// The key type `k` is inferred from the first column name when absent.
pub fn make_split_dataframe(
    library: &Library,
    separator: Option<&str>,
    col_names: &Value,
    k: Option<&str>,
) -> Result<Step> {
    let vec_name = k.map(|k| format!("Vec<{}>", k));
    let names_type = TypeDescriptor::parse_or_infer(vec_name.as_deref(), col_names)?;
    let TypeDescriptor::Vec(key_type) = &names_type else {
        return Err(DpError::type_mismatch(format!(
            "column names must be a list, found {}",
            names_type
        )));
    };
    let separator = separator.map_or(Arg::Null, |s| Arg::Str(s.to_owned()));
    call(
        library,
        "make_split_dataframe",
        vec![
            separator,
            object_arg(col_names, &names_type)?,
            type_arg(key_type),
        ],
    )
}

/// Select one column of a dataframe as a vector of strings.
pub fn make_select_column(
    library: &Library,
    key: &Value,
    k: Option<&str>,
    toa: Option<&str>,
) -> Result<Step> {
    let key_type = TypeDescriptor::parse_or_infer(k, key)?;
    let toa = TypeDescriptor::parse(toa.unwrap_or("String"))?;
    call(
        library,
        "make_select_column",
        vec![object_arg(key, &key_type)?, type_arg(&key_type), type_arg(&toa)],
    )
}

/// Parse every string, substituting the type's default when parsing fails.
pub fn make_cast_default(library: &Library, toa: &str) -> Result<Step> {
    let toa = TypeDescriptor::parse(toa)?;
    call(library, "make_cast_default", vec![type_arg(&toa)])
}

fn bounded(
    library: &Library,
    name: &str,
    lower: &Value,
    upper: &Value,
    t: Option<&str>,
) -> Result<Step> {
    let t = TypeDescriptor::parse_or_infer(t, lower)?;
    let bounds = Value::Tuple(vec![lower.clone(), upper.clone()]);
    call(
        library,
        name,
        vec![object_arg(&bounds, &pair(&t))?, type_arg(&t)],
    )
}

/// Clamp every element into `[lower, upper]`.
pub fn make_clamp(library: &Library, lower: &Value, upper: &Value, t: Option<&str>) -> Result<Step> {
    bounded(library, "make_clamp", lower, upper, t)
}

/// Sum elements already clamped into `[lower, upper]`.
pub fn make_bounded_sum(
    library: &Library,
    lower: &Value,
    upper: &Value,
    t: Option<&str>,
) -> Result<Step> {
    bounded(library, "make_bounded_sum", lower, upper, t)
}

/// Sum exactly `size` elements already clamped into `[lower, upper]`.
pub fn make_sized_bounded_sum(
    library: &Library,
    size: usize,
    lower: &Value,
    upper: &Value,
    t: Option<&str>,
) -> Result<Step> {
    let t = TypeDescriptor::parse_or_infer(t, lower)?;
    let bounds = Value::Tuple(vec![lower.clone(), upper.clone()]);
    call(
        library,
        "make_sized_bounded_sum",
        vec![Arg::Usize(size), object_arg(&bounds, &pair(&t))?, type_arg(&t)],
    )
}

/// Count the elements of a vector of `tia`.
pub fn make_count(library: &Library, tia: &str, to: Option<&str>) -> Result<Step> {
    let tia = TypeDescriptor::parse(tia)?;
    let to = TypeDescriptor::parse(to.unwrap_or(DEFAULT_COUNT_TYPE))?;
    call(library, "make_count", vec![type_arg(&tia), type_arg(&to)])
}

/// Count the distinct elements of a vector of `tia`.
pub fn make_count_distinct(library: &Library, tia: &str, to: Option<&str>) -> Result<Step> {
    let tia = TypeDescriptor::parse(tia)?;
    let to = TypeDescriptor::parse(to.unwrap_or(DEFAULT_COUNT_TYPE))?;
    call(library, "make_count_distinct", vec![type_arg(&tia), type_arg(&to)])
}

/// Count occurrences of each distinct element of a vector of `tik`.
pub fn make_count_by(
    library: &Library,
    tik: &str,
    toc: Option<&str>,
    qo: Option<&str>,
) -> Result<Step> {
    let tik = TypeDescriptor::parse(tik)?;
    let toc = TypeDescriptor::parse(toc.unwrap_or(DEFAULT_COUNT_TYPE))?;
    let qo = TypeDescriptor::parse(qo.unwrap_or(DEFAULT_HISTOGRAM_DISTANCE_TYPE))?;
    call(
        library,
        "make_count_by",
        vec![type_arg(&tik), type_arg(&toc), type_arg(&qo)],
    )
}

fn continuous(library: &Library, name: &str, scale: f64, t: Option<&str>) -> Result<Step> {
    let t = TypeDescriptor::parse_or_infer(t, &Value::Float(scale))?;
    call(library, name, vec![Arg::F64(scale), type_arg(&t)])
}

/// Add Laplace noise of the given scale to a scalar.
pub fn make_base_laplace(library: &Library, scale: f64, t: Option<&str>) -> Result<Step> {
    continuous(library, "make_base_laplace", scale, t)
}

/// Add Laplace noise of the given scale to every element of a vector.
pub fn make_base_vector_laplace(library: &Library, scale: f64, t: Option<&str>) -> Result<Step> {
    continuous(library, "make_base_vector_laplace", scale, t)
}

/// Add Gaussian noise, accounted as `(epsilon, delta)`.
pub fn make_base_gaussian(library: &Library, scale: f64, t: Option<&str>) -> Result<Step> {
    continuous(library, "make_base_gaussian", scale, t)
}

/// Add Gaussian noise to every element of a vector, accounted as
/// `(epsilon, delta)` over the L2 distance.
pub fn make_base_vector_gaussian(library: &Library, scale: f64, t: Option<&str>) -> Result<Step> {
    continuous(library, "make_base_vector_gaussian", scale, t)
}

/// Add Gaussian noise, accounted as zero-concentrated privacy.
pub fn make_base_gaussian_zcdp(library: &Library, scale: f64, t: Option<&str>) -> Result<Step> {
    continuous(library, "make_base_gaussian_zcdp", scale, t)
}

fn geometric(
    library: &Library,
    name: &str,
    scale: f64,
    bounds: Option<(&Value, &Value)>,
    t: Option<&str>,
    qo: Option<&str>,
) -> Result<Step> {
    let t = match (t, bounds) {
        (Some(name), _) => TypeDescriptor::parse(name)?,
        (None, Some((lower, _))) => TypeDescriptor::infer(lower)?,
        (None, None) => TypeDescriptor::parse(DEFAULT_GEOMETRIC_TYPE)?,
    };
    let qo = TypeDescriptor::parse_or_infer(qo, &Value::Float(scale))?;
    let bounds = match bounds {
        Some((lower, upper)) => object_arg(
            &Value::Tuple(vec![lower.clone(), upper.clone()]),
            &pair(&t),
        )?,
        None => Arg::Null,
    };
    call(
        library,
        name,
        vec![Arg::F64(scale), bounds, type_arg(&t), type_arg(&qo)],
    )
}

/// Add two-sided geometric noise to an integer.
///
/// The data type comes from `t`, then from the bounds, then defaults to
/// `i32`; the privacy loss type follows the scale.
pub fn make_base_geometric(
    library: &Library,
    scale: f64,
    bounds: Option<(&Value, &Value)>,
    t: Option<&str>,
    qo: Option<&str>,
) -> Result<Step> {
    geometric(library, "make_base_geometric", scale, bounds, t, qo)
}

/// Add two-sided geometric noise to every element of an integer vector.
pub fn make_base_vector_geometric(
    library: &Library,
    scale: f64,
    bounds: Option<(&Value, &Value)>,
    t: Option<&str>,
    qo: Option<&str>,
) -> Result<Step> {
    geometric(library, "make_base_vector_geometric", scale, bounds, t, qo)
}

fn constant_time_geometric(
    library: &Library,
    name: &str,
    scale: f64,
    lower: &Value,
    upper: &Value,
    t: Option<&str>,
    qo: Option<&str>,
) -> Result<Step> {
    let t = TypeDescriptor::parse_or_infer(t, lower)?;
    let qo = TypeDescriptor::parse_or_infer(qo, &Value::Float(scale))?;
    call(
        library,
        name,
        vec![
            Arg::F64(scale),
            object_arg(lower, &t)?,
            object_arg(upper, &t)?,
            type_arg(&t),
            type_arg(&qo),
        ],
    )
}

/// Add geometric noise to an integer in time independent of the noise.
///
/// The data type follows `lower` unless given.
pub fn make_constant_time_base_geometric(
    library: &Library,
    scale: f64,
    lower: &Value,
    upper: &Value,
    t: Option<&str>,
    qo: Option<&str>,
) -> Result<Step> {
    constant_time_geometric(library, "make_constant_time_base_geometric", scale, lower, upper, t, qo)
}

/// [`make_constant_time_base_geometric`] over every element of a vector.
pub fn make_constant_time_base_vector_geometric(
    library: &Library,
    scale: f64,
    lower: &Value,
    upper: &Value,
    t: Option<&str>,
    qo: Option<&str>,
) -> Result<Step> {
    constant_time_geometric(
        library,
        "make_constant_time_base_vector_geometric",
        scale,
        lower,
        upper,
        t,
        qo,
    )
}

/// Release the frequent keys of a histogram over `n` records.
///
/// Counts default to `i32`; the distance type follows the scale.
pub fn make_base_stability(
    library: &Library,
    n: usize,
    scale: f64,
    threshold: f64,
    tik: &str,
    tic: Option<&str>,
    q: Option<&str>,
) -> Result<Step> {
    let tik = TypeDescriptor::parse(tik)?;
    let tic = TypeDescriptor::parse(tic.unwrap_or(DEFAULT_COUNT_TYPE))?;
    let q = TypeDescriptor::parse_or_infer(q, &Value::Float(scale))?;
    call(
        library,
        "make_base_stability",
        vec![
            Arg::Usize(n),
            Arg::F64(scale),
            Arg::F64(threshold),
            type_arg(&tik),
            type_arg(&tic),
            type_arg(&q),
        ],
    )
}

/// Shuffle `num_steps` locally privatized reports of type `t`.
pub fn make_shuffle_amplification(
    library: &Library,
    step_epsilon: f64,
    step_delta: f64,
    num_steps: usize,
    t: &str,
) -> Result<Step> {
    let t = TypeDescriptor::parse(t)?;
    call(
        library,
        "make_shuffle_amplification",
        vec![
            Arg::F64(step_epsilon),
            Arg::F64(step_delta),
            Arg::Usize(num_steps),
            type_arg(&t),
        ],
    )
}

/// Release every measurement on the same input, as one tuple.
pub fn make_sequential_composition(library: &Library, measurements: &[Step]) -> Result<Step> {
    if let Some(step) = measurements.iter().find(|step| !step.is_measurement()) {
        return Err(DpError::metric_mismatch(format!(
            "only measurements compose; found a transformation over {}",
            step.input_carrier()
        )));
    }
    call(
        library,
        "make_sequential_composition",
        measurements.iter().map(Step::to_arg).collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use dp_chain_bridge::LibraryConfig;
    use dp_chain_core::ErrorKind;

    fn library() -> Library {
        Library::new(LibraryConfig::default().with_seed(17))
    }

    #[test]
    fn float_bounds_under_integer_type_are_rejected() {
        let err = make_clamp(
            &library(),
            &Value::Float(0.0),
            &Value::Float(10.0),
            Some("i32"),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn empty_column_names_are_ambiguous() {
        let err = make_split_dataframe(&library(), None, &Value::List(vec![]), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AmbiguousType);
        assert!(make_split_dataframe(&library(), None, &Value::List(vec![]), Some("String")).is_ok());
    }

    #[test]
    fn dataframes_split_and_select() {
        let library = library();
        let split = make_split_dataframe(&library, Some(","), &Value::from(vec!["A", "B"]), None)
            .unwrap();
        let select = make_select_column(&library, &Value::from("B"), None, None).unwrap();
        let cast = make_cast_default(&library, "i64").unwrap();
        let pipeline = ((split >> select) >> cast).unwrap();
        assert_eq!(
            pipeline.invoke(&Value::from("1, 2\n3, x\n5")).unwrap(),
            Value::from(vec![2_i64, 0, 0])
        );
    }

    #[test]
    fn bounded_sums_infer_their_type() {
        let library = library();
        let clamp = make_clamp(&library, &Value::Int(0), &Value::Int(5), None).unwrap();
        let sum = make_bounded_sum(&library, &Value::Int(0), &Value::Int(5), None).unwrap();
        let pipeline = (clamp >> sum).unwrap();
        assert_eq!(
            pipeline.invoke(&Value::from(vec![1, 9, -3])).unwrap(),
            Value::Int(6)
        );
        assert!(pipeline.check(&Value::Int(1), &Value::Int(5)).unwrap());
        assert!(!pipeline.check(&Value::Int(1), &Value::Int(4)).unwrap());
    }

    #[test]
    fn geometric_type_comes_from_bounds() {
        let library = library();
        let bounded = make_base_geometric(
            &library,
            1.0,
            Some((&Value::Int(0), &Value::Int(100))),
            Some("i64"),
            None,
        )
        .unwrap();
        assert_eq!(bounded.input_carrier().to_string(), "i64");
        let unbounded = make_base_geometric(&library, 1.0, None, None, None).unwrap();
        assert_eq!(unbounded.input_carrier().to_string(), "i32");
        let released = bounded.invoke(&Value::Int(50)).unwrap().as_int().unwrap();
        assert!((0..=100).contains(&released));
    }

    #[test]
    fn compositions_need_measurements() {
        let library = library();
        let count = make_count(&library, "String", None).unwrap();
        let noise = make_base_laplace(&library, 1.0, None).unwrap();
        let err = make_sequential_composition(&library, &[noise, count]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MetricMismatch);
    }

    #[test]
    fn composed_budgets_add() {
        let library = library();
        let a = make_base_gaussian_zcdp(&library, 1.0, None).unwrap();
        let b = make_base_gaussian_zcdp(&library, 1.0, None).unwrap();
        let both = make_sequential_composition(&library, &[a.clone(), b]).unwrap();
        assert!(a.check(&Value::Float(1.0), &Value::Float(0.5)).unwrap());
        assert!(!both.check(&Value::Float(1.0), &Value::Float(0.9)).unwrap());
        assert!(both.check(&Value::Float(1.0), &Value::Float(1.0)).unwrap());
        assert_eq!(both.output_carrier().to_string(), "(f64, f64)");
    }

    #[test]
    fn approximate_budgets_cannot_compose_without_a_closed_form() {
        let library = library();
        let a = make_base_gaussian(&library, 4.0, None).unwrap();
        let b = make_base_gaussian(&library, 4.0, None).unwrap();
        let err = make_sequential_composition(&library, &[a, b]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MetricMismatch);
    }
    #[test]
    fn sized_sums_infer_their_type() {
        let library = library();
        let sum = make_sized_bounded_sum(&library, 2, &Value::Float(0.0), &Value::Float(1.0), None)
            .unwrap();
        assert_eq!(
            sum.invoke(&Value::from(vec![0.25, 0.5])).unwrap(),
            Value::Float(0.75)
        );
        let err = sum.invoke(&Value::from(vec![0.25])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DomainMismatch);
        assert!(sum.check(&Value::Int(2), &Value::Float(1.0)).unwrap());
    }

    #[test]
    fn histograms_pass_the_stability_threshold() {
        let library = library();
        let count_by = make_count_by(&library, "String", Some("u32"), None).unwrap();
        let stability =
            make_base_stability(&library, 10, 0.001, 0.2, "String", Some("u32"), None).unwrap();
        let pipeline = (count_by >> stability).unwrap();
        let rows = Value::from(vec!["x", "x", "x", "x", "x", "x", "x", "x", "x", "y"]);
        let Value::Dict(entries) = pipeline.invoke(&rows).unwrap() else {
            panic!("expected a dict");
        };
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, Value::from("x"));
        let frequency = entries[0].1.as_float().unwrap();
        assert!((frequency - 0.9).abs() < 0.05);
    }

    #[test]
    fn constant_time_geometric_infers_from_lower() {
        let library = library();
        let noise = make_constant_time_base_geometric(
            &library,
            1.0,
            &Value::Int(0),
            &Value::Int(20),
            Some("u16"),
            None,
        )
        .unwrap();
        assert_eq!(noise.input_carrier().to_string(), "u16");
        let released = noise.invoke(&Value::Int(10)).unwrap().as_int().unwrap();
        assert!((0..=20).contains(&released));

        let vector = make_constant_time_base_vector_geometric(
            &library,
            0.0,
            &Value::Int(0),
            &Value::Int(3),
            None,
            None,
        )
        .unwrap();
        assert_eq!(
            vector.invoke(&Value::from(vec![-1, 2, 9])).unwrap(),
            Value::from(vec![0, 2, 3])
        );
    }

    #[test]
    fn vector_mechanisms_release_vectors() {
        let library = library();
        let gaussian = make_base_vector_gaussian(&library, 1.0, None).unwrap();
        let Value::List(released) = gaussian.invoke(&Value::from(vec![0.0, 0.0, 0.0])).unwrap() else {
            panic!("expected a list");
        };
        assert_eq!(released.len(), 3);

        let geometric = make_base_vector_geometric(
            &library,
            1.0,
            Some((&Value::Int(0), &Value::Int(5))),
            None,
            None,
        )
        .unwrap();
        assert_eq!(geometric.input_carrier().to_string(), "Vec<i32>");
    }

    #[test]
    fn shuffled_reports_keep_their_contents() {
        let library = library();
        let shuffle = make_shuffle_amplification(&library, 0.5, 0.0, 3, "i32").unwrap();
        let Value::List(mut reports) = shuffle.invoke(&Value::from(vec![1, 2, 3])).unwrap() else {
            panic!("expected a list");
        };
        reports.sort_by_key(|v| v.as_int().unwrap());
        assert_eq!(Value::List(reports), Value::from(vec![1, 2, 3]));
        assert!(shuffle
            .check(&Value::Int(2), &Value::Tuple(vec![Value::Float(0.5), Value::Float(0.0)]))
            .unwrap());
    }
}
