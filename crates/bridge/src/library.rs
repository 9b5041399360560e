//! The native library as an explicit capability object.
//!
//! Every constructor, chain and invocation goes through
//! [`Library::call`] with a positional argument list: type arguments as
//! descriptor names, values as [`AnyObject`] handles and scalars by value.
//! The library owns the noise source its measurements draw from, so two
//! libraries never share randomness.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use dp_chain_accounting::{make_sequential_composition, SearchConfig};
use dp_chain_core::{
    cast, make_base_gaussian_with, make_base_gaussian_zcdp_with, make_base_geometric_with,
    make_base_laplace_with, make_base_stability_with, make_base_vector_gaussian_with,
    make_base_vector_geometric_with, make_base_vector_laplace_with, make_bounded_sum,
    make_cast_default, make_chain_mt, make_chain_pm, make_chain_tt, make_clamp,
    make_constant_time_base_geometric_with, make_constant_time_base_vector_geometric_with,
    make_count, make_count_by, make_count_distinct, make_select_column,
    make_shuffle_amplification_with, make_sized_bounded_sum, make_split_dataframe,
    make_split_lines, Domain, DpError, NoiseSource, Result,
};

use crate::any::{
    product_into_any, AnyMeasurement, AnyObject, AnyTransformation, IntoAnyMeasurementExt,
    IntoAnyTransformationExt,
};
use crate::ffi::FfiResult;
use crate::typing::{Primitive, TypeDescriptor};

/// Names accepted by [`Library::call`].
pub const OPERATIONS: &[&str] = &[
    "make_split_lines",
    "make_split_dataframe",
    "make_select_column",
    "make_cast_default",
    "make_clamp",
    "make_bounded_sum",
    "make_sized_bounded_sum",
    "make_count",
    "make_count_distinct",
    "make_count_by",
    "make_base_laplace",
    "make_base_vector_laplace",
    "make_base_gaussian",
    "make_base_vector_gaussian",
    "make_base_gaussian_zcdp",
    "make_base_geometric",
    "make_base_vector_geometric",
    "make_constant_time_base_geometric",
    "make_constant_time_base_vector_geometric",
    "make_base_stability",
    "make_shuffle_amplification",
    "make_chain_tt",
    "make_chain_mt",
    "make_chain_pm",
    "make_sequential_composition",
    "transformation_invoke",
    "transformation_check",
    "measurement_invoke",
    "measurement_check",
];

/// Library-wide settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Seed for the noise source; fresh entropy when absent.
    pub seed: Option<u64>,
    /// Caps for calibration searches run through this library.
    pub search: SearchConfig,
}

impl LibraryConfig {
    /// Fix the noise seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the calibration caps.
    pub fn with_search(mut self, search: SearchConfig) -> Self {
        self.search = search;
        self
    }

    /// Load from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|err| DpError::native(format!("invalid library config: {}", err)))
    }
}

/// One positional argument of a library call.
#[derive(Debug)]
pub enum Arg {
    /// A type argument, by descriptor name.
    Type(String),
    /// A value handle.
    Object(AnyObject),
    /// A double passed by value.
    F64(f64),
    /// A count or length passed by value.
    Usize(usize),
    /// A string passed by value.
    Str(String),
    /// An absent optional argument.
    Null,
    /// A transformation handle.
    Transformation(AnyTransformation),
    /// A measurement handle.
    Measurement(AnyMeasurement),
}

impl Arg {
    fn kind_name(&self) -> &'static str {
        match self {
            Arg::Type(_) => "type",
            Arg::Object(_) => "object",
            Arg::F64(_) => "f64",
            Arg::Usize(_) => "usize",
            Arg::Str(_) => "str",
            Arg::Null => "null",
            Arg::Transformation(_) => "transformation",
            Arg::Measurement(_) => "measurement",
        }
    }
}

/// What a library call returns.
#[derive(Debug)]
pub enum Native {
    /// A constructed or chained transformation.
    Transformation(AnyTransformation),
    /// A constructed, chained or composed measurement.
    Measurement(AnyMeasurement),
    /// The output of an invocation.
    Object(AnyObject),
    /// The answer of a relation check.
    Bool(bool),
}

impl Native {
    fn kind_name(&self) -> &'static str {
        match self {
            Native::Transformation(_) => "transformation",
            Native::Measurement(_) => "measurement",
            Native::Object(_) => "object",
            Native::Bool(_) => "bool",
        }
    }

    fn unexpected(&self, expected: &str) -> DpError {
        DpError::native(format!("expected {}, found {}", expected, self.kind_name()))
    }

    /// The transformation, if one was returned.
    pub fn into_transformation(self) -> Result<AnyTransformation> {
        match self {
            Native::Transformation(t) => Ok(t),
            other => Err(other.unexpected("transformation")),
        }
    }

    /// The measurement, if one was returned.
    pub fn into_measurement(self) -> Result<AnyMeasurement> {
        match self {
            Native::Measurement(m) => Ok(m),
            other => Err(other.unexpected("measurement")),
        }
    }

    /// The object, if one was returned.
    pub fn into_object(self) -> Result<AnyObject> {
        match self {
            Native::Object(o) => Ok(o),
            other => Err(other.unexpected("object")),
        }
    }

    /// The boolean, if one was returned.
    pub fn into_bool(self) -> Result<bool> {
        match self {
            Native::Bool(b) => Ok(b),
            other => Err(other.unexpected("bool")),
        }
    }
}

/// Positional argument reader for one call.
struct ArgList<'a> {
    operation: &'a str,
    args: std::vec::IntoIter<Arg>,
    position: usize,
}

impl<'a> ArgList<'a> {
    fn new(operation: &'a str, args: Vec<Arg>) -> Self {
        Self {
            operation,
            args: args.into_iter(),
            position: 0,
        }
    }

    fn next(&mut self) -> Result<Arg> {
        let arg = self.args.next().ok_or_else(|| {
            DpError::native(format!(
                "{}: missing argument {}",
                self.operation, self.position
            ))
        })?;
        self.position += 1;
        Ok(arg)
    }

    fn wrong(&self, expected: &str, found: &Arg) -> DpError {
        DpError::native(format!(
            "{}: argument {} should be {}, found {}",
            self.operation,
            self.position - 1,
            expected,
            found.kind_name()
        ))
    }

    fn descriptor(&mut self) -> Result<TypeDescriptor> {
        match self.next()? {
            Arg::Type(name) => TypeDescriptor::parse(&name),
            other => Err(self.wrong("a type name", &other)),
        }
    }

    fn primitive(&mut self) -> Result<Primitive> {
        self.descriptor()?.as_primitive()
    }

    fn object(&mut self) -> Result<AnyObject> {
        match self.next()? {
            Arg::Object(object) => Ok(object),
            other => Err(self.wrong("an object", &other)),
        }
    }

    fn optional_object(&mut self) -> Result<Option<AnyObject>> {
        match self.next()? {
            Arg::Object(object) => Ok(Some(object)),
            Arg::Null => Ok(None),
            other => Err(self.wrong("an object or null", &other)),
        }
    }

    fn f64(&mut self) -> Result<f64> {
        match self.next()? {
            Arg::F64(v) => Ok(v),
            other => Err(self.wrong("an f64", &other)),
        }
    }

    fn usize(&mut self) -> Result<usize> {
        match self.next()? {
            Arg::Usize(v) => Ok(v),
            other => Err(self.wrong("a usize", &other)),
        }
    }

    fn optional_str(&mut self) -> Result<Option<String>> {
        match self.next()? {
            Arg::Str(s) => Ok(Some(s)),
            Arg::Null => Ok(None),
            other => Err(self.wrong("a str or null", &other)),
        }
    }

    fn transformation(&mut self) -> Result<AnyTransformation> {
        match self.next()? {
            Arg::Transformation(t) => Ok(t),
            other => Err(self.wrong("a transformation", &other)),
        }
    }

    fn measurement(&mut self) -> Result<AnyMeasurement> {
        match self.next()? {
            Arg::Measurement(m) => Ok(m),
            other => Err(self.wrong("a measurement", &other)),
        }
    }

    fn remaining_measurements(&mut self) -> Result<Vec<AnyMeasurement>> {
        let mut measurements = Vec::new();
        while self.args.len() > 0 {
            measurements.push(self.measurement()?);
        }
        Ok(measurements)
    }

    fn finish(&self) -> Result<()> {
        match self.args.len() {
            0 => Ok(()),
            extra => Err(DpError::native(format!(
                "{}: {} unexpected trailing arguments",
                self.operation, extra
            ))),
        }
    }

    fn unsupported(&self, role: &str, family: &str, found: Primitive) -> DpError {
        DpError::type_mismatch(format!(
            "{}: {} must be {}, found {}",
            self.operation, role, family, found
        ))
    }
}

/// Explicit handle to the library of native operations.
#[derive(Clone)]
pub struct Library {
    config: LibraryConfig,
    source: NoiseSource,
}

impl fmt::Debug for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Library")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for Library {
    fn default() -> Self {
        Self::new(LibraryConfig::default())
    }
}

impl Library {
    /// Open a library with the given settings.
    pub fn new(config: LibraryConfig) -> Self {
        let source = config
            .seed
            .map_or_else(NoiseSource::from_entropy, NoiseSource::seeded);
        Self { config, source }
    }

    /// The library's settings.
    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    /// Run the named operation on positional arguments.
    pub fn call(&self, name: &str, args: Vec<Arg>) -> FfiResult<Native> {
        debug!(operation = name, args = args.len(), "library call");
        let mut args = ArgList::new(name, args);
        self.run(name, &mut args).into()
    }

    fn run(&self, name: &str, args: &mut ArgList<'_>) -> Result<Native> {
        match name {
            "make_split_lines" => {
                args.finish()?;
                Ok(Native::Transformation(make_split_lines().into_any()))
            }
            "make_split_dataframe" => self.split_dataframe(args),
            "make_select_column" => self.select_column(args),
            "make_cast_default" => {
                let toa = args.primitive()?;
                args.finish()?;
                Ok(Native::Transformation(
                    dispatch_primitive!(toa, TOA => make_cast_default::<TOA>().into_any()),
                ))
            }
            "make_clamp" => self.clamp(args),
            "make_bounded_sum" => self.bounded_sum(args),
            "make_sized_bounded_sum" => self.sized_bounded_sum(args),
            "make_count" => self.count(args),
            "make_count_distinct" => self.count_distinct(args),
            "make_count_by" => self.count_by(args),
            "make_base_laplace"
            | "make_base_vector_laplace"
            | "make_base_gaussian"
            | "make_base_vector_gaussian"
            | "make_base_gaussian_zcdp" => self.continuous_noise(name, args),
            "make_base_geometric" | "make_base_vector_geometric" => self.geometric(name, args),
            "make_constant_time_base_geometric" | "make_constant_time_base_vector_geometric" => {
                self.constant_time_geometric(name, args)
            }
            "make_base_stability" => self.stability(args),
            "make_shuffle_amplification" => self.shuffle_amplification(args),
            "make_chain_tt" => {
                let (first, second) = (args.transformation()?, args.transformation()?);
                args.finish()?;
                Ok(Native::Transformation(make_chain_tt(&first, &second)?))
            }
            "make_chain_mt" => {
                let (first, second) = (args.transformation()?, args.measurement()?);
                args.finish()?;
                Ok(Native::Measurement(make_chain_mt(&first, &second)?))
            }
            "make_chain_pm" => {
                let (first, second) = (args.measurement()?, args.transformation()?);
                args.finish()?;
                Ok(Native::Measurement(make_chain_pm(&first, &second)?))
            }
            "make_sequential_composition" => {
                let measurements = args.remaining_measurements()?;
                if measurements.len() < 2 {
                    return Err(DpError::native(format!(
                        "make_sequential_composition: needs at least two measurements, found {}",
                        measurements.len()
                    )));
                }
                Ok(Native::Measurement(product_into_any(
                    make_sequential_composition(&measurements)?,
                )?))
            }
            "transformation_invoke" => {
                let (step, arg) = (args.transformation()?, args.object()?);
                args.finish()?;
                ensure_member(&step.input_domain, &arg)?;
                Ok(Native::Object(step.invoke(&arg)?))
            }
            "measurement_invoke" => {
                let (step, arg) = (args.measurement()?, args.object()?);
                args.finish()?;
                ensure_member(&step.input_domain, &arg)?;
                Ok(Native::Object(step.invoke(&arg)?))
            }
            "transformation_check" => {
                let (step, d_in, d_out) = (args.transformation()?, args.object()?, args.object()?);
                args.finish()?;
                Ok(Native::Bool(step.check(&d_in, &d_out)?))
            }
            "measurement_check" => {
                let (step, d_in, d_out) = (args.measurement()?, args.object()?, args.object()?);
                args.finish()?;
                Ok(Native::Bool(step.check(&d_in, &d_out)?))
            }
            unknown => Err(DpError::native(format!("unknown operation {:?}", unknown))),
        }
    }

    fn split_dataframe(&self, args: &mut ArgList<'_>) -> Result<Native> {
        let separator = args.optional_str()?;
        let col_names = args.object()?;
        let k = args.primitive()?;
        args.finish()?;
        let t = dispatch_hashable!(k, K => {
            make_split_dataframe(separator.as_deref(), col_names.downcast::<Vec<K>>()?).into_any()
        }, else return Err(args.unsupported("K", "hashable", k)));
        Ok(Native::Transformation(t))
    }

    fn select_column(&self, args: &mut ArgList<'_>) -> Result<Native> {
        let key = args.object()?;
        let k = args.primitive()?;
        let toa = args.primitive()?;
        args.finish()?;
        if toa != Primitive::String {
            return Err(args.unsupported("TOA", "String", toa));
        }
        let t = dispatch_hashable!(k, K => make_select_column(key.downcast::<K>()?).into_any(),
            else return Err(args.unsupported("K", "hashable", k)));
        Ok(Native::Transformation(t))
    }

    fn clamp(&self, args: &mut ArgList<'_>) -> Result<Native> {
        let bounds = args.object()?;
        let t = args.primitive()?;
        args.finish()?;
        let clamp = dispatch_numeric!(t, T => {
            let (lower, upper) = bounds.downcast::<(T, T)>()?;
            make_clamp(lower, upper)?.into_any()
        }, else return Err(args.unsupported("T", "numeric", t)));
        Ok(Native::Transformation(clamp))
    }

    fn bounded_sum(&self, args: &mut ArgList<'_>) -> Result<Native> {
        let bounds = args.object()?;
        let t = args.primitive()?;
        args.finish()?;
        let sum = dispatch_numeric!(t, T => {
            let (lower, upper) = bounds.downcast::<(T, T)>()?;
            make_bounded_sum(lower, upper)?.into_any()
        }, else return Err(args.unsupported("T", "numeric", t)));
        Ok(Native::Transformation(sum))
    }

    fn sized_bounded_sum(&self, args: &mut ArgList<'_>) -> Result<Native> {
        let size = args.usize()?;
        let bounds = args.object()?;
        let t = args.primitive()?;
        args.finish()?;
        let sum = dispatch_numeric!(t, T => {
            let (lower, upper) = bounds.downcast::<(T, T)>()?;
            make_sized_bounded_sum(size, lower, upper)?.into_any()
        }, else return Err(args.unsupported("T", "numeric", t)));
        Ok(Native::Transformation(sum))
    }

    fn count(&self, args: &mut ArgList<'_>) -> Result<Native> {
        let tia = args.primitive()?;
        let to = args.primitive()?;
        args.finish()?;
        let count = dispatch_primitive!(tia, TIA => {
            dispatch_integer!(to, TO => make_count::<TIA, TO>().into_any(),
                else return Err(args.unsupported("TO", "an integer", to)))
        });
        Ok(Native::Transformation(count))
    }

    fn count_distinct(&self, args: &mut ArgList<'_>) -> Result<Native> {
        let tia = args.primitive()?;
        let to = args.primitive()?;
        args.finish()?;
        let count = dispatch_hashable!(tia, TIA => {
            dispatch_integer!(to, TO => make_count_distinct::<TIA, TO>().into_any(),
                else return Err(args.unsupported("TO", "an integer", to)))
        }, else return Err(args.unsupported("TIA", "hashable", tia)));
        Ok(Native::Transformation(count))
    }

    fn count_by(&self, args: &mut ArgList<'_>) -> Result<Native> {
        let tik = args.primitive()?;
        let toc = args.primitive()?;
        let qo = args.primitive()?;
        args.finish()?;
        let count = dispatch_hashable!(tik, TIK => {
            dispatch_integer!(toc, TOC => {
                dispatch_float!(qo, QO => make_count_by::<TIK, TOC, QO>().into_any(),
                    else return Err(args.unsupported("QO", "a float", qo)))
            }, else return Err(args.unsupported("TOC", "an integer", toc)))
        }, else return Err(args.unsupported("TIK", "hashable", tik)));
        Ok(Native::Transformation(count))
    }

    fn continuous_noise(&self, name: &str, args: &mut ArgList<'_>) -> Result<Native> {
        let scale = args.f64()?;
        let t = args.primitive()?;
        args.finish()?;
        let source = self.source.clone();
        let measurement = dispatch_float!(t, T => {
            let scale: T = cast(scale)?;
            match name {
                "make_base_laplace" => make_base_laplace_with(scale, source)?.into_any(),
                "make_base_vector_laplace" => {
                    make_base_vector_laplace_with(scale, source)?.into_any()
                }
                "make_base_gaussian" => make_base_gaussian_with(scale, source)?.into_any(),
                "make_base_vector_gaussian" => {
                    make_base_vector_gaussian_with(scale, source)?.into_any()
                }
                _ => make_base_gaussian_zcdp_with(scale, source)?.into_any(),
            }
        }, else return Err(args.unsupported("T", "a float", t)));
        Ok(Native::Measurement(measurement))
    }

    fn geometric(&self, name: &str, args: &mut ArgList<'_>) -> Result<Native> {
        let scale = args.f64()?;
        let bounds = args.optional_object()?;
        let t = args.primitive()?;
        let qo = args.primitive()?;
        args.finish()?;
        let source = self.source.clone();
        let measurement = dispatch_integer!(t, T => {
            dispatch_float!(qo, QO => {
                let bounds = bounds.map(|b| b.downcast::<(T, T)>()).transpose()?;
                let scale: QO = cast(scale)?;
                if name == "make_base_vector_geometric" {
                    make_base_vector_geometric_with::<T, QO>(scale, bounds, source)?.into_any()
                } else {
                    make_base_geometric_with::<T, QO>(scale, bounds, source)?.into_any()
                }
            }, else return Err(args.unsupported("QO", "a float", qo)))
        }, else return Err(args.unsupported("T", "an integer", t)));
        Ok(Native::Measurement(measurement))
    }

    fn constant_time_geometric(&self, name: &str, args: &mut ArgList<'_>) -> Result<Native> {
        let scale = args.f64()?;
        let (lower, upper) = (args.object()?, args.object()?);
        let t = args.primitive()?;
        let qo = args.primitive()?;
        args.finish()?;
        let source = self.source.clone();
        let measurement = dispatch_integer!(t, T => {
            dispatch_float!(qo, QO => {
                let (lower, upper) = (lower.downcast::<T>()?, upper.downcast::<T>()?);
                let scale: QO = cast(scale)?;
                if name == "make_constant_time_base_vector_geometric" {
                    make_constant_time_base_vector_geometric_with::<T, QO>(scale, lower, upper, source)?
                        .into_any()
                } else {
                    make_constant_time_base_geometric_with::<T, QO>(scale, lower, upper, source)?
                        .into_any()
                }
            }, else return Err(args.unsupported("QO", "a float", qo)))
        }, else return Err(args.unsupported("T", "an integer", t)));
        Ok(Native::Measurement(measurement))
    }

    fn stability(&self, args: &mut ArgList<'_>) -> Result<Native> {
        let n = args.usize()?;
        let (scale, threshold) = (args.f64()?, args.f64()?);
        let tik = args.primitive()?;
        let tic = args.primitive()?;
        let q = args.primitive()?;
        args.finish()?;
        let source = self.source.clone();
        let measurement = dispatch_hashable!(tik, TIK => {
            dispatch_integer!(tic, TIC => {
                dispatch_float!(q, Q => {
                    make_base_stability_with::<TIK, TIC, Q>(n, cast(scale)?, cast(threshold)?, source)?
                        .into_any()
                }, else return Err(args.unsupported("Q", "a float", q)))
            }, else return Err(args.unsupported("TIC", "an integer", tic)))
        }, else return Err(args.unsupported("TIK", "hashable", tik)));
        Ok(Native::Measurement(measurement))
    }

    fn shuffle_amplification(&self, args: &mut ArgList<'_>) -> Result<Native> {
        let (step_epsilon, step_delta) = (args.f64()?, args.f64()?);
        let num_steps = args.usize()?;
        let t = args.primitive()?;
        args.finish()?;
        let source = self.source.clone();
        let measurement = dispatch_primitive!(t, T => {
            make_shuffle_amplification_with::<T>(step_epsilon, step_delta, num_steps, source)?
                .into_any()
        });
        Ok(Native::Measurement(measurement))
    }
}

fn ensure_member<D: Domain>(domain: &D, arg: &D::Carrier) -> Result<()> {
    if domain.member(arg)? {
        Ok(())
    } else {
        Err(DpError::domain_mismatch(format!(
            "argument is not a member of {:?}",
            domain
        )))
    }
}
