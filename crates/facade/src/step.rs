//! Host-facing steps: erased transformations and measurements bound to the
//! library that built them.

use std::ops::Shr;

use dp_chain_bridge::{
    from_native, to_native, AnyMeasurement, AnyTransformation, Arg, Library, Native,
    TypeDescriptor, Value,
};
use dp_chain_core::{DpError, Relate, Result};

/// Which kind of step a [`Step`] holds.
#[derive(Clone, Debug)]
pub enum StepKind {
    /// Deterministic, with a stability relation.
    Transformation(AnyTransformation),
    /// Randomized, with a privacy relation.
    Measurement(AnyMeasurement),
}

/// A transformation or measurement over host values.
///
/// Inputs and distance bounds are converted against the step's declared
/// carrier and distance types before every call, and outputs are converted
/// back. Chaining with `>>` goes through the same library.
#[derive(Clone, Debug)]
pub struct Step {
    kind: StepKind,
    library: Library,
}

fn as_domain_error(err: DpError) -> DpError {
    DpError::domain_mismatch(err.message())
}

impl Step {
    /// Wrap an erased transformation.
    pub fn from_transformation(library: &Library, transformation: AnyTransformation) -> Self {
        Self {
            kind: StepKind::Transformation(transformation),
            library: library.clone(),
        }
    }

    /// Wrap an erased measurement.
    pub fn from_measurement(library: &Library, measurement: AnyMeasurement) -> Self {
        Self {
            kind: StepKind::Measurement(measurement),
            library: library.clone(),
        }
    }

    /// Wrap whatever step a library call returned.
    pub(crate) fn from_output(library: &Library, native: Native) -> Result<Self> {
        match native {
            Native::Transformation(t) => Ok(Self::from_transformation(library, t)),
            other => Ok(Self::from_measurement(library, other.into_measurement()?)),
        }
    }

    /// The wrapped step.
    pub fn kind(&self) -> &StepKind {
        &self.kind
    }

    /// Whether the step is randomized.
    pub fn is_measurement(&self) -> bool {
        matches!(self.kind, StepKind::Measurement(_))
    }

    /// The library the step calls into.
    pub fn library(&self) -> &Library {
        &self.library
    }

    /// Type of accepted inputs.
    pub fn input_carrier(&self) -> &TypeDescriptor {
        match &self.kind {
            StepKind::Transformation(t) => t.input_domain.carrier(),
            StepKind::Measurement(m) => m.input_domain.carrier(),
        }
    }

    /// Type of produced outputs.
    pub fn output_carrier(&self) -> &TypeDescriptor {
        match &self.kind {
            StepKind::Transformation(t) => t.output_domain.carrier(),
            StepKind::Measurement(m) => m.output_domain.carrier(),
        }
    }

    /// Types of the `(d_in, d_out)` bounds accepted by [`Step::check`].
    pub fn distance_types(&self) -> (&TypeDescriptor, &TypeDescriptor) {
        match &self.kind {
            StepKind::Transformation(t) => (
                t.input_metric.distance_type(),
                t.output_metric.distance_type(),
            ),
            StepKind::Measurement(m) => (
                m.input_metric.distance_type(),
                m.output_measure.distance_type(),
            ),
        }
    }

    pub(crate) fn to_arg(&self) -> Arg {
        match &self.kind {
            StepKind::Transformation(t) => Arg::Transformation(t.clone()),
            StepKind::Measurement(m) => Arg::Measurement(m.clone()),
        }
    }

    fn call(&self, name: &str, args: Vec<Arg>) -> Result<Native> {
        self.library.call(name, args).unwrap()
    }

    /// Run the step on a host value.
    pub fn invoke(&self, arg: &Value) -> Result<Value> {
        let arg = to_native(arg, self.input_carrier())?;
        let name = if self.is_measurement() {
            "measurement_invoke"
        } else {
            "transformation_invoke"
        };
        let output = self
            .call(name, vec![self.to_arg(), Arg::Object(arg)])?
            .into_object()?;
        from_native(&output)
    }

    /// Whether inputs `d_in` apart always produce outputs within `d_out`.
    ///
    /// Bounds that do not convert to the declared distance types are domain
    /// errors.
    pub fn check(&self, d_in: &Value, d_out: &Value) -> Result<bool> {
        let (in_type, out_type) = self.distance_types();
        let d_in = to_native(d_in, in_type).map_err(as_domain_error)?;
        let d_out = to_native(d_out, out_type).map_err(as_domain_error)?;
        let name = if self.is_measurement() {
            "measurement_check"
        } else {
            "transformation_check"
        };
        self.call(
            name,
            vec![self.to_arg(), Arg::Object(d_in), Arg::Object(d_out)],
        )?
        .into_bool()
    }

    /// Run `self`, then `next`.
    ///
    /// Two measurements cannot be chained; compose them instead.
    pub fn chain(&self, next: &Step) -> Result<Step> {
        let name = match (&self.kind, &next.kind) {
            (StepKind::Transformation(_), StepKind::Transformation(_)) => "make_chain_tt",
            (StepKind::Transformation(_), StepKind::Measurement(_)) => "make_chain_mt",
            (StepKind::Measurement(_), StepKind::Transformation(_)) => "make_chain_pm",
            (StepKind::Measurement(_), StepKind::Measurement(_)) => {
                return Err(DpError::metric_mismatch(
                    "a measurement cannot follow a measurement; use sequential composition",
                ))
            }
        };
        let native = self.call(name, vec![self.to_arg(), next.to_arg()])?;
        Step::from_output(&self.library, native)
    }
}

impl Relate for Step {
    type InputDistance = Value;
    type OutputDistance = Value;

    fn check(&self, d_in: &Value, d_out: &Value) -> Result<bool> {
        Step::check(self, d_in, d_out)
    }
}

impl Shr<Step> for Step {
    type Output = Result<Step>;

    fn shr(self, rhs: Step) -> Result<Step> {
        self.chain(&rhs)
    }
}

impl Shr<Step> for Result<Step> {
    type Output = Result<Step>;

    fn shr(self, rhs: Step) -> Result<Step> {
        self?.chain(&rhs)
    }
}
