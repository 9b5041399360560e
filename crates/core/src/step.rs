//! Transformations and measurements: functions paired with the domains they
//! act on and a relation bounding how far their outputs can move.

use std::fmt::{self, Debug};
use std::rc::Rc;

use crate::domain::Domain;
use crate::error::Result;
use crate::metric::{Measure, Metric};
use crate::relation::{PrivacyRelation, StabilityRelation};

/// A fallible function between carrier types.
pub struct Function<TI, TO> {
    function: Rc<dyn Fn(&TI) -> Result<TO>>,
}

impl<TI, TO> Clone for Function<TI, TO> {
    fn clone(&self) -> Self {
        Self {
            function: self.function.clone(),
        }
    }
}

impl<TI, TO> Debug for Function<TI, TO> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Function({} -> {})",
            std::any::type_name::<TI>(),
            std::any::type_name::<TO>()
        )
    }
}

impl<TI: 'static, TO: 'static> Function<TI, TO> {
    /// Wrap a fallible closure.
    pub fn new_fallible(function: impl Fn(&TI) -> Result<TO> + 'static) -> Self {
        Self {
            function: Rc::new(function),
        }
    }

    /// Wrap a closure that cannot fail.
    pub fn new(function: impl Fn(&TI) -> TO + 'static) -> Self {
        Self::new_fallible(move |arg| Ok(function(arg)))
    }

    /// Apply the function.
    pub fn eval(&self, arg: &TI) -> Result<TO> {
        (self.function)(arg)
    }

    /// `x -> second(first(x))`.
    pub fn make_chain<TX: 'static>(first: &Function<TI, TX>, second: &Function<TX, TO>) -> Self {
        let first = first.function.clone();
        let second = second.function.clone();
        Self::new_fallible(move |arg| second(&first(arg)?))
    }
}

/// Something that can be asked whether a `(d_in, d_out)` bound holds.
pub trait Relate {
    /// Type of the input distance bound.
    type InputDistance;
    /// Type of the output distance (or privacy loss) bound.
    type OutputDistance;

    /// Whether inputs `d_in` apart always produce outputs within `d_out`.
    fn check(&self, d_in: &Self::InputDistance, d_out: &Self::OutputDistance) -> Result<bool>;
}

/// A deterministic, stable function between domains.
#[derive(Debug)]
pub struct Transformation<DI: Domain, DO: Domain, MI: Metric, MO: Metric> {
    /// Accepted inputs.
    pub input_domain: DI,
    /// Produced outputs.
    pub output_domain: DO,
    /// The computation.
    pub function: Function<DI::Carrier, DO::Carrier>,
    /// Distance between inputs.
    pub input_metric: MI,
    /// Distance between outputs.
    pub output_metric: MO,
    /// Bound on output distance given input distance.
    pub stability_relation: StabilityRelation<MI, MO>,
}

// Carriers need not be `Clone`: the function is shared, not copied.
impl<DI: Domain, DO: Domain, MI: Metric, MO: Metric> Clone for Transformation<DI, DO, MI, MO> {
    fn clone(&self) -> Self {
        Self {
            input_domain: self.input_domain.clone(),
            output_domain: self.output_domain.clone(),
            function: self.function.clone(),
            input_metric: self.input_metric.clone(),
            output_metric: self.output_metric.clone(),
            stability_relation: self.stability_relation.clone(),
        }
    }
}

impl<DI: Domain, DO: Domain, MI: Metric, MO: Metric> Transformation<DI, DO, MI, MO>
where
    DI::Carrier: 'static,
    DO::Carrier: 'static,
    MI::Distance: 'static,
    MO::Distance: 'static,
{
    /// Assemble a transformation from its parts.
    pub fn new(
        input_domain: DI,
        output_domain: DO,
        function: Function<DI::Carrier, DO::Carrier>,
        input_metric: MI,
        output_metric: MO,
        stability_relation: StabilityRelation<MI, MO>,
    ) -> Self {
        Self {
            input_domain,
            output_domain,
            function,
            input_metric,
            output_metric,
            stability_relation,
        }
    }

    /// Run the function.
    pub fn invoke(&self, arg: &DI::Carrier) -> Result<DO::Carrier> {
        self.function.eval(arg)
    }

    /// Evaluate the stability relation on validated bounds.
    pub fn check(&self, d_in: &MI::Distance, d_out: &MO::Distance) -> Result<bool> {
        self.input_metric.validate_distance(d_in)?;
        self.output_metric.validate_distance(d_out)?;
        self.stability_relation.eval(d_in, d_out)
    }
}

impl<DI: Domain, DO: Domain, MI: Metric, MO: Metric> Relate for Transformation<DI, DO, MI, MO>
where
    DI::Carrier: 'static,
    DO::Carrier: 'static,
    MI::Distance: 'static,
    MO::Distance: 'static,
{
    type InputDistance = MI::Distance;
    type OutputDistance = MO::Distance;

    fn check(&self, d_in: &MI::Distance, d_out: &MO::Distance) -> Result<bool> {
        Transformation::check(self, d_in, d_out)
    }
}

/// A randomized, private function between domains.
#[derive(Debug)]
pub struct Measurement<DI: Domain, DO: Domain, MI: Metric, MO: Measure> {
    /// Accepted inputs.
    pub input_domain: DI,
    /// Produced outputs.
    pub output_domain: DO,
    /// The randomized computation.
    pub function: Function<DI::Carrier, DO::Carrier>,
    /// Distance between inputs.
    pub input_metric: MI,
    /// Divergence between output distributions.
    pub output_measure: MO,
    /// Bound on privacy loss given input distance.
    pub privacy_relation: PrivacyRelation<MI, MO>,
}

impl<DI: Domain, DO: Domain, MI: Metric, MO: Measure> Clone for Measurement<DI, DO, MI, MO> {
    fn clone(&self) -> Self {
        Self {
            input_domain: self.input_domain.clone(),
            output_domain: self.output_domain.clone(),
            function: self.function.clone(),
            input_metric: self.input_metric.clone(),
            output_measure: self.output_measure.clone(),
            privacy_relation: self.privacy_relation.clone(),
        }
    }
}

impl<DI: Domain, DO: Domain, MI: Metric, MO: Measure> Measurement<DI, DO, MI, MO>
where
    DI::Carrier: 'static,
    DO::Carrier: 'static,
    MI::Distance: 'static,
    MO::Distance: 'static,
{
    /// Assemble a measurement from its parts.
    pub fn new(
        input_domain: DI,
        output_domain: DO,
        function: Function<DI::Carrier, DO::Carrier>,
        input_metric: MI,
        output_measure: MO,
        privacy_relation: PrivacyRelation<MI, MO>,
    ) -> Self {
        Self {
            input_domain,
            output_domain,
            function,
            input_metric,
            output_measure,
            privacy_relation,
        }
    }

    /// Release a randomized output.
    pub fn invoke(&self, arg: &DI::Carrier) -> Result<DO::Carrier> {
        self.function.eval(arg)
    }

    /// Evaluate the privacy relation on validated bounds.
    pub fn check(&self, d_in: &MI::Distance, d_out: &MO::Distance) -> Result<bool> {
        self.input_metric.validate_distance(d_in)?;
        self.output_measure.validate_distance(d_out)?;
        self.privacy_relation.eval(d_in, d_out)
    }
}

impl<DI: Domain, DO: Domain, MI: Metric, MO: Measure> Relate for Measurement<DI, DO, MI, MO>
where
    DI::Carrier: 'static,
    DO::Carrier: 'static,
    MI::Distance: 'static,
    MO::Distance: 'static,
{
    type InputDistance = MI::Distance;
    type OutputDistance = MO::Distance;

    fn check(&self, d_in: &MI::Distance, d_out: &MO::Distance) -> Result<bool> {
        Measurement::check(self, d_in, d_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AllDomain;
    use crate::error::ErrorKind;
    use crate::metric::AbsoluteDistance;
    use crate::relation::Relation;

    fn doubler() -> Transformation<
        AllDomain<i32>,
        AllDomain<i32>,
        AbsoluteDistance<i32>,
        AbsoluteDistance<i32>,
    > {
        Transformation::new(
            AllDomain::new(),
            AllDomain::new(),
            Function::new(|x: &i32| x * 2),
            AbsoluteDistance::new(),
            AbsoluteDistance::new(),
            Relation::new_from_constant(2),
        )
    }

    #[test]
    fn function_chain_applies_in_order() {
        let add = Function::new(|x: &i32| x + 1);
        let square = Function::new(|x: &i32| x * x);
        let chained = Function::make_chain(&add, &square);
        assert_eq!(chained.eval(&2).unwrap(), 9);
    }

    #[test]
    fn transformation_invokes_and_checks() {
        let t = doubler();
        assert_eq!(t.invoke(&21).unwrap(), 42);
        assert!(t.check(&1, &2).unwrap());
        assert!(!t.check(&1, &1).unwrap());
    }

    #[test]
    fn negative_bounds_are_domain_errors() {
        let t = doubler();
        let err = t.check(&-1, &2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DomainMismatch);
    }

    struct Opaque(i32);

    #[test]
    fn steps_over_uncloneable_carriers_clone() {
        let extract = Transformation::new(
            AllDomain::<Opaque>::new(),
            AllDomain::<i32>::new(),
            Function::new(|x: &Opaque| x.0),
            AbsoluteDistance::<i32>::new(),
            AbsoluteDistance::<i32>::new(),
            Relation::new_from_constant(1),
        );
        let copy = extract.clone();
        assert_eq!(copy.invoke(&Opaque(7)).unwrap(), 7);
        assert!(copy.check(&1, &1).unwrap());
    }
}
