//! Type-erased handles for values, domains, metrics, measures and steps.
//!
//! Every erased item remembers enough of its concrete type to recover it:
//! objects keep a descriptor and an export routine, and domains, metrics and
//! measures keep monomorphized equality, membership and distance routines
//! captured when they were erased. Steps over erased parts are ordinary
//! [`Transformation`]s and [`Measurement`]s, so chaining and composition work
//! on them unchanged.

use std::any::{type_name, Any};
use std::fmt::{self, Debug};
use std::rc::Rc;

use dp_chain_core::{
    BackwardMap, DistanceSearch, Domain, DpError, ForwardMap, Function, Measure, Measurement,
    Metric, ProductDomain, Relation, Result, Transformation,
};

use crate::convert::{to_native, HostValue};
use crate::typing::{NativeType, TypeDescriptor};
use crate::value::Value;

type ExportGlue = fn(&dyn Any) -> Result<Value>;

/// A native value whose type is known only at run time.
pub struct AnyObject {
    descriptor: TypeDescriptor,
    value: Box<dyn Any>,
    export_glue: ExportGlue,
}

fn export<T: HostValue>(value: &dyn Any) -> Result<Value> {
    value
        .downcast_ref::<T>()
        .map(T::to_value)
        .ok_or_else(|| DpError::type_mismatch(format!("object is not a {}", T::descriptor())))
}

fn export_tuple(value: &dyn Any) -> Result<Value> {
    let elements = value
        .downcast_ref::<Vec<AnyObject>>()
        .ok_or_else(|| DpError::type_mismatch("object is not a tuple"))?;
    Ok(Value::Tuple(
        elements
            .iter()
            .map(AnyObject::to_value)
            .collect::<Result<_>>()?,
    ))
}

impl AnyObject {
    /// Erase a native value.
    pub fn new<T: HostValue>(value: T) -> Self {
        Self {
            descriptor: T::descriptor(),
            value: Box::new(value),
            export_glue: export::<T>,
        }
    }

    /// A tuple of erased values.
    ///
    /// A pair of one primitive type is stored as a native `(T, T)`, the same
    /// layout [`to_native`](crate::convert::to_native) gives it; other tuples
    /// hold one handle per element.
    pub fn tuple(elements: Vec<AnyObject>) -> Result<Self> {
        if elements.len() < 2 {
            return Err(DpError::type_mismatch(format!(
                "tuples need at least two elements, found {}",
                elements.len()
            )));
        }
        let pair_primitive = match elements.as_slice() {
            [a, b] => match (&a.descriptor, &b.descriptor) {
                (TypeDescriptor::Primitive(p), TypeDescriptor::Primitive(q)) if p == q => Some(*p),
                _ => None,
            },
            _ => None,
        };
        if let Some(p) = pair_primitive {
            let mut elements = elements.into_iter();
            let (a, b) = match (elements.next(), elements.next()) {
                (Some(a), Some(b)) => (a, b),
                _ => return Err(DpError::type_mismatch("pair lost an element")),
            };
            return dispatch_primitive!(p, T => Ok(AnyObject::new((a.downcast::<T>()?, b.downcast::<T>()?))));
        }
        Ok(Self {
            descriptor: TypeDescriptor::Tuple(
                elements.iter().map(|e| e.descriptor.clone()).collect(),
            ),
            value: Box::new(elements),
            export_glue: export_tuple,
        })
    }

    /// The value's type.
    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    /// Recover the native value.
    pub fn downcast<T: 'static>(self) -> Result<T> {
        let Self {
            descriptor, value, ..
        } = self;
        value.downcast::<T>().map(|boxed| *boxed).map_err(|_| {
            DpError::type_mismatch(format!(
                "expected {}, found {}",
                type_name::<T>(),
                descriptor
            ))
        })
    }

    /// Borrow the native value.
    pub fn downcast_ref<T: 'static>(&self) -> Result<&T> {
        self.value.downcast_ref::<T>().ok_or_else(|| {
            DpError::type_mismatch(format!(
                "expected {}, found {}",
                type_name::<T>(),
                self.descriptor
            ))
        })
    }

    /// Export to a host value.
    pub fn to_value(&self) -> Result<Value> {
        (self.export_glue)(self.value.as_ref())
    }

    /// Fresh handles for the elements of a tuple, whatever its layout.
    pub fn tuple_elements(&self) -> Result<Vec<AnyObject>> {
        let (TypeDescriptor::Tuple(elements), Value::Tuple(items)) =
            (&self.descriptor, self.to_value()?)
        else {
            return Err(DpError::type_mismatch(format!(
                "expected a tuple, found {}",
                self.descriptor
            )));
        };
        items
            .iter()
            .zip(elements)
            .map(|(item, element)| to_native(item, element))
            .collect()
    }
}

impl Debug for AnyObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AnyObject({})", self.descriptor)
    }
}

/// Distances are validated against the metric's own type, so a handle of
/// the wrong type is a domain error rather than a conversion error.
fn distance_ref<Q: 'static>(distance: &AnyObject) -> Result<&Q> {
    distance
        .downcast_ref::<Q>()
        .map_err(|err| DpError::domain_mismatch(err.message()))
}

/// A concrete descriptor object with its equality and formatting.
#[derive(Clone)]
struct Erased {
    value: Rc<dyn Any>,
    eq_glue: fn(&dyn Any, &dyn Any) -> bool,
    debug_glue: fn(&dyn Any, &mut fmt::Formatter<'_>) -> fmt::Result,
}

fn eq_erased<T: PartialEq + 'static>(a: &dyn Any, b: &dyn Any) -> bool {
    match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn debug_erased<T: Debug + 'static>(value: &dyn Any, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match value.downcast_ref::<T>() {
        Some(value) => value.fmt(f),
        None => f.write_str("?"),
    }
}

impl Erased {
    fn new<T: PartialEq + Debug + 'static>(value: T) -> Self {
        Self {
            value: Rc::new(value),
            eq_glue: eq_erased::<T>,
            debug_glue: debug_erased::<T>,
        }
    }
}

impl PartialEq for Erased {
    fn eq(&self, other: &Self) -> bool {
        (self.eq_glue)(self.value.as_ref(), other.value.as_ref())
    }
}

impl Debug for Erased {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (self.debug_glue)(self.value.as_ref(), f)
    }
}

/// A domain whose carrier type is known only at run time.
#[derive(Clone)]
pub struct AnyDomain {
    domain: Erased,
    carrier: TypeDescriptor,
    member_glue: Rc<dyn Fn(&AnyObject) -> Result<bool>>,
}

impl AnyDomain {
    /// Erase a domain.
    pub fn new<D>(domain: D) -> Self
    where
        D: Domain + 'static,
        D::Carrier: NativeType,
    {
        Self::new_with_carrier(domain, D::Carrier::descriptor())
    }

    /// Erase a domain whose members are stored under a different descriptor.
    pub fn new_with_carrier<D>(domain: D, carrier: TypeDescriptor) -> Self
    where
        D: Domain + 'static,
        D::Carrier: 'static,
    {
        let member_domain = domain.clone();
        Self {
            domain: Erased::new(domain),
            carrier,
            member_glue: Rc::new(move |value: &AnyObject| {
                member_domain.member(value.downcast_ref::<D::Carrier>()?)
            }),
        }
    }

    /// Erase the output domain of a composition, whose members are tuples
    /// built by [`AnyObject::tuple`].
    pub fn new_product(domain: ProductDomain<AnyDomain>) -> Self {
        let carrier = TypeDescriptor::Tuple(
            domain
                .factors
                .iter()
                .map(|factor| factor.carrier().clone())
                .collect(),
        );
        let member_domain = domain.clone();
        let member_carrier = carrier.clone();
        Self {
            domain: Erased::new(domain),
            carrier,
            member_glue: Rc::new(move |value: &AnyObject| {
                if value.descriptor() != &member_carrier {
                    return Ok(false);
                }
                member_domain.member(&value.tuple_elements()?)
            }),
        }
    }

    /// Type of the members.
    pub fn carrier(&self) -> &TypeDescriptor {
        &self.carrier
    }
}

impl PartialEq for AnyDomain {
    fn eq(&self, other: &Self) -> bool {
        self.carrier == other.carrier && self.domain == other.domain
    }
}

impl Debug for AnyDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AnyDomain({:?})", self.domain)
    }
}

impl Domain for AnyDomain {
    type Carrier = AnyObject;

    fn member(&self, value: &AnyObject) -> Result<bool> {
        (self.member_glue)(value)
    }
}

/// A metric whose distance type is known only at run time.
#[derive(Clone)]
pub struct AnyMetric {
    metric: Erased,
    distance_type: TypeDescriptor,
    validate_glue: Rc<dyn Fn(&AnyObject) -> Result<()>>,
    search: Option<DistanceSearch<AnyObject>>,
}

impl AnyMetric {
    /// Erase a metric.
    pub fn new<M>(metric: M) -> Self
    where
        M: Metric + 'static,
        M::Distance: HostValue + Clone,
    {
        let search = metric.distance_search().map(|inner| {
            DistanceSearch::new(
                move |predicate: &dyn Fn(&AnyObject) -> Result<bool>| {
                    let found = inner.smallest_passing(&|d: &M::Distance| {
                        predicate(&AnyObject::new(d.clone()))
                    })?;
                    Ok(found.map(AnyObject::new))
                },
            )
        });
        let validator = metric.clone();
        Self {
            metric: Erased::new(metric),
            distance_type: M::Distance::descriptor(),
            validate_glue: Rc::new(move |d: &AnyObject| {
                validator.validate_distance(distance_ref::<M::Distance>(d)?)
            }),
            search,
        }
    }

    /// Type of a distance bound.
    pub fn distance_type(&self) -> &TypeDescriptor {
        &self.distance_type
    }
}

impl PartialEq for AnyMetric {
    fn eq(&self, other: &Self) -> bool {
        self.distance_type == other.distance_type && self.metric == other.metric
    }
}

impl Debug for AnyMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AnyMetric({:?})", self.metric)
    }
}

impl Metric for AnyMetric {
    type Distance = AnyObject;

    fn validate_distance(&self, distance: &AnyObject) -> Result<()> {
        (self.validate_glue)(distance)
    }

    fn distance_search(&self) -> Option<DistanceSearch<AnyObject>> {
        self.search.clone()
    }
}

/// A privacy measure whose distance type is known only at run time.
#[derive(Clone)]
pub struct AnyMeasure {
    measure: Erased,
    distance_type: TypeDescriptor,
    validate_glue: Rc<dyn Fn(&AnyObject) -> Result<()>>,
    within_glue: Rc<dyn Fn(&AnyObject, &AnyObject) -> Result<bool>>,
    compose_glue: Rc<dyn Fn(&[AnyObject]) -> Result<AnyObject>>,
}

impl AnyMeasure {
    /// Erase a measure.
    pub fn new<M>(measure: M) -> Self
    where
        M: Measure + 'static,
        M::Distance: HostValue + Clone,
    {
        let (validator, judge, composer) = (measure.clone(), measure.clone(), measure.clone());
        Self {
            measure: Erased::new(measure),
            distance_type: M::Distance::descriptor(),
            validate_glue: Rc::new(move |d: &AnyObject| {
                validator.validate_distance(distance_ref::<M::Distance>(d)?)
            }),
            within_glue: Rc::new(move |used: &AnyObject, budget: &AnyObject| {
                judge.within(
                    distance_ref::<M::Distance>(used)?,
                    distance_ref::<M::Distance>(budget)?,
                )
            }),
            compose_glue: Rc::new(move |parts: &[AnyObject]| {
                let parts = parts
                    .iter()
                    .map(|part| distance_ref::<M::Distance>(part).map(Clone::clone))
                    .collect::<Result<Vec<_>>>()?;
                Ok(AnyObject::new(composer.compose(&parts)?))
            }),
        }
    }

    /// Type of a privacy loss bound.
    pub fn distance_type(&self) -> &TypeDescriptor {
        &self.distance_type
    }
}

impl PartialEq for AnyMeasure {
    fn eq(&self, other: &Self) -> bool {
        self.distance_type == other.distance_type && self.measure == other.measure
    }
}

impl Debug for AnyMeasure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AnyMeasure({:?})", self.measure)
    }
}

impl Measure for AnyMeasure {
    type Distance = AnyObject;

    fn validate_distance(&self, distance: &AnyObject) -> Result<()> {
        (self.validate_glue)(distance)
    }

    fn within(&self, used: &AnyObject, budget: &AnyObject) -> Result<bool> {
        (self.within_glue)(used, budget)
    }

    fn compose(&self, parts: &[AnyObject]) -> Result<AnyObject> {
        (self.compose_glue)(parts)
    }
}

/// A transformation between erased domains and metrics.
pub type AnyTransformation = Transformation<AnyDomain, AnyDomain, AnyMetric, AnyMetric>;

/// A measurement between erased domains, metric and measure.
pub type AnyMeasurement = Measurement<AnyDomain, AnyDomain, AnyMetric, AnyMeasure>;

fn erase_function<TI, TO>(function: Function<TI, TO>) -> Function<AnyObject, AnyObject>
where
    TI: 'static,
    TO: HostValue,
{
    Function::new_fallible(move |arg: &AnyObject| {
        Ok(AnyObject::new(function.eval(arg.downcast_ref::<TI>()?)?))
    })
}

fn erase_relation<QI, QO>(relation: Relation<QI, QO>) -> Relation<AnyObject, AnyObject>
where
    QI: HostValue,
    QO: HostValue,
{
    let forward_map = relation.forward_map().map(|forward| -> ForwardMap<AnyObject, AnyObject> {
        Rc::new(move |d_in: &AnyObject| Ok(AnyObject::new(forward(distance_ref::<QI>(d_in)?)?)))
    });
    let backward_map = relation.backward_map().map(|backward| -> BackwardMap<AnyObject, AnyObject> {
        Rc::new(move |d_out: &AnyObject| {
            Ok(AnyObject::new(backward(distance_ref::<QO>(d_out)?)?))
        })
    });
    Relation::new_all(
        move |d_in: &AnyObject, d_out: &AnyObject| {
            relation.eval(distance_ref::<QI>(d_in)?, distance_ref::<QO>(d_out)?)
        },
        forward_map,
        backward_map,
    )
}

/// Erase a typed transformation.
pub trait IntoAnyTransformationExt {
    /// The transformation over erased parts.
    fn into_any(self) -> AnyTransformation;
}

impl<DI, DO, MI, MO> IntoAnyTransformationExt for Transformation<DI, DO, MI, MO>
where
    DI: Domain + 'static,
    DO: Domain + 'static,
    MI: Metric + 'static,
    MO: Metric + 'static,
    DI::Carrier: NativeType,
    DO::Carrier: HostValue,
    MI::Distance: HostValue + Clone,
    MO::Distance: HostValue + Clone,
{
    fn into_any(self) -> AnyTransformation {
        Transformation::new(
            AnyDomain::new(self.input_domain),
            AnyDomain::new(self.output_domain),
            erase_function(self.function),
            AnyMetric::new(self.input_metric),
            AnyMetric::new(self.output_metric),
            erase_relation(self.stability_relation),
        )
    }
}

/// Erase a typed measurement.
pub trait IntoAnyMeasurementExt {
    /// The measurement over erased parts.
    fn into_any(self) -> AnyMeasurement;
}

impl<DI, DO, MI, MO> IntoAnyMeasurementExt for Measurement<DI, DO, MI, MO>
where
    DI: Domain + 'static,
    DO: Domain + 'static,
    MI: Metric + 'static,
    MO: Measure + 'static,
    DI::Carrier: NativeType,
    DO::Carrier: HostValue,
    MI::Distance: HostValue + Clone,
    MO::Distance: HostValue + Clone,
{
    fn into_any(self) -> AnyMeasurement {
        Measurement::new(
            AnyDomain::new(self.input_domain),
            AnyDomain::new(self.output_domain),
            erase_function(self.function),
            AnyMetric::new(self.input_metric),
            AnyMeasure::new(self.output_measure),
            erase_relation(self.privacy_relation),
        )
    }
}

/// Collapse a composition of erased measurements into one whose release is
/// a tuple with one element per component.
pub fn product_into_any(
    measurement: Measurement<AnyDomain, ProductDomain<AnyDomain>, AnyMetric, AnyMeasure>,
) -> Result<AnyMeasurement> {
    if measurement.output_domain.factors.len() < 2 {
        return Err(DpError::native(
            "a composed release needs at least two components",
        ));
    }
    let function = measurement.function;
    Ok(Measurement::new(
        measurement.input_domain,
        AnyDomain::new_product(measurement.output_domain),
        Function::new_fallible(move |arg: &AnyObject| AnyObject::tuple(function.eval(arg)?)),
        measurement.input_metric,
        measurement.output_measure,
        measurement.privacy_relation,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dp_chain_core::{
        make_base_geometric_with, make_base_laplace_with, make_chain_mt, make_count, AllDomain,
        ErrorKind, NoiseSource, SymmetricDistance, VectorDomain,
    };

    #[test]
    fn objects_round_trip_through_export() {
        let object = AnyObject::new(vec![1_i32, 2, 3]);
        assert_eq!(object.descriptor(), &<Vec<i32>>::descriptor());
        assert_eq!(object.to_value().unwrap(), Value::from(vec![1, 2, 3]));
        assert_eq!(object.downcast::<Vec<i32>>().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn downcast_to_wrong_type_is_a_type_mismatch() {
        let object = AnyObject::new(1_u8);
        let err = object.downcast_ref::<i32>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert_eq!(format!("{:?}", object), "AnyObject(u8)");
    }

    #[test]
    fn tuples_need_two_elements() {
        let err = AnyObject::tuple(vec![AnyObject::new(1_i32)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        let pair = AnyObject::tuple(vec![AnyObject::new(1_i32), AnyObject::new(0.5_f64)]).unwrap();
        assert_eq!(pair.descriptor().to_string(), "(i32, f64)");
        assert_eq!(
            pair.to_value().unwrap(),
            Value::Tuple(vec![Value::Int(1), Value::Float(0.5)])
        );
    }

    #[test]
    fn erased_domains_compare_by_concrete_value() {
        let a = AnyDomain::new(VectorDomain::new(AllDomain::<i32>::new()));
        let b = AnyDomain::new(VectorDomain::new(AllDomain::<i32>::new()));
        let c = AnyDomain::new(VectorDomain::new(AllDomain::<i64>::new()));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.member(&AnyObject::new(vec![1_i32])).unwrap());
        assert!(a.member(&AnyObject::new(1_i32)).is_err());
    }

    #[test]
    fn erased_metric_checks_distance_type() {
        let metric = AnyMetric::new(SymmetricDistance);
        assert!(metric.validate_distance(&AnyObject::new(1_u32)).is_ok());
        let err = metric.validate_distance(&AnyObject::new(1.0_f64)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DomainMismatch);
        let search = metric.distance_search().unwrap();
        let found = search
            .smallest_passing(&|d: &AnyObject| Ok(*d.downcast_ref::<u32>()? >= 7))
            .unwrap()
            .unwrap();
        assert_eq!(*found.downcast_ref::<u32>().unwrap(), 7);
    }

    #[test]
    fn erased_steps_chain_like_typed_ones() {
        let count = make_count::<String, i32>().into_any();
        let noise = make_base_laplace_with::<f64>(1.0, NoiseSource::seeded(7)).unwrap();
        let err = make_chain_mt(&count, &noise.into_any()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DomainMismatch);

        let typed = make_chain_mt(
            &make_count::<String, i32>(),
            &make_base_geometric_with::<i32, f64>(1.0, None, NoiseSource::seeded(7)).unwrap(),
        )
        .unwrap()
        .into_any();
        let released = typed
            .invoke(&AnyObject::new(vec!["a".to_string(); 5]))
            .unwrap();
        assert_eq!(released.descriptor(), &i32::descriptor());
        assert!(typed
            .check(&AnyObject::new(1_u32), &AnyObject::new(1.0_f64))
            .unwrap());
    }

    #[test]
    fn composed_pairs_share_the_host_layout() {
        let source = NoiseSource::seeded(4);
        let laplace = || {
            make_base_laplace_with(1.0_f64, source.clone())
                .unwrap()
                .into_any()
        };
        let both = product_into_any(
            dp_chain_accounting::make_sequential_composition(&[laplace(), laplace()]).unwrap(),
        )
        .unwrap();

        let released = both.invoke(&AnyObject::new(0.0_f64)).unwrap();
        let pair = TypeDescriptor::parse("(f64, f64)").unwrap();
        let from_host = to_native(&released.to_value().unwrap(), &pair).unwrap();
        assert_eq!(released.descriptor(), &pair);
        assert_eq!(from_host.descriptor(), &pair);
        assert!(released.downcast_ref::<(f64, f64)>().is_ok());
        assert!(both.output_domain.member(&released).unwrap());
        assert!(both.output_domain.member(&from_host).unwrap());
        assert!(!both.output_domain.member(&AnyObject::new(1.0_f64)).unwrap());
    }

    #[test]
    fn mixed_tuples_split_into_handles() {
        let mixed = AnyObject::tuple(vec![
            AnyObject::new(2_i32),
            AnyObject::new("x".to_string()),
            AnyObject::new(0.5_f64),
        ])
        .unwrap();
        let elements = mixed.tuple_elements().unwrap();
        assert_eq!(elements.len(), 3);
        assert_eq!(*elements[1].downcast_ref::<String>().unwrap(), "x");
        let err = AnyObject::new(1_u8).tuple_elements().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }
}
