//! Relations between input and output distance bounds.

use std::fmt::{self, Debug};
use std::rc::Rc;

use num_traits::ToPrimitive;

use crate::error::Result;
use crate::metric::{Measure, Metric};
use crate::traits::{cast, Number};

/// Shared predicate over `(d_in, d_out)`.
pub type RelationFn<QI, QO> = Rc<dyn Fn(&QI, &QO) -> Result<bool>>;

/// Closed-form map from an input bound to the tightest output bound.
pub type ForwardMap<QI, QO> = Rc<dyn Fn(&QI) -> Result<QO>>;

/// Closed-form map from an output bound to the loosest admissible input bound.
pub type BackwardMap<QO, QI> = Rc<dyn Fn(&QO) -> Result<QI>>;

/// A monotone predicate `check(d_in, d_out)`.
///
/// If inputs differ by at most `d_in`, outputs differ (or diverge) by at most
/// `d_out`. Monotonicity is a precondition: whenever `check(d_in, d_out)`
/// holds it must also hold for any larger `d_out` and any smaller `d_in`.
///
/// A relation may also declare a forward map (`d_in` to the smallest `d_out`
/// that holds) and a backward map (`d_out` to the largest `d_in` that holds).
/// Chaining uses them to combine relations without searching.
pub struct Relation<QI, QO> {
    relation: RelationFn<QI, QO>,
    forward_map: Option<ForwardMap<QI, QO>>,
    backward_map: Option<BackwardMap<QO, QI>>,
}

/// Relation between two metrics.
pub type StabilityRelation<MI, MO> =
    Relation<<MI as Metric>::Distance, <MO as Metric>::Distance>;

/// Relation between a metric and a privacy measure.
pub type PrivacyRelation<MI, MO> = Relation<<MI as Metric>::Distance, <MO as Measure>::Distance>;

impl<QI, QO> Clone for Relation<QI, QO> {
    fn clone(&self) -> Self {
        Self {
            relation: self.relation.clone(),
            forward_map: self.forward_map.clone(),
            backward_map: self.backward_map.clone(),
        }
    }
}

impl<QI, QO> Debug for Relation<QI, QO> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relation")
            .field("forward_map", &self.forward_map.is_some())
            .field("backward_map", &self.backward_map.is_some())
            .finish()
    }
}

impl<QI: 'static, QO: 'static> Relation<QI, QO> {
    /// A relation given only as a predicate.
    pub fn new(relation: impl Fn(&QI, &QO) -> Result<bool> + 'static) -> Self {
        Self {
            relation: Rc::new(relation),
            forward_map: None,
            backward_map: None,
        }
    }

    /// A relation with any of its closed forms.
    pub fn new_all(
        relation: impl Fn(&QI, &QO) -> Result<bool> + 'static,
        forward_map: Option<ForwardMap<QI, QO>>,
        backward_map: Option<BackwardMap<QO, QI>>,
    ) -> Self {
        Self {
            relation: Rc::new(relation),
            forward_map,
            backward_map,
        }
    }

    /// A relation fully described by its forward map.
    ///
    /// `check(d_in, d_out)` holds iff `forward(d_in) <= d_out`.
    pub fn new_from_forward(forward: impl Fn(&QI) -> Result<QO> + 'static) -> Self
    where
        QO: PartialOrd,
    {
        let forward: ForwardMap<QI, QO> = Rc::new(forward);
        let map = forward.clone();
        Self::new_all(
            move |d_in, d_out| Ok(&map(d_in)? <= d_out),
            Some(forward),
            None,
        )
    }

    /// A `c`-Lipschitz relation: `d_out >= c * d_in`.
    pub fn new_from_constant(c: QO) -> Self
    where
        QI: Copy + Debug + ToPrimitive,
        QO: Number,
    {
        Self::new_from_forward(move |d_in: &QI| Ok(cast::<QI, QO>(*d_in)?.mul_saturating(c)))
    }

    /// Attach a backward map.
    pub fn with_backward_map(mut self, backward: impl Fn(&QO) -> Result<QI> + 'static) -> Self {
        self.backward_map = Some(Rc::new(backward));
        self
    }

    /// Evaluate the predicate.
    pub fn eval(&self, d_in: &QI, d_out: &QO) -> Result<bool> {
        (self.relation)(d_in, d_out)
    }

    /// The forward map, if declared.
    pub fn forward_map(&self) -> Option<ForwardMap<QI, QO>> {
        self.forward_map.clone()
    }

    /// The backward map, if declared.
    pub fn backward_map(&self) -> Option<BackwardMap<QO, QI>> {
        self.backward_map.clone()
    }

    /// Tightest output bound for `d_in`, when a forward map is declared.
    pub fn forward(&self, d_in: &QI) -> Option<Result<QO>> {
        self.forward_map.as_ref().map(|map| map(d_in))
    }

    /// Loosest input bound for `d_out`, when a backward map is declared.
    pub fn backward(&self, d_out: &QO) -> Option<Result<QI>> {
        self.backward_map.as_ref().map(|map| map(d_out))
    }
}

impl<Q: 'static + Clone + PartialOrd> Relation<Q, Q> {
    /// `d_out >= d_in`, with identity maps in both directions.
    pub fn new_identity() -> Self {
        Self::new_all(
            |d_in: &Q, d_out: &Q| Ok(d_out >= d_in),
            Some(Rc::new(|d_in: &Q| Ok(d_in.clone()))),
            Some(Rc::new(|d_out: &Q| Ok(d_out.clone()))),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn constant_relation_scales_input_bound() {
        let relation = Relation::<u32, f64>::new_from_constant(2.5);
        assert!(relation.eval(&2, &5.0).unwrap());
        assert!(!relation.eval(&2, &4.9).unwrap());
        assert_eq!(relation.forward(&4).unwrap().unwrap(), 10.0);
        assert!(relation.backward(&1.0).is_none());
    }

    #[test]
    fn constant_relation_rejects_unrepresentable_bound() {
        let relation = Relation::<u32, i8>::new_from_constant(1);
        let err = relation.eval(&1_000, &1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DomainMismatch);
    }

    #[test]
    fn identity_relation_maps_both_ways() {
        let relation = Relation::<u32, u32>::new_identity();
        assert!(relation.eval(&3, &3).unwrap());
        assert!(!relation.eval(&3, &2).unwrap());
        assert_eq!(relation.forward(&3).unwrap().unwrap(), 3);
        assert_eq!(relation.backward(&7).unwrap().unwrap(), 7);
    }
}
