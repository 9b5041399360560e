//! Input/output metrics and privacy measures.
//!
//! A metric says how far apart two datasets (or two outputs of a
//! transformation) are; a measure says how far apart the output distributions
//! of a measurement are. Both declare the Rust type of their distances.

use std::fmt::{self, Debug};
use std::marker::PhantomData;

use crate::error::Result;
use crate::search::DistanceSearch;
use crate::traits::{DistanceValue, FloatNumber, Number};

/// Distances between datasets counted in records.
pub type IntDistance = u32;

/// A distance between values.
pub trait Metric: Clone + PartialEq + Debug {
    /// Type of a distance bound.
    type Distance;

    /// Reject bounds outside the metric's distance space.
    fn validate_distance(&self, distance: &Self::Distance) -> Result<()>;

    /// How to search this metric's distances, if they can be searched.
    fn distance_search(&self) -> Option<DistanceSearch<Self::Distance>> {
        None
    }
}

/// A divergence between output distributions.
pub trait Measure: Clone + PartialEq + Debug {
    /// Type of a privacy loss bound.
    type Distance;

    /// Reject bounds outside the measure's distance space.
    fn validate_distance(&self, distance: &Self::Distance) -> Result<()>;

    /// Whether a loss of `used` fits within `budget`.
    fn within(&self, used: &Self::Distance, budget: &Self::Distance) -> Result<bool>;

    /// Total loss of running mechanisms with the given losses in sequence on
    /// the same input.
    fn compose(&self, parts: &[Self::Distance]) -> Result<Self::Distance>;
}

macro_rules! phantom_struct {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        pub struct $name<Q> {
            _marker: PhantomData<fn() -> Q>,
        }

        impl<Q> $name<Q> {
            /// Construct the metric or measure.
            pub fn new() -> Self {
                Self { _marker: PhantomData }
            }
        }

        impl<Q> Default for $name<Q> {
            fn default() -> Self {
                Self::new()
            }
        }

        impl<Q> Clone for $name<Q> {
            fn clone(&self) -> Self {
                Self::new()
            }
        }

        impl<Q> Copy for $name<Q> {}

        impl<Q> PartialEq for $name<Q> {
            fn eq(&self, _other: &Self) -> bool {
                true
            }
        }

        impl<Q> Debug for $name<Q> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), std::any::type_name::<Q>())
            }
        }
    };
}

/// Number of records added or removed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SymmetricDistance;

impl Metric for SymmetricDistance {
    type Distance = IntDistance;

    fn validate_distance(&self, distance: &IntDistance) -> Result<()> {
        distance.validate_distance()
    }

    fn distance_search(&self) -> Option<DistanceSearch<IntDistance>> {
        Some(DistanceSearch::bisection())
    }
}

/// Number of records changed in place.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HammingDistance;

impl Metric for HammingDistance {
    type Distance = IntDistance;

    fn validate_distance(&self, distance: &IntDistance) -> Result<()> {
        distance.validate_distance()
    }

    fn distance_search(&self) -> Option<DistanceSearch<IntDistance>> {
        Some(DistanceSearch::bisection())
    }
}

phantom_struct!(
    /// `|x - x'|` between scalars.
    AbsoluteDistance
);
phantom_struct!(
    /// L1 norm of the difference between vectors.
    L1Distance
);
phantom_struct!(
    /// L2 norm of the difference between vectors.
    L2Distance
);

macro_rules! impl_numeric_metric {
    ($($name:ident),*) => {$(
        impl<Q: Number> Metric for $name<Q> {
            type Distance = Q;

            fn validate_distance(&self, distance: &Q) -> Result<()> {
                distance.validate_distance()
            }

            fn distance_search(&self) -> Option<DistanceSearch<Q>> {
                Some(DistanceSearch::bisection())
            }
        }
    )*};
}

impl_numeric_metric!(AbsoluteDistance, L1Distance, L2Distance);

phantom_struct!(
    /// Pure differential privacy: the loss is a single epsilon.
    MaxDivergence
);
phantom_struct!(
    /// Approximate differential privacy: the loss is an `(epsilon, delta)` pair.
    SmoothedMaxDivergence
);
phantom_struct!(
    /// Zero-concentrated differential privacy: the loss is a single rho.
    ZeroConcentratedDivergence
);

fn sum_losses<Q: FloatNumber>(parts: &[Q]) -> Q {
    parts.iter().fold(Q::zero(), |acc, q| acc + *q)
}

impl<Q: FloatNumber> Measure for MaxDivergence<Q> {
    type Distance = Q;

    fn validate_distance(&self, distance: &Q) -> Result<()> {
        distance.validate_distance()
    }

    fn within(&self, used: &Q, budget: &Q) -> Result<bool> {
        Ok(used <= budget)
    }

    fn compose(&self, parts: &[Q]) -> Result<Q> {
        Ok(sum_losses(parts))
    }
}

impl<Q: FloatNumber> Measure for SmoothedMaxDivergence<Q> {
    type Distance = (Q, Q);

    fn validate_distance(&self, distance: &(Q, Q)) -> Result<()> {
        distance.validate_distance()
    }

    fn within(&self, used: &(Q, Q), budget: &(Q, Q)) -> Result<bool> {
        Ok(used.0 <= budget.0 && used.1 <= budget.1)
    }

    fn compose(&self, parts: &[(Q, Q)]) -> Result<(Q, Q)> {
        Ok(parts
            .iter()
            .fold((Q::zero(), Q::zero()), |(eps, delta), (e, d)| {
                (eps + *e, delta + *d)
            }))
    }
}

impl<Q: FloatNumber> Measure for ZeroConcentratedDivergence<Q> {
    type Distance = Q;

    fn validate_distance(&self, distance: &Q) -> Result<()> {
        distance.validate_distance()
    }

    fn within(&self, used: &Q, budget: &Q) -> Result<bool> {
        Ok(used <= budget)
    }

    fn compose(&self, parts: &[Q]) -> Result<Q> {
        Ok(sum_losses(parts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pure_epsilons_add() {
        let measure = MaxDivergence::<f64>::new();
        assert_eq!(measure.compose(&[0.5, 0.25, 0.25]).unwrap(), 1.0);
        assert!(measure.within(&1.0, &1.0).unwrap());
        assert!(!measure.within(&1.5, &1.0).unwrap());
    }

    #[test]
    fn approximate_losses_add_componentwise() {
        let measure = SmoothedMaxDivergence::<f64>::new();
        let total = measure.compose(&[(0.5, 1e-6), (0.25, 1e-6)]).unwrap();
        assert_eq!(total, (0.75, 2e-6));
        assert!(measure.within(&total, &(1.0, 1e-5)).unwrap());
        assert!(!measure.within(&total, &(1.0, 1e-7)).unwrap());
    }

    #[test]
    fn metrics_are_named_by_distance_type() {
        assert_eq!(
            format!("{:?}", AbsoluteDistance::<i32>::new()),
            "AbsoluteDistance(i32)"
        );
        assert_eq!(MaxDivergence::<f64>::new(), MaxDivergence::default());
    }

    #[test]
    fn negative_bounds_are_rejected() {
        assert!(SymmetricDistance.validate_distance(&0).is_ok());
        assert!(AbsoluteDistance::<f64>::new()
            .validate_distance(&-1.0)
            .is_err());
        assert!(SmoothedMaxDivergence::<f64>::new()
            .validate_distance(&(1.0, -1e-9))
            .is_err());
    }
}
