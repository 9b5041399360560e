//! Domains describe the set of values a step accepts or produces.

use std::fmt::{self, Debug};
use std::marker::PhantomData;

use crate::error::{DpError, Result};

/// A set of values of a carrier type.
pub trait Domain: Clone + PartialEq + Debug {
    /// Rust type of the members.
    type Carrier;

    /// Whether `value` belongs to the domain.
    fn member(&self, value: &Self::Carrier) -> Result<bool>;
}

/// Every value of `T`.
pub struct AllDomain<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> AllDomain<T> {
    /// Construct the domain.
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for AllDomain<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for AllDomain<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> PartialEq for AllDomain<T> {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl<T> Debug for AllDomain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AllDomain({})", std::any::type_name::<T>())
    }
}

impl<T> Domain for AllDomain<T> {
    type Carrier = T;

    fn member(&self, _value: &T) -> Result<bool> {
        Ok(true)
    }
}

/// Values within the closed interval `[lower, upper]`.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundedDomain<T> {
    lower: T,
    upper: T,
}

impl<T: PartialOrd + Debug> BoundedDomain<T> {
    /// Construct the interval, rejecting `lower > upper`.
    pub fn new(lower: T, upper: T) -> Result<Self> {
        if !(lower <= upper) {
            return Err(DpError::native(format!(
                "lower bound {:?} may not exceed upper bound {:?}",
                lower, upper
            )));
        }
        Ok(Self { lower, upper })
    }

    /// Lower end of the interval.
    pub fn lower(&self) -> &T {
        &self.lower
    }

    /// Upper end of the interval.
    pub fn upper(&self) -> &T {
        &self.upper
    }
}

impl<T: Clone + PartialOrd + Debug> Domain for BoundedDomain<T> {
    type Carrier = T;

    fn member(&self, value: &T) -> Result<bool> {
        Ok(&self.lower <= value && value <= &self.upper)
    }
}

/// Vectors whose elements all belong to an element domain.
#[derive(Clone, Debug, PartialEq)]
pub struct VectorDomain<D> {
    /// Domain of each element.
    pub element_domain: D,
}

impl<D: Domain> VectorDomain<D> {
    /// Construct from an element domain.
    pub fn new(element_domain: D) -> Self {
        Self { element_domain }
    }
}

impl<T> VectorDomain<AllDomain<T>> {
    /// Vectors of arbitrary `T`.
    pub fn new_all() -> Self {
        Self::new(AllDomain::new())
    }
}

impl<D: Domain> Domain for VectorDomain<D> {
    type Carrier = Vec<D::Carrier>;

    fn member(&self, value: &Self::Carrier) -> Result<bool> {
        for element in value {
            if !self.element_domain.member(element)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Vectors of a known, public length.
#[derive(Clone, Debug, PartialEq)]
pub struct SizedDomain<D> {
    /// Domain of the whole vector.
    pub inner_domain: VectorDomain<D>,
    /// Required number of elements.
    pub size: usize,
}

impl<D: Domain> SizedDomain<D> {
    /// Vectors of exactly `size` members of `element_domain`.
    pub fn new(element_domain: D, size: usize) -> Self {
        Self {
            inner_domain: VectorDomain::new(element_domain),
            size,
        }
    }
}

impl<D: Domain> Domain for SizedDomain<D> {
    type Carrier = Vec<D::Carrier>;

    fn member(&self, value: &Self::Carrier) -> Result<bool> {
        if value.len() != self.size {
            return Ok(false);
        }
        self.inner_domain.member(value)
    }
}

/// Fixed-length products of possibly different domains of one type.
///
/// Produced by sequential composition, one factor per composed measurement.
#[derive(Clone, Debug, PartialEq)]
pub struct ProductDomain<D> {
    /// The factors, in order.
    pub factors: Vec<D>,
}

impl<D: Domain> ProductDomain<D> {
    /// Construct from the factors.
    pub fn new(factors: Vec<D>) -> Self {
        Self { factors }
    }
}

impl<D: Domain> Domain for ProductDomain<D> {
    type Carrier = Vec<D::Carrier>;

    fn member(&self, value: &Self::Carrier) -> Result<bool> {
        if value.len() != self.factors.len() {
            return Ok(false);
        }
        for (factor, element) in self.factors.iter().zip(value) {
            if !factor.member(element)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_membership() {
        let domain = BoundedDomain::new(0, 10).unwrap();
        assert!(domain.member(&0).unwrap());
        assert!(domain.member(&10).unwrap());
        assert!(!domain.member(&11).unwrap());
        assert!(BoundedDomain::new(2.0, 1.0).is_err());
        assert!(BoundedDomain::new(f64::NAN, 1.0).is_err());
    }

    #[test]
    fn vector_membership_checks_every_element() {
        let domain = VectorDomain::new(BoundedDomain::new(0, 3).unwrap());
        assert!(domain.member(&vec![0, 1, 3]).unwrap());
        assert!(!domain.member(&vec![0, 4]).unwrap());
    }

    #[test]
    fn sized_membership_checks_length_then_elements() {
        let domain = SizedDomain::new(BoundedDomain::new(0, 3).unwrap(), 2);
        assert!(domain.member(&vec![0, 3]).unwrap());
        assert!(!domain.member(&vec![0, 1, 2]).unwrap());
        assert!(!domain.member(&vec![0, 4]).unwrap());
    }

    #[test]
    fn product_membership_checks_arity() {
        let domain = ProductDomain::new(vec![AllDomain::<i32>::new(), AllDomain::new()]);
        assert!(domain.member(&vec![1, 2]).unwrap());
        assert!(!domain.member(&vec![1]).unwrap());
    }

    #[test]
    fn all_domains_compare_equal() {
        assert_eq!(AllDomain::<String>::new(), AllDomain::<String>::default());
        assert_eq!(format!("{:?}", AllDomain::<u8>::new()), "AllDomain(u8)");
    }
}
