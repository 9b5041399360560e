//! Bisection over numeric spaces.
//!
//! Used both to find the tightest intermediate bound when composing relations
//! and, by the accounting crate, to calibrate mechanism parameters.

use std::fmt::Debug;
use std::rc::Rc;

use crate::error::Result;

/// Doublings tried when bracketing before giving up.
pub const DEFAULT_MAX_DOUBLINGS: u32 = 128;

/// Bisection steps before the search stops refining.
pub const DEFAULT_MAX_BISECTIONS: u32 = 2048;

/// A totally ordered numeric space that can be bracketed and bisected.
pub trait Bisect: 'static + Copy + PartialOrd + Debug {
    /// Whether negative values exist.
    const SIGNED: bool;

    /// The additive identity.
    fn origin() -> Self;

    /// The first offset tried when bracketing.
    fn unit() -> Self;

    /// Twice the value, or `None` when that overflows.
    fn double(self) -> Option<Self>;

    /// The negated value, or `None` when it does not exist.
    fn negate(self) -> Option<Self>;

    /// A value strictly between `lo` and `hi`, or `None` once the interval
    /// cannot be split further.
    fn midpoint(lo: Self, hi: Self) -> Option<Self>;
}

macro_rules! impl_bisect_int {
    ($signed:expr; $($ty:ty),*) => {$(
        impl Bisect for $ty {
            const SIGNED: bool = $signed;

            fn origin() -> Self { 0 }

            fn unit() -> Self { 1 }

            fn double(self) -> Option<Self> { self.checked_mul(2) }

            fn negate(self) -> Option<Self> {
                if self == 0 { Some(0) } else if $signed { (0 as $ty).checked_sub(self) } else { None }
            }

            fn midpoint(lo: Self, hi: Self) -> Option<Self> {
                let (lo, hi) = (lo as i128, hi as i128);
                if hi - lo <= 1 {
                    return None;
                }
                Some((lo + (hi - lo) / 2) as $ty)
            }
        }
    )*};
}

macro_rules! impl_bisect_float {
    ($($ty:ty),*) => {$(
        impl Bisect for $ty {
            const SIGNED: bool = true;

            fn origin() -> Self { 0.0 }

            fn unit() -> Self { 1.0 }

            fn double(self) -> Option<Self> {
                let doubled = self * 2.0;
                doubled.is_finite().then_some(doubled)
            }

            fn negate(self) -> Option<Self> { Some(-self) }

            fn midpoint(lo: Self, hi: Self) -> Option<Self> {
                let width = hi - lo;
                let mid = if width.is_finite() { lo + width / 2.0 } else { lo / 2.0 + hi / 2.0 };
                (lo < mid && mid < hi).then_some(mid)
            }
        }
    )*};
}

impl_bisect_int!(true; i8, i16, i32, i64);
impl_bisect_int!(false; u8, u16, u32, u64, usize);
impl_bisect_float!(f32, f64);

/// Narrow `[lo, hi]` around the point where `predicate` changes value.
///
/// Requires `predicate(hi) == at_hi` and `predicate(lo) != at_hi`; both hold
/// for the returned pair.
pub fn bisect_boundary<P: Bisect>(
    mut lo: P,
    mut hi: P,
    at_hi: bool,
    mut predicate: impl FnMut(P) -> Result<bool>,
    max_bisections: u32,
) -> Result<(P, P)> {
    for _ in 0..max_bisections {
        let Some(mid) = P::midpoint(lo, hi) else {
            break;
        };
        if predicate(mid)? == at_hi {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    Ok((lo, hi))
}

/// Smallest non-negative value satisfying a monotone predicate, if any is
/// found within the doubling budget.
pub fn smallest_passing<Q: Bisect>(
    predicate: &dyn Fn(&Q) -> Result<bool>,
    max_doublings: u32,
    max_bisections: u32,
) -> Result<Option<Q>> {
    let origin = Q::origin();
    if predicate(&origin)? {
        return Ok(Some(origin));
    }

    let mut lo = origin;
    let mut hi = Q::unit();
    let mut bracketed = false;
    for _ in 0..max_doublings {
        if predicate(&hi)? {
            bracketed = true;
            break;
        }
        lo = hi;
        hi = match hi.double() {
            Some(next) => next,
            None => break,
        };
    }
    if !bracketed {
        return Ok(None);
    }

    let (_, hi) = bisect_boundary(lo, hi, true, |q| predicate(&q), max_bisections)?;
    Ok(Some(hi))
}

type Finder<Q> = Rc<dyn Fn(&dyn Fn(&Q) -> Result<bool>) -> Result<Option<Q>>>;

/// Search capability a metric declares over its distance type.
///
/// Given a predicate that is monotone in the distance, finds the smallest
/// distance satisfying it.
pub struct DistanceSearch<Q> {
    finder: Finder<Q>,
}

impl<Q> Clone for DistanceSearch<Q> {
    fn clone(&self) -> Self {
        Self {
            finder: self.finder.clone(),
        }
    }
}

impl<Q> Debug for DistanceSearch<Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DistanceSearch")
    }
}

impl<Q: 'static> DistanceSearch<Q> {
    /// Wrap an arbitrary finder.
    pub fn new(
        finder: impl Fn(&dyn Fn(&Q) -> Result<bool>) -> Result<Option<Q>> + 'static,
    ) -> Self {
        Self {
            finder: Rc::new(finder),
        }
    }

    /// Bisection over a numeric distance type.
    pub fn bisection() -> Self
    where
        Q: Bisect,
    {
        Self::new(|predicate| {
            smallest_passing(predicate, DEFAULT_MAX_DOUBLINGS, DEFAULT_MAX_BISECTIONS)
        })
    }

    /// Smallest distance satisfying `predicate`.
    pub fn smallest_passing(&self, predicate: &dyn Fn(&Q) -> Result<bool>) -> Result<Option<Q>> {
        (self.finder)(predicate)
    }
}
