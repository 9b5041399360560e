//! Numeric traits shared by distances, parameters and data.

use std::fmt::Debug;
use std::hash::Hash;

use num_traits::{Float, Num, NumCast, PrimInt, ToPrimitive, Zero};

use crate::error::{DpError, Result};
use crate::search::Bisect;

/// A value that can be used as a distance bound.
pub trait DistanceValue {
    /// Reject bounds that are negative or not a number.
    fn validate_distance(&self) -> Result<()>;
}

/// Arithmetic that never panics on overflow.
pub trait Arith: Sized {
    /// Absolute value, saturating at the type's maximum.
    fn magnitude(self) -> Self;
    /// Addition, saturating for integers.
    fn add_saturating(self, rhs: Self) -> Self;
    /// Subtraction, saturating for integers.
    fn sub_saturating(self, rhs: Self) -> Self;
    /// Multiplication, saturating for integers.
    fn mul_saturating(self, rhs: Self) -> Self;
}

macro_rules! impl_signed {
    ($($ty:ty),*) => {$(
        impl Arith for $ty {
            fn magnitude(self) -> Self { self.saturating_abs() }
            fn add_saturating(self, rhs: Self) -> Self { self.saturating_add(rhs) }
            fn sub_saturating(self, rhs: Self) -> Self { self.saturating_sub(rhs) }
            fn mul_saturating(self, rhs: Self) -> Self { self.saturating_mul(rhs) }
        }
    )*};
}

macro_rules! impl_unsigned {
    ($($ty:ty),*) => {$(
        impl Arith for $ty {
            fn magnitude(self) -> Self { self }
            fn add_saturating(self, rhs: Self) -> Self { self.saturating_add(rhs) }
            fn sub_saturating(self, rhs: Self) -> Self { self.saturating_sub(rhs) }
            fn mul_saturating(self, rhs: Self) -> Self { self.saturating_mul(rhs) }
        }
    )*};
}

macro_rules! impl_float {
    ($($ty:ty),*) => {$(
        impl Arith for $ty {
            fn magnitude(self) -> Self { self.abs() }
            fn add_saturating(self, rhs: Self) -> Self { self + rhs }
            fn sub_saturating(self, rhs: Self) -> Self { self - rhs }
            fn mul_saturating(self, rhs: Self) -> Self { self * rhs }
        }
    )*};
}

macro_rules! impl_distance_value {
    ($($ty:ty),*) => {$(
        impl DistanceValue for $ty {
            fn validate_distance(&self) -> Result<()> {
                if *self >= <$ty as Zero>::zero() {
                    Ok(())
                } else {
                    Err(DpError::domain_mismatch(format!(
                        "distance must be non-negative, got {:?}",
                        self
                    )))
                }
            }
        }
    )*};
}

impl_signed!(i8, i16, i32, i64);
impl_unsigned!(u8, u16, u32, u64, usize);
impl_float!(f32, f64);
impl_distance_value!(i8, i16, i32, i64, u8, u16, u32, u64, usize, f32, f64);

impl<A: DistanceValue, B: DistanceValue> DistanceValue for (A, B) {
    fn validate_distance(&self) -> Result<()> {
        self.0.validate_distance()?;
        self.1.validate_distance()
    }
}

/// Numeric element types usable as data, distances and parameters.
pub trait Number:
    'static + Copy + Debug + PartialOrd + Num + NumCast + Arith + Bisect + DistanceValue
{
}

impl<T> Number for T where
    T: 'static + Copy + Debug + PartialOrd + Num + NumCast + Arith + Bisect + DistanceValue
{
}

/// Integer element types.
pub trait Integer: Number + PrimInt + Hash {}

impl<T> Integer for T where T: Number + PrimInt + Hash {}

/// Floating-point element types.
pub trait FloatNumber: Number + Float {}

impl<T> FloatNumber for T where T: Number + Float {}

/// Cast between numeric types.
///
/// Values outside the target's range fail; floats cast to integers truncate
/// toward zero.
pub fn cast<TI: ToPrimitive + Copy + Debug, TO: NumCast>(value: TI) -> Result<TO> {
    TO::from(value).ok_or_else(|| {
        DpError::domain_mismatch(format!(
            "{:?} is not representable as {}",
            value,
            std::any::type_name::<TO>()
        ))
    })
}
