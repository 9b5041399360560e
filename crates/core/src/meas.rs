//! Concrete measurements: additive noise mechanisms.
//!
//! Every constructor has a `_with` variant taking the [`NoiseSource`] to draw
//! from; the plain variant seeds a fresh source from entropy.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use num_traits::ToPrimitive;

use crate::domain::{AllDomain, SizedDomain, VectorDomain};
use crate::error::{DpError, Result};
use crate::metric::{
    AbsoluteDistance, IntDistance, L1Distance, L2Distance, MaxDivergence, SmoothedMaxDivergence,
    SymmetricDistance, ZeroConcentratedDivergence,
};
use crate::noise::{check_scale, NoiseSource};
use crate::relation::Relation;
use crate::step::{Function, Measurement};
use crate::traits::{cast, FloatNumber, Integer};

/// Measurement releasing a noisy scalar.
pub type ScalarMeasurement<T, MO> = Measurement<AllDomain<T>, AllDomain<T>, AbsoluteDistance<T>, MO>;

/// `d_in / scale <= epsilon`, with maps both ways.
fn linear_relation<QI, Q>(scale: Q) -> Relation<QI, Q>
where
    QI: 'static + Copy + Debug + ToPrimitive + num_traits::NumCast,
    Q: FloatNumber,
{
    Relation::new_from_forward(move |d_in: &QI| {
        let d_in: Q = cast(*d_in)?;
        if d_in.is_zero() {
            return Ok(Q::zero());
        }
        Ok(d_in / scale)
    })
    .with_backward_map(move |d_out: &Q| cast((*d_out * scale).floor()))
}

fn validated_scale<Q: FloatNumber>(scale: Q) -> Result<f64> {
    let scale: f64 = cast(scale).map_err(|e| DpError::native(e.message().to_owned()))?;
    check_scale(scale)?;
    Ok(scale)
}

fn add_noise<T: FloatNumber>(value: T, noise: f64) -> Result<T> {
    Ok(value + cast::<f64, T>(noise)?)
}

/// Laplace mechanism on a scalar: `epsilon = d_in / scale`.
pub fn make_base_laplace<T: FloatNumber>(scale: T) -> Result<ScalarMeasurement<T, MaxDivergence<T>>> {
    make_base_laplace_with(scale, NoiseSource::from_entropy())
}

/// [`make_base_laplace`] drawing from `source`.
pub fn make_base_laplace_with<T: FloatNumber>(
    scale: T,
    source: NoiseSource,
) -> Result<ScalarMeasurement<T, MaxDivergence<T>>> {
    let sample_scale = validated_scale(scale)?;
    Ok(Measurement::new(
        AllDomain::new(),
        AllDomain::new(),
        Function::new_fallible(move |arg: &T| add_noise(*arg, source.laplace(sample_scale)?)),
        AbsoluteDistance::new(),
        MaxDivergence::new(),
        linear_relation(scale),
    ))
}

/// Laplace mechanism applied independently to each element of a vector.
pub fn make_base_vector_laplace<T: FloatNumber>(
    scale: T,
) -> Result<Measurement<VectorDomain<AllDomain<T>>, VectorDomain<AllDomain<T>>, L1Distance<T>, MaxDivergence<T>>>
{
    make_base_vector_laplace_with(scale, NoiseSource::from_entropy())
}

/// [`make_base_vector_laplace`] drawing from `source`.
pub fn make_base_vector_laplace_with<T: FloatNumber>(
    scale: T,
    source: NoiseSource,
) -> Result<Measurement<VectorDomain<AllDomain<T>>, VectorDomain<AllDomain<T>>, L1Distance<T>, MaxDivergence<T>>>
{
    let sample_scale = validated_scale(scale)?;
    Ok(Measurement::new(
        VectorDomain::new_all(),
        VectorDomain::new_all(),
        Function::new_fallible(move |arg: &Vec<T>| {
            arg.iter()
                .map(|v| add_noise(*v, source.laplace(sample_scale)?))
                .collect()
        }),
        L1Distance::new(),
        MaxDivergence::new(),
        linear_relation(scale),
    ))
}

/// `sqrt(2 ln(1.25 / delta))`, the classical Gaussian tail factor.
fn gaussian_tail<T: FloatNumber>(delta: T) -> Result<T> {
    let ratio: T = cast::<f64, T>(1.25)? / delta;
    let two: T = cast(2.0)?;
    Ok((two * ratio.ln()).max(T::zero()).sqrt())
}

/// Classical `(epsilon, delta)` Gaussian bound,
/// `scale >= d_in * sqrt(2 ln(1.25 / delta)) / epsilon`, valid for `epsilon <= 1`.
fn gaussian_relation<T: FloatNumber>(scale: T) -> Relation<T, (T, T)> {
    let check_epsilon = |eps: T| -> Result<()> {
        if eps > T::one() {
            return Err(DpError::native(format!(
                "gaussian bound requires epsilon <= 1, got {:?}",
                eps
            )));
        }
        Ok(())
    };

    Relation::new(move |d_in: &T, (eps, delta): &(T, T)| {
        check_epsilon(*eps)?;
        if d_in.is_zero() {
            return Ok(true);
        }
        if *delta <= T::zero() || eps.is_zero() {
            return Ok(false);
        }
        Ok(scale * *eps >= *d_in * gaussian_tail(*delta)?)
    })
    .with_backward_map(move |(eps, delta): &(T, T)| {
        check_epsilon(*eps)?;
        if *delta <= T::zero() {
            return Ok(T::zero());
        }
        let tail = gaussian_tail(*delta)?;
        if tail.is_zero() {
            return Ok(T::infinity());
        }
        Ok(scale * *eps / tail)
    })
}

/// Gaussian mechanism on a scalar, under the classical `(epsilon, delta)`
/// bound `scale >= d_in * sqrt(2 ln(1.25 / delta)) / epsilon`.
///
/// The bound only holds for `epsilon <= 1`; larger budgets are an error.
pub fn make_base_gaussian<T: FloatNumber>(
    scale: T,
) -> Result<ScalarMeasurement<T, SmoothedMaxDivergence<T>>> {
    make_base_gaussian_with(scale, NoiseSource::from_entropy())
}

/// [`make_base_gaussian`] drawing from `source`.
pub fn make_base_gaussian_with<T: FloatNumber>(
    scale: T,
    source: NoiseSource,
) -> Result<ScalarMeasurement<T, SmoothedMaxDivergence<T>>> {
    let sample_scale = validated_scale(scale)?;
    Ok(Measurement::new(
        AllDomain::new(),
        AllDomain::new(),
        Function::new_fallible(move |arg: &T| add_noise(*arg, source.gaussian(sample_scale)?)),
        AbsoluteDistance::new(),
        SmoothedMaxDivergence::new(),
        gaussian_relation(scale),
    ))
}

/// Measurement adding noise to every element of a vector.
pub type VectorMeasurement<T, MI, MO> =
    Measurement<VectorDomain<AllDomain<T>>, VectorDomain<AllDomain<T>>, MI, MO>;

/// Gaussian mechanism applied independently to each element of a vector,
/// with the classical bound over the L2 distance between inputs.
pub fn make_base_vector_gaussian<T: FloatNumber>(
    scale: T,
) -> Result<VectorMeasurement<T, L2Distance<T>, SmoothedMaxDivergence<T>>> {
    make_base_vector_gaussian_with(scale, NoiseSource::from_entropy())
}

/// [`make_base_vector_gaussian`] drawing from `source`.
pub fn make_base_vector_gaussian_with<T: FloatNumber>(
    scale: T,
    source: NoiseSource,
) -> Result<VectorMeasurement<T, L2Distance<T>, SmoothedMaxDivergence<T>>> {
    let sample_scale = validated_scale(scale)?;
    Ok(Measurement::new(
        VectorDomain::new_all(),
        VectorDomain::new_all(),
        Function::new_fallible(move |arg: &Vec<T>| {
            arg.iter()
                .map(|v| add_noise(*v, source.gaussian(sample_scale)?))
                .collect()
        }),
        L2Distance::new(),
        SmoothedMaxDivergence::new(),
        gaussian_relation(scale),
    ))
}

/// Gaussian mechanism on a scalar under zero-concentrated DP:
/// `rho = (d_in / scale)^2 / 2`.
pub fn make_base_gaussian_zcdp<T: FloatNumber>(
    scale: T,
) -> Result<ScalarMeasurement<T, ZeroConcentratedDivergence<T>>> {
    make_base_gaussian_zcdp_with(scale, NoiseSource::from_entropy())
}

/// [`make_base_gaussian_zcdp`] drawing from `source`.
pub fn make_base_gaussian_zcdp_with<T: FloatNumber>(
    scale: T,
    source: NoiseSource,
) -> Result<ScalarMeasurement<T, ZeroConcentratedDivergence<T>>> {
    let sample_scale = validated_scale(scale)?;
    let two: T = cast(2.0)?;
    let relation = Relation::new_from_forward(move |d_in: &T| {
        if d_in.is_zero() {
            return Ok(T::zero());
        }
        let ratio = *d_in / scale;
        Ok(ratio * ratio / two)
    })
    .with_backward_map(move |rho: &T| Ok(scale * (two * *rho).sqrt()));

    Ok(Measurement::new(
        AllDomain::new(),
        AllDomain::new(),
        Function::new_fallible(move |arg: &T| add_noise(*arg, source.gaussian(sample_scale)?)),
        AbsoluteDistance::new(),
        ZeroConcentratedDivergence::new(),
        relation,
    ))
}

fn wide<T: Integer>(value: T) -> Result<i128> {
    value
        .to_i128()
        .ok_or_else(|| DpError::native("integer exceeds i128"))
}

fn wide_bounds<T: Integer>(lower: T, upper: T) -> Result<(i128, i128)> {
    if lower > upper {
        return Err(DpError::native(format!(
            "lower bound {:?} may not exceed upper bound {:?}",
            lower, upper
        )));
    }
    Ok((wide(lower)?, wide(upper)?))
}

/// `value + noise` clamped into `[lower, upper]`.
fn release<T: Integer>(value: i128, noise: i128, (lower, upper): (i128, i128)) -> Result<T> {
    cast(value.saturating_add(noise).clamp(lower, upper))
}

/// Two-sided geometric mechanism on an integer: `epsilon = d_in / scale`.
///
/// Releases are clamped into `bounds` when given, and otherwise saturate at
/// the limits of `T`.
pub fn make_base_geometric<T, QO>(
    scale: QO,
    bounds: Option<(T, T)>,
) -> Result<ScalarMeasurement<T, MaxDivergence<QO>>>
where
    T: Integer,
    QO: FloatNumber,
{
    make_base_geometric_with(scale, bounds, NoiseSource::from_entropy())
}

/// [`make_base_geometric`] drawing from `source`.
pub fn make_base_geometric_with<T, QO>(
    scale: QO,
    bounds: Option<(T, T)>,
    source: NoiseSource,
) -> Result<ScalarMeasurement<T, MaxDivergence<QO>>>
where
    T: Integer,
    QO: FloatNumber,
{
    let sample_scale = validated_scale(scale)?;
    let (lower, upper) = bounds.unwrap_or((T::min_value(), T::max_value()));
    let range = wide_bounds(lower, upper)?;

    Ok(Measurement::new(
        AllDomain::new(),
        AllDomain::new(),
        Function::new_fallible(move |arg: &T| {
            release(wide(*arg)?, source.two_sided_geometric(sample_scale)?, range)
        }),
        AbsoluteDistance::new(),
        MaxDivergence::new(),
        linear_relation(scale),
    ))
}

/// Two-sided geometric mechanism applied independently to each element of a
/// vector: `epsilon = d_in / scale` over the L1 distance between inputs.
pub fn make_base_vector_geometric<T, QO>(
    scale: QO,
    bounds: Option<(T, T)>,
) -> Result<VectorMeasurement<T, L1Distance<T>, MaxDivergence<QO>>>
where
    T: Integer,
    QO: FloatNumber,
{
    make_base_vector_geometric_with(scale, bounds, NoiseSource::from_entropy())
}

/// [`make_base_vector_geometric`] drawing from `source`.
pub fn make_base_vector_geometric_with<T, QO>(
    scale: QO,
    bounds: Option<(T, T)>,
    source: NoiseSource,
) -> Result<VectorMeasurement<T, L1Distance<T>, MaxDivergence<QO>>>
where
    T: Integer,
    QO: FloatNumber,
{
    let sample_scale = validated_scale(scale)?;
    let (lower, upper) = bounds.unwrap_or((T::min_value(), T::max_value()));
    let range = wide_bounds(lower, upper)?;

    Ok(Measurement::new(
        VectorDomain::new_all(),
        VectorDomain::new_all(),
        Function::new_fallible(move |arg: &Vec<T>| {
            arg.iter()
                .map(|v| release(wide(*v)?, source.two_sided_geometric(sample_scale)?, range))
                .collect()
        }),
        L1Distance::new(),
        MaxDivergence::new(),
        linear_relation(scale),
    ))
}

/// Number of magnitude trials needed so truncation never shows after clamping.
fn trials_for((lower, upper): (i128, i128)) -> Result<u64> {
    upper
        .checked_sub(lower)
        .and_then(|width| u64::try_from(width).ok())
        .ok_or_else(|| DpError::native("bounds are too far apart for constant-time sampling"))
}

/// Two-sided geometric mechanism whose running time does not depend on the
/// noise drawn.
///
/// Arguments are clamped into `[lower, upper]` before noise is added and
/// releases are clamped again afterwards. Each release costs
/// `upper - lower + 1` uniform draws, so keep the bounds tight.
pub fn make_constant_time_base_geometric<T, QO>(
    scale: QO,
    lower: T,
    upper: T,
) -> Result<ScalarMeasurement<T, MaxDivergence<QO>>>
where
    T: Integer,
    QO: FloatNumber,
{
    make_constant_time_base_geometric_with(scale, lower, upper, NoiseSource::from_entropy())
}

/// [`make_constant_time_base_geometric`] drawing from `source`.
pub fn make_constant_time_base_geometric_with<T, QO>(
    scale: QO,
    lower: T,
    upper: T,
    source: NoiseSource,
) -> Result<ScalarMeasurement<T, MaxDivergence<QO>>>
where
    T: Integer,
    QO: FloatNumber,
{
    let sample_scale = validated_scale(scale)?;
    let range = wide_bounds(lower, upper)?;
    let trials = trials_for(range)?;

    Ok(Measurement::new(
        AllDomain::new(),
        AllDomain::new(),
        Function::new_fallible(move |arg: &T| {
            let value = wide(*arg)?.clamp(range.0, range.1);
            release(value, source.two_sided_geometric_bounded(sample_scale, trials)?, range)
        }),
        AbsoluteDistance::new(),
        MaxDivergence::new(),
        linear_relation(scale),
    ))
}

/// [`make_constant_time_base_geometric`] applied independently to each
/// element of a vector, over the L1 distance between inputs.
pub fn make_constant_time_base_vector_geometric<T, QO>(
    scale: QO,
    lower: T,
    upper: T,
) -> Result<VectorMeasurement<T, L1Distance<T>, MaxDivergence<QO>>>
where
    T: Integer,
    QO: FloatNumber,
{
    make_constant_time_base_vector_geometric_with(scale, lower, upper, NoiseSource::from_entropy())
}

/// [`make_constant_time_base_vector_geometric`] drawing from `source`.
pub fn make_constant_time_base_vector_geometric_with<T, QO>(
    scale: QO,
    lower: T,
    upper: T,
    source: NoiseSource,
) -> Result<VectorMeasurement<T, L1Distance<T>, MaxDivergence<QO>>>
where
    T: Integer,
    QO: FloatNumber,
{
    let sample_scale = validated_scale(scale)?;
    let range = wide_bounds(lower, upper)?;
    let trials = trials_for(range)?;

    Ok(Measurement::new(
        VectorDomain::new_all(),
        VectorDomain::new_all(),
        Function::new_fallible(move |arg: &Vec<T>| {
            arg.iter()
                .map(|v| {
                    let value = wide(*v)?.clamp(range.0, range.1);
                    release(value, source.two_sided_geometric_bounded(sample_scale, trials)?, range)
                })
                .collect()
        }),
        L1Distance::new(),
        MaxDivergence::new(),
        linear_relation(scale),
    ))
}

/// Measurement releasing noisy frequencies of a histogram.
pub type StabilityMeasurement<TIK, TIC, Q> = Measurement<
    AllDomain<HashMap<TIK, TIC>>,
    AllDomain<HashMap<TIK, Q>>,
    L1Distance<Q>,
    SmoothedMaxDivergence<Q>,
>;

/// Stability-based histogram release over `n` records.
///
/// Each count becomes `count / n` plus Laplace noise, and only keys whose
/// noisy frequency reaches `threshold` are released. The relation requires
/// `scale >= d_in / (n epsilon)` and
/// `threshold >= scale' ln(2 / delta) + 1 / n` where `scale' = d_in / (n epsilon)`.
pub fn make_base_stability<TIK, TIC, Q>(
    n: usize,
    scale: Q,
    threshold: Q,
) -> Result<StabilityMeasurement<TIK, TIC, Q>>
where
    TIK: 'static + Eq + Hash + Clone,
    TIC: Integer,
    Q: FloatNumber,
{
    make_base_stability_with(n, scale, threshold, NoiseSource::from_entropy())
}

/// [`make_base_stability`] drawing from `source`.
pub fn make_base_stability_with<TIK, TIC, Q>(
    n: usize,
    scale: Q,
    threshold: Q,
    source: NoiseSource,
) -> Result<StabilityMeasurement<TIK, TIC, Q>>
where
    TIK: 'static + Eq + Hash + Clone,
    TIC: Integer,
    Q: FloatNumber,
{
    if n == 0 {
        return Err(DpError::native("stability release needs at least one record"));
    }
    if !threshold.is_finite() {
        return Err(DpError::native(format!("threshold must be finite, got {:?}", threshold)));
    }
    let sample_scale = validated_scale(scale)?;
    let n: Q = cast(n)?;
    let two: Q = cast(2.0)?;

    let relation = Relation::new(move |d_in: &Q, (eps, delta): &(Q, Q)| {
        if d_in.is_zero() {
            return Ok(true);
        }
        if *eps <= Q::zero() || *delta <= Q::zero() {
            return Ok(false);
        }
        let ideal_scale = *d_in / (n * *eps);
        let ideal_threshold = (two / *delta).ln() * ideal_scale + n.recip();
        Ok(scale >= ideal_scale && threshold >= ideal_threshold)
    });

    Ok(Measurement::new(
        AllDomain::new(),
        AllDomain::new(),
        Function::new_fallible(move |counts: &HashMap<TIK, TIC>| {
            let mut released = HashMap::new();
            for (key, count) in counts {
                let frequency = cast::<TIC, Q>(*count)? / n;
                let noisy = add_noise(frequency, source.laplace(sample_scale)?)?;
                if noisy >= threshold {
                    released.insert(key.clone(), noisy);
                }
            }
            Ok(released)
        }),
        L1Distance::new(),
        SmoothedMaxDivergence::new(),
        relation,
    ))
}

/// Amplified `(epsilon, delta)` of shuffling `n` reports, each produced by an
/// `(epsilon0, delta0)` local randomizer, when one report changes.
fn shuffled_within(epsilon0: f64, delta0: f64, n: f64, eps: f64, delta: f64) -> bool {
    // covered by the group bound
    if epsilon0 <= 0.0 {
        return false;
    }
    let e0 = epsilon0.exp();
    let delta_s = delta - (eps.exp() + 1.0) * (1.0 + (-epsilon0).exp() / 2.0) * n * delta0;
    if delta_s <= 0.0 || delta_s >= 1.0 {
        return false;
    }
    if epsilon0 > (n / (16.0 * (2.0 / delta_s).ln())).ln() {
        return false;
    }
    let spread = 8.0 * (e0 * (4.0 / delta_s).ln()).sqrt() / n.sqrt() + 8.0 * e0 / n;
    (1.0 + (e0 - 1.0) / (e0 + 1.0) * spread).ln() <= eps
}

/// Shuffles `num_steps` locally randomized reports and accounts for the
/// privacy amplification shuffling provides.
///
/// Each report was released by an `(step_epsilon, step_delta)` mechanism on
/// its own record. A budget holds if either the amplified bound or the
/// group bound `(k step_epsilon, k e^((k-1) step_epsilon) step_delta)` over
/// the `k = ceil(d_in / 2)` changed reports fits within it. The amplified
/// bound only covers `k = 1`.
pub fn make_shuffle_amplification<T>(
    step_epsilon: f64,
    step_delta: f64,
    num_steps: usize,
) -> Result<
    Measurement<
        SizedDomain<AllDomain<T>>,
        SizedDomain<AllDomain<T>>,
        SymmetricDistance,
        SmoothedMaxDivergence<f64>,
    >,
>
where
    T: 'static + Clone,
{
    make_shuffle_amplification_with(step_epsilon, step_delta, num_steps, NoiseSource::from_entropy())
}

/// [`make_shuffle_amplification`] drawing from `source`.
pub fn make_shuffle_amplification_with<T>(
    step_epsilon: f64,
    step_delta: f64,
    num_steps: usize,
    source: NoiseSource,
) -> Result<
    Measurement<
        SizedDomain<AllDomain<T>>,
        SizedDomain<AllDomain<T>>,
        SymmetricDistance,
        SmoothedMaxDivergence<f64>,
    >,
>
where
    T: 'static + Clone,
{
    if !(step_epsilon.is_finite() && step_epsilon >= 0.0) {
        return Err(DpError::native(format!(
            "step epsilon must be finite and non-negative, got {}",
            step_epsilon
        )));
    }
    if !(0.0..=1.0).contains(&step_delta) {
        return Err(DpError::native(format!(
            "step delta must lie in [0, 1], got {}",
            step_delta
        )));
    }
    if num_steps == 0 {
        return Err(DpError::native("shuffling needs at least one step"));
    }
    let n = num_steps as f64;

    let relation = Relation::new(move |d_in: &IntDistance, (eps, delta): &(f64, f64)| {
        let k = d_in / 2 + d_in % 2;
        if k == 0 {
            return Ok(true);
        }
        let k = f64::from(k);
        let group_delta = k * ((k - 1.0) * step_epsilon).exp() * step_delta;
        if k * step_epsilon <= *eps && group_delta <= *delta {
            return Ok(true);
        }
        Ok(k == 1.0 && shuffled_within(step_epsilon, step_delta, n, *eps, *delta))
    });

    Ok(Measurement::new(
        SizedDomain::new(AllDomain::new(), num_steps),
        SizedDomain::new(AllDomain::new(), num_steps),
        Function::new(move |reports: &Vec<T>| {
            let mut shuffled = reports.clone();
            source.shuffle(&mut shuffled);
            shuffled
        }),
        SymmetricDistance,
        SmoothedMaxDivergence::new(),
        relation,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::domain::Domain;

    #[test]
    fn laplace_relation_is_sensitivity_over_scale() {
        let m = make_base_laplace_with(2.0, NoiseSource::seeded(1)).unwrap();
        assert!(m.check(&1.0, &0.5).unwrap());
        assert!(!m.check(&1.0, &0.49).unwrap());
        assert_eq!(m.privacy_relation.backward(&0.5).unwrap().unwrap(), 1.0);
    }

    #[test]
    fn zero_scale_is_only_private_for_identical_inputs() {
        let m = make_base_laplace_with(0.0, NoiseSource::seeded(1)).unwrap();
        assert!(m.check(&0.0, &0.0).unwrap());
        assert!(!m.check(&1.0, &1e300).unwrap());
        assert_eq!(m.invoke(&3.0).unwrap(), 3.0);
    }

    #[test]
    fn invalid_scales_are_rejected() {
        let err = make_base_laplace(-1.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NativeOperationFailed);
        assert!(make_base_geometric::<i32, f64>(f64::NAN, None).is_err());
        assert!(make_base_geometric::<i32, f64>(1.0, Some((5, 1))).is_err());
    }

    #[test]
    fn seeded_measurements_repeat() {
        let a = make_base_vector_laplace_with(1.0, NoiseSource::seeded(3)).unwrap();
        let b = make_base_vector_laplace_with(1.0, NoiseSource::seeded(3)).unwrap();
        let input = vec![0.0; 8];
        assert_eq!(a.invoke(&input).unwrap(), b.invoke(&input).unwrap());
    }

    #[test]
    fn gaussian_classical_bound() {
        let m = make_base_gaussian_with(10.0, NoiseSource::seeded(1)).unwrap();
        let tail = (2.0f64 * (1.25f64 / 1e-5).ln()).sqrt();
        let eps = tail / 10.0;
        assert!(m.check(&1.0, &(eps * 1.0001, 1e-5)).unwrap());
        assert!(!m.check(&1.0, &(eps * 0.9999, 1e-5)).unwrap());
        assert!(!m.check(&1.0, &(0.5, 0.0)).unwrap());
        let err = m.check(&1.0, &(1.5, 1e-5)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NativeOperationFailed);
    }

    #[test]
    fn zcdp_rho_is_half_squared_ratio() {
        let m = make_base_gaussian_zcdp_with(2.0, NoiseSource::seeded(1)).unwrap();
        assert!(m.check(&1.0, &0.125).unwrap());
        assert!(!m.check(&1.0, &0.124).unwrap());
        assert_eq!(m.privacy_relation.backward(&0.125).unwrap().unwrap(), 1.0);
    }

    #[test]
    fn geometric_respects_bounds() {
        let m = make_base_geometric_with::<i32, f64>(50.0, Some((0, 10)), NoiseSource::seeded(5))
            .unwrap();
        for _ in 0..100 {
            let out = m.invoke(&5).unwrap();
            assert!((0..=10).contains(&out));
        }
        assert!(m.check(&1, &0.02).unwrap());
        assert!(!m.check(&2, &0.02).unwrap());
    }

    #[test]
    fn geometric_saturates_without_bounds() {
        let m = make_base_geometric_with::<u8, f64>(1e6, None, NoiseSource::seeded(8)).unwrap();
        for _ in 0..20 {
            m.invoke(&u8::MAX).unwrap();
        }
    }
    #[test]
    fn geometric_backward_map_floors() {
        let m = make_base_geometric_with::<i32, f64>(1.0, None, NoiseSource::seeded(1)).unwrap();
        assert_eq!(m.privacy_relation.backward(&1.5).unwrap().unwrap(), 1);
        assert_eq!(m.privacy_relation.backward(&0.99).unwrap().unwrap(), 0);
    }

    #[test]
    fn vector_gaussian_shares_the_scalar_bound() {
        let scalar = make_base_gaussian_with(4.0, NoiseSource::seeded(1)).unwrap();
        let vector = make_base_vector_gaussian_with(4.0, NoiseSource::seeded(1)).unwrap();
        for budget in [(0.5, 1e-6), (0.9, 1e-3), (0.2, 1e-9)] {
            assert_eq!(
                scalar.check(&2.0, &budget).unwrap(),
                vector.check(&2.0, &budget).unwrap()
            );
        }
        assert_eq!(vector.invoke(&vec![0.0; 5]).unwrap().len(), 5);
        assert!(vector.check(&1.0, &(2.0, 1e-6)).is_err());
    }

    #[test]
    fn vector_geometric_clamps_every_element() {
        let m = make_base_vector_geometric_with::<i64, f64>(20.0, Some((0, 3)), NoiseSource::seeded(4))
            .unwrap();
        let out = m.invoke(&vec![0, 1, 2, 3, 100]).unwrap();
        assert_eq!(out.len(), 5);
        assert!(out.iter().all(|v| (0..=3).contains(v)));
        assert!(m.check(&4, &0.2).unwrap());
        assert!(!m.check(&5, &0.2).unwrap());
    }

    #[test]
    fn constant_time_geometric_stays_in_bounds() {
        let m = make_constant_time_base_geometric_with::<i32, f64>(2.0, -5, 5, NoiseSource::seeded(6))
            .unwrap();
        for arg in [-100, -5, 0, 5, 100] {
            let out = m.invoke(&arg).unwrap();
            assert!((-5..=5).contains(&out));
        }
        assert!(m.check(&1, &0.5).unwrap());
        assert!(!m.check(&1, &0.49).unwrap());
        assert!(make_constant_time_base_geometric::<i32, f64>(1.0, 3, 1).is_err());
        assert!(make_constant_time_base_geometric::<i128, f64>(1.0, i128::MIN, i128::MAX).is_err());
    }

    #[test]
    fn constant_time_vector_geometric_without_noise_clamps() {
        let m = make_constant_time_base_vector_geometric_with::<u8, f64>(
            0.0,
            10,
            20,
            NoiseSource::seeded(1),
        )
        .unwrap();
        assert_eq!(m.invoke(&vec![0, 15, 255]).unwrap(), vec![10, 15, 20]);
    }

    #[test]
    fn stability_thresholds_noisy_frequencies() {
        let m = make_base_stability_with::<String, u32, f64>(100, 0.001, 0.05, NoiseSource::seeded(9))
            .unwrap();
        let mut counts = HashMap::new();
        counts.insert("common".to_owned(), 60u32);
        counts.insert("rare".to_owned(), 1u32);
        let released = m.invoke(&counts).unwrap();
        assert!(released.contains_key("common"));
        assert!(!released.contains_key("rare"));
        assert!((released["common"] - 0.6).abs() < 0.05);
    }

    #[test]
    fn stability_relation_needs_scale_and_threshold() {
        let n = 1000;
        let m = make_base_stability_with::<u8, u32, f64>(n, 0.002, 0.05, NoiseSource::seeded(1))
            .unwrap();
        // ideal scale 1 / (1000 * 0.5) = 0.002, ideal threshold 0.002 ln(2e6) + 0.001
        assert!(m.check(&1.0, &(0.5, 1e-6)).unwrap());
        assert!(!m.check(&1.0, &(0.4, 1e-6)).unwrap());
        assert!(!m.check(&1.0, &(0.5, 0.0)).unwrap());
        assert!(m.check(&0.0, &(0.0, 0.0)).unwrap());

        let low = make_base_stability_with::<u8, u32, f64>(n, 0.002, 0.01, NoiseSource::seeded(1))
            .unwrap();
        assert!(!low.check(&1.0, &(0.5, 1e-6)).unwrap());
        assert!(make_base_stability::<u8, u32, f64>(0, 1.0, 1.0).is_err());
    }

    #[test]
    fn shuffling_permutes_reports() {
        let m = make_shuffle_amplification_with::<u32>(1.0, 0.0, 20, NoiseSource::seeded(3)).unwrap();
        let reports: Vec<u32> = (0..20).collect();
        let mut out = m.invoke(&reports).unwrap();
        assert_ne!(out, reports);
        out.sort_unstable();
        assert_eq!(out, reports);
        assert!(!m.input_domain.member(&vec![1, 2, 3]).unwrap());
        assert!(make_shuffle_amplification::<u32>(1.0, 0.0, 0).is_err());
        assert!(make_shuffle_amplification::<u32>(1.0, 1.5, 5).is_err());
    }

    #[test]
    fn shuffling_falls_back_to_group_privacy() {
        let m = make_shuffle_amplification::<u32>(0.5, 1e-8, 10).unwrap();
        assert!(m.check(&0, &(0.0, 0.0)).unwrap());
        assert!(m.check(&2, &(0.5, 1e-8)).unwrap());
        assert!(!m.check(&2, &(0.49, 1e-8)).unwrap());
        let group_delta = 2.0 * 0.5f64.exp() * 1e-8;
        assert!(m.check(&4, &(1.0, group_delta * 1.0001)).unwrap());
        assert!(!m.check(&4, &(1.0, group_delta * 0.999)).unwrap());
    }

    #[test]
    fn shuffling_many_reports_amplifies() {
        let n = 1_000_000;
        let m = make_shuffle_amplification::<u8>(1.0, 0.0, n).unwrap();
        let delta = 1e-6;
        let e0 = 1.0f64.exp();
        let spread = 8.0 * (e0 * (4.0f64 / delta).ln()).sqrt() / (n as f64).sqrt() + 8.0 * e0 / n as f64;
        let amplified = (1.0 + (e0 - 1.0) / (e0 + 1.0) * spread).ln();
        assert!(amplified < 0.1);
        assert!(m.check(&1, &(amplified * 1.001, delta)).unwrap());
        assert!(!m.check(&1, &(amplified * 0.999, delta)).unwrap());
        assert!(!m.check(&3, &(amplified * 1.001, delta)).unwrap());
    }
}
