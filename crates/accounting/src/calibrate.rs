//! Calibration of free parameters against a target `(d_in, d_out)` bound.
//!
//! The search brackets the point where a monotone predicate changes value,
//! then bisects down to adjacent values. Whether the predicate holds at the
//! low or the high end of the bracket decides the direction: the smallest
//! passing parameter is returned when it holds at the high end (noise
//! scales), the largest when it holds at the low end (budgets, sample sizes).

use std::cell::RefCell;

use tracing::{debug, info, warn};

use dp_chain_core::search::bisect_boundary;
use dp_chain_core::{Bisect, DpError, Relate, Result};

use crate::config::SearchConfig;

/// Runs the predicate, treating errors as "does not hold" and remembering
/// the last one.
struct Trial<F> {
    predicate: F,
    last_error: RefCell<Option<DpError>>,
}

impl<F> Trial<F> {
    fn new(predicate: F) -> Self {
        Self {
            predicate,
            last_error: RefCell::new(None),
        }
    }

    fn run<P: Bisect>(&self, param: P) -> bool
    where
        F: Fn(&P) -> Result<bool>,
    {
        match (self.predicate)(&param) {
            Ok(passed) => {
                debug!(?param, passed, "calibration trial");
                passed
            }
            Err(error) => {
                warn!(?param, %error, "calibration trial failed");
                *self.last_error.borrow_mut() = Some(error);
                false
            }
        }
    }

    /// The last trial error, or a search failure.
    fn failure(self, msg: impl Into<String>) -> DpError {
        self.last_error
            .into_inner()
            .unwrap_or_else(|| DpError::search_exhausted(msg))
    }
}

/// Find two adjacent-enough points around the centre where the predicate
/// differs, probing `0`, then `+1, -1, +2, -2, ...`.
fn bracket<P: Bisect, F: Fn(&P) -> Result<bool>>(
    trial: &Trial<F>,
    config: &SearchConfig,
) -> Option<(P, P)> {
    let centre = P::origin();
    let at_centre = trial.run(centre);

    let mut offset = P::unit();
    for _ in 0..config.max_doublings {
        if trial.run(offset) != at_centre {
            return Some((centre, offset));
        }
        if P::SIGNED {
            if let Some(negative) = offset.negate() {
                if trial.run(negative) != at_centre {
                    return Some((negative, centre));
                }
            }
        }
        offset = offset.double()?;
    }
    None
}

/// Find where a monotone predicate changes value.
///
/// Without `bounds` the bracket is found by exponential probing around zero.
/// Returns the smallest passing parameter if the predicate holds at the high
/// end of the bracket, otherwise the largest.
pub fn binary_search<P, F>(predicate: F, bounds: Option<(P, P)>, config: &SearchConfig) -> Result<P>
where
    P: Bisect,
    F: Fn(&P) -> Result<bool>,
{
    let trial = Trial::new(predicate);

    let (lo, hi) = match bounds {
        Some((lo, hi)) => {
            if !(lo <= hi) {
                return Err(DpError::native(format!(
                    "lower bound {:?} may not exceed upper bound {:?}",
                    lo, hi
                )));
            }
            if trial.run(lo) == trial.run(hi) {
                return Err(trial.failure(format!(
                    "predicate agrees at both bounds {:?} and {:?}",
                    lo, hi
                )));
            }
            (lo, hi)
        }
        None => match bracket(&trial, config) {
            Some(found) => found,
            None => {
                return Err(trial.failure(format!(
                    "no change in the predicate within {} doublings of zero",
                    config.max_doublings
                )))
            }
        },
    };

    let minimize = trial.run(hi);
    let (lo, hi) = bisect_boundary(
        lo,
        hi,
        minimize,
        |param| Ok(trial.run(param)),
        config.max_bisections,
    )?;
    let param = if minimize { hi } else { lo };
    info!(?param, minimize, "calibrated parameter");
    Ok(param)
}

/// The parameter at which the step built by `make_chain` meets `(d_in, d_out)`.
///
/// A parameter for which construction fails counts as not meeting the bound.
pub fn binary_search_param<P, S, F>(
    make_chain: F,
    d_in: &S::InputDistance,
    d_out: &S::OutputDistance,
    bounds: Option<(P, P)>,
    config: &SearchConfig,
) -> Result<P>
where
    P: Bisect,
    S: Relate,
    F: Fn(&P) -> Result<S>,
{
    binary_search(
        |param: &P| make_chain(param)?.check(d_in, d_out),
        bounds,
        config,
    )
}

/// The step built by `make_chain` at the calibrated parameter.
pub fn binary_search_chain<P, S, F>(
    make_chain: F,
    d_in: &S::InputDistance,
    d_out: &S::OutputDistance,
    bounds: Option<(P, P)>,
    config: &SearchConfig,
) -> Result<S>
where
    P: Bisect,
    S: Relate,
    F: Fn(&P) -> Result<S>,
{
    let param = binary_search_param(&make_chain, d_in, d_out, bounds, config)?;
    make_chain(&param)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dp_chain_core::{make_base_laplace_with, make_count, ErrorKind, NoiseSource};
    use proptest::prelude::*;

    fn prev_float(x: f64) -> f64 {
        f64::from_bits(x.to_bits() - 1)
    }

    #[test]
    fn minimal_passing_integer() {
        let found = binary_search(|n: &i64| Ok(*n >= 37), None, &SearchConfig::default());
        assert_eq!(found.unwrap(), 37);
    }

    #[test]
    fn maximal_passing_integer() {
        let found = binary_search(|n: &u32| Ok(*n <= 1_000), None, &SearchConfig::default());
        assert_eq!(found.unwrap(), 1_000);
    }

    #[test]
    fn negative_side_is_searched_for_signed_types() {
        let found = binary_search(|x: &f64| Ok(*x >= -3.5), None, &SearchConfig::default());
        assert_eq!(found.unwrap(), -3.5);
    }

    #[test]
    fn explicit_bounds_that_agree_are_exhausted() {
        let err = binary_search(|_: &f64| Ok(true), Some((0.0, 10.0)), &SearchConfig::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SearchBoundsExhausted);
    }

    #[test]
    fn bracketing_gives_up_after_doublings() {
        let config = SearchConfig::default().with_max_doublings(4);
        let err = binary_search(|x: &f64| Ok(*x >= 100.0), None, &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SearchBoundsExhausted);
    }

    #[test]
    fn failed_trials_are_surfaced_when_bracketing_fails() {
        let err = binary_search(
            |_: &f64| Err(DpError::native("boom")),
            None,
            &SearchConfig::default().with_max_doublings(3),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NativeOperationFailed);
        assert_eq!(err.message(), "boom");
    }

    #[test]
    fn calibrates_laplace_scale() {
        let scale = binary_search_param(
            |s: &f64| make_base_laplace_with(*s, NoiseSource::seeded(0)),
            &1.0,
            &0.5,
            None,
            &SearchConfig::default(),
        )
        .unwrap();
        assert_eq!(scale, 2.0);
    }

    #[test]
    fn calibrates_chain_and_returns_step() {
        let count = make_count::<String, i32>();
        let chain = binary_search_chain(
            |s: &f64| {
                let meas = dp_chain_core::make_base_geometric_with::<i32, f64>(
                    *s,
                    None,
                    NoiseSource::seeded(0),
                )?;
                dp_chain_core::make_chain_mt(&count, &meas)
            },
            &1,
            &1.0,
            None,
            &SearchConfig::default(),
        )
        .unwrap();
        assert!(chain.check(&1, &1.0).unwrap());
    }

    proptest! {
        #[test]
        fn calibration_is_tight(d_in in 1e-3f64..1e3, d_out in 1e-3f64..1e3) {
            let make = |s: &f64| make_base_laplace_with(*s, NoiseSource::seeded(0));
            let scale = binary_search_param(make, &d_in, &d_out, None, &SearchConfig::default())
                .unwrap();
            prop_assert!(make(&scale).unwrap().check(&d_in, &d_out).unwrap());
            prop_assert!(!make(&prev_float(scale)).unwrap().check(&d_in, &d_out).unwrap());
        }
    }
}
