//! Noise samplers used by the measurements.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rand_distr::{Distribution, Exp, Normal};

use crate::error::{DpError, Result};

/// A shared random number generator.
///
/// Measurements built from the same source draw from one stream, so a seeded
/// source makes a whole pipeline reproducible.
#[derive(Clone)]
pub struct NoiseSource {
    rng: Rc<RefCell<ChaCha20Rng>>,
}

impl fmt::Debug for NoiseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NoiseSource")
    }
}

impl Default for NoiseSource {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl NoiseSource {
    /// Seed from operating system entropy.
    pub fn from_entropy() -> Self {
        Self::from_rng(ChaCha20Rng::from_entropy())
    }

    /// Deterministic stream for a seed.
    pub fn seeded(seed: u64) -> Self {
        Self::from_rng(ChaCha20Rng::seed_from_u64(seed))
    }

    fn from_rng(rng: ChaCha20Rng) -> Self {
        Self {
            rng: Rc::new(RefCell::new(rng)),
        }
    }

    fn sample<D: Distribution<f64>>(&self, dist: &D) -> f64 {
        dist.sample(&mut *self.rng.borrow_mut())
    }

    /// A uniform draw from `[0, 1)`.
    pub fn uniform(&self) -> f64 {
        self.rng.borrow_mut().gen::<f64>()
    }

    /// Laplace noise centred at zero.
    ///
    /// Sampled as the difference of two exponentials.
    pub fn laplace(&self, scale: f64) -> Result<f64> {
        check_scale(scale)?;
        if scale == 0.0 {
            return Ok(0.0);
        }
        let dist = Exp::new(1.0 / scale).map_err(|e| DpError::native(e.to_string()))?;
        Ok(self.sample(&dist) - self.sample(&dist))
    }

    /// Gaussian noise centred at zero.
    pub fn gaussian(&self, scale: f64) -> Result<f64> {
        check_scale(scale)?;
        if scale == 0.0 {
            return Ok(0.0);
        }
        let dist = Normal::new(0.0, scale).map_err(|e| DpError::native(e.to_string()))?;
        Ok(self.sample(&dist))
    }

    /// Two-sided geometric noise: `P(k)` proportional to `exp(-|k| / scale)`.
    ///
    /// Each side is the floor of an exponential draw, which is geometric with
    /// success probability `1 - exp(-1 / scale)`.
    pub fn two_sided_geometric(&self, scale: f64) -> Result<i128> {
        check_scale(scale)?;
        if scale == 0.0 {
            return Ok(0);
        }
        let dist = Exp::new(1.0 / scale).map_err(|e| DpError::native(e.to_string()))?;
        let positive = self.sample(&dist).floor() as i128;
        let negative = self.sample(&dist).floor() as i128;
        Ok(positive.saturating_sub(negative))
    }

    /// Two-sided geometric noise drawn from a fixed number of uniforms.
    ///
    /// Every call draws `max_trials + 1` uniforms whatever the outcome.
    /// Magnitudes stop at `max_trials + 1`, which is invisible once the
    /// release is clamped into a range `max_trials` wide.
    pub fn two_sided_geometric_bounded(&self, scale: f64, max_trials: u64) -> Result<i128> {
        check_scale(scale)?;
        let alpha = if scale == 0.0 { 0.0 } else { (-1.0 / scale).exp() };
        let zero_mass = (1.0 - alpha) / (1.0 + alpha);

        let side = self.uniform();
        let mut failures: u64 = 0;
        let mut stopped = false;
        for _ in 0..max_trials {
            stopped |= self.uniform() < 1.0 - alpha;
            if !stopped {
                failures += 1;
            }
        }

        if side < zero_mass {
            return Ok(0);
        }
        let magnitude = i128::from(failures) + 1;
        if side < zero_mass + (1.0 - zero_mass) / 2.0 {
            Ok(magnitude)
        } else {
            Ok(-magnitude)
        }
    }

    /// Permute `values` uniformly at random.
    pub fn shuffle<T>(&self, values: &mut [T]) {
        values.shuffle(&mut *self.rng.borrow_mut());
    }
}

/// Reject negative or non-finite noise scales.
pub fn check_scale(scale: f64) -> Result<()> {
    if scale.is_finite() && scale >= 0.0 {
        Ok(())
    } else {
        Err(DpError::native(format!(
            "scale must be finite and non-negative, got {}",
            scale
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_sources_repeat() {
        let a = NoiseSource::seeded(42);
        let b = NoiseSource::seeded(42);
        for _ in 0..10 {
            assert_eq!(a.laplace(1.0).unwrap(), b.laplace(1.0).unwrap());
        }
    }

    #[test]
    fn clones_share_one_stream() {
        let a = NoiseSource::seeded(7);
        let b = a.clone();
        let fresh = NoiseSource::seeded(7);
        let first = a.uniform();
        assert_eq!(first, fresh.uniform());
        assert_eq!(b.uniform(), fresh.uniform());
    }

    #[test]
    fn gaussian_statistics() {
        let source = NoiseSource::seeded(123);
        let draws: Vec<f64> = (0..10_000).map(|_| source.gaussian(1.0).unwrap()).collect();
        let mean = draws.iter().sum::<f64>() / draws.len() as f64;
        let var = draws.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / draws.len() as f64;
        assert!(mean.abs() < 0.1);
        assert!((var - 1.0).abs() < 0.1);
    }

    #[test]
    fn geometric_is_symmetric_and_integral() {
        let source = NoiseSource::seeded(9);
        let draws: Vec<i128> = (0..10_000)
            .map(|_| source.two_sided_geometric(2.0).unwrap())
            .collect();
        let mean = draws.iter().sum::<i128>() as f64 / draws.len() as f64;
        assert!(mean.abs() < 0.2);
        assert!(draws.iter().any(|k| *k < 0));
        assert!(draws.iter().any(|k| *k > 0));
    }

    #[test]
    fn bounded_geometric_stays_within_its_trials() {
        let source = NoiseSource::seeded(21);
        let draws: Vec<i128> = (0..5_000)
            .map(|_| source.two_sided_geometric_bounded(3.0, 4).unwrap())
            .collect();
        assert!(draws.iter().all(|k| k.abs() <= 5));
        assert!(draws.iter().any(|k| *k == 5));
        assert!(draws.iter().any(|k| *k == -5));
        let mean = draws.iter().sum::<i128>() as f64 / draws.len() as f64;
        assert!(mean.abs() < 0.2);
        assert_eq!(source.two_sided_geometric_bounded(0.0, 10).unwrap(), 0);
    }

    #[test]
    fn bounded_geometric_matches_unbounded_near_zero() {
        let source = NoiseSource::seeded(5);
        let n = 20_000;
        let zeros = (0..n)
            .filter(|_| source.two_sided_geometric_bounded(1.0, 50).unwrap() == 0)
            .count();
        let alpha = (-1.0f64).exp();
        let expected = (1.0 - alpha) / (1.0 + alpha);
        assert!((zeros as f64 / n as f64 - expected).abs() < 0.02);
    }

    #[test]
    fn shuffles_permute() {
        let source = NoiseSource::seeded(2);
        let mut values: Vec<u32> = (0..50).collect();
        source.shuffle(&mut values);
        assert_ne!(values, (0..50).collect::<Vec<_>>());
        values.sort_unstable();
        assert_eq!(values, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn zero_scale_is_noiseless_and_negative_scale_fails() {
        let source = NoiseSource::seeded(1);
        assert_eq!(source.laplace(0.0).unwrap(), 0.0);
        assert_eq!(source.two_sided_geometric(0.0).unwrap(), 0);
        assert!(source.gaussian(-1.0).is_err());
        assert!(source.laplace(f64::NAN).is_err());
    }
}
