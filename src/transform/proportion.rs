//! Smithson-Verkuilen bounded-proportion transform
//!
//! Maps proportions on the closed interval [0, 1] into the open interval
//! (0, 1) required by a Beta likelihood:
//!
//! ```text
//! p* = (p (n - 1) + 0.5) / n
//! p  = (p* n - 0.5) / (n - 1)
//! ```
//!
//! `n` is the count of non-missing observations in the whole dataset. It is
//! fixed once and must be shared by the forward and inverse transforms;
//! recomputing it after filtering breaks the round trip.

use crate::constants::transform::{MIN_OBSERVATIONS, SHRINK_OFFSET};
use crate::error::{AnalysisError, Result};

/// Transform `p` in [0, 1] into (0, 1) for a dataset of `n` observations
///
/// # Errors
///
/// `DomainError` if `p` is outside [0, 1] (or not finite) or `n <= 1`.
pub fn transform(p: f64, n: usize) -> Result<f64> {
    ProportionTransform::new(n)?.transform(p)
}

/// Exact inverse of [`transform`] for the same `n`
///
/// # Errors
///
/// `DomainError` if `p_star` is outside [0, 1] (or not finite) or `n <= 1`.
pub fn inverse(p_star: f64, n: usize) -> Result<f64> {
    ProportionTransform::new(n)?.inverse(p_star)
}

/// Bounded-proportion transform with its observation count pinned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProportionTransform {
    n: usize,
}

impl ProportionTransform {
    /// Create a transform for a dataset of `n` non-missing observations
    pub fn new(n: usize) -> Result<Self> {
        if n < MIN_OBSERVATIONS {
            return Err(AnalysisError::domain("n", n));
        }
        Ok(Self { n })
    }

    /// Create a transform whose `n` counts the non-missing observations
    ///
    /// A missing value is `None` or NaN. The count is taken once here;
    /// later filtering of the dataset does not change it.
    pub fn from_observations(observations: &[Option<f64>]) -> Result<Self> {
        let n = observations.iter().filter(|p| !is_missing(p)).count();
        Self::new(n)
    }

    /// Observation count the transform was built with
    pub fn observation_count(&self) -> usize {
        self.n
    }

    /// Map a proportion in [0, 1] strictly into (0, 1)
    pub fn transform(&self, p: f64) -> Result<f64> {
        if !(0.0..=1.0).contains(&p) {
            return Err(AnalysisError::domain("p", p));
        }
        let n = self.n as f64;
        Ok((p * (n - 1.0) + SHRINK_OFFSET) / n)
    }

    /// Map a transformed proportion back to the original scale
    pub fn inverse(&self, p_star: f64) -> Result<f64> {
        if !(0.0..=1.0).contains(&p_star) {
            return Err(AnalysisError::domain("p_star", p_star));
        }
        let n = self.n as f64;
        Ok((p_star * n - SHRINK_OFFSET) / (n - 1.0))
    }

    /// Transform a column, passing missing values through as `None`
    pub fn transform_all(&self, observations: &[Option<f64>]) -> Result<Vec<Option<f64>>> {
        map_column(observations, |p| self.transform(p))
    }

    /// Back-transform a column, passing missing values through as `None`
    pub fn inverse_column(&self, values: &[Option<f64>]) -> Result<Vec<Option<f64>>> {
        map_column(values, |p_star| self.inverse(p_star))
    }

    /// Back-transform a batch of draws on the transformed scale
    pub fn inverse_all(&self, draws: &[f64]) -> Result<Vec<f64>> {
        draws.iter().map(|&p_star| self.inverse(p_star)).collect()
    }
}

fn is_missing(value: &Option<f64>) -> bool {
    value.map_or(true, f64::is_nan)
}

fn map_column(column: &[Option<f64>], f: impl Fn(f64) -> Result<f64>) -> Result<Vec<Option<f64>>> {
    column
        .iter()
        .map(|value| match value {
            Some(v) if !is_missing(value) => f(*v).map(Some),
            _ => Ok(None),
        })
        .collect()
}

/// A proportion of a known maximum, constrained to [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProportionObservation(f64);

impl ProportionObservation {
    /// Validate a proportion
    pub fn new(p: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&p) {
            return Err(AnalysisError::domain("proportion", p));
        }
        Ok(Self(p))
    }

    /// Proportion of `offered` that was `consumed` (e.g. grams of food)
    ///
    /// A result above 1 usually points to a unit mismatch and is rejected
    /// rather than clamped.
    pub fn from_amounts(consumed: f64, offered: f64) -> Result<Self> {
        if !(offered.is_finite() && offered > 0.0) {
            return Err(AnalysisError::domain("offered", offered));
        }
        Self::new(consumed / offered)
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const SAMPLE_SIZES: [usize; 4] = [2, 10, 100, 1000];

    #[test]
    fn test_round_trip_dense_grid() {
        for n in SAMPLE_SIZES {
            for i in 0..=1000 {
                let p = i as f64 / 1000.0;
                let back = inverse(transform(p, n).unwrap(), n).unwrap();
                assert_abs_diff_eq!(back, p, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_boundaries_map_inside_open_interval() {
        for n in SAMPLE_SIZES {
            let low = transform(0.0, n).unwrap();
            let high = transform(1.0, n).unwrap();
            assert!(low > 0.0, "transform(0, {}) = {}", n, low);
            assert!(high < 1.0, "transform(1, {}) = {}", n, high);
            assert_abs_diff_eq!(low, 0.5 / n as f64, epsilon = 1e-15);
        }
    }

    #[test]
    fn test_monotonic() {
        let t = ProportionTransform::new(10).unwrap();
        let values: Vec<f64> = (0..=100)
            .map(|i| t.transform(i as f64 / 100.0).unwrap())
            .collect();
        assert!(values.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_domain_rejection() {
        assert!(matches!(transform(-0.1, 10), Err(AnalysisError::DomainError { .. })));
        assert!(matches!(transform(1.1, 10), Err(AnalysisError::DomainError { .. })));
        assert!(matches!(transform(0.5, 1), Err(AnalysisError::DomainError { .. })));
        assert!(matches!(transform(f64::NAN, 10), Err(AnalysisError::DomainError { .. })));
        assert!(matches!(inverse(0.5, 0), Err(AnalysisError::DomainError { .. })));
        assert!(matches!(inverse(1.5, 10), Err(AnalysisError::DomainError { .. })));
    }

    #[test]
    fn test_observation_count_ignores_missing() {
        let column = [Some(0.0), None, Some(0.25), Some(f64::NAN), Some(0.9)];
        let t = ProportionTransform::from_observations(&column).unwrap();
        assert_eq!(t.observation_count(), 3);

        let transformed = t.transform_all(&column).unwrap();
        assert_eq!(transformed.len(), column.len());
        assert!(transformed[1].is_none());
        assert!(transformed[3].is_none());
        assert_abs_diff_eq!(transformed[0].unwrap(), 0.5 / 3.0, epsilon = 1e-15);
    }

    #[test]
    fn test_inverse_column_restores_transformed_column() {
        let column = [Some(0.0), None, Some(0.2), Some(0.5), Some(f64::NAN), Some(0.9)];
        let t = ProportionTransform::from_observations(&column).unwrap();
        let back = t.inverse_column(&t.transform_all(&column).unwrap()).unwrap();

        assert!(back[1].is_none());
        assert!(back[4].is_none());
        for i in [0, 2, 3, 5] {
            assert_abs_diff_eq!(back[i].unwrap(), column[i].unwrap(), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_too_few_observations() {
        let column = [Some(0.3), None];
        assert!(ProportionTransform::from_observations(&column).is_err());
    }

    #[test]
    fn test_inverse_all_draws() {
        let t = ProportionTransform::new(100).unwrap();
        let draws = [0.005, 0.25, 0.5, 0.995];
        let back = t.inverse_all(&draws).unwrap();
        assert_abs_diff_eq!(back[0], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(back[2], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(back[3], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_proportion_from_amounts() {
        let p = ProportionObservation::from_amounts(0.0, 2.5).unwrap();
        assert_eq!(p.value(), 0.0);
        let p = ProportionObservation::from_amounts(1.2, 2.4).unwrap();
        assert_abs_diff_eq!(p.value(), 0.5, epsilon = 1e-15);

        assert!(ProportionObservation::from_amounts(3.0, 2.4).is_err());
        assert!(ProportionObservation::from_amounts(1.0, 0.0).is_err());
    }
}
