//! Centering and scaling of model covariates
//!
//! Scale parameters are computed once from the full dataset and then passed
//! around as configuration, so every consumer centers with the same mean and
//! standard deviation.

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

/// Mean and standard deviation used to standardize a covariate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleParameters {
    pub mean: f64,
    pub sd: f64,
}

impl ScaleParameters {
    /// Use known parameters
    pub fn new(mean: f64, sd: f64) -> Result<Self> {
        if !mean.is_finite() {
            return Err(AnalysisError::invalid_parameter("mean", mean));
        }
        if !(sd.is_finite() && sd > 0.0) {
            return Err(AnalysisError::invalid_parameter("sd", sd));
        }
        Ok(Self { mean, sd })
    }

    /// Estimate parameters from a column, skipping non-finite entries
    ///
    /// Uses the sample standard deviation (`n - 1` denominator).
    pub fn from_values(values: &[f64]) -> Result<Self> {
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.len() < 2 {
            return Err(AnalysisError::invalid_parameter(
                "scaling values",
                format!("{} finite values", finite.len()),
            ));
        }

        let n = finite.len() as f64;
        let mean = finite.iter().sum::<f64>() / n;
        let variance = finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        Self::new(mean, variance.sqrt())
    }

    /// Standardize one value
    pub fn scale(&self, x: f64) -> f64 {
        (x - self.mean) / self.sd
    }

    /// Undo [`ScaleParameters::scale`]
    pub fn unscale(&self, z: f64) -> f64 {
        z * self.sd + self.mean
    }

    pub fn scale_all(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|&x| self.scale(x)).collect()
    }
}
