//! Configuration structures for the shellscan analysis pipeline.
//!
//! This module defines all tunable parameters for reflectance calibration
//! and proportion transforms, organized into logical groups.
//!
//! # Configuration Loading
//!
//! Configuration can be loaded from JSON files or constructed programmatically:
//!
//! ```no_run
//! use shellscan::PipelineConfig;
//! use std::path::Path;
//!
//! // Load from file
//! let config = PipelineConfig::from_json_file(Path::new("config.json"))?;
//!
//! // Or use defaults
//! let config = PipelineConfig::default_config();
//! # Ok::<(), shellscan::AnalysisError>(())
//! ```
//!
//! # Configuration Sections
//!
//! - [`FittingConfig`]: Curve starting values and iteration cap
//! - [`BatchConfig`]: Parallelism and failure handling
//! - [`TransformConfig`]: Pinned observation count for the proportion transform
//! - [`ScaleParameters`]: Optional fixed covariate scaling

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::fitting;
use crate::error::{AnalysisError, Result};
use crate::transform::{ProportionTransform, ScaleParameters};

/// Complete pipeline configuration.
///
/// Can be serialized to/from JSON for reproducible analyses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Calibration table (long-format CSV)
    pub input_path: PathBuf,

    /// Reflectance output table (CSV)
    pub output_path: PathBuf,

    /// Curve fitting configuration
    pub fitting: FittingConfig,

    /// Batch processing configuration
    #[serde(default)]
    pub batch: BatchConfig,

    /// Proportion transform configuration
    #[serde(default)]
    pub transform: TransformConfig,

    /// Covariate scaling fixed for the whole analysis
    #[serde(default)]
    pub scaling: Option<ScaleParameters>,
}

/// Nonlinear least-squares parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittingConfig {
    /// Starting value for the curve scale `a`
    pub start_a: f64,

    /// Starting value for the curve rate `b`
    pub start_b: f64,

    /// Budget of residual evaluations for the solver, rounded up to whole
    /// solver steps; exhausting it is a fit divergence
    pub max_iterations: usize,
}

impl Default for FittingConfig {
    fn default() -> Self {
        Self {
            start_a: fitting::START_A,
            start_b: fitting::START_B,
            max_iterations: fitting::MAX_ITERATIONS,
        }
    }
}

/// Batch processing parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Fit photos in parallel
    pub parallel: bool,

    /// Stop at the first failing specimen instead of recording it as invalid
    pub fail_fast: bool,
}

/// Proportion transform parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformConfig {
    /// Dataset-wide observation count `n`.
    /// When unset, it is counted once from the proportion table.
    pub observation_count: Option<usize>,
}

impl TransformConfig {
    /// Build the transform, preferring the pinned count over the dataset count
    pub fn build(&self, observations: &[Option<f64>]) -> Result<ProportionTransform> {
        let counted = ProportionTransform::from_observations(observations);
        match self.observation_count {
            Some(pinned) => {
                if let Ok(counted) = &counted {
                    if counted.observation_count() != pinned {
                        log::warn!(
                            "Pinned observation count {} differs from the {} non-missing values in the table",
                            pinned,
                            counted.observation_count()
                        );
                    }
                }
                ProportionTransform::new(pinned)
            }
            None => counted,
        }
    }

    /// Build the transform for mapping model output back to proportions
    ///
    /// Values on the transformed scale are usually a subset or a set of
    /// posterior draws, so `n` cannot be counted from them. It must be the
    /// pinned count of the original dataset.
    pub fn build_inverse(&self) -> Result<ProportionTransform> {
        match self.observation_count {
            Some(pinned) => ProportionTransform::new(pinned),
            None => Err(AnalysisError::invalid_parameter(
                "transform.observation_count",
                "unset (required to invert transformed values)",
            )),
        }
    }
}

impl PipelineConfig {
    /// Create the default configuration
    pub fn default_config() -> Self {
        Self {
            input_path: PathBuf::from("data/calibration.csv"),
            output_path: PathBuf::from("output/reflectance.csv"),
            fitting: FittingConfig::default(),
            batch: BatchConfig {
                parallel: true,
                fail_fast: false,
            },
            transform: TransformConfig::default(),
            scaling: None,
        }
    }

    /// Check parameter ranges
    pub fn validate(&self) -> Result<()> {
        if self.fitting.max_iterations == 0 {
            return Err(AnalysisError::invalid_parameter("fitting.max_iterations", 0));
        }
        if !self.fitting.start_a.is_finite() {
            return Err(AnalysisError::invalid_parameter("fitting.start_a", self.fitting.start_a));
        }
        if !self.fitting.start_b.is_finite() {
            return Err(AnalysisError::invalid_parameter("fitting.start_b", self.fitting.start_b));
        }
        if let Some(n) = self.transform.observation_count {
            ProportionTransform::new(n)?;
        }
        if let Some(scaling) = self.scaling {
            ScaleParameters::new(scaling.mean, scaling.sd)?;
        }
        Ok(())
    }

    /// Load configuration from JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AnalysisError::config(format!("cannot read {}", path.display()), e))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| AnalysisError::config(format!("cannot parse {}", path.display()), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to JSON file
    pub fn to_json_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| AnalysisError::config("cannot serialize configuration", e))?;
        std::fs::write(path, json)
            .map_err(|e| AnalysisError::config(format!("cannot write {}", path.display()), e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.fitting.start_a, 5.0);
        assert_eq!(config.fitting.start_b, 0.01);
        assert_eq!(config.fitting.max_iterations, 50);
    }

    #[test]
    fn test_json_round_trip() {
        let mut config = PipelineConfig::default_config();
        config.transform.observation_count = Some(412);
        config.scaling = Some(ScaleParameters::new(21.3, 4.8).unwrap());

        let json = serde_json::to_string(&config).unwrap();
        let parsed: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_optional_sections_default() {
        let json = r#"{
            "input_path": "cal.csv",
            "output_path": "out.csv",
            "fitting": { "start_a": 5.0, "start_b": 0.01, "max_iterations": 50 }
        }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert!(!config.batch.parallel);
        assert!(config.transform.observation_count.is_none());
        assert!(config.scaling.is_none());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = PipelineConfig::default_config();
        config.fitting.max_iterations = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default_config();
        config.transform.observation_count = Some(1);
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default_config();
        config.fitting.start_b = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverse_requires_dataset_count() {
        let err = TransformConfig::default().build_inverse().unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidParameter { .. }));

        // n from the original five observations, not from the draws being inverted
        let dataset = [Some(0.0), Some(0.2), None, Some(0.5), Some(0.9), Some(0.3)];
        let forward = TransformConfig::default().build(&dataset).unwrap();
        let pinned = TransformConfig {
            observation_count: Some(forward.observation_count()),
        };
        let inverse = pinned.build_inverse().unwrap();
        assert_eq!(inverse.observation_count(), 5);

        let draws = [forward.transform(0.0).unwrap(), forward.transform(0.2).unwrap()];
        let back = inverse.inverse_all(&draws).unwrap();
        assert!((back[0] - 0.0).abs() < 1e-12);
        assert!((back[1] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_pinned_observation_count_wins() {
        let transform = TransformConfig {
            observation_count: Some(400),
        };
        let built = transform.build(&[Some(0.1), Some(0.2), None]).unwrap();
        assert_eq!(built.observation_count(), 400);

        let counted = TransformConfig::default()
            .build(&[Some(0.1), Some(0.2), None])
            .unwrap();
        assert_eq!(counted.observation_count(), 2);
    }
}
