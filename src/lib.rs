//! # shellscan
//!
//! A Rust crate for calibrated snail shell reflectance and bounded
//! proportion transforms in urban field studies.
//!
//! This library provides the numerical core feeding downstream regression models:
//! - Fitting exponential pixel-to-reflectance curves per photo and channel
//! - Predicting specimen reflectance with propagated measurement uncertainty
//! - Mapping food-intake proportions into (0, 1) for Beta likelihoods, and back
//! - Fixed covariate scaling shared across an analysis
//!
//! ## Example
//!
//! ```rust,no_run
//! use shellscan::{calibrate_table, table::save_reflectance};
//! use std::path::Path;
//!
//! let report = calibrate_table(Path::new("calibration.csv"))?;
//! println!("{} valid, {} invalid", report.valid_count(), report.invalid_count());
//! save_reflectance(Path::new("reflectance.csv"), &report.records)?;
//! # Ok::<(), shellscan::AnalysisError>(())
//! ```

use std::path::Path;

pub mod error;
pub mod constants;
pub mod config;
pub mod calibration;
pub mod transform;
pub mod table;
pub mod pipeline;

pub use calibration::{
    average_with_uncertainty, fit_channel_curve, CalibrationCurve, CalibrationSample, Channel,
    Measurement, ReflectanceEstimate,
};
pub use config::PipelineConfig;
pub use error::{AnalysisError, Result};
pub use pipeline::{BatchReport, CalibrationPipeline, SpecimenReflectance};
pub use transform::{ProportionTransform, ScaleParameters};

/// Calibrate every specimen in a long-format calibration table
///
/// Uses the default fitting parameters and sequential processing.
///
/// # Arguments
///
/// * `table_path` - Path to the calibration CSV
///
/// # Returns
///
/// A `BatchReport` with one record per specimen region
///
/// # Errors
///
/// Returns `AnalysisError` if the table cannot be read or parsed.
/// Per-specimen calibration failures are recorded in the report.
pub fn calibrate_table(table_path: &Path) -> Result<BatchReport> {
    let photos = table::load_calibration_table(table_path)?;
    CalibrationPipeline::new().run(&photos)
}

/// Calibrate a table with an explicit configuration
pub fn calibrate_with_config(config: &PipelineConfig) -> Result<BatchReport> {
    let pipeline = CalibrationPipeline::from_config(config)?;
    let photos = table::load_calibration_table(&config.input_path)?;
    pipeline.run(&photos)
}
