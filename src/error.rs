//! Error types for the shellscan library

use crate::calibration::Channel;
use std::sync::Arc;
use thiserror::Error;

/// Result type alias for shellscan operations
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Comprehensive error types for calibration and transform operations
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Nonlinear curve fit did not converge within the evaluation budget
    #[error("Curve fit diverged for {channel} channel after {evaluations} evaluations: {reason}")]
    FitDivergence {
        channel: Channel,
        evaluations: usize,
        reason: String,
    },

    /// Fitted curve parameters are not finite
    #[error("Invalid {channel} calibration curve: a = {a}, b = {b}")]
    InvalidCurve { channel: Channel, a: f64, b: f64 },

    /// Fewer channel predictions than required for averaging
    #[error("Incomplete channels: expected {expected}, found {found}")]
    IncompleteChannels { expected: usize, found: usize },

    /// Transform or prediction input outside its mathematical domain
    #[error("Domain error: {parameter} = {value}")]
    DomainError { parameter: String, value: String },

    /// Calibration set cannot identify a two-parameter curve
    #[error("Insufficient calibration data for {channel} channel: {samples} samples, {distinct} distinct intensities")]
    InsufficientCalibration {
        channel: Channel,
        samples: usize,
        distinct: usize,
    },

    /// Invalid input parameters
    #[error("Invalid parameter: {parameter} = {value}")]
    InvalidParameter { parameter: String, value: String },

    /// Tabular input could not be read or written
    #[error("Table error: {message}")]
    TableError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration file could not be read, parsed or written
    #[error("Configuration error: {message}")]
    ConfigError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A photo-level curve failure shared by every specimen of that photo
    #[error(transparent)]
    CurveUnavailable(Arc<AnalysisError>),

    /// A single specimen could not be estimated
    #[error("Specimen '{specimen}' in photo '{photo}' failed: {source}")]
    SpecimenFailed {
        photo: String,
        specimen: String,
        #[source]
        source: Box<AnalysisError>,
    },
}

impl AnalysisError {
    /// Create a domain error for an out-of-range argument
    pub fn domain(parameter: impl Into<String>, value: impl ToString) -> Self {
        Self::DomainError {
            parameter: parameter.into(),
            value: value.to_string(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(parameter: impl Into<String>, value: impl ToString) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            value: value.to_string(),
        }
    }

    /// Create a table error with context
    pub fn table<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::TableError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a configuration error with context
    pub fn config<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ConfigError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Attach photo and specimen identifiers to a per-specimen failure
    pub fn for_specimen(self, photo: impl Into<String>, specimen: impl Into<String>) -> Self {
        Self::SpecimenFailed {
            photo: photo.into(),
            specimen: specimen.into(),
            source: Box::new(self),
        }
    }

    /// Innermost error, skipping specimen context
    pub fn root(&self) -> &AnalysisError {
        match self {
            AnalysisError::SpecimenFailed { source, .. } => source.root(),
            AnalysisError::CurveUnavailable(shared) => shared.root(),
            other => other,
        }
    }

    /// Check if this error points at the input data rather than the configuration
    ///
    /// Data errors call for inspecting the source image or table row;
    /// the remaining variants indicate a setup problem.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self.root(),
            AnalysisError::FitDivergence { .. }
                | AnalysisError::InvalidCurve { .. }
                | AnalysisError::IncompleteChannels { .. }
                | AnalysisError::DomainError { .. }
                | AnalysisError::InsufficientCalibration { .. }
        )
    }

    /// Get user-friendly error description for display
    pub fn user_message(&self) -> String {
        match self {
            AnalysisError::SpecimenFailed { photo, specimen, source } => {
                format!(
                    "Specimen '{}' (photo '{}'): {}",
                    specimen,
                    photo,
                    source.user_message()
                )
            }
            AnalysisError::CurveUnavailable(shared) => shared.user_message(),
            AnalysisError::FitDivergence { channel, .. } => {
                format!(
                    "The {} calibration curve did not converge. Check the grey standard readings in this image.",
                    channel
                )
            }
            AnalysisError::InvalidCurve { channel, .. } => {
                format!("The {} calibration curve is degenerate. Check the calibration card readings.", channel)
            }
            AnalysisError::IncompleteChannels { expected, found } => {
                format!(
                    "Only {} of {} colour channels could be measured for this specimen.",
                    found, expected
                )
            }
            AnalysisError::InsufficientCalibration { channel, distinct, .. } => {
                format!(
                    "The {} channel has {} distinct calibration readings; at least 2 are needed.",
                    channel, distinct
                )
            }
            AnalysisError::DomainError { parameter, value } => {
                format!(
                    "Value {} for '{}' is out of range. Check the data row for a unit mismatch or entry error.",
                    value, parameter
                )
            }
            _ => self.to_string(),
        }
    }
}
