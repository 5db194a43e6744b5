//! Reflectance calibration module
//!
//! This module fits per-photo, per-channel calibration curves against
//! grey-standard readings and propagates their uncertainty into a single
//! reflectance estimate per specimen.

pub mod sample;
pub mod curve;
pub mod propagation;

pub use sample::{CalibrationSample, Channel};
pub use curve::{fit_channel_curve, CalibrationCurve, ChannelPrediction, CurveFitter};
pub use propagation::{average_channels, average_with_uncertainty, Measurement, ReflectanceEstimate};
