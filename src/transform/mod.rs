//! Data transforms feeding the downstream regression models
//!
//! This module maps bounded proportions into the open unit interval for a
//! Beta likelihood and standardizes covariates with fixed parameters.

pub mod proportion;
pub mod scaling;

pub use proportion::{inverse, transform, ProportionObservation, ProportionTransform};
pub use scaling::ScaleParameters;
