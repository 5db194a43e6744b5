//! Calibration constants and reference values for reflectance analysis
//!
//! This module contains compile-time constants for curve fitting,
//! uncertainty propagation and proportion transforms.

/// Exponential calibration curve fitting
///
/// Reflectance is on a 0-100 percentage scale and pixel intensities on a
/// 0-255 scale, so the curve starts shallow and increasing.
pub mod fitting {
    /// Starting value for the curve scale `a`
    pub const START_A: f64 = 5.0;

    /// Starting value for the curve rate `b`
    pub const START_B: f64 = 0.01;

    /// Residual evaluation budget for the nonlinear least-squares solver
    pub const MAX_ITERATIONS: usize = 50;

    /// Number of curve parameters (a, b)
    pub const PARAMETER_COUNT: usize = 2;

    /// Minimum distinct pixel intensities to identify the curve
    pub const MIN_DISTINCT_INTENSITIES: usize = 2;

    /// Minimum samples so the residual σ keeps a degree of freedom
    pub const MIN_SAMPLES: usize = PARAMETER_COUNT + 1;

    /// Intensities closer than this are treated as the same reading
    pub const INTENSITY_RESOLUTION: f64 = 1e-9;
}

/// Colour channel configuration
pub mod channels {
    /// Channels averaged into one reflectance estimate (R, G, B)
    pub const REQUIRED_CHANNELS: usize = 3;
}

/// Smithson-Verkuilen bounded-proportion transform
pub mod transform {
    /// Shrinkage offset added before rescaling
    pub const SHRINK_OFFSET: f64 = 0.5;

    /// Smallest observation count for which the transform is defined
    pub const MIN_OBSERVATIONS: usize = 2;
}

/// Batch processing parameters
pub mod batch {
    /// Photo count from which parallel fitting pays off
    pub const PARALLEL_THRESHOLD: usize = 8;
}
