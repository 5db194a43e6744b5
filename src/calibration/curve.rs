//! Exponential pixel-to-reflectance calibration curves
//!
//! Fits `reflectance = a * exp(b * intensity)` per photo and colour channel
//! by Levenberg-Marquardt nonlinear least squares, then predicts the
//! reflectance of a specimen reading from the same photo.

use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use nalgebra::{storage::Owned, DVector, Dyn, OMatrix, Vector2, U2};
use serde::{Deserialize, Serialize};

use crate::calibration::{CalibrationSample, Channel};
use crate::config::FittingConfig;
use crate::constants::fitting;
use crate::error::{AnalysisError, Result};

/// Fitted calibration curve for one photo and channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationCurve {
    /// Channel the curve was fitted on
    pub channel: Channel,
    /// Scale parameter
    pub a: f64,
    /// Rate parameter
    pub b: f64,
    /// Residual standard deviation, used as the prediction uncertainty
    pub sigma: f64,
    /// Pearson correlation of fitted vs observed reflectance (diagnostic only).
    /// NaN when either series is constant.
    pub correlation: f64,
}

/// Single-channel reflectance prediction with its uncertainty
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelPrediction {
    pub channel: Channel,
    pub value: f64,
    pub sigma: f64,
}

impl CalibrationCurve {
    /// Check that both parameters are finite
    pub fn is_valid(&self) -> bool {
        self.a.is_finite() && self.b.is_finite()
    }

    /// Predict reflectance for a pixel intensity
    ///
    /// No clamping is applied: intensities outside the calibration range
    /// extrapolate along the curve.
    ///
    /// # Errors
    ///
    /// - `InvalidCurve` if the curve parameters are not finite
    /// - `DomainError` if the intensity is not finite
    pub fn predict(&self, intensity: f64) -> Result<ChannelPrediction> {
        if !self.is_valid() {
            return Err(AnalysisError::InvalidCurve {
                channel: self.channel,
                a: self.a,
                b: self.b,
            });
        }
        if !intensity.is_finite() {
            return Err(AnalysisError::domain(
                format!("{} intensity", self.channel),
                intensity,
            ));
        }

        Ok(ChannelPrediction {
            channel: self.channel,
            value: self.evaluate(intensity),
            sigma: self.sigma,
        })
    }

    fn evaluate(&self, intensity: f64) -> f64 {
        self.a * (self.b * intensity).exp()
    }
}

/// Least-squares problem for the two-parameter exponential
struct ExponentialProblem<'a> {
    intensities: &'a [f64],
    reflectances: &'a [f64],
    params: Vector2<f64>,
}

impl LeastSquaresProblem<f64, Dyn, U2> for ExponentialProblem<'_> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, U2>;
    type ParameterStorage = Owned<f64, U2>;

    fn set_params(&mut self, params: &Vector2<f64>) {
        self.params.copy_from(params);
    }

    fn params(&self) -> Vector2<f64> {
        self.params
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        let (a, b) = (self.params[0], self.params[1]);
        Some(DVector::from_iterator(
            self.intensities.len(),
            self.intensities
                .iter()
                .zip(self.reflectances)
                .map(|(&x, &y)| a * (b * x).exp() - y),
        ))
    }

    fn jacobian(&self) -> Option<OMatrix<f64, Dyn, U2>> {
        let (a, b) = (self.params[0], self.params[1]);
        let mut jacobian = OMatrix::<f64, Dyn, U2>::zeros(self.intensities.len());
        for (row, &x) in self.intensities.iter().enumerate() {
            let growth = (b * x).exp();
            jacobian[(row, 0)] = growth;
            jacobian[(row, 1)] = a * x * growth;
        }
        Some(jacobian)
    }
}

/// Calibration curve fitter with configurable starting values
#[derive(Debug, Clone)]
pub struct CurveFitter {
    start_a: f64,
    start_b: f64,
    max_iterations: usize,
}

impl Default for CurveFitter {
    fn default() -> Self {
        Self::new()
    }
}

impl CurveFitter {
    /// Create a fitter with the default starting values and iteration cap
    pub fn new() -> Self {
        Self {
            start_a: fitting::START_A,
            start_b: fitting::START_B,
            max_iterations: fitting::MAX_ITERATIONS,
        }
    }

    /// Create a fitter with custom starting values and iteration cap
    pub fn with_params(start_a: f64, start_b: f64, max_iterations: usize) -> Self {
        Self {
            start_a,
            start_b,
            max_iterations,
        }
    }

    /// Create a fitter from the pipeline's fitting section
    pub fn from_config(config: &FittingConfig) -> Self {
        Self::with_params(config.start_a, config.start_b, config.max_iterations)
    }

    /// Fit the exponential curve for one channel of a calibration set
    ///
    /// # Arguments
    ///
    /// * `samples` - Grey-standard readings from one photo
    /// * `channel` - Colour channel to fit
    ///
    /// # Returns
    ///
    /// Fitted `CalibrationCurve` with residual σ and fit correlation
    ///
    /// # Errors
    ///
    /// - `InsufficientCalibration` with fewer than 3 samples or fewer than
    ///   2 distinct intensities
    /// - `FitDivergence` if the solver does not converge within the
    ///   evaluation budget
    /// - `InvalidCurve` if the solver returns non-finite parameters
    pub fn fit(&self, samples: &[CalibrationSample], channel: Channel) -> Result<CalibrationCurve> {
        let intensities: Vec<f64> = samples
            .iter()
            .map(|s| s.channel_intensity(channel))
            .collect();
        let reflectances: Vec<f64> = samples.iter().map(|s| s.reflectance).collect();

        if let Some(bad) = intensities.iter().find(|v| !v.is_finite()) {
            return Err(AnalysisError::domain(format!("{} intensity", channel), bad));
        }
        if let Some(bad) = reflectances.iter().find(|v| !v.is_finite()) {
            return Err(AnalysisError::domain("reference reflectance", bad));
        }

        let distinct = count_distinct(&intensities);
        if samples.len() < fitting::MIN_SAMPLES || distinct < fitting::MIN_DISTINCT_INTENSITIES {
            return Err(AnalysisError::InsufficientCalibration {
                channel,
                samples: samples.len(),
                distinct,
            });
        }

        let problem = ExponentialProblem {
            intensities: &intensities,
            reflectances: &reflectances,
            params: Vector2::new(self.start_a, self.start_b),
        };
        let (problem, report) = LevenbergMarquardt::new()
            .with_patience(solver_patience(self.max_iterations))
            .minimize(problem);

        if !report.termination.was_successful() {
            return Err(AnalysisError::FitDivergence {
                channel,
                evaluations: report.number_of_evaluations,
                reason: format!("{:?}", report.termination),
            });
        }

        let (a, b) = (problem.params[0], problem.params[1]);
        if !a.is_finite() || !b.is_finite() {
            return Err(AnalysisError::InvalidCurve { channel, a, b });
        }

        let fitted: Vec<f64> = intensities.iter().map(|&x| a * (b * x).exp()).collect();
        let rss: f64 = fitted
            .iter()
            .zip(&reflectances)
            .map(|(f, y)| (f - y).powi(2))
            .sum();
        let degrees_of_freedom = (samples.len() - fitting::PARAMETER_COUNT) as f64;
        let sigma = (rss / degrees_of_freedom).sqrt();
        let correlation = pearson_correlation(&fitted, &reflectances);

        log::debug!(
            "{} curve: a = {:.4}, b = {:.5}, sigma = {:.4}, r = {:.4} ({} evaluations)",
            channel,
            a,
            b,
            sigma,
            correlation,
            report.number_of_evaluations
        );

        Ok(CalibrationCurve {
            channel,
            a,
            b,
            sigma,
            correlation,
        })
    }
}

/// Fit one channel's curve with the default fitter
pub fn fit_channel_curve(samples: &[CalibrationSample], channel: Channel) -> Result<CalibrationCurve> {
    CurveFitter::new().fit(samples, channel)
}

/// The solver spends `patience * (parameters + 1)` residual evaluations,
/// so the evaluation budget is rounded up to whole patience steps.
fn solver_patience(max_evaluations: usize) -> usize {
    max_evaluations.div_ceil(fitting::PARAMETER_COUNT + 1).max(1)
}

fn count_distinct(values: &[f64]) -> usize {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup_by(|a, b| (*a - *b).abs() <= fitting::INTENSITY_RESOLUTION);
    sorted.len()
}

fn pearson_correlation(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    cov / (var_x * var_y).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const INTENSITIES: [f64; 9] = [20.0, 45.0, 70.0, 95.0, 120.0, 145.0, 170.0, 195.0, 220.0];

    fn synthetic_card(a: f64, b: f64, noise: &[f64]) -> Vec<CalibrationSample> {
        INTENSITIES
            .iter()
            .enumerate()
            .map(|(i, &x)| {
                let reflectance = a * (b * x).exp() + noise.get(i).copied().unwrap_or(0.0);
                CalibrationSample::new(x, x + 3.0, x - 4.0, reflectance)
            })
            .collect()
    }

    #[test]
    fn test_recovers_noiseless_curve() {
        let samples = synthetic_card(7.0, 0.015, &[]);
        let curve = fit_channel_curve(&samples, Channel::Red).unwrap();

        assert_relative_eq!(curve.a, 7.0, max_relative = 1e-4);
        assert_relative_eq!(curve.b, 0.015, max_relative = 1e-4);
        assert!(curve.sigma < 1e-6, "sigma = {}", curve.sigma);
        assert_relative_eq!(curve.correlation, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_noisy_curve_reports_residual_sigma() {
        let noise = [0.4, -0.3, 0.2, -0.5, 0.3, -0.2, 0.5, -0.4, 0.1];
        let samples = synthetic_card(6.0, 0.012, &noise);
        let curve = fit_channel_curve(&samples, Channel::Red).unwrap();

        assert!(curve.sigma > 0.0);
        assert!(curve.sigma < 1.0);
        assert!(curve.correlation > 0.99);
        assert_relative_eq!(curve.b, 0.012, max_relative = 0.05);
    }

    #[test]
    fn test_each_channel_uses_its_own_intensity() {
        let samples = synthetic_card(7.0, 0.015, &[]);
        let red = fit_channel_curve(&samples, Channel::Red).unwrap();
        let green = fit_channel_curve(&samples, Channel::Green).unwrap();

        // Green readings sit 3 units above red, so the fitted scale shrinks
        assert_relative_eq!(green.a, 7.0 * (-0.015f64 * 3.0).exp(), max_relative = 1e-4);
        assert!(green.a < red.a);
    }

    #[test]
    fn test_rejects_identical_intensities() {
        let samples = vec![CalibrationSample::new(100.0, 100.0, 100.0, 20.0); 5];
        let err = fit_channel_curve(&samples, Channel::Blue).unwrap_err();
        match err {
            AnalysisError::InsufficientCalibration { distinct, samples, .. } => {
                assert_eq!(distinct, 1);
                assert_eq!(samples, 5);
            }
            other => panic!("Expected InsufficientCalibration, got: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_too_few_samples() {
        let samples = synthetic_card(7.0, 0.015, &[]);
        let err = fit_channel_curve(&samples[..2], Channel::Red).unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientCalibration { .. }));
    }

    #[test]
    fn test_iteration_cap_reports_divergence() {
        let samples = synthetic_card(7.0, 0.015, &[]);
        let fitter = CurveFitter::with_params(0.5, 0.03, 1);
        let err = fitter.fit(&samples, Channel::Red).unwrap_err();
        match err {
            AnalysisError::FitDivergence { channel, evaluations, .. } => {
                assert_eq!(channel, Channel::Red);
                assert!(evaluations > 0 && evaluations <= 3, "evaluations = {}", evaluations);
            }
            other => panic!("Expected FitDivergence, got: {:?}", other),
        }
    }

    #[test]
    fn test_divergence_reports_evaluations_spent() {
        // A budget of 6 evaluations is two solver steps for two parameters
        let samples = synthetic_card(7.0, 0.015, &[]);
        let fitter = CurveFitter::with_params(0.5, 0.03, 6);
        match fitter.fit(&samples, Channel::Red).unwrap_err() {
            AnalysisError::FitDivergence { evaluations, .. } => {
                assert!(evaluations <= 6, "evaluations = {}", evaluations);
            }
            other => panic!("Expected FitDivergence, got: {:?}", other),
        }
    }

    #[test]
    fn test_solver_patience_covers_budget() {
        assert_eq!(solver_patience(50), 17);
        assert_eq!(solver_patience(6), 2);
        assert_eq!(solver_patience(1), 1);
        assert_eq!(solver_patience(0), 1);
    }

    #[test]
    fn test_predict_extrapolates_without_clamping() {
        let curve = CalibrationCurve {
            channel: Channel::Green,
            a: 7.0,
            b: 0.015,
            sigma: 0.25,
            correlation: 0.99,
        };

        let dark = curve.predict(2.0).unwrap();
        assert_relative_eq!(dark.value, 7.0 * 0.03f64.exp(), epsilon = 1e-12);
        assert_eq!(dark.sigma, 0.25);
        assert_eq!(dark.channel, Channel::Green);

        let beyond = curve.predict(300.0).unwrap();
        assert!(beyond.value > 100.0);
    }

    #[test]
    fn test_predict_rejects_non_finite_curve() {
        let curve = CalibrationCurve {
            channel: Channel::Blue,
            a: f64::NAN,
            b: 0.01,
            sigma: 0.1,
            correlation: f64::NAN,
        };
        assert!(matches!(
            curve.predict(120.0),
            Err(AnalysisError::InvalidCurve { channel: Channel::Blue, .. })
        ));
    }

    #[test]
    fn test_predict_rejects_non_finite_intensity() {
        let curve = CalibrationCurve {
            channel: Channel::Red,
            a: 7.0,
            b: 0.015,
            sigma: 0.1,
            correlation: 1.0,
        };
        assert!(matches!(
            curve.predict(f64::INFINITY),
            Err(AnalysisError::DomainError { .. })
        ));
    }

    #[test]
    fn test_count_distinct() {
        assert_eq!(count_distinct(&[1.0, 1.0, 2.0, 3.0, 3.0]), 3);
        assert_eq!(count_distinct(&[]), 0);
    }
}
