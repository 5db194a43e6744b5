//! Uncertainty propagation through the channel average
//!
//! Channel errors are treated as independent, so for an unweighted mean
//! of `k` predictions the combined σ is `sqrt(Σσᵢ²) / k`.

use serde::{Deserialize, Serialize};

use crate::calibration::{ChannelPrediction, Channel};
use crate::constants::channels::REQUIRED_CHANNELS;
use crate::error::{AnalysisError, Result};

/// A value with its standard deviation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub value: f64,
    pub sigma: f64,
}

impl Measurement {
    pub fn new(value: f64, sigma: f64) -> Self {
        Self { value, sigma }
    }

    /// A measurement is defined when both value and σ are finite
    pub fn is_defined(&self) -> bool {
        self.value.is_finite() && self.sigma.is_finite()
    }
}

impl From<(f64, f64)> for Measurement {
    fn from((value, sigma): (f64, f64)) -> Self {
        Self::new(value, sigma)
    }
}

impl From<ChannelPrediction> for Measurement {
    fn from(prediction: ChannelPrediction) -> Self {
        Self::new(prediction.value, prediction.sigma)
    }
}

/// Averaged reflectance with propagated uncertainty
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReflectanceEstimate {
    /// Arithmetic mean of the channel predictions (percent)
    pub reflectance: f64,
    /// Propagated standard deviation
    pub sigma: f64,
    /// Number of channels averaged
    pub channels: usize,
}

/// Average `required` measurements and propagate their uncertainty
///
/// # Arguments
///
/// * `estimates` - Per-channel `(value, σ)` measurements
/// * `required` - Number of channels the estimate must combine
///
/// # Errors
///
/// - `IncompleteChannels` if fewer than `required` defined measurements are
///   given; undefined (non-finite) measurements do not count
/// - `InvalidParameter` if `required` is zero or more measurements than
///   `required` are given
pub fn average_with_uncertainty(estimates: &[Measurement], required: usize) -> Result<ReflectanceEstimate> {
    if required == 0 {
        return Err(AnalysisError::invalid_parameter("required channels", required));
    }
    if estimates.len() > required {
        return Err(AnalysisError::invalid_parameter(
            "channel estimates",
            format!("{} (expected {})", estimates.len(), required),
        ));
    }

    let defined = estimates.iter().filter(|m| m.is_defined()).count();
    if defined < required {
        return Err(AnalysisError::IncompleteChannels {
            expected: required,
            found: defined,
        });
    }

    let k = required as f64;
    let reflectance = estimates.iter().map(|m| m.value).sum::<f64>() / k;
    let sigma = estimates.iter().map(|m| m.sigma.powi(2)).sum::<f64>().sqrt() / k;

    Ok(ReflectanceEstimate {
        reflectance,
        sigma,
        channels: required,
    })
}

/// Average one prediction per RGB channel
///
/// Every channel in [`Channel::ALL`] must appear exactly once.
pub fn average_channels(predictions: &[ChannelPrediction]) -> Result<ReflectanceEstimate> {
    let mut measurements = Vec::with_capacity(REQUIRED_CHANNELS);
    for channel in Channel::ALL {
        let mut matching = predictions.iter().filter(|p| p.channel == channel);
        match (matching.next(), matching.next()) {
            (Some(prediction), None) => measurements.push(Measurement::from(*prediction)),
            (Some(_), Some(_)) => {
                return Err(AnalysisError::invalid_parameter(
                    "channel predictions",
                    format!("duplicate {} prediction", channel),
                ))
            }
            (None, _) => {}
        }
    }
    if measurements.len() < REQUIRED_CHANNELS {
        return Err(AnalysisError::IncompleteChannels {
            expected: REQUIRED_CHANNELS,
            found: measurements.iter().filter(|m| m.is_defined()).count(),
        });
    }

    average_with_uncertainty(&measurements, REQUIRED_CHANNELS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn prediction(channel: Channel, value: f64, sigma: f64) -> ChannelPrediction {
        ChannelPrediction {
            channel,
            value,
            sigma,
        }
    }

    #[test]
    fn test_three_channel_propagation() {
        let estimates: Vec<Measurement> = vec![(10.0, 0.3).into(), (12.0, 0.4).into(), (11.0, 0.5).into()];
        let estimate = average_with_uncertainty(&estimates, 3).unwrap();

        assert_relative_eq!(estimate.reflectance, 11.0, epsilon = 1e-12);
        assert_relative_eq!(estimate.sigma, 0.5f64.sqrt() / 3.0, epsilon = 1e-12);
        assert_relative_eq!(estimate.sigma, 0.2357, epsilon = 1e-4);
        assert_eq!(estimate.channels, 3);
    }

    #[test]
    fn test_two_of_three_channels_is_incomplete() {
        let estimates: Vec<Measurement> = vec![(10.0, 0.3).into(), (12.0, 0.4).into()];
        match average_with_uncertainty(&estimates, 3) {
            Err(AnalysisError::IncompleteChannels { expected, found }) => {
                assert_eq!(expected, 3);
                assert_eq!(found, 2);
            }
            other => panic!("Expected IncompleteChannels, got: {:?}", other),
        }
    }

    #[test]
    fn test_undefined_channel_is_incomplete() {
        let estimates: Vec<Measurement> = vec![(10.0, 0.3).into(), (f64::NAN, 0.4).into(), (11.0, 0.5).into()];
        assert!(matches!(
            average_with_uncertainty(&estimates, 3),
            Err(AnalysisError::IncompleteChannels { found: 2, .. })
        ));
    }

    #[test]
    fn test_too_many_estimates_rejected() {
        let estimates: Vec<Measurement> = vec![(1.0, 0.1).into(); 4];
        assert!(matches!(
            average_with_uncertainty(&estimates, 3),
            Err(AnalysisError::InvalidParameter { .. })
        ));
        assert!(average_with_uncertainty(&estimates, 0).is_err());
    }

    #[test]
    fn test_average_channels_order_independent() {
        let predictions = [
            prediction(Channel::Blue, 11.0, 0.5),
            prediction(Channel::Red, 10.0, 0.3),
            prediction(Channel::Green, 12.0, 0.4),
        ];
        let estimate = average_channels(&predictions).unwrap();
        assert_relative_eq!(estimate.reflectance, 11.0, epsilon = 1e-12);
        assert_relative_eq!(estimate.sigma, 0.2357, epsilon = 1e-4);
    }

    #[test]
    fn test_average_channels_missing_blue() {
        let predictions = [
            prediction(Channel::Red, 10.0, 0.3),
            prediction(Channel::Green, 12.0, 0.4),
        ];
        assert!(matches!(
            average_channels(&predictions),
            Err(AnalysisError::IncompleteChannels { expected: 3, found: 2 })
        ));
    }

    #[test]
    fn test_average_channels_duplicate() {
        let predictions = [
            prediction(Channel::Red, 10.0, 0.3),
            prediction(Channel::Red, 10.5, 0.3),
            prediction(Channel::Green, 12.0, 0.4),
        ];
        assert!(matches!(
            average_channels(&predictions),
            Err(AnalysisError::InvalidParameter { .. })
        ));
    }
}
