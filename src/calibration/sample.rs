//! Calibration card readings and colour channel selection
//!
//! A calibration sample pairs the mean pixel intensity of one grey-standard
//! cell (per colour channel) with its spectrometer-measured reflectance.

use crate::error::{AnalysisError, Result};
use palette::Srgb;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Colour channel of an RGB photograph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Red,
    Green,
    Blue,
}

impl Channel {
    /// All channels in R, G, B order
    pub const ALL: [Channel; 3] = [Channel::Red, Channel::Green, Channel::Blue];

    /// Position of the channel in an RGB triplet
    pub fn index(self) -> usize {
        match self {
            Channel::Red => 0,
            Channel::Green => 1,
            Channel::Blue => 2,
        }
    }

    /// Read this channel's component from an RGB triplet
    pub fn component(self, rgb: &Srgb<f64>) -> f64 {
        match self {
            Channel::Red => rgb.red,
            Channel::Green => rgb.green,
            Channel::Blue => rgb.blue,
        }
    }

    /// Lowercase channel name
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Red => "red",
            Channel::Green => "green",
            Channel::Blue => "blue",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = AnalysisError;

    /// Parse channel labels as written in calibration tables (`R`, `red`, ...)
    fn from_str(label: &str) -> Result<Self> {
        match label.trim().to_lowercase().as_str() {
            "r" | "red" => Ok(Channel::Red),
            "g" | "green" => Ok(Channel::Green),
            "b" | "blue" => Ok(Channel::Blue),
            _ => Err(AnalysisError::invalid_parameter("channel", label)),
        }
    }
}

/// One grey-standard cell measured on a calibration card
///
/// Intensities are mean pixel values on the 0-255 scale; `reflectance`
/// is the spectrometric ground truth in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSample {
    /// Mean pixel intensity per channel
    pub intensity: Srgb<f64>,
    /// Reference reflectance (percent)
    pub reflectance: f64,
}

impl CalibrationSample {
    /// Create a sample from per-channel intensities and a reference reflectance
    pub fn new(red: f64, green: f64, blue: f64, reflectance: f64) -> Self {
        Self {
            intensity: Srgb::new(red, green, blue),
            reflectance,
        }
    }

    /// Pixel intensity for one channel
    pub fn channel_intensity(&self, channel: Channel) -> f64 {
        channel.component(&self.intensity)
    }
}
