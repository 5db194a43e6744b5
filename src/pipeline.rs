//! Batch reflectance calibration
//!
//! For every photo the pipeline fits one curve per channel against the
//! grey-standard cells, predicts each specimen region on all three channels
//! and averages the predictions with propagated uncertainty.
//!
//! A failed curve or prediction invalidates the affected specimens only;
//! the rest of the batch continues unless `fail_fast` is set.

use rayon::prelude::*;
use serde::Serialize;
use std::sync::Arc;

use crate::calibration::{
    average_channels, CalibrationCurve, Channel, CurveFitter, ReflectanceEstimate,
};
use crate::config::{BatchConfig, PipelineConfig};
use crate::constants::batch::PARALLEL_THRESHOLD;
use crate::constants::channels::REQUIRED_CHANNELS;
use crate::error::{AnalysisError, Result};
use crate::table::{PhotoReadings, SpecimenReading};
use crate::transform::ScaleParameters;

/// A channel fit; failures are shared by every specimen of the photo
type CurveFit = std::result::Result<CalibrationCurve, Arc<AnalysisError>>;

/// Reflectance outcome for one specimen region
#[derive(Debug)]
pub struct SpecimenReflectance {
    pub specimen: String,
    pub photo: String,
    /// Estimate, or the reason the specimen is invalid
    pub outcome: Result<ReflectanceEstimate>,
    /// Reflectance standardized with the configured covariate scaling
    pub scaled: Option<f64>,
}

impl SpecimenReflectance {
    pub fn is_valid(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Curves fitted for one photo
#[derive(Debug, Clone, Serialize)]
pub struct PhotoCalibration {
    pub photo: String,
    pub curves: Vec<CalibrationCurve>,
}

/// Result of a batch run
#[derive(Debug)]
pub struct BatchReport {
    /// One record per specimen region, in input order
    pub records: Vec<SpecimenReflectance>,
    /// Fitted curves per photo, omitting channels whose fit failed
    pub calibrations: Vec<PhotoCalibration>,
}

impl BatchReport {
    pub fn valid_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_valid()).count()
    }

    pub fn invalid_count(&self) -> usize {
        self.records.len() - self.valid_count()
    }

    /// Failures with their photo and specimen context
    pub fn failures(&self) -> impl Iterator<Item = &SpecimenReflectance> {
        self.records.iter().filter(|r| !r.is_valid())
    }
}

/// Per-photo calibration and specimen prediction
pub struct CalibrationPipeline {
    fitter: CurveFitter,
    batch: BatchConfig,
    scaling: Option<ScaleParameters>,
}

impl Default for CalibrationPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl CalibrationPipeline {
    /// Create a pipeline with default fitting and sequential processing
    pub fn new() -> Self {
        Self {
            fitter: CurveFitter::new(),
            batch: BatchConfig::default(),
            scaling: None,
        }
    }

    /// Create a pipeline from a validated configuration
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            fitter: CurveFitter::from_config(&config.fitting),
            batch: config.batch.clone(),
            scaling: config.scaling,
        })
    }

    /// Calibrate every specimen in a set of photos
    ///
    /// # Errors
    ///
    /// Only with `fail_fast`: the first specimen failure, wrapped with its
    /// photo and specimen identifiers. Otherwise failures are reported as
    /// invalid records.
    pub fn run(&self, photos: &[PhotoReadings]) -> Result<BatchReport> {
        let specimen_count: usize = photos.iter().map(|p| p.specimens.len()).sum();
        log::info!(
            "Calibrating {} specimens across {} photos",
            specimen_count,
            photos.len()
        );

        let results: Vec<(PhotoCalibration, Vec<SpecimenReflectance>)> =
            if self.batch.parallel && photos.len() >= PARALLEL_THRESHOLD {
                photos.par_iter().map(|photo| self.process_photo(photo)).collect()
            } else {
                photos.iter().map(|photo| self.process_photo(photo)).collect()
            };

        let mut records = Vec::with_capacity(specimen_count);
        let mut calibrations = Vec::with_capacity(photos.len());
        for (calibration, photo_records) in results {
            calibrations.push(calibration);
            records.extend(photo_records);
        }

        if self.batch.fail_fast {
            if let Some(index) = records.iter().position(|r| !r.is_valid()) {
                let failed = records.swap_remove(index);
                if let Err(error) = failed.outcome {
                    return Err(error);
                }
            }
        }

        let report = BatchReport {
            records,
            calibrations,
        };
        log::info!(
            "Calibration finished: {} valid, {} invalid",
            report.valid_count(),
            report.invalid_count()
        );
        Ok(report)
    }

    /// Fit the three channel curves of one photo and predict its specimens
    pub fn process_photo(&self, photo: &PhotoReadings) -> (PhotoCalibration, Vec<SpecimenReflectance>) {
        let fits: Vec<(Channel, CurveFit)> = Channel::ALL
            .iter()
            .map(|&channel| (channel, self.fitter.fit(&photo.samples, channel).map_err(Arc::new)))
            .collect();

        for (channel, fit) in &fits {
            if let Err(error) = fit {
                log::warn!("Photo {}: {} curve unavailable: {}", photo.photo, channel, error);
            }
        }

        let records = photo
            .specimens
            .iter()
            .map(|specimen| {
                let outcome = estimate_specimen(&fits, specimen)
                    .map_err(|e| e.for_specimen(photo.photo.clone(), specimen.region.clone()));
                if let Err(error) = &outcome {
                    log::error!("{}", error);
                }
                let scaled = match (&outcome, self.scaling) {
                    (Ok(estimate), Some(scaling)) => Some(scaling.scale(estimate.reflectance)),
                    _ => None,
                };
                SpecimenReflectance {
                    specimen: specimen.region.clone(),
                    photo: photo.photo.clone(),
                    outcome,
                    scaled,
                }
            })
            .collect();

        let curves = fits
            .into_iter()
            .filter_map(|(_, fit)| fit.ok())
            .collect();

        (
            PhotoCalibration {
                photo: photo.photo.clone(),
                curves,
            },
            records,
        )
    }
}

/// Predict one specimen on every channel and average
///
/// The first failing channel aborts the specimen: its curve error, or
/// `IncompleteChannels` when the specimen lacks a reading.
fn estimate_specimen(
    fits: &[(Channel, CurveFit)],
    specimen: &SpecimenReading,
) -> Result<ReflectanceEstimate> {
    let measured = Channel::ALL
        .iter()
        .filter(|&&channel| specimen.intensity(channel).is_some())
        .count();
    if measured < REQUIRED_CHANNELS {
        return Err(AnalysisError::IncompleteChannels {
            expected: REQUIRED_CHANNELS,
            found: measured,
        });
    }

    let mut predictions = Vec::with_capacity(REQUIRED_CHANNELS);
    for (channel, fit) in fits {
        let curve = match fit {
            Ok(curve) => curve,
            Err(error) => return Err(AnalysisError::CurveUnavailable(Arc::clone(error))),
        };
        let intensity = specimen.intensity(*channel).unwrap_or(f64::NAN);
        predictions.push(curve.predict(intensity)?);
    }

    average_channels(&predictions)
}
