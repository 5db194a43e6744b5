//! CSV tables consumed and produced by the pipeline
//!
//! ## Calibration table
//!
//! Long format, one row per photo, region and channel:
//!
//! ```text
//! photo,region,channel,intensity,reference
//! IMG_0042,grey_1,R,38.2,3.1
//! IMG_0042,shell,R,71.9,
//! ```
//!
//! Regions with a `reference` reflectance are grey-standard cells; regions
//! without one are specimens to be predicted.
//!
//! ## Proportion table
//!
//! ```text
//! id,proportion
//! snail_001,0.42
//! snail_002,
//! ```
//!
//! An empty proportion is a missing observation. Tables may instead carry
//! `consumed` and `offered` amounts, from which the proportion is derived.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::calibration::{CalibrationSample, Channel};
use crate::error::{AnalysisError, Result};
use crate::pipeline::SpecimenReflectance;
use crate::transform::ProportionObservation;

/// One row of the long-format calibration table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRow {
    pub photo: String,
    pub region: String,
    pub channel: String,
    pub intensity: f64,
    pub reference: Option<f64>,
}

/// Specimen region readings, one optional intensity per channel
#[derive(Debug, Clone, PartialEq)]
pub struct SpecimenReading {
    pub region: String,
    pub intensities: [Option<f64>; 3],
}

impl SpecimenReading {
    pub fn intensity(&self, channel: Channel) -> Option<f64> {
        self.intensities[channel.index()]
    }
}

/// Everything measured on one photograph
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoReadings {
    pub photo: String,
    pub samples: Vec<CalibrationSample>,
    pub specimens: Vec<SpecimenReading>,
}

/// One row of the proportion table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProportionRow {
    pub id: String,
    #[serde(default)]
    pub proportion: Option<f64>,
    /// Amount eaten, used when `proportion` is empty
    #[serde(default)]
    pub consumed: Option<f64>,
    /// Amount offered, used when `proportion` is empty
    #[serde(default)]
    pub offered: Option<f64>,
}

impl ProportionRow {
    /// Validated proportion, or `None` when the observation is missing
    ///
    /// An explicit proportion wins; otherwise `consumed / offered` is used
    /// when both amounts are present.
    pub fn observation(&self) -> Result<Option<ProportionObservation>> {
        let observation = match (self.proportion, self.consumed, self.offered) {
            (Some(p), _, _) if p.is_nan() => None,
            (Some(p), _, _) => Some(ProportionObservation::new(p)),
            (None, Some(consumed), Some(offered)) => {
                Some(ProportionObservation::from_amounts(consumed, offered))
            }
            _ => None,
        };
        observation.transpose().map_err(|e| match e {
            AnalysisError::DomainError { parameter, value } => AnalysisError::DomainError {
                parameter: format!("{} of {}", parameter, self.id),
                value,
            },
            other => other,
        })
    }
}

/// Validated proportion column, one entry per row with `None` for missing
pub fn proportion_column(rows: &[ProportionRow]) -> Result<Vec<Option<f64>>> {
    rows.iter()
        .map(|row| Ok(row.observation()?.map(|p| p.value())))
        .collect()
}

/// One row of the transformed proportion output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformedRow {
    pub id: String,
    pub proportion: Option<f64>,
    pub transformed: Option<f64>,
}

/// One row of the reflectance output table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflectanceRow {
    pub specimen: String,
    pub photo: String,
    pub reflectance: Option<f64>,
    pub sigma: Option<f64>,
    pub scaled: Option<f64>,
    pub valid: bool,
    pub error: Option<String>,
}

impl From<&SpecimenReflectance> for ReflectanceRow {
    fn from(record: &SpecimenReflectance) -> Self {
        match &record.outcome {
            Ok(estimate) => Self {
                specimen: record.specimen.clone(),
                photo: record.photo.clone(),
                reflectance: Some(estimate.reflectance),
                sigma: Some(estimate.sigma),
                scaled: record.scaled,
                valid: true,
                error: None,
            },
            Err(error) => Self {
                specimen: record.specimen.clone(),
                photo: record.photo.clone(),
                reflectance: None,
                sigma: None,
                scaled: None,
                valid: false,
                error: Some(error.to_string()),
            },
        }
    }
}

#[derive(Default)]
struct RegionAccumulator {
    intensities: [Option<f64>; 3],
    reference: Option<f64>,
}

#[derive(Default)]
struct PhotoAccumulator {
    regions: Vec<(String, RegionAccumulator)>,
    index: HashMap<String, usize>,
}

impl PhotoAccumulator {
    fn push(&mut self, row: &CalibrationRow, channel: Channel) -> Result<()> {
        let slot = match self.index.get(&row.region) {
            Some(&slot) => slot,
            None => {
                self.regions.push((row.region.clone(), RegionAccumulator::default()));
                self.index.insert(row.region.clone(), self.regions.len() - 1);
                self.regions.len() - 1
            }
        };
        let region = &mut self.regions[slot].1;

        if region.intensities[channel.index()].replace(row.intensity).is_some() {
            return Err(AnalysisError::invalid_parameter(
                "calibration row",
                format!("duplicate {} reading for {}/{}", channel, row.photo, row.region),
            ));
        }
        if let Some(reference) = row.reference {
            match region.reference {
                Some(existing) if existing != reference => {
                    return Err(AnalysisError::invalid_parameter(
                        "reference",
                        format!("{}/{} has {} and {}", row.photo, row.region, existing, reference),
                    ));
                }
                _ => region.reference = Some(reference),
            }
        }
        Ok(())
    }

    fn finish(self, photo: String) -> PhotoReadings {
        let mut samples = Vec::new();
        let mut specimens = Vec::new();

        for (label, region) in self.regions {
            match (region.reference, region.intensities) {
                (Some(reference), [Some(red), Some(green), Some(blue)]) => {
                    samples.push(CalibrationSample::new(red, green, blue, reference));
                }
                (Some(_), _) => {
                    log::warn!(
                        "Skipping calibration region {}/{}: not all channels were measured",
                        photo,
                        label
                    );
                }
                (None, intensities) => specimens.push(SpecimenReading {
                    region: label,
                    intensities,
                }),
            }
        }

        PhotoReadings {
            photo,
            samples,
            specimens,
        }
    }
}

/// Group calibration rows by photo, preserving first-appearance order
pub fn group_rows(rows: &[CalibrationRow]) -> Result<Vec<PhotoReadings>> {
    let mut photos: Vec<(String, PhotoAccumulator)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for row in rows {
        let channel: Channel = row.channel.parse()?;
        let slot = *index.entry(row.photo.as_str()).or_insert_with(|| {
            photos.push((row.photo.clone(), PhotoAccumulator::default()));
            photos.len() - 1
        });
        photos[slot].1.push(row, channel)?;
    }

    Ok(photos
        .into_iter()
        .map(|(photo, accumulator)| accumulator.finish(photo))
        .collect())
}

/// Read a long-format calibration table
pub fn read_calibration_table<R: Read>(reader: R) -> Result<Vec<PhotoReadings>> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let rows = csv_reader
        .deserialize()
        .collect::<std::result::Result<Vec<CalibrationRow>, csv::Error>>()
        .map_err(|e| AnalysisError::table("invalid calibration row", e))?;
    group_rows(&rows)
}

/// Load a long-format calibration table from disk
pub fn load_calibration_table(path: &Path) -> Result<Vec<PhotoReadings>> {
    let file = File::open(path)
        .map_err(|e| AnalysisError::table(format!("cannot open {}", path.display()), e))?;
    read_calibration_table(file)
}

/// Read a proportion table
pub fn read_proportions<R: Read>(reader: R) -> Result<Vec<ProportionRow>> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    csv_reader
        .deserialize()
        .collect::<std::result::Result<Vec<ProportionRow>, csv::Error>>()
        .map_err(|e| AnalysisError::table("invalid proportion row", e))
}

/// Load a proportion table from disk
pub fn load_proportions(path: &Path) -> Result<Vec<ProportionRow>> {
    let file = File::open(path)
        .map_err(|e| AnalysisError::table(format!("cannot open {}", path.display()), e))?;
    read_proportions(file)
}

fn write_rows<W: Write, T: Serialize>(writer: W, rows: impl IntoIterator<Item = T>) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer
            .serialize(row)
            .map_err(|e| AnalysisError::table("cannot write row", e))?;
    }
    csv_writer
        .flush()
        .map_err(|e| AnalysisError::table("cannot flush table", e))
}

/// Write per-specimen reflectance records
pub fn write_reflectance<W: Write>(writer: W, records: &[SpecimenReflectance]) -> Result<()> {
    write_rows(writer, records.iter().map(ReflectanceRow::from))
}

/// Write per-specimen reflectance records to disk
pub fn save_reflectance(path: &Path, records: &[SpecimenReflectance]) -> Result<()> {
    let file = File::create(path)
        .map_err(|e| AnalysisError::table(format!("cannot create {}", path.display()), e))?;
    write_reflectance(file, records)
}

/// Write transformed proportions
pub fn write_transformed<W: Write>(writer: W, rows: &[TransformedRow]) -> Result<()> {
    write_rows(writer, rows)
}
