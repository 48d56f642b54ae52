//! Calibration storage and lookup.
//!
//! The calibration artifact maps each algorithm variant tag (`cbg-m-1`,
//! `oct-m-1`, `spo-m-a`, `spo-g-a` in the reference configuration) to
//! either a single pooled model or a per-landmark model table. It is
//! produced by the external calibration-fitting tool as gzipped JSON and
//! loaded here in one call; the schema is private but must round-trip.

mod model;
#[cfg(test)]
mod tests;

pub use model::{physical_range, DistanceRange, RangeModel, PHYSICAL_M_PER_RTT_MS};

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::landmarks::LandmarkPosition;

/// Errors loading or saving the calibration artifact.
#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("cannot read calibration '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot parse calibration '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Calibration data for one variant: a pooled global model, or one model
/// per landmark keyed by IPv4 address, label, or numeric sub-label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "selector", rename_all = "kebab-case")]
pub enum VariantCalibration {
    /// One model per landmark. Keys are, in lookup priority order, the
    /// dotted IPv4 address, the host label, or the decimal numeric
    /// sub-label.
    PerLandmark {
        landmarks: HashMap<String, RangeModel>,
    },
    /// A single model shared by every landmark.
    Pooled { global: RangeModel },
}

/// Immutable mapping from variant tag to calibration data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CalibrationStore {
    variants: BTreeMap<String, VariantCalibration>,
}

impl CalibrationStore {
    /// Load a gzipped-JSON calibration artifact.
    pub fn load(path: &Path) -> Result<Self, CalibrationError> {
        let file = File::open(path).map_err(|source| CalibrationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(GzDecoder::new(file));
        serde_json::from_reader(reader).map_err(|source| CalibrationError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the artifact in the same gzipped-JSON form it is loaded
    /// from.
    pub fn save(&self, path: &Path) -> Result<(), CalibrationError> {
        let file = File::create(path).map_err(|source| CalibrationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        serde_json::to_writer(&mut encoder, self).map_err(|source| CalibrationError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        encoder
            .finish()
            .map(|_| ())
            .map_err(|source| CalibrationError::Io {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Build a store from explicit variant data (tests and tooling).
    pub fn from_variants(variants: BTreeMap<String, VariantCalibration>) -> Self {
        Self { variants }
    }

    /// Tags of all variants present in the artifact.
    pub fn variant_tags(&self) -> impl Iterator<Item = &str> {
        self.variants.keys().map(String::as_str)
    }

    /// Look up the model for `landmark` under `variant`.
    ///
    /// Per-landmark variants try the IPv4 address, then the label, then
    /// the numeric sub-label (when the label has one); pooled variants
    /// return the global model. `None` means the landmark is skipped for
    /// this variant.
    pub fn lookup(&self, variant: &str, landmark: &LandmarkPosition) -> Option<&RangeModel> {
        match self.variants.get(variant)? {
            VariantCalibration::Pooled { global } => Some(global),
            VariantCalibration::PerLandmark { landmarks } => landmarks
                .get(&landmark.ipv4.to_string())
                .or_else(|| landmarks.get(&landmark.label))
                .or_else(|| {
                    if landmark.ilabel >= 0 {
                        landmarks.get(&landmark.ilabel.to_string())
                    } else {
                        None
                    }
                }),
        }
    }
}
