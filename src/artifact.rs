//! The persisted artifact triple: fitted model, fitted encoder, and the
//! canonical column list.
//!
//! Training writes the three files once; inference loads them once per
//! process and treats them as immutable from then on. The files are
//! human-readable TOML; the only compatibility requirement is that the same
//! scheme writes and reads them.

use crate::encode::OneHotEncoder;
use crate::forest::RandomForestRegressor;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

pub const MODEL_FILE: &str = "model.toml";
pub const ENCODER_FILE: &str = "encoder.toml";
pub const COLUMNS_FILE: &str = "columns.toml";

/// Everything inference needs, loaded and checked as a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceArtifacts {
    pub model: RandomForestRegressor,
    pub encoder: OneHotEncoder,
    /// The frozen, ordered feature column names the model was trained on.
    pub columns: Vec<String>,
}

/// TOML requires a table at the root, so the bare column list gets a
/// wrapper struct.
#[derive(Debug, Serialize, Deserialize)]
struct ColumnList {
    columns: Vec<String>,
}

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Failed to read or write artifact file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML artifact file: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize artifact to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error(
        "Artifact mismatch: the model was fitted on {model_width} feature columns, but the canonical column list has {column_count}. The artifacts were not produced by the same training run."
    )]
    InconsistentArtifacts {
        model_width: usize,
        column_count: usize,
    },
}

impl PriceArtifacts {
    /// Writes the three artifact files into `dir`, creating it if needed.
    pub fn save(&self, dir: &Path) -> Result<(), ArtifactError> {
        fs::create_dir_all(dir)?;
        write_toml(&dir.join(MODEL_FILE), &self.model)?;
        write_toml(&dir.join(ENCODER_FILE), &self.encoder)?;
        write_toml(
            &dir.join(COLUMNS_FILE),
            &ColumnList {
                columns: self.columns.clone(),
            },
        )?;
        Ok(())
    }

    /// Loads the triple from `dir` and cross-checks that the model and the
    /// canonical column list agree on feature width. A missing or corrupt
    /// file is fatal to the caller.
    pub fn load(dir: &Path) -> Result<Self, ArtifactError> {
        let model: RandomForestRegressor = read_toml(&dir.join(MODEL_FILE))?;
        let encoder: OneHotEncoder = read_toml(&dir.join(ENCODER_FILE))?;
        let ColumnList { columns } = read_toml(&dir.join(COLUMNS_FILE))?;

        if model.n_features() != columns.len() {
            return Err(ArtifactError::InconsistentArtifacts {
                model_width: model.n_features(),
                column_count: columns.len(),
            });
        }

        Ok(PriceArtifacts {
            model,
            encoder,
            columns,
        })
    }
}

fn write_toml<T: Serialize>(path: &Path, value: &T) -> Result<(), ArtifactError> {
    let toml_string = toml::to_string_pretty(value)?;
    let mut file = BufWriter::new(fs::File::create(path)?);
    file.write_all(toml_string.as_bytes())?;
    Ok(())
}

fn read_toml<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ArtifactError> {
    let toml_string = fs::read_to_string(path)?;
    Ok(toml::from_str(&toml_string)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2};
    use tempfile::tempdir;

    fn fitted_artifacts() -> PriceArtifacts {
        let x = Array2::from_shape_vec((10, 2), (0..20).map(|i| i as f64).collect()).unwrap();
        let y = Array1::from_iter((0..10).map(|i| (i * 3) as f64));
        let mut model = RandomForestRegressor::new(4, 42);
        model.fit(x.view(), y.view()).unwrap();

        let encoder = OneHotEncoder::fit(&[(
            "fuel_type".to_string(),
            vec!["Petrol".to_string(), "Diesel".to_string()],
        )]);

        PriceArtifacts {
            model,
            encoder,
            columns: vec!["km_driven".to_string(), "vehicle_age".to_string()],
        }
    }

    #[test]
    fn save_load_round_trip() {
        let artifacts = fitted_artifacts();
        let dir = tempdir().unwrap();
        artifacts.save(dir.path()).unwrap();

        for file in [MODEL_FILE, ENCODER_FILE, COLUMNS_FILE] {
            assert!(dir.path().join(file).exists());
        }

        let loaded = PriceArtifacts::load(dir.path()).unwrap();
        assert_eq!(loaded, artifacts);
    }

    #[test]
    fn missing_file_is_fatal() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            PriceArtifacts::load(dir.path()),
            Err(ArtifactError::IoError(_))
        ));
    }

    #[test]
    fn corrupt_file_is_fatal() {
        let artifacts = fitted_artifacts();
        let dir = tempdir().unwrap();
        artifacts.save(dir.path()).unwrap();
        fs::write(dir.path().join(ENCODER_FILE), "not = [valid").unwrap();
        assert!(matches!(
            PriceArtifacts::load(dir.path()),
            Err(ArtifactError::TomlParseError(_))
        ));
    }

    #[test]
    fn width_disagreement_is_detected() {
        let mut artifacts = fitted_artifacts();
        artifacts.columns.push("extra".to_string());
        let dir = tempdir().unwrap();
        artifacts.save(dir.path()).unwrap();
        assert!(matches!(
            PriceArtifacts::load(dir.path()),
            Err(ArtifactError::InconsistentArtifacts {
                model_width: 2,
                column_count: 3
            })
        ));
    }
}
