//! The offline training procedure.
//!
//! A straight line of hard dependencies: load the dataset, assemble training
//! features, split train/test with a fixed seed, fit the forest, score it on
//! the held-out partition, persist the artifact triple. Any failure aborts
//! the whole run; there is no partial output and no retry.

use crate::artifact::{ArtifactError, PriceArtifacts};
use crate::data::{self, DataError, Dataset};
use crate::features;
use crate::forest::{self, ModelError, RandomForestRegressor};
use log::info;
use ndarray::Axis;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::Path;
use thiserror::Error;

/// Training hyperparameters. The defaults mirror the reference model:
/// 100 trees, seed 42, an 80/20 train/test split.
#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub n_trees: usize,
    pub seed: u64,
    pub test_fraction: f64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            n_trees: 100,
            seed: 42,
            test_fraction: 0.2,
        }
    }
}

/// What a completed training run reports back.
#[derive(Debug, Clone)]
pub struct TrainReport {
    pub r_squared: f64,
    pub n_train: usize,
    pub n_test: usize,
    pub n_columns: usize,
}

#[derive(Error, Debug)]
pub enum TrainError {
    #[error("Data loading failed: {0}")]
    Data(#[from] DataError),
    #[error("Model fitting failed: {0}")]
    Model(#[from] ModelError),
    #[error("Failed to persist artifacts: {0}")]
    Artifact(#[from] ArtifactError),
    #[error("The dataset has only {0} rows; at least 2 are needed for a train/test split.")]
    DatasetTooSmall(usize),
    #[error("Test fraction {0} is outside the open interval (0, 1).")]
    InvalidTestFraction(f64),
}

/// Fits a model on `dataset` and returns the artifact triple plus a report.
/// Does not touch the filesystem; see [`run_training`] for the full
/// load-train-persist pipeline.
pub fn train(dataset: &Dataset, config: &TrainConfig) -> Result<(PriceArtifacts, TrainReport), TrainError> {
    if !(config.test_fraction > 0.0 && config.test_fraction < 1.0) {
        return Err(TrainError::InvalidTestFraction(config.test_fraction));
    }

    let features = features::assemble_for_training(dataset);
    info!(
        "Assembled {} rows x {} feature columns",
        features.matrix.nrows(),
        features.columns.len()
    );

    let (train_idx, test_idx) =
        train_test_split(features.matrix.nrows(), config.test_fraction, config.seed)?;
    let x_train = features.matrix.select(Axis(0), &train_idx);
    let y_train = features.target.select(Axis(0), &train_idx);
    let x_test = features.matrix.select(Axis(0), &test_idx);
    let y_test = features.target.select(Axis(0), &test_idx);

    let mut model = RandomForestRegressor::new(config.n_trees, config.seed);
    model.fit(x_train.view(), y_train.view())?;

    let predicted = model.predict(x_test.view())?;
    let score = forest::r_squared(y_test.view(), predicted.view());
    info!(
        "Held-out R² = {:.4} ({} train rows, {} test rows)",
        score,
        train_idx.len(),
        test_idx.len()
    );

    let report = TrainReport {
        r_squared: score,
        n_train: train_idx.len(),
        n_test: test_idx.len(),
        n_columns: features.columns.len(),
    };
    let artifacts = PriceArtifacts {
        model,
        encoder: features.encoder,
        columns: features.columns,
    };
    Ok((artifacts, report))
}

/// The full offline pipeline: load the CSV, train, persist the artifact
/// triple into `out_dir`.
pub fn run_training(
    dataset_path: &Path,
    out_dir: &Path,
    config: &TrainConfig,
) -> Result<TrainReport, TrainError> {
    let dataset = data::load_dataset(dataset_path)?;
    let (artifacts, report) = train(&dataset, config)?;
    artifacts.save(out_dir)?;
    info!("Artifacts saved to '{}'", out_dir.display());
    Ok(report)
}

/// Seeded shuffle split of `0..n_rows` into disjoint (train, test) index
/// sets. Both partitions are guaranteed non-empty.
fn train_test_split(
    n_rows: usize,
    test_fraction: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>), TrainError> {
    if n_rows < 2 {
        return Err(TrainError::DatasetTooSmall(n_rows));
    }

    let mut indices: Vec<usize> = (0..n_rows).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n_test = ((n_rows as f64 * test_fraction).round() as usize).clamp(1, n_rows - 1);
    let test = indices.split_off(n_rows - n_test);
    Ok((indices, test))
}
