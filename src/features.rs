//! Feature assembly: the single place where raw car records become the
//! positional vectors the regressor consumes.
//!
//! Training and inference must construct features identically. The model is
//! fit on a matrix whose column order becomes the canonical column list;
//! every inference row is then *reindexed by name* onto that list. The
//! reindex step is what makes single-row inference safe: a lone record can
//! never regenerate the full one-hot width on its own, and positional
//! concatenation would silently corrupt predictions the moment column order
//! drifted.

use crate::data::Dataset;
use crate::encode::OneHotEncoder;
use ndarray::{Array1, Array2};
use std::collections::HashMap;

/// One car, as supplied by a user at inference time.
///
/// Attribute order does not matter for correctness (the assembler reindexes
/// by name), but callers conventionally use the dataset schema order.
#[derive(Debug, Clone, Default)]
pub struct Record {
    pub numeric: Vec<(String, f64)>,
    pub categorical: Vec<(String, String)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_numeric(mut self, name: &str, value: f64) -> Self {
        self.numeric.push((name.to_string(), value));
        self
    }

    pub fn with_categorical(mut self, name: &str, value: &str) -> Self {
        self.categorical.push((name.to_string(), value.to_string()));
        self
    }
}

/// Everything the training procedure needs from feature assembly: the
/// design matrix, the target vector, the canonical column list, and the
/// fitted encoder. The latter two are persisted and frozen.
#[derive(Debug)]
pub struct TrainingFeatures {
    pub matrix: Array2<f64>,
    pub target: Array1<f64>,
    pub columns: Vec<String>,
    pub encoder: OneHotEncoder,
}

/// Fit-mode assembly over the whole training dataset.
///
/// Numeric columns come first, in dataset-declared order and unscaled; the
/// one-hot indicator columns follow in encoder vocabulary order. The
/// resulting column list is the canonical contract both training and
/// inference reindex against.
pub fn assemble_for_training(dataset: &Dataset) -> TrainingFeatures {
    let encoder = OneHotEncoder::fit(&dataset.categorical);

    let mut columns: Vec<String> = dataset
        .numeric
        .iter()
        .map(|(name, _)| name.clone())
        .collect();
    columns.extend(encoder.feature_names());

    let n_rows = dataset.n_rows();
    let width = columns.len();
    let mut buffer = Vec::with_capacity(n_rows * width);
    let mut row_pairs: Vec<(String, String)> = Vec::with_capacity(dataset.categorical.len());
    for row in 0..n_rows {
        for (_, values) in &dataset.numeric {
            buffer.push(values[row]);
        }
        row_pairs.clear();
        for (name, values) in &dataset.categorical {
            row_pairs.push((name.clone(), values[row].clone()));
        }
        buffer.extend(encoder.transform_row(&row_pairs));
    }

    let matrix = Array2::from_shape_vec((n_rows, width), buffer)
        .expect("feature columns should have consistent row counts");
    let target = Array1::from_vec(dataset.target.clone());

    TrainingFeatures {
        matrix,
        target,
        columns,
        encoder,
    }
}

/// Apply-mode assembly for a single record, using the persisted encoder and
/// canonical column list. Returns a one-row matrix whose columns are exactly
/// `canonical_columns`, in that order.
pub fn assemble_for_inference(
    record: &Record,
    encoder: &OneHotEncoder,
    canonical_columns: &[String],
) -> Array2<f64> {
    let mut produced: Vec<(String, f64)> = record.numeric.clone();
    produced.extend(
        encoder
            .feature_names()
            .into_iter()
            .zip(encoder.transform_row(&record.categorical)),
    );

    let row = project_onto(&produced, canonical_columns);
    Array2::from_shape_vec((1, canonical_columns.len()), row)
        .expect("projected row length should equal the canonical column count")
}

/// Projects a row's named values onto a target column list: values are
/// placed under their matching canonical name, canonical columns with no
/// produced value are filled with 0.0, and produced columns not in the
/// canonical list are dropped.
pub fn project_onto(produced: &[(String, f64)], canonical_columns: &[String]) -> Vec<f64> {
    let by_name: HashMap<&str, f64> = produced
        .iter()
        .map(|(name, value)| (name.as_str(), *value))
        .collect();
    canonical_columns
        .iter()
        .map(|column| by_name.get(column.as_str()).copied().unwrap_or(0.0))
        .collect()
}
