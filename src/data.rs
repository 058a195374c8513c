//! Dataset loading and validation.
//!
//! This module is the exclusive entry point for the car CSV. It reads the
//! file with Polars, validates it against the fixed schema below, and
//! produces plain column vectors for the feature assembler. Column names are
//! not configurable; enforcing the exact schema eliminates a class of
//! configuration errors and keeps training and inference agreed on which
//! attributes are categorical.
//!
//! Any column outside the schema (for example a leading unnamed index
//! column, or pandas' `Unnamed: 0`) is dropped before processing.

use log::{debug, info};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

/// Categorical attributes, in canonical schema order.
pub const CATEGORICAL_ATTRS: [&str; 6] = [
    "car_name",
    "brand",
    "model",
    "seller_type",
    "fuel_type",
    "transmission_type",
];

/// Numeric attributes, in canonical schema order.
pub const NUMERIC_ATTRS: [&str; 6] = [
    "vehicle_age",
    "km_driven",
    "mileage",
    "engine",
    "max_power",
    "seats",
];

/// The regression target, present only in training data.
pub const TARGET: &str = "selling_price";

/// A validated training dataset, split into typed column vectors.
///
/// Column order within each group follows the order the columns appear in
/// the source file, which in turn fixes the canonical feature column order
/// produced at training time.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Numeric feature columns as `(name, values)` pairs.
    pub numeric: Vec<(String, Vec<f64>)>,
    /// Categorical feature columns as `(name, values)` pairs.
    pub categorical: Vec<(String, Vec<String>)>,
    /// The `selling_price` column.
    pub target: Vec<f64>,
}

/// All data loading and validation failures.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error(
        "The required column '{0}' was not found in the dataset. Please check spelling and case."
    )]
    ColumnNotFound(String),
    #[error(
        "The required column '{column_name}' could not be converted to the expected type '{expected_type}'. (Found type: {found_type})"
    )]
    ColumnWrongType {
        column_name: String,
        expected_type: &'static str,
        found_type: String,
    },
    #[error(
        "Missing or null values were found in the required column '{0}'. This tool requires complete data with no missing values."
    )]
    MissingValuesFound(String),
    #[error(
        "Non-finite values (NaN or Infinity) were found in the required column '{0}'. This tool requires all numeric data to be finite."
    )]
    NonFiniteValuesFound(String),
    #[error("The dataset contains no data rows.")]
    EmptyDataset,
    #[error("'{0}' is not a categorical attribute of the dataset schema.")]
    NotCategorical(String),
}

/// Loads and validates the full training dataset from a CSV file.
pub fn load_dataset(path: &Path) -> Result<Dataset, DataError> {
    info!("Loading dataset from '{}'", path.display());

    let df = CsvReader::new(File::open(path)?)
        .with_options(
            CsvReadOptions::default()
                .with_has_header(true)
                .with_parse_options(CsvParseOptions::default().with_separator(b',')),
        )
        .finish()?;

    if df.height() == 0 {
        return Err(DataError::EmptyDataset);
    }

    // Verify the full schema before extracting anything.
    let present: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();
    for required in CATEGORICAL_ATTRS
        .iter()
        .chain(NUMERIC_ATTRS.iter())
        .chain(std::iter::once(&TARGET))
    {
        if !present.iter().any(|name| name == required) {
            return Err(DataError::ColumnNotFound(required.to_string()));
        }
    }
    debug!("All {} schema columns found", CATEGORICAL_ATTRS.len() + NUMERIC_ATTRS.len() + 1);

    // Walk the frame in file order so the dataset-declared column order is
    // preserved; anything outside the schema (index columns included) is
    // skipped here.
    let mut numeric = Vec::with_capacity(NUMERIC_ATTRS.len());
    let mut categorical = Vec::with_capacity(CATEGORICAL_ATTRS.len());
    let mut target = None;
    for column in df.get_columns() {
        let name = column.name().as_str();
        if name == TARGET {
            target = Some(extract_numeric_column(&df, name)?);
        } else if CATEGORICAL_ATTRS.contains(&name) {
            categorical.push((name.to_string(), extract_string_column(&df, name)?));
        } else if NUMERIC_ATTRS.contains(&name) {
            numeric.push((name.to_string(), extract_numeric_column(&df, name)?));
        }
    }

    // Presence was checked above, so the target must have been extracted.
    let target = target.ok_or_else(|| DataError::ColumnNotFound(TARGET.to_string()))?;

    info!(
        "Loaded {} rows: {} categorical and {} numeric feature columns",
        df.height(),
        categorical.len(),
        numeric.len()
    );

    Ok(Dataset {
        numeric,
        categorical,
        target,
    })
}

impl Dataset {
    /// Number of data rows.
    pub fn n_rows(&self) -> usize {
        self.target.len()
    }

    /// Sorted distinct values of a categorical attribute, for populating
    /// user-facing choice lists.
    pub fn distinct(&self, attribute: &str) -> Result<Vec<String>, DataError> {
        self.distinct_where(attribute, &[])
    }

    /// Sorted distinct values of `attribute` over the rows matching every
    /// `(attribute, value)` filter. This backs the cascading choice lists:
    /// models filtered by brand, car names filtered by brand and model.
    pub fn distinct_where(
        &self,
        attribute: &str,
        filters: &[(&str, &str)],
    ) -> Result<Vec<String>, DataError> {
        let column = self.categorical_column(attribute)?;
        let filter_columns = filters
            .iter()
            .map(|(name, value)| Ok((self.categorical_column(name)?, *value)))
            .collect::<Result<Vec<_>, DataError>>()?;

        let mut values: Vec<String> = column
            .iter()
            .enumerate()
            .filter(|(row, _)| {
                filter_columns
                    .iter()
                    .all(|(col, wanted)| col[*row] == *wanted)
            })
            .map(|(_, value)| value.clone())
            .collect();
        values.sort_unstable();
        values.dedup();
        Ok(values)
    }

    /// All brands present in the dataset.
    pub fn brands(&self) -> Result<Vec<String>, DataError> {
        self.distinct("brand")
    }

    /// Models offered under a given brand.
    pub fn models_for_brand(&self, brand: &str) -> Result<Vec<String>, DataError> {
        self.distinct_where("model", &[("brand", brand)])
    }

    /// Full car names for a given brand and model.
    pub fn car_names_for(&self, brand: &str, model: &str) -> Result<Vec<String>, DataError> {
        self.distinct_where("car_name", &[("brand", brand), ("model", model)])
    }

    fn categorical_column(&self, attribute: &str) -> Result<&Vec<String>, DataError> {
        self.categorical
            .iter()
            .find(|(name, _)| name == attribute)
            .map(|(_, values)| values)
            .ok_or_else(|| DataError::NotCategorical(attribute.to_string()))
    }
}

fn extract_numeric_column(df: &DataFrame, column_name: &str) -> Result<Vec<f64>, DataError> {
    let series = df.column(column_name)?;
    if series.null_count() > 0 {
        return Err(DataError::MissingValuesFound(column_name.to_string()));
    }

    let casted = match series.cast(&DataType::Float64) {
        Ok(casted) => casted,
        Err(_) => {
            return Err(DataError::ColumnWrongType {
                column_name: column_name.to_string(),
                expected_type: "f64 (numeric)",
                found_type: format!("{:?}", series.dtype()),
            });
        }
    };

    if casted.null_count() > 0 {
        return Err(DataError::ColumnWrongType {
            column_name: column_name.to_string(),
            expected_type: "f64 (numeric)",
            found_type: format!("{:?}", series.dtype()),
        });
    }

    let chunked = casted.f64()?.rechunk();
    let values: Vec<f64> = chunked.into_no_null_iter().collect();
    if values.iter().any(|v| !v.is_finite()) {
        return Err(DataError::NonFiniteValuesFound(column_name.to_string()));
    }
    Ok(values)
}

fn extract_string_column(df: &DataFrame, column_name: &str) -> Result<Vec<String>, DataError> {
    let series = df.column(column_name)?;
    if series.null_count() > 0 {
        return Err(DataError::MissingValuesFound(column_name.to_string()));
    }

    // Casting to String is tolerant: a categorical column that happens to
    // contain numbers is still a valid set of category labels.
    let casted = match series.cast(&DataType::String) {
        Ok(casted) => casted,
        Err(_) => {
            return Err(DataError::ColumnWrongType {
                column_name: column_name.to_string(),
                expected_type: "string (categorical)",
                found_type: format!("{:?}", series.dtype()),
            });
        }
    };

    let chunked = casted.str()?.rechunk();
    let values: Vec<String> = chunked
        .into_no_null_iter()
        .map(|s| s.to_string())
        .collect();
    Ok(values)
}
