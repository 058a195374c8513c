//! The inference procedure.
//!
//! A [`Predictor`] is loaded once per process from the persisted artifact
//! triple and is immutable afterwards, so it is safe to share by reference
//! across any number of prediction calls. Each prediction assembles a single
//! record through the same feature path training used and reports any
//! failure as one [`PredictError`]; there are no partial results.

use crate::artifact::{ArtifactError, PriceArtifacts};
use crate::data;
use crate::features::{self, Record};
use crate::forest::ModelError;
use log::debug;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PredictError {
    #[error("Failed to load prediction artifacts: {0}")]
    Artifact(#[from] ArtifactError),
    #[error("Prediction failed: {0}")]
    Model(#[from] ModelError),
}

/// A loaded, frozen model ready to price cars.
#[derive(Debug, Clone)]
pub struct Predictor {
    artifacts: PriceArtifacts,
}

impl Predictor {
    /// Loads the artifact triple from `dir`. Missing or corrupt artifacts
    /// abort here, before any prediction is attempted.
    pub fn load(dir: &Path) -> Result<Self, PredictError> {
        let artifacts = PriceArtifacts::load(dir)?;
        debug!(
            "Loaded predictor: {} feature columns, {} categorical attributes",
            artifacts.columns.len(),
            artifacts.encoder.attributes().len()
        );
        Ok(Predictor { artifacts })
    }

    /// Wraps an in-memory artifact triple, e.g. fresh from training.
    pub fn from_artifacts(artifacts: PriceArtifacts) -> Self {
        Predictor { artifacts }
    }

    /// Predicts a resale price for one car record.
    pub fn predict(&self, record: &Record) -> Result<f64, PredictError> {
        let row = features::assemble_for_inference(
            record,
            &self.artifacts.encoder,
            &self.artifacts.columns,
        );
        Ok(self.artifacts.model.predict_one(row.view())?)
    }

    /// The canonical feature column list the model was trained on.
    pub fn columns(&self) -> &[String] {
        &self.artifacts.columns
    }
}

/// The twelve user-facing car attributes, with the types and bounds the
/// input surface advertises. Conversion into a [`Record`] uses the dataset
/// schema's attribute names.
#[derive(Debug, Clone)]
pub struct CarInput {
    pub brand: String,
    pub model: String,
    pub car_name: String,
    pub transmission_type: String,
    pub vehicle_age: u32,
    pub km_driven: u32,
    pub fuel_type: String,
    pub seller_type: String,
    pub mileage: f64,
    pub engine: u32,
    pub max_power: f64,
    pub seats: u32,
}

impl CarInput {
    /// Builds the generic record the feature assembler consumes. Numeric
    /// attributes keep their raw magnitudes.
    pub fn to_record(&self) -> Record {
        let mut record = Record::new();
        for (name, value) in [
            ("car_name", &self.car_name),
            ("brand", &self.brand),
            ("model", &self.model),
            ("seller_type", &self.seller_type),
            ("fuel_type", &self.fuel_type),
            ("transmission_type", &self.transmission_type),
        ] {
            debug_assert!(data::CATEGORICAL_ATTRS.contains(&name));
            record = record.with_categorical(name, value);
        }
        record
            .with_numeric("vehicle_age", f64::from(self.vehicle_age))
            .with_numeric("km_driven", f64::from(self.km_driven))
            .with_numeric("mileage", self.mileage)
            .with_numeric("engine", f64::from(self.engine))
            .with_numeric("max_power", self.max_power)
            .with_numeric("seats", f64::from(self.seats))
    }
}

/// Formats a predicted price as a currency string: rounded to the nearest
/// whole rupee with three-digit grouping, e.g. `₹ 1,234,568`.
pub fn format_price(value: f64) -> String {
    let rounded = value.round() as i64;
    let digits = rounded.unsigned_abs().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if rounded < 0 { "-" } else { "" };
    format!("₹ {sign}{grouped}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Dataset;
    use crate::train::{self, TrainConfig};

    fn trained_predictor() -> Predictor {
        let n = 40;
        let dataset = Dataset {
            numeric: vec![(
                "km_driven".to_string(),
                (0..n).map(|i| 5_000.0 * i as f64).collect(),
            )],
            categorical: vec![(
                "fuel_type".to_string(),
                (0..n)
                    .map(|i| if i % 2 == 0 { "Diesel" } else { "Petrol" }.to_string())
                    .collect(),
            )],
            target: (0..n).map(|i| 900_000.0 - 4_000.0 * i as f64).collect(),
        };
        let config = TrainConfig {
            n_trees: 10,
            ..TrainConfig::default()
        };
        let (artifacts, _) = train::train(&dataset, &config).unwrap();
        Predictor::from_artifacts(artifacts)
    }

    #[test]
    fn predicts_a_finite_price() {
        let predictor = trained_predictor();
        let record = Record::new()
            .with_numeric("km_driven", 60_000.0)
            .with_categorical("fuel_type", "Petrol");
        let price = predictor.predict(&record).unwrap();
        assert!(price.is_finite());
    }

    #[test]
    fn unseen_category_still_predicts() {
        let predictor = trained_predictor();
        let record = Record::new()
            .with_numeric("km_driven", 60_000.0)
            .with_categorical("fuel_type", "CNG");
        assert!(predictor.predict(&record).is_ok());
    }

    #[test]
    fn missing_artifacts_abort_load() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Predictor::load(dir.path()),
            Err(PredictError::Artifact(_))
        ));
    }

    #[test]
    fn car_input_covers_the_full_schema() {
        let input = CarInput {
            brand: "Honda".to_string(),
            model: "City".to_string(),
            car_name: "Honda City".to_string(),
            transmission_type: "Manual".to_string(),
            vehicle_age: 5,
            km_driven: 30_000,
            fuel_type: "Petrol".to_string(),
            seller_type: "Dealer".to_string(),
            mileage: 17.8,
            engine: 1_497,
            max_power: 117.3,
            seats: 5,
        };
        let record = input.to_record();
        assert_eq!(record.categorical.len(), data::CATEGORICAL_ATTRS.len());
        assert_eq!(record.numeric.len(), data::NUMERIC_ATTRS.len());
        assert!(record
            .numeric
            .iter()
            .any(|(name, value)| name == "engine" && *value == 1_497.0));
    }

    #[test]
    fn price_formatting() {
        assert_eq!(format_price(1_234_567.8), "₹ 1,234,568");
        assert_eq!(format_price(999.4), "₹ 999");
        assert_eq!(format_price(1_000.0), "₹ 1,000");
        assert_eq!(format_price(0.2), "₹ 0");
        assert_eq!(format_price(-12_345.6), "₹ -12,346");
    }
}
