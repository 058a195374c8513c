//! End-to-end pipeline test: CSV on disk, through training and artifact
//! persistence, to a price for a user-supplied record.

use resale::predict::{CarInput, Predictor, format_price};
use resale::train::{self, TrainConfig};
use std::fmt::Write as _;
use std::fs;
use tempfile::tempdir;

const HEADER: &str = "car_name,brand,model,vehicle_age,km_driven,seller_type,fuel_type,transmission_type,mileage,engine,max_power,seats,selling_price";

/// A small but varied synthetic dataset with two brands and a price that
/// depends on age and kilometers driven.
fn synthetic_csv() -> String {
    let mut csv = String::from(HEADER);
    for i in 0..80u32 {
        let (car, brand, model, fuel) = if i % 2 == 0 {
            ("Maruti Alto", "Maruti", "Alto", "Petrol")
        } else {
            ("Honda City", "Honda", "City", "Diesel")
        };
        let seller = if i % 3 == 0 { "Dealer" } else { "Individual" };
        let transmission = if i % 5 == 0 { "Automatic" } else { "Manual" };
        let age = i % 15;
        let km = 10_000 + 3_000 * i;
        let price = 900_000 - 30_000 * u64::from(age) - u64::from(km);
        write!(
            csv,
            "\n{car},{brand},{model},{age},{km},{seller},{fuel},{transmission},18.5,1200,82.0,5,{price}"
        )
        .unwrap();
    }
    csv
}

#[test]
fn train_persist_load_predict() {
    let dir = tempdir().unwrap();
    let dataset_path = dir.path().join("cars.csv");
    fs::write(&dataset_path, synthetic_csv()).unwrap();
    let artifact_dir = dir.path().join("artifacts");

    let config = TrainConfig {
        n_trees: 20,
        ..TrainConfig::default()
    };
    let report = train::run_training(&dataset_path, &artifact_dir, &config).unwrap();
    assert!(report.r_squared > 0.5, "R² = {}", report.r_squared);

    let predictor = Predictor::load(&artifact_dir).unwrap();

    // Numeric columns first (file order), then one indicator per observed
    // category value, sorted within each attribute.
    let columns = predictor.columns();
    assert_eq!(&columns[..6], &[
        "vehicle_age",
        "km_driven",
        "mileage",
        "engine",
        "max_power",
        "seats"
    ]);
    assert!(columns.contains(&"brand_Honda".to_string()));
    assert!(columns.contains(&"fuel_type_Diesel".to_string()));

    let input = CarInput {
        brand: "Honda".to_string(),
        model: "City".to_string(),
        car_name: "Honda City".to_string(),
        transmission_type: "Manual".to_string(),
        vehicle_age: 5,
        km_driven: 60_000,
        fuel_type: "Diesel".to_string(),
        seller_type: "Individual".to_string(),
        mileage: 18.5,
        engine: 1_200,
        max_power: 82.0,
        seats: 5,
    };
    let price = predictor.predict(&input.to_record()).unwrap();
    assert!(price.is_finite() && price > 0.0);
    assert!(format_price(price).starts_with("₹ "));

    // A brand the dataset has never seen: the indicator block zero-fills
    // and prediction still succeeds.
    let unseen = CarInput {
        brand: "Tesla".to_string(),
        model: "Model 3".to_string(),
        car_name: "Tesla Model 3".to_string(),
        fuel_type: "Electric".to_string(),
        ..input.clone()
    };
    assert!(predictor.predict(&unseen.to_record()).is_ok());
}

#[test]
fn retraining_with_same_seed_is_reproducible() {
    let dir = tempdir().unwrap();
    let dataset_path = dir.path().join("cars.csv");
    fs::write(&dataset_path, synthetic_csv()).unwrap();

    let config = TrainConfig {
        n_trees: 10,
        ..TrainConfig::default()
    };
    let first = train::run_training(&dataset_path, &dir.path().join("a"), &config).unwrap();
    let second = train::run_training(&dataset_path, &dir.path().join("b"), &config).unwrap();
    assert_eq!(first.r_squared, second.r_squared);

    let a = Predictor::load(&dir.path().join("a")).unwrap();
    let b = Predictor::load(&dir.path().join("b")).unwrap();
    assert_eq!(a.columns(), b.columns());

    let input = CarInput {
        brand: "Maruti".to_string(),
        model: "Alto".to_string(),
        car_name: "Maruti Alto".to_string(),
        transmission_type: "Manual".to_string(),
        vehicle_age: 8,
        km_driven: 90_000,
        fuel_type: "Petrol".to_string(),
        seller_type: "Individual".to_string(),
        mileage: 18.5,
        engine: 1_200,
        max_power: 82.0,
        seats: 5,
    };
    let record = input.to_record();
    assert_eq!(a.predict(&record).unwrap(), b.predict(&record).unwrap());
}
