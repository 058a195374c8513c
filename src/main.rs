use clap::{Parser, Subcommand, ValueEnum};
use resale::data;
use resale::predict::{self, CarInput, Predictor};
use resale::train::{self, TrainConfig};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(
    name = "resale",
    about = "Train and apply used-car resale price models",
    long_about = "Trains a random-forest regressor on a car dataset CSV (one-hot encoding the \
                 categorical attributes) and predicts resale prices for individual cars using \
                 the persisted model, encoder, and canonical column list."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a price model from a dataset CSV
    #[command(about = "Train a model (outputs: model.toml, encoder.toml, columns.toml)")]
    Train {
        /// Path to the car dataset CSV
        dataset: PathBuf,

        /// Directory to write the artifact triple into
        #[arg(long, default_value = "artifacts")]
        out_dir: PathBuf,

        /// Number of trees in the forest
        #[arg(long, default_value_t = 100)]
        trees: usize,

        /// Random seed for the train/test split and the bootstrap samples
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Fraction of rows held out for the R² score
        #[arg(long, default_value_t = 0.2)]
        test_fraction: f64,
    },

    /// Predict the resale price of a single car
    #[command(about = "Predict a price from persisted artifacts")]
    Predict {
        /// Directory holding the trained artifact triple
        #[arg(long, default_value = "artifacts")]
        artifacts: PathBuf,

        #[arg(long)]
        brand: String,

        #[arg(long)]
        model: String,

        #[arg(long)]
        car_name: String,

        #[arg(long, value_enum)]
        transmission: Transmission,

        /// Vehicle age in years
        #[arg(long, value_parser = clap::value_parser!(u32).range(0..=20))]
        vehicle_age: u32,

        /// Kilometers driven
        #[arg(long, value_parser = clap::value_parser!(u32).range(0..=300_000))]
        km_driven: u32,

        #[arg(long)]
        fuel_type: String,

        #[arg(long)]
        seller_type: String,

        /// Mileage in km/l (0-50)
        #[arg(long)]
        mileage: f64,

        /// Engine displacement in cc
        #[arg(long, value_parser = clap::value_parser!(u32).range(500..=5_000))]
        engine: u32,

        /// Maximum power in bhp (20-300)
        #[arg(long)]
        max_power: f64,

        #[arg(long, value_parser = clap::value_parser!(u32).range(2..=10))]
        seats: u32,
    },

    /// List dataset-derived values for the categorical inputs
    #[command(about = "List valid choices (brands, models per brand, car names, ...)")]
    Choices {
        /// Path to the car dataset CSV
        dataset: PathBuf,

        /// Restrict the listing to models of this brand
        #[arg(long)]
        brand: Option<String>,

        /// With --brand, restrict the listing to car names of this model
        #[arg(long, requires = "brand")]
        model: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Transmission {
    Manual,
    Automatic,
}

impl Transmission {
    fn as_str(self) -> &'static str {
        match self {
            Transmission::Manual => "Manual",
            Transmission::Automatic => "Automatic",
        }
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Train {
            dataset,
            out_dir,
            trees,
            seed,
            test_fraction,
        } => train_command(&dataset, &out_dir, trees, seed, test_fraction),
        Commands::Predict {
            artifacts,
            brand,
            model,
            car_name,
            transmission,
            vehicle_age,
            km_driven,
            fuel_type,
            seller_type,
            mileage,
            engine,
            max_power,
            seats,
        } => predict_command(
            &artifacts,
            CarInput {
                brand,
                model,
                car_name,
                transmission_type: transmission.as_str().to_string(),
                vehicle_age,
                km_driven,
                fuel_type,
                seller_type,
                mileage,
                engine,
                max_power,
                seats,
            },
        ),
        Commands::Choices {
            dataset,
            brand,
            model,
        } => choices_command(&dataset, brand.as_deref(), model.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn train_command(
    dataset: &std::path::Path,
    out_dir: &std::path::Path,
    trees: usize,
    seed: u64,
    test_fraction: f64,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Training from: {}", dataset.display());
    let config = TrainConfig {
        n_trees: trees,
        seed,
        test_fraction,
    };
    let report = train::run_training(dataset, out_dir, &config)?;
    println!(
        "Trained on {} rows, scored on {} held-out rows ({} feature columns)",
        report.n_train, report.n_test, report.n_columns
    );
    println!("R² score: {:.4}", report.r_squared);
    println!("Artifacts saved to: {}", out_dir.display());
    Ok(())
}

fn predict_command(
    artifacts_dir: &std::path::Path,
    input: CarInput,
) -> Result<(), Box<dyn std::error::Error>> {
    // Float bounds from the input surface; clap's integer ranges cover the
    // rest at parse time.
    check_range("mileage", input.mileage, 0.0, 50.0)?;
    check_range("max-power", input.max_power, 20.0, 300.0)?;

    let predictor = Predictor::load(artifacts_dir)?;
    let price = predictor.predict(&input.to_record())?;
    println!("Estimated price: {}", predict::format_price(price));
    Ok(())
}

fn choices_command(
    dataset_path: &std::path::Path,
    brand: Option<&str>,
    model: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let dataset = data::load_dataset(dataset_path)?;

    match (brand, model) {
        (Some(brand), Some(model)) => {
            print_section("car names", &dataset.car_names_for(brand, model)?);
        }
        (Some(brand), None) => {
            print_section("models", &dataset.models_for_brand(brand)?);
        }
        (None, _) => {
            print_section("brands", &dataset.brands()?);
            print_section("fuel types", &dataset.distinct("fuel_type")?);
            print_section("seller types", &dataset.distinct("seller_type")?);
            print_section("transmissions", &dataset.distinct("transmission_type")?);
        }
    }
    Ok(())
}

fn print_section(title: &str, values: &[String]) {
    println!("{title}:");
    for value in values {
        println!("  {value}");
    }
}

fn check_range(
    name: &str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<(), Box<dyn std::error::Error>> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(format!("--{name} must be between {min} and {max}, got {value}").into())
    }
}
