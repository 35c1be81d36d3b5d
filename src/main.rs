//! Valuator - headless ensemble valuation engine runner
//!
//! Loads the frozen model artifacts, wires the engine from environment
//! configuration, and valuates property records from a JSON file (one object
//! or an array). Stands in for the API layer during local runs.
//!
//! # Usage
//! ```sh
//! MODEL_DIR=models cargo run -- --input properties.json
//! cargo run -- --demo
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use rand::Rng;
use std::path::PathBuf;
use tracing::{Level, info};
use tracing_subscriber::prelude::*;
use valuator::application::valuation_service::ValuationService;
use valuator::config::Config;
use valuator::domain::property::{PropertyAttributes, PropertyType};

#[derive(Debug, Parser)]
#[command(name = "valuator", about = "Commercial property ensemble valuation engine")]
struct Cli {
    /// JSON file holding one property record or an array of records
    #[arg(long, conflicts_with = "demo")]
    input: Option<PathBuf>,

    /// Valuate a synthetic demo property instead of reading a file
    #[arg(long)]
    demo: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false).pretty();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stdout_layer)
        .init();

    info!("Valuator {} starting...", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let config = Config::from_env()?;
    info!(
        "Configuration loaded: model_version={}, confidence_level={}%, cache_ttl={}s",
        config.estimators.model_version,
        config.engine.confidence_level,
        config.engine.cache_ttl_seconds
    );

    let service = ValuationService::from_config(&config);
    info!(
        "Engine ready with {} estimator(s)",
        service.pool().len()
    );

    let properties = if cli.demo {
        vec![demo_property()]
    } else {
        let path = cli
            .input
            .context("Provide --input <file> or --demo")?;
        load_properties(&path)?
    };

    if properties.len() == 1 {
        let response = service.valuate(&properties[0]).await?;
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        let summary = service.valuate_batch(&properties).await;
        info!(
            "Batch complete: {}/{} successful",
            summary.successful, summary.total_properties
        );
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    Ok(())
}

fn load_properties(path: &PathBuf) -> Result<Vec<PropertyAttributes>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    // Accept either a single record or an array of records.
    if let Ok(batch) = serde_json::from_str::<Vec<PropertyAttributes>>(&raw) {
        return Ok(batch);
    }
    let single: PropertyAttributes =
        serde_json::from_str(&raw).context("Input is neither a property nor a property array")?;
    Ok(vec![single])
}

fn demo_property() -> PropertyAttributes {
    let mut rng = rand::rng();
    let revenue = rng.random_range(300_000.0..2_000_000.0_f64);
    let expenses = revenue * rng.random_range(0.25..0.45);

    PropertyAttributes {
        property_type: PropertyType::Office,
        city: "Seattle".to_string(),
        square_feet: rng.random_range(5_000.0..50_000.0),
        num_floors: rng.random_range(1.0..20.0_f64).round(),
        num_units: rng.random_range(1.0..60.0_f64).round(),
        parking_spots: rng.random_range(0.0..200.0_f64).round(),
        occupancy_rate: rng.random_range(0.6..0.99),
        annual_revenue: revenue,
        annual_expenses: expenses,
        net_operating_income: revenue - expenses,
        cap_rate: rng.random_range(0.04..0.09),
        walk_score: rng.random_range(30.0..100.0_f64).round(),
        transit_score: rng.random_range(20.0..100.0_f64).round(),
        building_age: rng.random_range(0.0..60.0_f64).round(),
        distance_to_downtown: rng.random_range(0.2..15.0),
    }
}
