//! Configuration module for the valuation engine.
//!
//! Structured configuration loading from environment variables, organized by
//! concern: ensemble/cache tunables and estimator artifact locations.

mod engine_config;
mod estimator_config;

pub use engine_config::EngineEnvConfig;
pub use estimator_config::EstimatorEnvConfig;

use anyhow::{Context, Result};

/// Main engine configuration.
///
/// Aggregates the recognized option surface: confidence level, cache TTL and
/// capacity, per-estimator weights and timeout, minimum uncertainty fallback,
/// and model artifact locations.
#[derive(Debug, Clone)]
pub struct Config {
    pub engine: EngineEnvConfig,
    pub estimators: EstimatorEnvConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let engine = EngineEnvConfig::from_env().context("Failed to load engine config")?;
        let estimators =
            EstimatorEnvConfig::from_env().context("Failed to load estimator config")?;

        Ok(Self { engine, estimators })
    }
}
