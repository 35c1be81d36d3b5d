//! Ensemble and cache tunables parsed from environment variables.

use anyhow::{Context, Result, bail};
use std::collections::HashMap;
use std::env;

/// Engine environment configuration
#[derive(Debug, Clone)]
pub struct EngineEnvConfig {
    /// Interval probability in percent (e.g. 95).
    pub confidence_level: f64,
    pub cache_ttl_seconds: u64,
    pub max_cache_entries: usize,
    /// Per-estimator reliability weights, key = estimator id.
    pub estimator_weights: HashMap<String, f64>,
    pub estimator_timeout_ms: u64,
    /// Fallback plus/minus band (percent) when only one estimator succeeds.
    pub min_uncertainty_pct: f64,
}

impl EngineEnvConfig {
    pub fn from_env() -> Result<Self> {
        let confidence_level = Self::parse_f64("CONFIDENCE_LEVEL", 95.0)?;
        if confidence_level <= 0.0 || confidence_level >= 100.0 {
            bail!(
                "CONFIDENCE_LEVEL must be within (0, 100), got {}",
                confidence_level
            );
        }

        // Weight list format: "random_forest:0.4,neural_network:0.2"
        let weights_env = env::var("ESTIMATOR_WEIGHTS").unwrap_or_default();
        let mut estimator_weights = HashMap::new();
        for entry in weights_env.split(',').filter(|e| !e.trim().is_empty()) {
            let (id, weight) = entry
                .split_once(':')
                .with_context(|| format!("Malformed ESTIMATOR_WEIGHTS entry '{}'", entry))?;
            let weight: f64 = weight
                .trim()
                .parse()
                .with_context(|| format!("Invalid weight in ESTIMATOR_WEIGHTS entry '{}'", entry))?;
            if weight < 0.0 {
                bail!("Estimator weight for '{}' must be non-negative", id.trim());
            }
            estimator_weights.insert(id.trim().to_string(), weight);
        }

        Ok(Self {
            confidence_level,
            cache_ttl_seconds: Self::parse_u64("CACHE_TTL_SECONDS", 300)?,
            max_cache_entries: Self::parse_usize("MAX_CACHE_ENTRIES", 1000)?,
            estimator_weights,
            estimator_timeout_ms: Self::parse_u64("ESTIMATOR_TIMEOUT_MS", 2000)?,
            min_uncertainty_pct: Self::parse_f64("MIN_UNCERTAINTY_PCT", 2.0)?,
        })
    }

    fn parse_usize(key: &str, default: usize) -> Result<usize> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<usize>()
            .context(format!("Failed to parse {}", key))
    }

    fn parse_f64(key: &str, default: f64) -> Result<f64> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<f64>()
            .context(format!("Failed to parse {}", key))
    }

    fn parse_u64(key: &str, default: u64) -> Result<u64> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<u64>()
            .context(format!("Failed to parse {}", key))
    }
}
