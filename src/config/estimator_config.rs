//! Model artifact locations and the active model version tag.

use anyhow::Result;
use std::env;
use std::path::PathBuf;

/// Estimator environment configuration
#[derive(Debug, Clone)]
pub struct EstimatorEnvConfig {
    /// Directory holding the frozen model artifacts.
    pub model_dir: PathBuf,
    pub forest_enabled: bool,
    pub linear_enabled: bool,
    pub onnx_enabled: bool,
    pub income_enabled: bool,
    /// Deployment tag mixed into every fingerprint, so re-deploying
    /// estimators invalidates stale cache entries without an explicit flush.
    pub model_version: String,
}

impl EstimatorEnvConfig {
    pub fn from_env() -> Result<Self> {
        let model_dir = env::var("MODEL_DIR").unwrap_or_else(|_| "models".to_string());

        Ok(Self {
            model_dir: PathBuf::from(model_dir),
            forest_enabled: Self::parse_bool("FOREST_ESTIMATOR_ENABLED", true),
            linear_enabled: Self::parse_bool("LINEAR_ESTIMATOR_ENABLED", true),
            onnx_enabled: Self::parse_bool("ONNX_ESTIMATOR_ENABLED", true),
            income_enabled: Self::parse_bool("INCOME_ESTIMATOR_ENABLED", true),
            model_version: env::var("MODEL_VERSION").unwrap_or_else(|_| "v1.1.0".to_string()),
        })
    }

    pub fn forest_path(&self) -> PathBuf {
        self.model_dir.join("random_forest.json")
    }

    pub fn linear_path(&self) -> PathBuf {
        self.model_dir.join("linear_regression.json")
    }

    pub fn onnx_path(&self) -> PathBuf {
        self.model_dir.join("neural_network.onnx")
    }

    pub fn scaler_path(&self) -> PathBuf {
        self.model_dir.join("scaler.json")
    }

    fn parse_bool(key: &str, default: bool) -> bool {
        env::var(key)
            .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(default)
    }
}
