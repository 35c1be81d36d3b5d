use super::estimator::ValueEstimator;
use crate::domain::features::FeatureVector;
use ort::session::Session;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{error, info, warn};

/// Per-feature standardization parameters exported alongside the network
/// (the training pipeline's scaler artifact).
#[derive(Debug, Clone, Deserialize)]
pub struct ScalerParams {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

/// Feed-forward network estimator via ONNX Runtime.
///
/// The network was trained on standardized inputs, so raw feature values are
/// transformed with the scaler sidecar before inference.
pub struct OnnxEstimator {
    session: Option<Mutex<Session>>,
    scaler: Option<ScalerParams>,
    model_path: PathBuf,
}

impl OnnxEstimator {
    pub fn new(model_path: PathBuf, scaler_path: PathBuf) -> Self {
        let mut estimator = Self {
            session: None,
            scaler: None,
            model_path,
        };
        estimator.load_model();
        estimator.load_scaler(&scaler_path);
        estimator
    }

    fn load_model(&mut self) {
        if !self.model_path.exists() {
            warn!(
                "ONNX model artifact not found at {:?}. Estimator will be excluded from ensembles.",
                self.model_path
            );
            return;
        }

        match Session::builder() {
            Ok(mut builder) => match builder.commit_from_file(&self.model_path) {
                Ok(session) => {
                    info!("Loaded ONNX model from {:?}", self.model_path);
                    self.session = Some(Mutex::new(session));
                }
                Err(e) => {
                    error!("Failed to load ONNX model: {}", e);
                }
            },
            Err(e) => {
                error!("Failed to create ONNX session builder: {}", e);
            }
        }
    }

    fn load_scaler(&mut self, scaler_path: &PathBuf) {
        if !scaler_path.exists() {
            warn!(
                "Scaler sidecar not found at {:?}. Network inputs would be unscaled, excluding estimator.",
                scaler_path
            );
            return;
        }

        match std::fs::read_to_string(scaler_path) {
            Ok(raw) => match serde_json::from_str::<ScalerParams>(&raw) {
                Ok(params) => {
                    info!("Loaded scaler parameters from {:?}", scaler_path);
                    self.scaler = Some(params);
                }
                Err(e) => error!("Failed to parse scaler sidecar: {}", e),
            },
            Err(e) => error!("Failed to read scaler sidecar: {}", e),
        }
    }

    fn standardize(&self, features: &FeatureVector) -> Result<Vec<f32>, String> {
        let scaler = self
            .scaler
            .as_ref()
            .ok_or_else(|| "scaler parameters not loaded".to_string())?;
        let values = features.values();
        if scaler.mean.len() != values.len() || scaler.std.len() != values.len() {
            return Err(format!(
                "scaler dimension {} does not match feature dimension {}",
                scaler.mean.len(),
                values.len()
            ));
        }

        Ok(values
            .iter()
            .zip(scaler.mean.iter().zip(scaler.std.iter()))
            .map(|(v, (mean, std))| {
                let denom = if *std > 0.0 { *std } else { 1.0 };
                ((v - mean) / denom) as f32
            })
            .collect())
    }
}

impl ValueEstimator for OnnxEstimator {
    fn predict(&self, features: &FeatureVector) -> Result<f64, String> {
        let mut session = match &self.session {
            Some(m) => m.lock().map_err(|e| format!("Mutex lock failed: {}", e))?,
            None => return Err("ONNX model artifact not loaded".to_string()),
        };

        let scaled = self.standardize(features)?;
        let shape = vec![1_usize, scaled.len()];

        let input_value = ort::value::Value::from_array((shape.as_slice(), scaled))
            .map_err(|e| format!("Input value creation failed: {}", e))?;

        let inputs = ort::inputs![input_value];

        match session.run(inputs) {
            Ok(outputs) => {
                let output_value = outputs
                    .iter()
                    .next()
                    .map(|(_, v)| v)
                    .ok_or("No output found")?;
                let data = output_value
                    .try_extract_tensor::<f32>()
                    .map_err(|e| e.to_string())?;
                Ok(*data.1.iter().next().ok_or("Empty output")? as f64)
            }
            Err(e) => Err(e.to_string()),
        }
    }

    fn id(&self) -> &str {
        "neural_network"
    }

    fn version(&self) -> &str {
        "v1.1"
    }
}
