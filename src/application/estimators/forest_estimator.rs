use super::estimator::ValueEstimator;
use crate::domain::features::FeatureVector;
use smartcore::ensemble::random_forest_regressor::RandomForestRegressor;
use smartcore::linalg::basic::matrix::DenseMatrix;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Random-forest regression estimator backed by a smartcore artifact
/// serialized as JSON by the training pipeline.
pub struct ForestEstimator {
    model: Option<RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>>,
    model_path: PathBuf,
}

impl ForestEstimator {
    pub fn new(model_path: PathBuf) -> Self {
        let mut estimator = Self {
            model: None,
            model_path,
        };
        estimator.load_model();
        estimator
    }

    fn load_model(&mut self) {
        if !self.model_path.exists() {
            warn!(
                "Forest model artifact not found at {:?}. Estimator will be excluded from ensembles.",
                self.model_path
            );
            return;
        }

        match File::open(&self.model_path) {
            Ok(mut file) => {
                let mut buffer = Vec::new();
                if let Err(e) = file.read_to_end(&mut buffer) {
                    error!("Failed to read forest model artifact: {}", e);
                    return;
                }

                match serde_json::from_reader(std::io::Cursor::new(&buffer)) {
                    Ok(model) => {
                        info!("Loaded forest model from {:?}", self.model_path);
                        self.model = Some(model);
                    }
                    Err(e) => {
                        error!("Failed to deserialize forest model: {}", e);
                    }
                }
            }
            Err(e) => {
                error!("Failed to open forest model artifact: {}", e);
            }
        }
    }
}

impl ValueEstimator for ForestEstimator {
    fn predict(&self, features: &FeatureVector) -> Result<f64, String> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| "forest model artifact not loaded".to_string())?;

        let input_matrix = DenseMatrix::from_2d_vec(&vec![features.values().to_vec()])
            .map_err(|e| format!("Matrix creation failed: {}", e))?;

        let predictions = model
            .predict(&input_matrix)
            .map_err(|e| format!("Prediction failed: {}", e))?;

        predictions
            .first()
            .copied()
            .ok_or_else(|| "No prediction returned".to_string())
    }

    fn id(&self) -> &str {
        "random_forest"
    }

    fn version(&self) -> &str {
        "v1.0"
    }
}
