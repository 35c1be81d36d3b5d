use super::estimator::ValueEstimator;
use crate::domain::features::FeatureVector;
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::linear_regression::LinearRegression;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Linear regression estimator. Deliberately simple: it anchors the ensemble
/// with a low-variance baseline next to the tree and network models.
pub struct LinearEstimator {
    model: Option<LinearRegression<f64, f64, DenseMatrix<f64>, Vec<f64>>>,
    model_path: PathBuf,
}

impl LinearEstimator {
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
                "Linear model artifact not found at {:?}. Estimator will be excluded from ensembles.",
                self.model_path
            );
            return;
        }

        match File::open(&self.model_path) {
            Ok(mut file) => {
                let mut buffer = Vec::new();
                if let Err(e) = file.read_to_end(&mut buffer) {
                    error!("Failed to read linear model artifact: {}", e);
                    return;
                }

                match serde_json::from_reader(std::io::Cursor::new(&buffer)) {
                    Ok(model) => {
                        info!("Loaded linear model from {:?}", self.model_path);
                        self.model = Some(model);
                    }
                    Err(e) => {
                        error!("Failed to deserialize linear model: {}", e);
                    }
                }
            }
            Err(e) => {
                error!("Failed to open linear model artifact: {}", e);
            }
        }
    }
}

impl ValueEstimator for LinearEstimator {
    fn predict(&self, features: &FeatureVector) -> Result<f64, String> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| "linear model artifact not loaded".to_string())?;

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
        "linear"
    }

    fn version(&self) -> &str {
        "v1.0"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_artifact_fails_prediction() {
        let estimator = LinearEstimator::new(PathBuf::from("non_existent_linear.json"));
        assert_eq!(estimator.id(), "linear");
        assert!(estimator.model.is_none());
    }
}
