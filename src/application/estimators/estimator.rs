use crate::domain::features::FeatureVector;

/// Interface for frozen regression models.
///
/// Implementations are loaded once at startup and never mutated afterwards,
/// so they are safe to share across concurrent predictions.
pub trait ValueEstimator: Send + Sync {
    /// Predict a property value in dollars for the encoded feature vector.
    fn predict(&self, features: &FeatureVector) -> Result<f64, String>;

    /// Stable identifier used for weight configuration and diagnostics.
    fn id(&self) -> &str;

    /// Get model version/artifact tag.
    fn version(&self) -> &str;
}

/// Snapshot of one estimator's identity, for startup logs and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EstimatorInfo {
    pub id: String,
    pub version: String,
}
