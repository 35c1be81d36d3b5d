use super::estimator::{EstimatorInfo, ValueEstimator};
use crate::domain::errors::ValuationError;
use crate::domain::features::FeatureVector;
use crate::domain::valuation::EstimatorOutput;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Holds the frozen estimators for the process lifetime and fans predictions
/// out across them.
///
/// Estimators never observe each other's output. An individual failure,
/// timeout, or non-finite prediction excludes that estimator from the
/// ensemble for the request; the pool only fails outright when no estimator
/// succeeds.
pub struct EstimatorPool {
    estimators: Vec<Arc<dyn ValueEstimator>>,
    per_estimator_timeout: Duration,
}

impl EstimatorPool {
    pub fn new(estimators: Vec<Arc<dyn ValueEstimator>>, per_estimator_timeout: Duration) -> Self {
        Self {
            estimators,
            per_estimator_timeout,
        }
    }

    pub fn len(&self) -> usize {
        self.estimators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.estimators.is_empty()
    }

    pub fn infos(&self) -> Vec<EstimatorInfo> {
        self.estimators
            .iter()
            .map(|e| EstimatorInfo {
                id: e.id().to_string(),
                version: e.version().to_string(),
            })
            .collect()
    }

    /// Invoke every estimator concurrently and collect the successful
    /// outputs.
    pub async fn predict_all(
        &self,
        features: &FeatureVector,
    ) -> Result<Vec<EstimatorOutput>, ValuationError> {
        let tasks = self.estimators.iter().map(|estimator| {
            let estimator = Arc::clone(estimator);
            let features = features.clone();
            let budget = self.per_estimator_timeout;
            async move {
                let id = estimator.id().to_string();
                let version = estimator.version().to_string();
                let handle = tokio::task::spawn_blocking(move || estimator.predict(&features));

                match tokio::time::timeout(budget, handle).await {
                    Err(_) => {
                        let err = ValuationError::EstimatorTimeout {
                            estimator_id: id.clone(),
                            timeout_ms: budget.as_millis() as u64,
                        };
                        Err((id, err.to_string()))
                    }
                    Ok(Err(join_err)) => Err((id, format!("estimator task failed: {}", join_err))),
                    Ok(Ok(Err(e))) => Err((id, e)),
                    Ok(Ok(Ok(value))) if !value.is_finite() => {
                        Err((id, format!("non-finite prediction: {}", value)))
                    }
                    Ok(Ok(Ok(value))) => Ok(EstimatorOutput {
                        estimator_id: id,
                        version,
                        value,
                    }),
                }
            }
        });

        let mut outputs = Vec::with_capacity(self.estimators.len());
        let mut failures = Vec::new();
        for result in join_all(tasks).await {
            match result {
                Ok(output) => outputs.push(output),
                Err((id, reason)) => {
                    warn!("Estimator '{}' excluded from ensemble: {}", id, reason);
                    failures.push(format!("{}: {}", id, reason));
                }
            }
        }

        if outputs.is_empty() {
            return Err(ValuationError::EnsembleUnavailable {
                attempted: self.estimators.len(),
                detail: failures.join("; "),
            });
        }

        debug!(
            "Ensemble prediction: {}/{} estimators succeeded",
            outputs.len(),
            self.estimators.len()
        );
        Ok(outputs)
    }
}
