use thiserror::Error;

/// Errors surfaced by the valuation engine.
///
/// Per-estimator failures (`EstimatorTimeout`, bad outputs) are absorbed by
/// the pool and downgrade the ensemble size; only engine-fatal variants reach
/// the caller. No failure is ever stored in the result cache.
#[derive(Debug, Clone, Error)]
pub enum ValuationError {
    #[error("Invalid input for '{field}': {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Estimator '{estimator_id}' exceeded its budget of {timeout_ms}ms")]
    EstimatorTimeout {
        estimator_id: String,
        timeout_ms: u64,
    },

    #[error("Ensemble unavailable: all {attempted} estimators failed ({detail})")]
    EnsembleUnavailable { attempted: usize, detail: String },

    #[error("Cached computation failed: {detail}")]
    CacheComputeFailed { detail: String },
}

impl ValuationError {
    pub fn invalid_input(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// True when a retry by the caller could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::EnsembleUnavailable { .. } | Self::CacheComputeFailed { .. }
        )
    }
}
