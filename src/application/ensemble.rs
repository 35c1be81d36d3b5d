use crate::domain::errors::ValuationError;
use crate::domain::valuation::{EnsembleResult, EstimatorOutput};
use statrs::distribution::{ContinuousCDF, Normal};
use std::collections::HashMap;

/// Merges independent estimator outputs into one point estimate plus a
/// confidence interval derived from inter-model disagreement.
///
/// The interval half-width is `z(confidence_level) * stddev`, not an
/// empirical min/max, so a single outlier estimator cannot dominate the
/// band. Dispersion uses the weighted population standard deviation of the
/// successful outputs.
pub struct EnsembleCombiner {
    /// Stated interval probability in percent (e.g. 95.0).
    confidence_level: f64,
    /// Optional per-estimator reliability weights, key = estimator id.
    /// Missing ids get weight 1.0; weights are normalized over the
    /// successful subset.
    weights: HashMap<String, f64>,
    /// Fractional band (percent of the point estimate) applied when only one
    /// estimator survived and dispersion is undefined.
    min_uncertainty_pct: f64,
}

impl EnsembleCombiner {
    pub fn new(
        confidence_level: f64,
        weights: HashMap<String, f64>,
        min_uncertainty_pct: f64,
    ) -> Self {
        Self {
            confidence_level: confidence_level.clamp(1.0, 99.99),
            weights,
            min_uncertainty_pct: min_uncertainty_pct.max(0.0),
        }
    }

    fn weight_for(&self, estimator_id: &str) -> f64 {
        self.weights.get(estimator_id).copied().unwrap_or(1.0)
    }

    /// Two-sided standard-normal quantile for the configured level.
    fn z_score(&self) -> f64 {
        let p = 0.5 + self.confidence_level / 200.0;
        match Normal::new(0.0, 1.0) {
            Ok(normal) => normal.inverse_cdf(p),
            // Standard normal construction cannot fail with these params;
            // keep the 95% quantile as a safety net.
            Err(_) => 1.959964,
        }
    }

    pub fn combine(
        &self,
        outputs: &[EstimatorOutput],
        model_version: &str,
    ) -> Result<EnsembleResult, ValuationError> {
        if outputs.is_empty() {
            return Err(ValuationError::EnsembleUnavailable {
                attempted: 0,
                detail: "no estimator outputs to combine".to_string(),
            });
        }

        let raw_weights: Vec<f64> = outputs
            .iter()
            .map(|o| self.weight_for(&o.estimator_id).max(0.0))
            .collect();
        let weight_sum: f64 = raw_weights.iter().sum();
        // All-zero weights would make the mean undefined; treat as equal.
        let normalized: Vec<f64> = if weight_sum > 0.0 {
            raw_weights.iter().map(|w| w / weight_sum).collect()
        } else {
            vec![1.0 / outputs.len() as f64; outputs.len()]
        };

        let point_estimate: f64 = outputs
            .iter()
            .zip(&normalized)
            .map(|(o, w)| o.value * w)
            .sum();

        let (half_width, std_dev) = if outputs.len() == 1 {
            // Dispersion undefined for a single survivor: fall back to the
            // configured minimum fractional band so the interval stays
            // usable.
            let half = point_estimate.abs() * self.min_uncertainty_pct / 100.0;
            (half, half / self.z_score().max(f64::EPSILON))
        } else {
            let variance: f64 = outputs
                .iter()
                .zip(&normalized)
                .map(|(o, w)| w * (o.value - point_estimate).powi(2))
                .sum();
            let std_dev = variance.sqrt();
            (self.z_score() * std_dev, std_dev)
        };

        let model_agreement = if point_estimate == 0.0 {
            0.0
        } else {
            (1.0 - std_dev / point_estimate.abs()).clamp(0.0, 1.0)
        };

        Ok(EnsembleResult {
            point_estimate,
            lower_bound: point_estimate - half_width,
            upper_bound: point_estimate + half_width,
            confidence_level: self.confidence_level,
            model_agreement,
            models_used: outputs.len(),
            model_version: model_version.to_string(),
            computed_at: chrono::Utc::now(),
        })
    }
}
