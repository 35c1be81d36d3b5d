use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single model's scalar prediction, tagged with the estimator identity.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimatorOutput {
    pub estimator_id: String,
    pub version: String,
    pub value: f64,
}

/// Combined ensemble prediction with its disagreement-derived interval.
/// Owned by the result cache once stored; callers receive clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleResult {
    pub point_estimate: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    /// Stated probability of the interval, in percent (e.g. 95.0).
    pub confidence_level: f64,
    /// Diagnostic in [0, 1]; 1.0 means the estimators agreed exactly.
    pub model_agreement: f64,
    pub models_used: usize,
    pub model_version: String,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
    pub confidence_level: f64,
    /// Half-width as a percentage of the point estimate (plus/minus, not the
    /// full band width).
    pub uncertainty_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleInfo {
    pub models_used: usize,
    pub model_agreement: f64,
}

/// Response envelope returned to the (out-of-scope) API layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationResponse {
    pub request_id: uuid::Uuid,
    pub predicted_value: f64,
    pub confidence_interval: ConfidenceInterval,
    /// Absent when square_feet is 0 (division undefined).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_per_sqft: Option<f64>,
    pub model_version: String,
    pub cached: bool,
    pub processing_time_ms: f64,
    pub ensemble_info: EnsembleInfo,
    pub valuation_date: DateTime<Utc>,
}

impl ValuationResponse {
    pub fn from_result(
        result: &EnsembleResult,
        square_feet: f64,
        cached: bool,
        processing_time_ms: f64,
    ) -> Self {
        let half_width = result.upper_bound - result.point_estimate;
        let uncertainty_percentage = if result.point_estimate != 0.0 {
            (half_width / result.point_estimate).abs() * 100.0
        } else {
            0.0
        };
        let price_per_sqft = if square_feet > 0.0 {
            Some(result.point_estimate / square_feet)
        } else {
            None
        };

        Self {
            request_id: uuid::Uuid::new_v4(),
            predicted_value: result.point_estimate,
            confidence_interval: ConfidenceInterval {
                lower: result.lower_bound,
                upper: result.upper_bound,
                confidence_level: result.confidence_level,
                uncertainty_percentage,
            },
            price_per_sqft,
            model_version: result.model_version.clone(),
            cached,
            processing_time_ms,
            ensemble_info: EnsembleInfo {
                models_used: result.models_used,
                model_agreement: result.model_agreement,
            },
            valuation_date: Utc::now(),
        }
    }
}

/// Aggregate outcome of a batch valuation run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub total_properties: usize,
    pub successful: usize,
    pub failed: usize,
    pub total_portfolio_value: f64,
    pub average_property_value: f64,
    pub processing_time_ms: f64,
    pub results: Vec<BatchItem>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BatchItem {
    Success { valuation: ValuationResponse },
    Error { error: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result() -> EnsembleResult {
        EnsembleResult {
            point_estimate: 2_000_000.0,
            lower_bound: 1_900_000.0,
            upper_bound: 2_100_000.0,
            confidence_level: 95.0,
            model_agreement: 0.95,
            models_used: 3,
            model_version: "v1.1.0".to_string(),
            computed_at: Utc::now(),
        }
    }

    #[test]
    fn test_uncertainty_is_half_band() {
        let resp = ValuationResponse::from_result(&result(), 10_000.0, false, 12.0);
        // Half-width 100k over 2M = 5%, not the 10% full band.
        assert!((resp.confidence_interval.uncertainty_percentage - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_price_per_sqft() {
        let resp = ValuationResponse::from_result(&result(), 10_000.0, false, 12.0);
        assert_eq!(resp.price_per_sqft, Some(200.0));
    }

    #[test]
    fn test_price_per_sqft_absent_for_zero_area() {
        let resp = ValuationResponse::from_result(&result(), 0.0, true, 1.0);
        assert!(resp.price_per_sqft.is_none());
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("price_per_sqft").is_none());
    }

    #[test]
    fn test_interval_ordering_preserved() {
        let resp = ValuationResponse::from_result(&result(), 10_000.0, false, 12.0);
        assert!(resp.confidence_interval.lower <= resp.predicted_value);
        assert!(resp.predicted_value <= resp.confidence_interval.upper);
    }
}
