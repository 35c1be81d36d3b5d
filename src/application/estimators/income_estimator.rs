use super::estimator::ValueEstimator;
use crate::domain::features::{FeatureVector, IDX_CAP_RATE, IDX_NET_OPERATING_INCOME};

/// Direct-capitalization estimator: value = NOI / cap rate.
///
/// The classic income-approach appraisal. Needs no trained artifact, which
/// keeps the ensemble from going fully unavailable when every model artifact
/// is corrupt or unloaded.
pub struct IncomeEstimator;

impl ValueEstimator for IncomeEstimator {
    fn predict(&self, features: &FeatureVector) -> Result<f64, String> {
        let values = features.values();
        let noi = *values
            .get(IDX_NET_OPERATING_INCOME)
            .ok_or("feature vector missing net operating income")?;
        let cap_rate = *values
            .get(IDX_CAP_RATE)
            .ok_or("feature vector missing cap rate")?;

        if cap_rate <= 0.0 {
            return Err(format!("cap rate {} is not capitalizable", cap_rate));
        }

        Ok(noi / cap_rate)
    }

    fn id(&self) -> &str {
        "direct_capitalization"
    }

    fn version(&self) -> &str {
        "v1.0"
    }
}
