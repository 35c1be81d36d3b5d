use crate::application::cache::ResultCache;
use crate::application::ensemble::EnsembleCombiner;
use crate::application::estimators::{
    EstimatorPool, ForestEstimator, IncomeEstimator, LinearEstimator, OnnxEstimator,
    ValueEstimator,
};
use crate::config::Config;
use crate::domain::errors::ValuationError;
use crate::domain::features;
use crate::domain::property::PropertyAttributes;
use crate::domain::valuation::{BatchItem, BatchSummary, ValuationResponse};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Public entry point of the engine.
///
/// Per request: validate attributes, encode the feature vector and
/// fingerprint, then serve from the result cache. On a miss the cache runs
/// the expensive path (concurrent estimator fan-out, ensemble combination)
/// exactly once per fingerprint, no matter how many identical requests race.
pub struct ValuationService {
    pool: Arc<EstimatorPool>,
    cache: Arc<ResultCache>,
    combiner: Arc<EnsembleCombiner>,
    model_version: String,
}

impl ValuationService {
    pub fn new(
        pool: Arc<EstimatorPool>,
        cache: Arc<ResultCache>,
        combiner: Arc<EnsembleCombiner>,
        model_version: String,
    ) -> Self {
        Self {
            pool,
            cache,
            combiner,
            model_version,
        }
    }

    /// Wire the full engine from environment configuration, loading the
    /// enabled model artifacts.
    pub fn from_config(config: &Config) -> Self {
        let mut estimators: Vec<Arc<dyn ValueEstimator>> = Vec::new();
        if config.estimators.forest_enabled {
            estimators.push(Arc::new(ForestEstimator::new(
                config.estimators.forest_path(),
            )));
        }
        if config.estimators.linear_enabled {
            estimators.push(Arc::new(LinearEstimator::new(
                config.estimators.linear_path(),
            )));
        }
        if config.estimators.onnx_enabled {
            estimators.push(Arc::new(OnnxEstimator::new(
                config.estimators.onnx_path(),
                config.estimators.scaler_path(),
            )));
        }
        if config.estimators.income_enabled {
            estimators.push(Arc::new(IncomeEstimator));
        }

        let pool = Arc::new(EstimatorPool::new(
            estimators,
            Duration::from_millis(config.engine.estimator_timeout_ms),
        ));
        for estimator in pool.infos() {
            info!("Estimator registered: {} ({})", estimator.id, estimator.version);
        }

        let cache = Arc::new(ResultCache::new(
            Duration::from_secs(config.engine.cache_ttl_seconds),
            config.engine.max_cache_entries,
        ));
        let combiner = Arc::new(EnsembleCombiner::new(
            config.engine.confidence_level,
            config.engine.estimator_weights.clone(),
            config.engine.min_uncertainty_pct,
        ));

        Self::new(
            pool,
            cache,
            combiner,
            config.estimators.model_version.clone(),
        )
    }

    /// Estimate the market value of one property.
    pub async fn valuate(
        &self,
        attrs: &PropertyAttributes,
    ) -> Result<ValuationResponse, ValuationError> {
        let started = Instant::now();

        let (vector, fingerprint) = features::build(attrs, &self.model_version)?;
        debug!("Fingerprint {} for {} in {}", fingerprint, attrs.property_type, attrs.city);

        let pool = Arc::clone(&self.pool);
        let combiner = Arc::clone(&self.combiner);
        let model_version = self.model_version.clone();
        let (result, cached) = self
            .cache
            .get_or_compute(&fingerprint, async move {
                let outputs = pool.predict_all(&vector).await?;
                combiner.combine(&outputs, &model_version)
            })
            .await?;

        let processing_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        Ok(ValuationResponse::from_result(
            &result,
            attrs.square_feet,
            cached,
            processing_time_ms,
        ))
    }

    /// Valuate a portfolio of properties, tolerating per-property failures.
    pub async fn valuate_batch(&self, properties: &[PropertyAttributes]) -> BatchSummary {
        let started = Instant::now();
        let mut results = Vec::with_capacity(properties.len());
        let mut successful = 0;
        let mut total_portfolio_value = 0.0;

        for attrs in properties {
            match self.valuate(attrs).await {
                Ok(valuation) => {
                    successful += 1;
                    total_portfolio_value += valuation.predicted_value;
                    results.push(BatchItem::Success { valuation });
                }
                Err(e) => results.push(BatchItem::Error {
                    error: e.to_string(),
                }),
            }
        }

        BatchSummary {
            total_properties: properties.len(),
            successful,
            failed: properties.len() - successful,
            total_portfolio_value,
            average_property_value: total_portfolio_value / successful.max(1) as f64,
            processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
            results,
        }
    }

    pub fn pool(&self) -> &EstimatorPool {
        &self.pool
    }

    pub fn model_version(&self) -> &str {
        &self.model_version
    }
}
