mod estimator;
mod forest_estimator;
mod income_estimator;
mod linear_estimator;
mod onnx_estimator;
mod pool;

pub use estimator::{EstimatorInfo, ValueEstimator};
pub use forest_estimator::ForestEstimator;
pub use income_estimator::IncomeEstimator;
pub use linear_estimator::LinearEstimator;
pub use onnx_estimator::{OnnxEstimator, ScalerParams};
pub use pool::EstimatorPool;

#[cfg(test)]
pub(crate) use pool::test_support;
