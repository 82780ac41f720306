/// Machine Learning Module
///
/// Provides the price forecasting model:
/// - Feature encoding of raw mandi quotes
/// - Linear regression trained by batch gradient descent
/// - Inference with confidence bands

pub mod features;
pub mod predictor;
pub mod trainer;

pub use features::{FeatureEncoder, FeaturePoint, NormalizationStats, NUM_FEATURES};
pub use predictor::{LiveSnapshot, ModelMetrics, PredictionResult, PriceModel, PriceRange};
pub use trainer::{ModelTrainer, TrainingConfig};
