/// Model Training Pipeline
///
/// Handles:
/// - Feature matrix construction from the training corpus
/// - Per-column z-score normalization
/// - Batch gradient descent on squared error
/// - In-sample evaluation (R², RMSE)
///
/// Every run refits from zero weights, so identical corpora yield
/// bit-identical models.

use super::features::{FeaturePoint, NormalizationStats, NUM_FEATURES};
use super::predictor::{ModelMetrics, PriceModel};
use chrono::Utc;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct TrainingConfig {
    /// Minimum corpus size before training
    pub min_data_points: usize,
    /// Learning rate for gradient descent
    pub learning_rate: f64,
    /// Number of full-batch epochs
    pub epochs: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            min_data_points: 100,
            learning_rate: 1e-4,
            epochs: 1000,
        }
    }
}

pub struct ModelTrainer {
    config: TrainingConfig,
}

impl ModelTrainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Whether a corpus of `len` points is large enough to train on
    pub fn has_enough_data(&self, len: usize) -> bool {
        len >= self.config.min_data_points
    }

    /// Fit a fresh model. Returns `None` below the data threshold.
    pub fn train(&self, corpus: &[FeaturePoint]) -> Option<PriceModel> {
        if !self.has_enough_data(corpus.len()) {
            debug!(
                "Not enough data to train: {} < {}",
                corpus.len(),
                self.config.min_data_points
            );
            return None;
        }

        let raw: Vec<[f64; NUM_FEATURES]> = corpus.iter().map(FeaturePoint::features).collect();
        let targets: Vec<f64> = corpus.iter().map(|p| p.target).collect();

        let stats = NormalizationStats::compute(&raw);
        let x: Vec<[f64; NUM_FEATURES]> = raw
            .iter()
            .map(|row| NormalizationStats::normalize(&stats, row))
            .collect();

        let weights = self.gradient_descent(&x, &targets);

        let predictions: Vec<f64> = x.iter().map(|row| PriceModel::linear(&weights, row)).collect();
        let metrics = ModelMetrics::evaluate(&predictions, &targets);

        info!(
            "Model trained on {} points ({} epochs, lr {}): {}",
            corpus.len(),
            self.config.epochs,
            self.config.learning_rate,
            metrics.to_string()
        );

        Some(PriceModel {
            weights,
            normalization_stats: stats,
            training_size: corpus.len(),
            metrics,
            timestamp: Utc::now().timestamp_millis(),
            version: 1,
        })
    }

    /// Full-batch descent from zero weights: `w -= lr * Σ(residual * x) / n`
    fn gradient_descent(&self, x: &[[f64; NUM_FEATURES]], y: &[f64]) -> [f64; NUM_FEATURES + 1] {
        let n = x.len() as f64;
        let lr = self.config.learning_rate;
        let mut weights = [0.0f64; NUM_FEATURES + 1];

        for _ in 0..self.config.epochs {
            let mut gradient = [0.0f64; NUM_FEATURES + 1];

            for (row, &target) in x.iter().zip(y) {
                let residual = PriceModel::linear(&weights, row) - target;
                gradient[0] += residual;
                for j in 0..NUM_FEATURES {
                    gradient[j + 1] += residual * row[j];
                }
            }

            for (w, g) in weights.iter_mut().zip(gradient) {
                *w -= lr * g / n;
            }
        }

        weights
    }
}

impl Default for ModelTrainer {
    fn default() -> Self {
        Self::new(TrainingConfig::default())
    }
}
