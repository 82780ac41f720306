/// Price Predictor
///
/// Implements multiple linear regression over z-scored features.
///
/// Model: price = w0 + w1*z1 + w2*z2 + ... + w9*z9
/// where zi = (xi - mean_i) / std_i using the stats captured at training time

use super::features::{calendar_features, commodity_index, state_index, NormalizationStats, NUM_FEATURES};
use crate::models::{ExtraFeatures, PriceObservation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Volatility assumed for a live snapshot, which has no observed spread
pub const DEFAULT_LIVE_VOLATILITY: f64 = 5.0;

/// Floor applied to the model's R² when reporting confidence
pub const MIN_CONFIDENCE: f64 = 0.85;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub r2: f64,
    pub rmse: f64,
}

impl ModelMetrics {
    /// In-sample R² and RMSE for paired predictions and targets
    pub fn evaluate(predictions: &[f64], targets: &[f64]) -> Self {
        let n = targets.len();
        if n == 0 || predictions.len() != n {
            return Self::default();
        }

        let mean = targets.iter().sum::<f64>() / n as f64;
        let mut ss_res = 0.0;
        let mut ss_tot = 0.0;
        for (&p, &y) in predictions.iter().zip(targets) {
            ss_res += (p - y).powi(2);
            ss_tot += (y - mean).powi(2);
        }

        // A constant target leaves R² undefined; report a perfect fit only when residuals vanish too
        let r2 = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else if ss_res == 0.0 {
            1.0
        } else {
            0.0
        };

        Self {
            r2,
            rmse: (ss_res / n as f64).sqrt(),
        }
    }

    pub fn to_string(&self) -> String {
        format!("R²: {:.4}, RMSE: {:.2}", self.r2, self.rmse)
    }
}

/// Persisted regression model. Replaced wholesale by each training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceModel {
    /// Bias followed by one coefficient per feature
    pub weights: [f64; NUM_FEATURES + 1],
    pub normalization_stats: [NormalizationStats; NUM_FEATURES],
    pub training_size: usize,
    pub metrics: ModelMetrics,
    /// Training time, unix millis
    pub timestamp: i64,
    pub version: u32,
}

impl PriceModel {
    /// Apply the weights to an already-normalized vector
    pub fn predict_normalized(&self, normalized: &[f64; NUM_FEATURES]) -> f64 {
        Self::linear(&self.weights, normalized)
    }

    /// Normalize with the stored stats, then apply the weights
    pub fn predict(&self, raw: &[f64; NUM_FEATURES]) -> f64 {
        let normalized = NormalizationStats::normalize(&self.normalization_stats, raw);
        self.predict_normalized(&normalized)
    }

    /// `bias + Σ weight_j * x_j`
    pub(crate) fn linear(weights: &[f64; NUM_FEATURES + 1], x: &[f64; NUM_FEATURES]) -> f64 {
        let mut y = weights[0];
        for j in 0..NUM_FEATURES {
            y += weights[j + 1] * x[j];
        }
        y
    }

    /// Coefficients ranked by magnitude, largest first
    pub fn feature_importance(&self) -> Vec<(usize, f64)> {
        let mut importance: Vec<(usize, f64)> = (0..NUM_FEATURES)
            .map(|j| (j, self.weights[j + 1].abs()))
            .collect();

        importance.sort_by(|a, b| b.1.total_cmp(&a.1));
        importance
    }
}

/// Snapshot aggregates used for inference
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveSnapshot {
    pub avg_price: f64,
    pub avg_arrivals: f64,
}

impl LiveSnapshot {
    /// Average modal price and arrivals across the returned rows
    pub fn from_observations(rows: &[PriceObservation]) -> Option<Self> {
        if rows.is_empty() {
            return None;
        }

        let n = rows.len() as f64;
        Some(Self {
            avg_price: rows.iter().map(|r| r.modal_price).sum::<f64>() / n,
            avg_arrivals: rows.iter().map(|r| r.arrivals).sum::<f64>() / n,
        })
    }

    /// Approximate the 9 training features from the averages.
    ///
    /// Min/max are ±5% of the average, spread is 10% of it and volatility
    /// is fixed; the live rows' own spreads are not consulted.
    pub fn inference_vector(
        &self,
        commodity: &str,
        state: &str,
        extra: &ExtraFeatures,
        now: &DateTime<Utc>,
    ) -> [f64; NUM_FEATURES] {
        let (month, weekday) = calendar_features(now);
        [
            self.avg_price * 0.95,
            self.avg_price * 1.05,
            extra.arrivals.unwrap_or(self.avg_arrivals),
            month,
            weekday,
            state_index(state) as f64,
            commodity_index(commodity) as f64,
            self.avg_price * 0.1,
            DEFAULT_LIVE_VOLATILITY,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionFeatures {
    pub commodity: String,
    pub state: String,
    pub timestamp: i64,
}

/// Per-request forecast; never persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    pub predicted_price: f64,
    /// Fraction in [0.85, 1.0]
    pub confidence: f64,
    pub range: PriceRange,
    pub current_average: f64,
    pub model_metrics: ModelMetrics,
    pub features: PredictionFeatures,
}

impl PredictionResult {
    /// Wrap a point estimate with the model's confidence band
    pub fn from_estimate(
        predicted_price: f64,
        model: &PriceModel,
        snapshot: &LiveSnapshot,
        commodity: &str,
        state: &str,
        now: &DateTime<Utc>,
    ) -> Self {
        let confidence = confidence_for(&model.metrics);
        let error_margin = (predicted_price * (1.0 - confidence) * 0.5).abs();

        Self {
            predicted_price,
            confidence,
            range: PriceRange {
                min: predicted_price - error_margin,
                max: predicted_price + error_margin,
            },
            current_average: snapshot.avg_price,
            model_metrics: model.metrics,
            features: PredictionFeatures {
                commodity: commodity.to_string(),
                state: state.to_string(),
                timestamp: now.timestamp_millis(),
            },
        }
    }
}

/// `max(0.85, r2)`, capped at 1
pub fn confidence_for(metrics: &ModelMetrics) -> f64 {
    let r2 = if metrics.r2.is_finite() { metrics.r2 } else { 0.0 };
    r2.max(MIN_CONFIDENCE).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn identity_model(weights: [f64; NUM_FEATURES + 1], r2: f64) -> PriceModel {
        PriceModel {
            weights,
            normalization_stats: [NormalizationStats { mean: 0.0, std: 1.0 }; NUM_FEATURES],
            training_size: 100,
            metrics: ModelMetrics { r2, rmse: 10.0 },
            timestamp: 0,
            version: 1,
        }
    }

    fn row(modal: f64, arrivals: f64) -> PriceObservation {
        PriceObservation {
            market: "Nashik".to_string(),
            min_price: modal - 100.0,
            max_price: modal + 100.0,
            modal_price: modal,
            arrivals,
            date: "17/07/2024".to_string(),
            source: "test".to_string(),
        }
    }

    #[test]
    fn test_linear_prediction() {
        let mut weights = [0.0; NUM_FEATURES + 1];
        weights[0] = 10.0;
        weights[1] = 2.0;
        weights[9] = -1.0;
        let model = identity_model(weights, 0.9);

        let mut x = [0.0; NUM_FEATURES];
        x[0] = 3.0;
        x[8] = 4.0;
        assert_eq!(model.predict(&x), 12.0);
    }

    #[test]
    fn test_prediction_uses_stored_stats() {
        let mut model = identity_model([0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0], 0.9);
        model.normalization_stats[0] = NormalizationStats { mean: 100.0, std: 50.0 };

        let mut x = [0.0; NUM_FEATURES];
        x[0] = 200.0;
        assert!((model.predict(&x) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_metrics() {
        let perfect = ModelMetrics::evaluate(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]);
        assert_eq!(perfect.r2, 1.0);
        assert_eq!(perfect.rmse, 0.0);

        let mean_only = ModelMetrics::evaluate(&[2.0, 2.0, 2.0], &[1.0, 2.0, 3.0]);
        assert!(mean_only.r2.abs() < 1e-12);
        assert!((mean_only.rmse - (2.0f64 / 3.0).sqrt()).abs() < 1e-12);

        assert_eq!(ModelMetrics::evaluate(&[], &[]), ModelMetrics::default());
    }

    #[test]
    fn test_confidence_floor() {
        assert_eq!(confidence_for(&ModelMetrics { r2: 0.3, rmse: 1.0 }), 0.85);
        assert_eq!(confidence_for(&ModelMetrics { r2: 0.97, rmse: 1.0 }), 0.97);
        assert_eq!(confidence_for(&ModelMetrics { r2: -40.0, rmse: 1.0 }), 0.85);
        assert_eq!(confidence_for(&ModelMetrics { r2: f64::NAN, rmse: 1.0 }), 0.85);
    }

    #[test]
    fn test_inference_vector_approximation() {
        let snapshot = LiveSnapshot::from_observations(&[row(2000.0, 100.0), row(3000.0, 300.0)]).unwrap();
        assert_eq!(snapshot.avg_price, 2500.0);
        assert_eq!(snapshot.avg_arrivals, 200.0);

        // Friday 2024-03-15
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        let v = snapshot.inference_vector("wheat", "Punjab", &ExtraFeatures::default(), &now);
        let expected = [2375.0, 2625.0, 200.0, 2.0, 5.0, 2.0, 1.0, 250.0, 5.0];
        for (got, want) in v.iter().zip(expected) {
            assert!((got - want).abs() < 1e-9, "{} != {}", got, want);
        }

        let extra = ExtraFeatures { arrivals: Some(42.0) };
        let v = snapshot.inference_vector("wheat", "Punjab", &extra, &now);
        assert_eq!(v[2], 42.0);
    }

    #[test]
    fn test_empty_snapshot() {
        assert!(LiveSnapshot::from_observations(&[]).is_none());
    }

    #[test]
    fn test_range_brackets_prediction() {
        let model = identity_model([0.0; NUM_FEATURES + 1], 0.5);
        let snapshot = LiveSnapshot { avg_price: 1000.0, avg_arrivals: 10.0 };
        let now = Utc::now();

        for price in [2400.0, 0.0, -150.0] {
            let result = PredictionResult::from_estimate(price, &model, &snapshot, "wheat", "Punjab", &now);
            assert!(result.range.min <= result.predicted_price);
            assert!(result.predicted_price <= result.range.max);
            assert_eq!(result.confidence, 0.85);
        }

        let result = PredictionResult::from_estimate(2000.0, &model, &snapshot, "wheat", "Punjab", &now);
        assert!((result.range.max - 2150.0).abs() < 1e-9);
        assert!((result.range.min - 1850.0).abs() < 1e-9);
    }

    #[test]
    fn test_feature_importance() {
        let model = identity_model([5.0, 0.1, -0.9, 0.3, 0.2, 0.8, 0.4, 0.6, 0.7, 0.5], 0.9);
        let importance = model.feature_importance();

        assert_eq!(importance.len(), NUM_FEATURES);
        assert_eq!(importance[0], (1, 0.9));
        assert!(importance.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn test_model_serialization() {
        let model = identity_model([0.25; NUM_FEATURES + 1], 0.91);
        let json = serde_json::to_string(&model).unwrap();
        let restored: PriceModel = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, model);
    }
}
