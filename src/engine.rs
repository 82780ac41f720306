/// Forecast Engine
///
/// Owns the training corpus, model store and market data provider, and
/// exposes the operations the surrounding application calls:
/// - `collect_once` - collect, then train once the corpus is large enough
/// - `collect` / `maybe_train` - the two halves, independently callable
/// - `train_model` / `manual_train` - operator-triggered training
/// - `predict` - price forecast for a (commodity, state) pair
/// - `status` - corpus and model summary
/// - `feature_importance` - ranked model coefficients
///
/// Writes to the corpus and model are serialized by one cycle lock, so a
/// manual run and a scheduled run never interleave.

use crate::config::Config;
use crate::errors::{ForecastError, ForecastResult};
use crate::ml::{FeaturePoint, LiveSnapshot, ModelMetrics, ModelTrainer, PredictionResult, PriceModel};
use crate::models::{ExtraFeatures, MarketPair};
use crate::services::{
    fetch_prices, CollectionReport, DataCollector, Database, MarketDataProvider, ModelStore,
    TrainingCorpus,
};
use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Where the collection/training cycle currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CyclePhase {
    Idle,
    Collecting,
    Training,
}

impl CyclePhase {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => CyclePhase::Collecting,
            2 => CyclePhase::Training,
            _ => CyclePhase::Idle,
        }
    }
}

/// Result of one collect-then-maybe-train cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub collection: CollectionReport,
    /// Metrics of the model trained in this cycle, if any
    pub trained: Option<ModelMetrics>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastStatus {
    pub data_collected: usize,
    pub last_collection: Option<DateTime<Utc>>,
    pub minimum_required: usize,
    pub model_trained: bool,
    pub last_model_training: Option<DateTime<Utc>>,
    pub model_performance: Option<ModelMetrics>,
    pub model_version: Option<u32>,
    pub supported_commodities: Vec<String>,
    pub supported_states: Vec<String>,
    pub cycle_phase: CyclePhase,
}

/// One entry of the model's coefficient ranking
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureWeight {
    pub feature: &'static str,
    /// Absolute coefficient on the z-scored feature
    pub weight: f64,
}

pub struct ForecastEngine {
    corpus: TrainingCorpus,
    model_store: ModelStore,
    collector: DataCollector,
    trainer: ModelTrainer,
    provider: Arc<dyn MarketDataProvider>,
    request_timeout: Duration,
    commodities: Vec<String>,
    states: Vec<String>,
    cycle_lock: Mutex<()>,
    phase: AtomicU8,
}

impl ForecastEngine {
    pub fn new(db: Arc<Database>, provider: Arc<dyn MarketDataProvider>, config: &Config) -> Self {
        let catalog = MarketPair::catalog(&config.collector.commodities, &config.collector.states);
        let collector = DataCollector::new(
            provider.clone(),
            catalog,
            config.collector.request_delay(),
            config.collector.request_timeout(),
        );

        Self {
            corpus: TrainingCorpus::new(db.clone(), config.corpus.max_points),
            model_store: ModelStore::new(db),
            collector,
            trainer: ModelTrainer::new(config.training.clone()),
            provider,
            request_timeout: config.collector.request_timeout(),
            commodities: config.collector.commodities.clone(),
            states: config.collector.states.clone(),
            cycle_lock: Mutex::new(()),
            phase: AtomicU8::new(CyclePhase::Idle as u8),
        }
    }

    pub fn corpus(&self) -> &TrainingCorpus {
        &self.corpus
    }

    pub fn model_store(&self) -> &ModelStore {
        &self.model_store
    }

    pub fn phase(&self) -> CyclePhase {
        CyclePhase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    fn set_phase(&self, phase: CyclePhase) {
        self.phase.store(phase as u8, Ordering::SeqCst);
    }

    /// Collect one batch without training
    pub async fn collect(&self) -> ForecastResult<CollectionReport> {
        let _guard = self.cycle_lock.lock().await;
        Ok(self.collect_locked().await?)
    }

    /// Train if the corpus has reached the threshold
    pub async fn maybe_train(&self) -> ForecastResult<Option<ModelMetrics>> {
        let _guard = self.cycle_lock.lock().await;
        let size = self.corpus.len();
        Ok(self.maybe_train_locked(size).await?)
    }

    /// Default cycle: collect, then train once the threshold is met
    pub async fn collect_once(&self) -> ForecastResult<CycleReport> {
        let _guard = self.cycle_lock.lock().await;

        let collection = self.collect_locked().await?;
        let trained = self.maybe_train_locked(collection.corpus_size).await?;

        Ok(CycleReport {
            collection,
            trained,
        })
    }

    /// Attempt a training run now. `None` when the corpus is too small.
    pub async fn train_model(&self) -> ForecastResult<Option<PriceModel>> {
        let _guard = self.cycle_lock.lock().await;
        Ok(self.train_locked().await?)
    }

    /// Operator-triggered collect followed by a training attempt
    pub async fn manual_train(&self) -> ForecastResult<CycleReport> {
        let _guard = self.cycle_lock.lock().await;
        info!("Manual collect-and-train requested");

        let collection = self.collect_locked().await?;
        let trained = self.train_locked().await?.map(|m| m.metrics);

        Ok(CycleReport {
            collection,
            trained,
        })
    }

    async fn collect_locked(&self) -> Result<CollectionReport> {
        self.set_phase(CyclePhase::Collecting);
        let report = self.collector.collect_into(&self.corpus).await;
        self.set_phase(CyclePhase::Idle);
        report
    }

    async fn maybe_train_locked(&self, corpus_size: usize) -> Result<Option<ModelMetrics>> {
        if !self.trainer.has_enough_data(corpus_size) {
            info!(
                "Corpus has {} points, need {} before training",
                corpus_size,
                self.trainer.config().min_data_points
            );
            return Ok(None);
        }

        Ok(self.train_locked().await?.map(|m| m.metrics))
    }

    async fn train_locked(&self) -> Result<Option<PriceModel>> {
        let corpus = self.corpus.load();
        if !self.trainer.has_enough_data(corpus.len()) {
            return Ok(None);
        }

        self.set_phase(CyclePhase::Training);
        let trainer = ModelTrainer::new(self.trainer.config().clone());
        let fitted = tokio::task::spawn_blocking(move || trainer.train(&corpus)).await;
        self.set_phase(CyclePhase::Idle);

        let Some(mut model) = fitted.context("Training task failed")? else {
            return Ok(None);
        };

        model.version = self.model_store.load().map_or(1, |prev| prev.version + 1);
        self.model_store.save(&model).context("Failed to persist trained model")?;

        info!(
            "Model v{} saved ({} points, {})",
            model.version,
            model.training_size,
            model.metrics.to_string()
        );
        Ok(Some(model))
    }

    /// Forecast the modal price for a pair from a live snapshot
    pub async fn predict(
        &self,
        commodity: &str,
        state: &str,
        extra: Option<ExtraFeatures>,
    ) -> ForecastResult<PredictionResult> {
        let model = self.model_store.load().ok_or(ForecastError::ModelUnavailable)?;

        let rows = fetch_prices(self.provider.as_ref(), commodity, state, self.request_timeout).await?;
        let snapshot = LiveSnapshot::from_observations(&rows).ok_or_else(|| {
            ForecastError::NoCurrentData {
                commodity: commodity.to_string(),
                state: state.to_string(),
            }
        })?;

        let now = Utc::now();
        let features = snapshot.inference_vector(commodity, state, &extra.unwrap_or_default(), &now);
        let predicted_price = model.predict(&features);

        if !predicted_price.is_finite() {
            warn!("Model v{} produced a non-finite price for {}/{}", model.version, commodity, state);
        }

        Ok(PredictionResult::from_estimate(
            predicted_price,
            &model,
            &snapshot,
            commodity,
            state,
            &now,
        ))
    }

    /// Model coefficients by magnitude, largest first
    pub fn feature_importance(&self) -> ForecastResult<Vec<FeatureWeight>> {
        let model = self.model_store.load().ok_or(ForecastError::ModelUnavailable)?;

        Ok(model
            .feature_importance()
            .into_iter()
            .map(|(j, weight)| FeatureWeight {
                feature: FeaturePoint::FEATURE_NAMES[j],
                weight,
            })
            .collect())
    }

    pub fn status(&self) -> ForecastStatus {
        let model = self.model_store.load();

        ForecastStatus {
            data_collected: self.corpus.len(),
            last_collection: self
                .corpus
                .updated_at()
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
            minimum_required: self.trainer.config().min_data_points,
            model_trained: model.is_some(),
            last_model_training: model
                .as_ref()
                .and_then(|m| Utc.timestamp_millis_opt(m.timestamp).single()),
            model_performance: model.as_ref().map(|m| m.metrics),
            model_version: model.as_ref().map(|m| m.version),
            supported_commodities: self.commodities.clone(),
            supported_states: self.states.clone(),
            cycle_phase: self.phase(),
        }
    }
}
