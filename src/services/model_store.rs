use super::database::Database;
use crate::ml::PriceModel;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::warn;

pub const MODEL_KEY: &str = "price_model";

/// Single-slot holder of the current model. Saving replaces the previous one.
pub struct ModelStore {
    db: Arc<Database>,
}

impl ModelStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn save(&self, model: &PriceModel) -> Result<()> {
        let json = serde_json::to_string(model).context("Failed to encode model")?;
        self.db.save_blob(MODEL_KEY, &json)
    }

    /// Current model, or `None` if absent or unreadable
    pub fn load(&self) -> Option<PriceModel> {
        let json = match self.db.load_blob(MODEL_KEY) {
            Ok(Some(json)) => json,
            Ok(None) => return None,
            Err(e) => {
                warn!("Model store unreadable: {:#}", e);
                return None;
            }
        };

        match serde_json::from_str(&json) {
            Ok(model) => Some(model),
            Err(e) => {
                warn!("Stored model could not be decoded: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::trainer::tests::synthetic_corpus;
    use crate::ml::ModelTrainer;

    #[test]
    fn test_empty_store() {
        let store = ModelStore::new(Arc::new(Database::in_memory().unwrap()));
        assert!(store.load().is_none());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let store = ModelStore::new(Arc::new(Database::in_memory().unwrap()));
        let model = ModelTrainer::default().train(&synthetic_corpus(120)).unwrap();

        store.save(&model).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded.weights, model.weights);
        assert_eq!(loaded.normalization_stats, model.normalization_stats);
        assert_eq!(loaded.metrics, model.metrics);
        assert_eq!(loaded, model);
    }

    #[test]
    fn test_save_replaces_previous() {
        let store = ModelStore::new(Arc::new(Database::in_memory().unwrap()));
        let mut first = ModelTrainer::default().train(&synthetic_corpus(100)).unwrap();
        first.version = 1;
        let mut second = ModelTrainer::default().train(&synthetic_corpus(140)).unwrap();
        second.version = 2;

        store.save(&first).unwrap();
        store.save(&second).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.version, 2);
        assert_eq!(loaded.training_size, 140);
    }

    #[test]
    fn test_corrupt_model_reads_as_absent() {
        let db = Arc::new(Database::in_memory().unwrap());
        db.save_blob(MODEL_KEY, "{\"weights\": [1, 2]}").unwrap();
        assert!(ModelStore::new(db).load().is_none());
    }
}
