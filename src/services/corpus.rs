/// Bounded training corpus persisted as one blob.
///
/// Appends are read-modify-write of the whole corpus; the oldest points are
/// evicted first once the cap is exceeded. Callers must serialize writers.

use super::database::Database;
use crate::ml::FeaturePoint;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, warn};

pub const CORPUS_KEY: &str = "training_corpus";

/// Default corpus capacity
pub const DEFAULT_MAX_POINTS: usize = 10_000;

pub struct TrainingCorpus {
    db: Arc<Database>,
    max_points: usize,
}

impl TrainingCorpus {
    pub fn new(db: Arc<Database>, max_points: usize) -> Self {
        Self { db, max_points }
    }

    pub fn max_points(&self) -> usize {
        self.max_points
    }

    /// Full corpus in insertion order. Unreadable data degrades to empty.
    pub fn load(&self) -> Vec<FeaturePoint> {
        match self.try_load() {
            Ok(points) => points,
            Err(e) => {
                warn!("Training corpus unreadable, treating as empty: {:#}", e);
                Vec::new()
            }
        }
    }

    fn try_load(&self) -> Result<Vec<FeaturePoint>> {
        match self.db.load_blob(CORPUS_KEY)? {
            Some(json) => serde_json::from_str(&json).context("Failed to decode training corpus"),
            None => Ok(Vec::new()),
        }
    }

    /// Time of the last successful append, unix millis
    pub fn updated_at(&self) -> Option<i64> {
        match self.db.blob_updated_at(CORPUS_KEY) {
            Ok(updated_at) => updated_at,
            Err(e) => {
                warn!("Training corpus timestamp unreadable: {:#}", e);
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a batch and persist, keeping only the newest `max_points`.
    /// Returns the corpus size after the write.
    pub fn append(&self, points: Vec<FeaturePoint>) -> Result<usize> {
        let mut corpus = self.load();
        let added = points.len();
        corpus.extend(points);

        let evicted = corpus.len().saturating_sub(self.max_points);
        if evicted > 0 {
            corpus.drain(..evicted);
        }

        let json = serde_json::to_string(&corpus).context("Failed to encode training corpus")?;
        self.db.save_blob(CORPUS_KEY, &json)?;

        debug!(
            "Corpus append: +{} points, {} evicted, {} stored",
            added,
            evicted,
            corpus.len()
        );
        Ok(corpus.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::trainer::tests::synthetic_corpus;

    fn corpus(cap: usize) -> TrainingCorpus {
        TrainingCorpus::new(Arc::new(Database::in_memory().unwrap()), cap)
    }

    #[test]
    fn test_load_empty() {
        let corpus = corpus(10);
        assert!(corpus.load().is_empty());
        assert!(corpus.is_empty());
        assert!(corpus.updated_at().is_none());
    }

    #[test]
    fn test_append_accumulates() {
        let corpus = corpus(100);
        let points = synthetic_corpus(30);

        assert_eq!(corpus.append(points[..10].to_vec()).unwrap(), 10);
        assert_eq!(corpus.append(points[10..].to_vec()).unwrap(), 30);
        assert_eq!(corpus.load(), points);
        assert!(corpus.updated_at().is_some());
    }

    #[test]
    fn test_oldest_first_eviction() {
        let corpus = corpus(25);
        let points = synthetic_corpus(40);

        corpus.append(points[..20].to_vec()).unwrap();
        let size = corpus.append(points[20..].to_vec()).unwrap();

        assert_eq!(size, 25);
        let stored = corpus.load();
        assert_eq!(stored.len(), 25);
        assert_eq!(stored, points[15..].to_vec());
    }

    #[test]
    fn test_oversized_batch_is_truncated() {
        let corpus = corpus(5);
        let points = synthetic_corpus(12);

        assert_eq!(corpus.append(points.clone()).unwrap(), 5);
        assert_eq!(corpus.load(), points[7..].to_vec());
    }

    #[test]
    fn test_corrupt_blob_degrades_to_empty() {
        let db = Arc::new(Database::in_memory().unwrap());
        db.save_blob(CORPUS_KEY, "not json").unwrap();
        let corpus = TrainingCorpus::new(db, 10);

        assert!(corpus.load().is_empty());
        assert_eq!(corpus.append(synthetic_corpus(3)).unwrap(), 3);
    }
}
