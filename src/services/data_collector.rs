/// Market Data Collector
///
/// Walks the (commodity, state) catalog, fetches quotes for each pair,
/// encodes them into feature points and appends the whole batch to the
/// training corpus in a single write. A failing pair is logged and skipped.

use super::corpus::TrainingCorpus;
use super::price_feed::{fetch_prices, MarketDataProvider};
use crate::ml::{FeatureEncoder, FeaturePoint};
use crate::models::MarketPair;
use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Points gathered during one pass over the catalog
#[derive(Debug, Default)]
pub struct CollectionBatch {
    pub points: Vec<FeaturePoint>,
    pub pairs_succeeded: usize,
    pub pairs_empty: usize,
    pub pairs_failed: Vec<MarketPair>,
}

/// Outcome of a collection pass after it was persisted
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionReport {
    pub points_collected: usize,
    pub pairs_succeeded: usize,
    pub pairs_empty: usize,
    pub pairs_failed: usize,
    pub corpus_size: usize,
}

pub struct DataCollector {
    provider: Arc<dyn MarketDataProvider>,
    catalog: Vec<MarketPair>,
    request_delay: Duration,
    request_timeout: Duration,
}

impl DataCollector {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        catalog: Vec<MarketPair>,
        request_delay: Duration,
        request_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            catalog,
            request_delay,
            request_timeout,
        }
    }

    pub fn catalog(&self) -> &[MarketPair] {
        &self.catalog
    }

    /// Query every pair once. Never fails; per-pair errors are counted.
    pub async fn gather(&self) -> CollectionBatch {
        let mut batch = CollectionBatch::default();

        for (i, pair) in self.catalog.iter().enumerate() {
            if i > 0 && !self.request_delay.is_zero() {
                // Rate limiting
                sleep(self.request_delay).await;
            }

            let rows = match fetch_prices(
                self.provider.as_ref(),
                &pair.commodity,
                &pair.state,
                self.request_timeout,
            )
            .await
            {
                Ok(rows) => rows,
                Err(e) => {
                    warn!("Skipping {}: {}", pair, e);
                    batch.pairs_failed.push(pair.clone());
                    continue;
                }
            };

            if rows.is_empty() {
                debug!("No quotes for {}", pair);
                batch.pairs_empty += 1;
                continue;
            }

            let points = FeatureEncoder::encode_all(&rows, &pair.commodity, &pair.state, Utc::now());
            debug!("{}: {} quotes, {} usable", pair, rows.len(), points.len());
            batch.points.extend(points);
            batch.pairs_succeeded += 1;
        }

        batch
    }

    /// Gather one batch and append it to the corpus
    pub async fn collect_into(&self, corpus: &TrainingCorpus) -> Result<CollectionReport> {
        info!(
            "Collecting market prices for {} pairs via {}",
            self.catalog.len(),
            self.provider.name()
        );

        let batch = self.gather().await;
        let points_collected = batch.points.len();
        let corpus_size = corpus.append(batch.points)?;

        let report = CollectionReport {
            points_collected,
            pairs_succeeded: batch.pairs_succeeded,
            pairs_empty: batch.pairs_empty,
            pairs_failed: batch.pairs_failed.len(),
            corpus_size,
        };

        info!(
            "Collected {} points ({} pairs ok, {} empty, {} failed); corpus now {}",
            report.points_collected,
            report.pairs_succeeded,
            report.pairs_empty,
            report.pairs_failed,
            report.corpus_size
        );
        Ok(report)
    }
}
