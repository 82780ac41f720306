use anyhow::Result;
use mandi_forecast::config::Config;
use mandi_forecast::engine::ForecastEngine;
use mandi_forecast::scheduler::Scheduler;
use mandi_forecast::services::Database;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    info!("Loading configuration...");
    let config = Config::from_env()?;

    info!("Forecast Configuration:");
    info!("  Database: {}", config.storage.path);
    info!(
        "  Catalog: {} commodities x {} states",
        config.collector.commodities.len(),
        config.collector.states.len()
    );
    info!("  Collection Interval: {}s", config.collector.interval_secs);
    info!(
        "  Training: min {} points, lr {}, {} epochs",
        config.training.min_data_points, config.training.learning_rate, config.training.epochs
    );

    // Initialize services
    info!("Initializing services...");
    let db = Arc::new(Database::new(&config.storage.path)?);
    let provider = config.market_data_provider()?;
    info!("  Market Data: {}", provider.name());

    let engine = Arc::new(ForecastEngine::new(db, provider, &config));

    let status = engine.status();
    info!(
        "  Corpus: {}/{} points, model trained: {}",
        status.data_collected, status.minimum_required, status.model_trained
    );

    let scheduler = Scheduler::spawn(engine.clone(), config.collector.interval());

    // Run until interrupted
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for ctrl+c signal: {}", e);
    }

    info!("Received interrupt signal, shutting down...");
    scheduler.stop().await;

    Ok(())
}
