// Operator tool: one-off forecasts, status and manual training
//
//   predict <commodity> <state> [arrivals]
//   predict status
//   predict train
//   predict importance

use anyhow::{anyhow, Context, Result};
use mandi_forecast::config::Config;
use mandi_forecast::engine::ForecastEngine;
use mandi_forecast::models::ExtraFeatures;
use mandi_forecast::services::Database;
use std::env;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: predict <commodity> <state> [arrivals] | predict status | predict train | predict importance";

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        return Err(anyhow!(USAGE));
    }

    let config = Config::from_env()?;
    let db = Arc::new(Database::new(&config.storage.path)?);
    let engine = ForecastEngine::new(db, config.market_data_provider()?, &config);

    let output = match args[0].as_str() {
        "status" => serde_json::to_string_pretty(&engine.status())?,
        "train" => serde_json::to_string_pretty(&engine.manual_train().await?)?,
        "importance" => serde_json::to_string_pretty(&engine.feature_importance()?)?,
        commodity => {
            let state = args.get(1).ok_or_else(|| anyhow!(USAGE))?;
            let extra = match args.get(2) {
                Some(raw) => ExtraFeatures {
                    arrivals: Some(raw.parse::<f64>().with_context(|| format!("Invalid arrivals: {}", raw))?),
                },
                None => ExtraFeatures::default(),
            };

            let prediction = engine.predict(commodity, state, Some(extra)).await?;
            serde_json::to_string_pretty(&prediction)?
        }
    };

    println!("{}", output);
    Ok(())
}
