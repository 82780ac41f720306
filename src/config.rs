use crate::ml::features::{COMMODITIES, STATES};
use crate::ml::TrainingConfig;
use crate::services::corpus::DEFAULT_MAX_POINTS;
use crate::services::price_feed::{
    AgmarknetClient, MarketDataProvider, SyntheticMarketData, DEFAULT_AGMARKNET_URL,
};
use anyhow::{anyhow, Context, Result};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    pub corpus: CorpusConfig,
    pub training: TrainingConfig,
    pub collector: CollectorConfig,
    pub market_api: MarketApiConfig,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct CorpusConfig {
    pub max_points: usize,
}

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub interval_secs: u64,
    pub request_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub commodities: Vec<String>,
    pub states: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct MarketApiConfig {
    pub url: String,
    // Synthetic data is used when no key is configured
    pub api_key: Option<String>,
    pub requests_per_minute: u32,
}

/// States collected by default; a subset of the vocabulary
const DEFAULT_STATES: [&str; 5] = [
    "Maharashtra",
    "Punjab",
    "Uttar Pradesh",
    "Madhya Pradesh",
    "Karnataka",
];

impl CollectorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                path: "./data/forecast.db".to_string(),
            },
            corpus: CorpusConfig {
                max_points: DEFAULT_MAX_POINTS,
            },
            training: TrainingConfig::default(),
            collector: CollectorConfig {
                interval_secs: 30 * 60,
                request_delay_ms: 100,
                request_timeout_secs: 10,
                commodities: COMMODITIES.iter().map(|c| c.to_string()).collect(),
                states: DEFAULT_STATES.iter().map(|s| s.to_string()).collect(),
            },
            market_api: MarketApiConfig {
                url: DEFAULT_AGMARKNET_URL.to_string(),
                api_key: None,
                requests_per_minute: 60,
            },
        }
    }
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr + ToString,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .trim()
        .parse::<T>()
        .with_context(|| format!("Invalid value for {}", key))
}

fn env_list(key: &str, default: &[String]) -> Vec<String> {
    match env::var(key) {
        Ok(raw) => raw
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect(),
        Err(_) => default.to_vec(),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let defaults = Config::default();

        let storage = StorageConfig {
            path: env::var("FORECAST_DB_PATH").unwrap_or(defaults.storage.path),
        };

        let corpus = CorpusConfig {
            max_points: env_parse("CORPUS_MAX_POINTS", defaults.corpus.max_points)?,
        };

        let training = TrainingConfig {
            min_data_points: env_parse("MIN_DATA_POINTS", defaults.training.min_data_points)?,
            learning_rate: env_parse("TRAINING_LEARNING_RATE", defaults.training.learning_rate)?,
            epochs: env_parse("TRAINING_EPOCHS", defaults.training.epochs)?,
        };

        let collector = CollectorConfig {
            interval_secs: env_parse("COLLECTION_INTERVAL_SECS", defaults.collector.interval_secs)?,
            request_delay_ms: env_parse(
                "PROVIDER_REQUEST_DELAY_MS",
                defaults.collector.request_delay_ms,
            )?,
            request_timeout_secs: env_parse(
                "PROVIDER_TIMEOUT_SECS",
                defaults.collector.request_timeout_secs,
            )?,
            commodities: env_list("COLLECTION_COMMODITIES", &defaults.collector.commodities),
            states: env_list("COLLECTION_STATES", &defaults.collector.states),
        };

        let market_api = MarketApiConfig {
            url: env::var("MARKET_API_URL").unwrap_or(defaults.market_api.url),
            api_key: env::var("MARKET_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            requests_per_minute: env_parse(
                "MARKET_API_REQUESTS_PER_MINUTE",
                defaults.market_api.requests_per_minute,
            )?,
        };

        let config = Config {
            storage,
            corpus,
            training,
            collector,
            market_api,
        };

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.corpus.max_points == 0 {
            return Err(anyhow!("Corpus capacity must be greater than 0"));
        }
        if self.training.min_data_points == 0 {
            return Err(anyhow!("Minimum data points must be greater than 0"));
        }
        if self.training.min_data_points > self.corpus.max_points {
            return Err(anyhow!(
                "Minimum data points ({}) cannot exceed corpus capacity ({})",
                self.training.min_data_points,
                self.corpus.max_points
            ));
        }
        if !self.training.learning_rate.is_finite() || self.training.learning_rate <= 0.0 {
            return Err(anyhow!("Learning rate must be a positive number"));
        }
        if self.training.epochs == 0 {
            return Err(anyhow!("Training epochs must be greater than 0"));
        }

        if self.collector.interval_secs == 0 {
            return Err(anyhow!("Collection interval must be greater than 0 seconds"));
        }
        if self.collector.request_timeout_secs == 0 {
            return Err(anyhow!("Provider timeout must be greater than 0 seconds"));
        }
        if self.collector.commodities.is_empty() || self.collector.states.is_empty() {
            return Err(anyhow!("Collection catalog needs at least one commodity and one state"));
        }

        if self.market_api.requests_per_minute == 0 {
            return Err(anyhow!("Market API rate limit must be greater than 0"));
        }

        for state in &self.collector.states {
            if !STATES.contains(&state.as_str()) {
                warn!("State '{}' is outside the vocabulary and will encode as unknown", state);
            }
        }

        Ok(())
    }

    /// Agmarknet when an API key is configured, synthetic quotes otherwise
    pub fn market_data_provider(&self) -> Result<Arc<dyn MarketDataProvider>> {
        match &self.market_api.api_key {
            Some(key) => {
                let client = AgmarknetClient::new(
                    &self.market_api.url,
                    key,
                    self.collector.request_timeout(),
                    self.market_api.requests_per_minute,
                )
                .context("Failed to initialize Agmarknet client")?;
                Ok(Arc::new(client))
            }
            None => {
                warn!("MARKET_API_KEY not set, using synthetic market data");
                Ok(Arc::new(SyntheticMarketData::default()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();

        assert_eq!(config.corpus.max_points, 10_000);
        assert_eq!(config.training.min_data_points, 100);
        assert_eq!(config.training.epochs, 1000);
        assert_eq!(config.collector.interval(), Duration::from_secs(1800));
        assert_eq!(config.collector.commodities.len(), 20);
        assert_eq!(config.collector.states.len(), 5);
        assert!(config.market_api.api_key.is_none());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.training.min_data_points = 20_000;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.training.learning_rate = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.collector.interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.collector.states.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_list_parsing() {
        std::env::set_var("MANDI_TEST_LIST", " wheat, onion ,,rice ");
        let parsed = env_list("MANDI_TEST_LIST", &[]);
        assert_eq!(parsed, vec!["wheat", "onion", "rice"]);

        let fallback = env_list("MANDI_TEST_LIST_UNSET", &["maize".to_string()]);
        assert_eq!(fallback, vec!["maize"]);
    }

    #[test]
    fn test_provider_selection() {
        let mut config = Config::default();
        assert_eq!(config.market_data_provider().unwrap().name(), "synthetic");

        config.market_api.api_key = Some("test-key".to_string());
        assert_eq!(config.market_data_provider().unwrap().name(), "agmarknet");
    }
}
