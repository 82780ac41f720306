use crate::errors::{ForecastError, ForecastResult};
use crate::ml::features::{commodity_index, state_index};
use crate::models::PriceObservation;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{Datelike, Utc};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::{debug, warn};

/// Source of raw mandi quotes for a (commodity, state) pair.
///
/// An empty list is a valid answer; callers treat errors as a failure of
/// that pair only.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn get_prices(&self, commodity: &str, state: &str) -> Result<Vec<PriceObservation>>;

    /// Provider label for logs
    fn name(&self) -> &str;
}

/// Call a provider with an upper bound on how long the pair may take
pub async fn fetch_prices(
    provider: &dyn MarketDataProvider,
    commodity: &str,
    state: &str,
    timeout: Duration,
) -> ForecastResult<Vec<PriceObservation>> {
    match tokio::time::timeout(timeout, provider.get_prices(commodity, state)).await {
        Ok(Ok(rows)) => Ok(rows),
        Ok(Err(e)) => Err(ForecastError::provider(commodity, state, format!("{:#}", e))),
        Err(_) => Err(ForecastError::provider(
            commodity,
            state,
            format!("timed out after {:?}", timeout),
        )),
    }
}

/// Default Agmarknet daily price resource on data.gov.in
pub const DEFAULT_AGMARKNET_URL: &str =
    "https://api.data.gov.in/resource/9ef84268-d588-465a-a308-a864a43d0070";

#[derive(Debug, Deserialize)]
struct AgmarknetResponse {
    #[serde(default)]
    records: Vec<AgmarknetRecord>,
}

#[derive(Debug, Deserialize)]
struct AgmarknetRecord {
    #[serde(default)]
    market: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    min_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    max_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    modal_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    arrivals: Option<f64>,
    #[serde(default)]
    arrival_date: Option<String>,
}

/// Accept numbers encoded either as JSON numbers or as strings; non-finite values become `None`
fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(f64),
        Text(String),
        Null,
    }

    let value = match Raw::deserialize(deserializer)? {
        Raw::Num(v) => Some(v),
        Raw::Text(s) => s.trim().parse::<f64>().ok(),
        Raw::Null => None,
    };

    // "NaN" and "inf" parse as f64 but are not prices
    Ok(value.filter(|v| v.is_finite()))
}

type DirectRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// HTTP client for the Agmarknet open-data API
pub struct AgmarknetClient {
    client: Client,
    base_url: String,
    api_key: String,
    rate_limiter: DirectRateLimiter,
}

impl AgmarknetClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        timeout: Duration,
        requests_per_minute: u32,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for AgmarknetClient")?;

        let per_minute = NonZeroU32::new(requests_per_minute)
            .ok_or_else(|| anyhow!("requests_per_minute must be greater than 0"))?;
        let rate_limiter = RateLimiter::direct(Quota::per_minute(per_minute));

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            rate_limiter,
        })
    }

    /// Convert a response body into observations, skipping rows without prices
    fn parse_records(body: &str) -> Result<Vec<PriceObservation>> {
        let response: AgmarknetResponse =
            serde_json::from_str(body).context("Failed to parse Agmarknet response")?;

        let observations = response
            .records
            .into_iter()
            .filter_map(|r| {
                Some(PriceObservation {
                    market: r.market.unwrap_or_else(|| "Unknown".to_string()),
                    min_price: r.min_price?,
                    max_price: r.max_price?,
                    modal_price: r.modal_price?,
                    arrivals: r.arrivals.unwrap_or(0.0),
                    date: r.arrival_date.unwrap_or_default(),
                    source: "agmarknet".to_string(),
                })
            })
            .collect();

        Ok(observations)
    }
}

/// "wheat" -> "Wheat", the casing the API filters on
fn title_case(name: &str) -> String {
    let mut chars = name.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new(),
    }
}

#[async_trait]
impl MarketDataProvider for AgmarknetClient {
    async fn get_prices(&self, commodity: &str, state: &str) -> Result<Vec<PriceObservation>> {
        // Wait for rate limiter
        self.rate_limiter.until_ready().await;

        let commodity_filter = title_case(commodity);
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("api-key", self.api_key.as_str()),
                ("format", "json"),
                ("limit", "50"),
                ("filters[state]", state),
                ("filters[commodity]", commodity_filter.as_str()),
            ])
            .send()
            .await
            .with_context(|| format!("Failed to fetch prices for {}/{}", commodity, state))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Agmarknet API error for {}/{}: {}",
                commodity,
                state,
                response.status()
            ));
        }

        let body = response.text().await.context("Failed to read Agmarknet response")?;
        let observations = Self::parse_records(&body)?;

        debug!("Agmarknet returned {} rows for {}/{}", observations.len(), commodity, state);
        Ok(observations)
    }

    fn name(&self) -> &str {
        "agmarknet"
    }
}

/// Offline provider producing plausible quotes from a fixed price table.
///
/// Output depends only on the pair and the current day, so repeated calls
/// within a day agree.
pub struct SyntheticMarketData {
    markets_per_pair: usize,
}

impl SyntheticMarketData {
    /// Indicative modal prices (Rs/quintal), vocabulary order
    const BASE_PRICES: [f64; 20] = [
        2350.0, 3100.0, 2050.0, 2400.0, 3000.0, 2000.0, 5400.0, 7200.0, 8100.0, 6900.0, 6200.0,
        4500.0, 5600.0, 7000.0, 350.0, 1800.0, 1300.0, 1500.0, 11000.0, 9500.0,
    ];

    const MARKETS: [&'static str; 5] = ["Central", "North", "South", "East", "West"];

    pub fn new(markets_per_pair: usize) -> Self {
        Self {
            markets_per_pair: markets_per_pair.clamp(1, Self::MARKETS.len()),
        }
    }

    fn base_price(commodity: &str) -> Option<f64> {
        match commodity_index(commodity) {
            0 => None,
            i => Self::BASE_PRICES.get(i - 1).copied(),
        }
    }
}

impl Default for SyntheticMarketData {
    fn default() -> Self {
        Self::new(3)
    }
}

#[async_trait]
impl MarketDataProvider for SyntheticMarketData {
    async fn get_prices(&self, commodity: &str, state: &str) -> Result<Vec<PriceObservation>> {
        let Some(base) = Self::base_price(commodity) else {
            warn!("No synthetic price table entry for '{}'", commodity);
            return Ok(Vec::new());
        };

        let today = Utc::now().date_naive();
        let day = today.ordinal() as f64;
        let state_factor = 1.0 + (state_index(state) as f64 - 6.0) * 0.01;

        let observations = (0..self.markets_per_pair)
            .map(|m| {
                let wobble = ((day + m as f64 * 17.0) * 0.37).sin() * 0.04;
                let modal = (base * state_factor * (1.0 + wobble)).round();
                let half_spread = (modal * (0.04 + m as f64 * 0.01)).round();
                PriceObservation {
                    market: format!("{} {}", state, Self::MARKETS[m]),
                    min_price: modal - half_spread,
                    max_price: modal + half_spread,
                    modal_price: modal,
                    arrivals: 80.0 + ((day as usize + m * 31) % 120) as f64,
                    date: today.format("%d/%m/%Y").to_string(),
                    source: "synthetic".to_string(),
                }
            })
            .collect();

        Ok(observations)
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_records_mixed_encodings() {
        let body = r#"{
            "total": 3,
            "records": [
                {"state": "Punjab", "market": "Khanna", "commodity": "Wheat",
                 "arrival_date": "17/07/2024", "min_price": "2200", "max_price": "2450", "modal_price": "2300"},
                {"market": "Rajpura", "min_price": 2210.5, "max_price": 2400, "modal_price": 2350, "arrivals": "87.5"},
                {"market": "Broken", "min_price": "NR", "max_price": "2400", "modal_price": "2350"}
            ]
        }"#;

        let rows = AgmarknetClient::parse_records(body).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].market, "Khanna");
        assert_eq!(rows[0].modal_price, 2300.0);
        assert_eq!(rows[0].arrivals, 0.0);
        assert_eq!(rows[0].date, "17/07/2024");
        assert_eq!(rows[1].min_price, 2210.5);
        assert_eq!(rows[1].arrivals, 87.5);
        assert_eq!(rows[1].source, "agmarknet");
    }

    #[test]
    fn test_parse_records_non_finite_strings() {
        let body = r#"{
            "records": [
                {"market": "A", "min_price": "NaN", "max_price": "2400", "modal_price": "2350"},
                {"market": "B", "min_price": "2200", "max_price": "Infinity", "modal_price": "2350"},
                {"market": "C", "min_price": "2200", "max_price": "2400", "modal_price": "inf"},
                {"market": "D", "min_price": "2200", "max_price": "2400", "modal_price": "2300", "arrivals": "-infinity"}
            ]
        }"#;

        let rows = AgmarknetClient::parse_records(body).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].market, "D");
        assert_eq!(rows[0].arrivals, 0.0);
    }

    #[test]
    fn test_parse_records_without_records_field() {
        assert!(AgmarknetClient::parse_records("{}").unwrap().is_empty());
        assert!(AgmarknetClient::parse_records("not json").is_err());
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("wheat"), "Wheat");
        assert_eq!(title_case(" ONION "), "Onion");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_zero_rate_limit_rejected() {
        assert!(AgmarknetClient::new(DEFAULT_AGMARKNET_URL, "key", Duration::from_secs(5), 0).is_err());
    }

    struct StalledProvider;

    #[async_trait]
    impl MarketDataProvider for StalledProvider {
        async fn get_prices(&self, _commodity: &str, _state: &str) -> Result<Vec<PriceObservation>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }

        fn name(&self) -> &str {
            "stalled"
        }
    }

    #[tokio::test]
    async fn test_fetch_prices_times_out() {
        let err = fetch_prices(&StalledProvider, "wheat", "Punjab", Duration::from_millis(20))
            .await
            .unwrap_err();

        match err {
            ForecastError::ProviderUnavailable { commodity, reason, .. } => {
                assert_eq!(commodity, "wheat");
                assert!(reason.contains("timed out"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_synthetic_prices() {
        let provider = SyntheticMarketData::default();

        let rows = provider.get_prices("wheat", "Maharashtra").await.unwrap();
        assert_eq!(rows.len(), 3);
        for row in &rows {
            assert!(row.modal_price > 2000.0 && row.modal_price < 2700.0);
            assert!(row.min_price < row.modal_price && row.modal_price < row.max_price);
            assert!(row.arrivals > 0.0);
        }

        assert!(provider.get_prices("dragonfruit", "Punjab").await.unwrap().is_empty());
    }
}
