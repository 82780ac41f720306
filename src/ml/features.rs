/// Feature Engineering for Mandi Price Forecasting
///
/// Encodes one raw market quote into a `FeaturePoint` carrying 9 regression
/// features plus the modal price target:
///
/// Price Features (2):
/// 1. min_price - Lowest traded price at the market
/// 2. max_price - Highest traded price at the market
///
/// Supply Features (1):
/// 3. arrivals - Quantity arriving at the market
///
/// Calendar Features (2):
/// 4. seasonality - Month of collection (0-11)
/// 5. day_of_week - Weekday of collection (0 = Sunday)
///
/// Categorical Features (2):
/// 6. state_index - Position in the state vocabulary
/// 7. commodity_index - Position in the commodity vocabulary
///
/// Dispersion Features (2):
/// 8. price_spread - max_price - min_price
/// 9. price_volatility - Spread as a percentage of the modal price

use crate::models::PriceObservation;
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// Number of regression inputs (the bias term is not counted)
pub const NUM_FEATURES: usize = 9;

/// Index assigned to any commodity or state outside the vocabularies.
/// Known names start at 1, so 0 never aliases a real category.
pub const UNKNOWN_INDEX: usize = 0;

/// Closed commodity vocabulary (lower-case). Index = position + 1.
pub const COMMODITIES: [&str; 20] = [
    "wheat",
    "rice",
    "maize",
    "bajra",
    "jowar",
    "barley",
    "gram",
    "tur",
    "moong",
    "urad",
    "groundnut",
    "soybean",
    "mustard",
    "cotton",
    "sugarcane",
    "onion",
    "potato",
    "tomato",
    "chilli",
    "turmeric",
];

/// Closed state vocabulary. Index = position + 1.
pub const STATES: [&str; 12] = [
    "Maharashtra",
    "Punjab",
    "Uttar Pradesh",
    "Madhya Pradesh",
    "Karnataka",
    "Gujarat",
    "Rajasthan",
    "Haryana",
    "Andhra Pradesh",
    "Tamil Nadu",
    "West Bengal",
    "Bihar",
];

/// Commodity name -> vocabulary index (case-insensitive)
pub fn commodity_index(name: &str) -> usize {
    let needle = name.trim().to_lowercase();
    COMMODITIES
        .iter()
        .position(|&c| c == needle)
        .map_or(UNKNOWN_INDEX, |i| i + 1)
}

/// State name -> vocabulary index (exact match)
pub fn state_index(name: &str) -> usize {
    let needle = name.trim();
    STATES
        .iter()
        .position(|&s| s == needle)
        .map_or(UNKNOWN_INDEX, |i| i + 1)
}

/// Month (0-11) and weekday (0 = Sunday) of an instant
pub fn calendar_features(at: &DateTime<Utc>) -> (f64, f64) {
    (
        at.month0() as f64,
        at.weekday().num_days_from_sunday() as f64,
    )
}

/// `(max - min) / modal * 100`, or 0 for a non-positive modal price
pub fn price_volatility(min_price: f64, max_price: f64, modal_price: f64) -> f64 {
    if modal_price > 0.0 {
        (max_price - min_price) / modal_price * 100.0
    } else {
        0.0
    }
}

/// One encoded observation. Never constructed with a non-positive modal price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeaturePoint {
    pub modal_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub arrivals: f64,
    pub seasonality: u32,
    pub day_of_week: u32,
    pub state_index: usize,
    pub commodity_index: usize,
    pub price_spread: f64,
    pub price_volatility: f64,
    /// Collection time, unix millis
    pub timestamp: i64,
    pub commodity: String,
    pub state: String,
    pub market: String,
    pub source: String,
    pub target: f64,
}

impl FeaturePoint {
    /// Feature names for logging and debugging
    pub const FEATURE_NAMES: [&'static str; NUM_FEATURES] = [
        "min_price",
        "max_price",
        "arrivals",
        "seasonality",
        "day_of_week",
        "state_index",
        "commodity_index",
        "price_spread",
        "price_volatility",
    ];

    /// Regression inputs in model column order
    pub fn features(&self) -> [f64; NUM_FEATURES] {
        [
            self.min_price,
            self.max_price,
            self.arrivals,
            self.seasonality as f64,
            self.day_of_week as f64,
            self.state_index as f64,
            self.commodity_index as f64,
            self.price_spread,
            self.price_volatility,
        ]
    }
}

pub struct FeatureEncoder;

impl FeatureEncoder {
    /// Encode a raw quote collected at `now`.
    ///
    /// Calendar features describe when the point was collected, not the
    /// observation's own date. Returns `None` when the modal price is not
    /// positive or any numeric field is not finite.
    pub fn encode(
        observation: &PriceObservation,
        commodity: &str,
        state: &str,
        now: DateTime<Utc>,
    ) -> Option<FeaturePoint> {
        let modal_price = observation.modal_price;
        let min_price = observation.min_price;
        let max_price = observation.max_price;

        // JSON has no encoding for NaN/inf; one such point would make the stored corpus unreadable
        let finite = [modal_price, min_price, max_price, observation.arrivals]
            .iter()
            .all(|v| v.is_finite());
        if !finite || modal_price <= 0.0 {
            return None;
        }

        Some(FeaturePoint {
            modal_price,
            min_price,
            max_price,
            arrivals: observation.arrivals,
            seasonality: now.month0(),
            day_of_week: now.weekday().num_days_from_sunday(),
            state_index: state_index(state),
            commodity_index: commodity_index(commodity),
            price_spread: max_price - min_price,
            price_volatility: price_volatility(min_price, max_price, modal_price),
            timestamp: now.timestamp_millis(),
            commodity: commodity.to_string(),
            state: state.to_string(),
            market: observation.market.clone(),
            source: observation.source.clone(),
            target: modal_price,
        })
    }

    /// Encode a batch, silently dropping quotes without a usable modal price
    pub fn encode_all(
        observations: &[PriceObservation],
        commodity: &str,
        state: &str,
        now: DateTime<Utc>,
    ) -> Vec<FeaturePoint> {
        observations
            .iter()
            .filter_map(|obs| Self::encode(obs, commodity, state, now))
            .collect()
    }
}

/// Per-feature z-score parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizationStats {
    pub mean: f64,
    pub std: f64,
}

impl NormalizationStats {
    /// Population mean and standard deviation of one column.
    /// A zero (or non-finite) deviation is replaced by 1.
    pub fn from_column(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self { mean: 0.0, std: 1.0 };
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();

        Self {
            mean,
            std: if std == 0.0 || !std.is_finite() { 1.0 } else { std },
        }
    }

    pub fn apply(&self, value: f64) -> f64 {
        (value - self.mean) / self.std
    }

    /// Stats for every column of a feature matrix
    pub fn compute(rows: &[[f64; NUM_FEATURES]]) -> [NormalizationStats; NUM_FEATURES] {
        std::array::from_fn(|j| {
            let column: Vec<f64> = rows.iter().map(|row| row[j]).collect();
            Self::from_column(&column)
        })
    }

    /// Z-score a raw feature vector
    pub fn normalize(
        stats: &[NormalizationStats; NUM_FEATURES],
        raw: &[f64; NUM_FEATURES],
    ) -> [f64; NUM_FEATURES] {
        std::array::from_fn(|j| stats[j].apply(raw[j]))
    }
}
