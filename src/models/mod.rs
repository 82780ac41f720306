use serde::{Deserialize, Serialize};

/// One raw quote returned by a market data provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceObservation {
    pub market: String,
    pub min_price: f64,
    pub max_price: f64,
    pub modal_price: f64,
    pub arrivals: f64,
    /// Provider-reported trading date, kept verbatim
    pub date: String,
    pub source: String,
}

/// Caller-supplied overrides for inference
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtraFeatures {
    pub arrivals: Option<f64>,
}

/// A (commodity, state) pair from the collection catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarketPair {
    pub commodity: String,
    pub state: String,
}

impl MarketPair {
    pub fn new(commodity: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            commodity: commodity.into(),
            state: state.into(),
        }
    }

    /// Cartesian product of commodities and states, commodity-major
    pub fn catalog(commodities: &[String], states: &[String]) -> Vec<MarketPair> {
        commodities
            .iter()
            .flat_map(|c| states.iter().map(move |s| MarketPair::new(c.clone(), s.clone())))
            .collect()
    }
}

impl std::fmt::Display for MarketPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.commodity, self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_product() {
        let commodities = vec!["wheat".to_string(), "onion".to_string()];
        let states = vec!["Punjab".to_string(), "Bihar".to_string(), "Gujarat".to_string()];

        let catalog = MarketPair::catalog(&commodities, &states);

        assert_eq!(catalog.len(), 6);
        assert_eq!(catalog[0], MarketPair::new("wheat", "Punjab"));
        assert_eq!(catalog[5], MarketPair::new("onion", "Gujarat"));
        assert_eq!(catalog[1].to_string(), "wheat/Bihar");
    }
}
