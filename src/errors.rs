use thiserror::Error;

/// Failures surfaced by the forecasting core.
///
/// Too little training data is not an error: training operations return
/// `Ok(None)` instead.
#[derive(Error, Debug)]
pub enum ForecastError {
    /// One provider fetch failed or timed out
    #[error("Market data unavailable for {commodity}/{state}: {reason}")]
    ProviderUnavailable {
        commodity: String,
        state: String,
        reason: String,
    },
    #[error("No trained model available")]
    ModelUnavailable,
    #[error("No current market data for {commodity}/{state}")]
    NoCurrentData { commodity: String, state: String },
    #[error("Persistence failure: {0:#}")]
    Persistence(#[from] anyhow::Error),
}

impl ForecastError {
    pub fn provider(commodity: &str, state: &str, reason: impl ToString) -> Self {
        Self::ProviderUnavailable {
            commodity: commodity.to_string(),
            state: state.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type ForecastResult<T> = std::result::Result<T, ForecastError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ForecastError::provider("onion", "Punjab", "timed out after 10s");
        assert_eq!(
            err.to_string(),
            "Market data unavailable for onion/Punjab: timed out after 10s"
        );

        let err = ForecastError::NoCurrentData {
            commodity: "wheat".to_string(),
            state: "Bihar".to_string(),
        };
        assert_eq!(err.to_string(), "No current market data for wheat/Bihar");

        let err: ForecastError = anyhow::anyhow!("disk full").into();
        assert!(matches!(err, ForecastError::Persistence(_)));
    }
}
