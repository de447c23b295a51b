pub mod alphavantage;
pub mod indianapi;
pub mod motilal;
pub mod traits;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

pub use alphavantage::AlphaVantageProvider;
pub use indianapi::IndianApiProvider;
pub use motilal::MotilalOswalProvider;
pub use traits::{BrokerHolding, BrokerHoldingsProvider, NavProvider, QuoteProvider, SchemeMatch};

/// Errors from third-party market data and broker APIs
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Missing API key: {0}")]
    MissingKey(&'static str),

    #[error("API error ({provider}): {message}")]
    Api { provider: String, message: String },

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    pub(crate) fn api(provider: &str, message: impl Into<String>) -> Self {
        ProviderError::Api {
            provider: provider.to_string(),
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        // reqwest errors carry the full URL, and Alpha Vantage takes its key as a query parameter
        ProviderError::Network(redact_query(&e.to_string()))
    }
}

pub(crate) fn redact_query(message: &str) -> String {
    match message.find('?') {
        Some(idx) => {
            let rest = &message[idx..];
            // Keep whatever follows the URL, e.g. ")" or ": operation timed out"
            let tail = rest.find(|c: char| c == ')' || c.is_whitespace()).map_or("", |end| &rest[end..]);
            format!("{}?<query redacted>{}", &message[..idx], tail)
        }
        None => message.to_string(),
    }
}

/// Numbers from these APIs arrive as JSON numbers or numeric strings
pub(crate) fn loose_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("expected string or number, got {}", other))),
    }
}
