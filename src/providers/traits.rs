use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ProviderError;

/// Latest traded price for a stock symbol
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Human-readable name of this provider (for logs/errors).
    fn name(&self) -> &str;

    async fn latest_price(&self, symbol: &str) -> Result<f64, ProviderError>;
}

/// Mutual fund scheme lookup and NAV
#[async_trait]
pub trait NavProvider: Send + Sync {
    fn name(&self) -> &str;

    /// False when the provider has no credentials; callers skip the run.
    fn is_configured(&self) -> bool;

    /// Best match for a fund name, if any
    async fn search_scheme(&self, query: &str) -> Result<Option<SchemeMatch>, ProviderError>;

    async fn latest_nav(&self, scheme_code: &str) -> Result<f64, ProviderError>;
}

/// Holdings held at a broker, imported as BUY transactions
#[async_trait]
pub trait BrokerHoldingsProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn holdings(&self, user_id: Uuid) -> Result<Vec<BrokerHolding>, ProviderError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemeMatch {
    #[serde(deserialize_with = "super::string_or_number")]
    pub scheme_code: String,
    #[serde(default)]
    pub scheme_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerHolding {
    pub symbol: String,
    #[serde(default)]
    pub name: Option<String>,
    pub quantity: f64,
    pub avg_price: f64,
    #[serde(default)]
    pub purchase_date: Option<String>,
    #[serde(default)]
    pub exchange: Option<String>,
}
