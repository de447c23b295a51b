use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::database::models::{NewSecurity, NewTransaction, Security, Transaction};
use crate::database::{MemoryStore, PortfolioStore};
use crate::providers::{
    BrokerHolding, BrokerHoldingsProvider, NavProvider, ProviderError, QuoteProvider, SchemeMatch,
};
use crate::types::{source, SecurityType, TransactionType};

/// Empty in-memory store with the test security settings
pub fn test_store() -> MemoryStore {
    MemoryStore::new(AppConfig::for_tests().security)
}

pub async fn seed_security(
    store: &MemoryStore,
    symbol: &str,
    security_type: SecurityType,
    last_price: Option<f64>,
) -> Security {
    store
        .insert_security(NewSecurity {
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            security_type,
            isin: None,
            exchange: None,
            last_price,
            last_updated: None,
        })
        .await
        .expect("seed security")
}

pub async fn seed_named_security(
    store: &MemoryStore,
    symbol: &str,
    name: &str,
    security_type: SecurityType,
) -> Security {
    store
        .insert_security(NewSecurity {
            symbol: symbol.to_string(),
            name: name.to_string(),
            security_type,
            isin: None,
            exchange: None,
            last_price: None,
            last_updated: None,
        })
        .await
        .expect("seed security")
}

pub async fn seed_transaction(
    store: &MemoryStore,
    user_id: Uuid,
    security: &Security,
    transaction_type: TransactionType,
    quantity: f64,
    price: f64,
    date: &str,
) -> Transaction {
    let transaction_date = chrono::DateTime::parse_from_rfc3339(date)
        .expect("rfc3339 date")
        .with_timezone(&chrono::Utc);
    store
        .insert_transaction(NewTransaction {
            user_id,
            security_id: security.id,
            transaction_type,
            transaction_date,
            quantity,
            price_per_unit: price,
            total_amount: quantity * price,
            source: source::MANUAL.to_string(),
        })
        .await
        .expect("seed transaction")
}

/// Quote provider answering from a fixed table; unknown symbols are API errors
pub struct FixedQuotes {
    prices: Option<HashMap<String, f64>>,
}

impl FixedQuotes {
    pub fn new(prices: &[(&str, f64)]) -> Self {
        Self {
            prices: Some(prices.iter().map(|(s, p)| (s.to_string(), *p)).collect()),
        }
    }

    pub fn unconfigured() -> Self {
        Self { prices: None }
    }
}

#[async_trait]
impl QuoteProvider for FixedQuotes {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn latest_price(&self, symbol: &str) -> Result<f64, ProviderError> {
        let prices = self.prices.as_ref().ok_or(ProviderError::MissingKey("ALPHA_VANTAGE_API_KEY"))?;
        prices
            .get(symbol)
            .copied()
            .ok_or_else(|| ProviderError::api("fixed", format!("no quote for {symbol}")))
    }
}

/// NAV provider keyed by exact search query
pub struct FixedNavs {
    schemes: Option<HashMap<String, (String, f64)>>,
}

impl FixedNavs {
    pub fn new(schemes: &[(&str, &str, f64)]) -> Self {
        Self {
            schemes: Some(
                schemes
                    .iter()
                    .map(|(query, code, nav)| (query.to_string(), (code.to_string(), *nav)))
                    .collect(),
            ),
        }
    }

    pub fn unconfigured() -> Self {
        Self { schemes: None }
    }
}

#[async_trait]
impl NavProvider for FixedNavs {
    fn name(&self) -> &str {
        "fixed"
    }

    fn is_configured(&self) -> bool {
        self.schemes.is_some()
    }

    async fn search_scheme(&self, query: &str) -> Result<Option<SchemeMatch>, ProviderError> {
        let schemes = self.schemes.as_ref().ok_or(ProviderError::MissingKey("INDIAN_API_KEY"))?;
        Ok(schemes.get(query).map(|(code, _)| SchemeMatch {
            scheme_code: code.clone(),
            scheme_name: Some(query.to_string()),
        }))
    }

    async fn latest_nav(&self, scheme_code: &str) -> Result<f64, ProviderError> {
        let schemes = self.schemes.as_ref().ok_or(ProviderError::MissingKey("INDIAN_API_KEY"))?;
        schemes
            .values()
            .find(|(code, _)| code == scheme_code)
            .map(|(_, nav)| *nav)
            .ok_or_else(|| ProviderError::api("fixed", "unknown scheme"))
    }
}

/// Broker returning a fixed holdings list for every user
pub struct FixedBroker {
    pub holdings: Vec<BrokerHolding>,
}

#[async_trait]
impl BrokerHoldingsProvider for FixedBroker {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn holdings(&self, _user_id: Uuid) -> Result<Vec<BrokerHolding>, ProviderError> {
        Ok(self.holdings.clone())
    }
}
