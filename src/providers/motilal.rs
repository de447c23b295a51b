use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use uuid::Uuid;

use super::traits::{BrokerHolding, BrokerHoldingsProvider};
use super::ProviderError;
use crate::config::ProvidersConfig;

const NAME: &str = "Motilal Oswal";

/// Broker holdings over HTTP. Requests carry the API key and secret as
/// headers and the portfolio owner as `client_id`.
pub struct MotilalOswalProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    api_secret: Option<String>,
}

#[derive(Deserialize)]
struct HoldingsResponse {
    #[serde(default)]
    holdings: Vec<BrokerHolding>,
}

impl MotilalOswalProvider {
    pub fn new(config: &ProvidersConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: config.motilal_oswal_base_url.trim_end_matches('/').to_string(),
            api_key: config.motilal_oswal_api_key.clone(),
            api_secret: config.motilal_oswal_api_secret.clone(),
        }
    }
}

#[async_trait]
impl BrokerHoldingsProvider for MotilalOswalProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn holdings(&self, user_id: Uuid) -> Result<Vec<BrokerHolding>, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ProviderError::MissingKey("MOTILAL_OSWAL_API_KEY"))?;
        let api_secret = self
            .api_secret
            .as_deref()
            .ok_or(ProviderError::MissingKey("MOTILAL_OSWAL_API_SECRET"))?;

        let response = self
            .client
            .get(format!("{}/holdings", self.base_url))
            .header("X-Api-Key", api_key)
            .header("X-Api-Secret", api_secret)
            .query(&[("client_id", user_id.to_string())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::api(NAME, format!("HTTP {}", response.status())));
        }

        let body: HoldingsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::api(NAME, format!("Failed to parse holdings: {e}")))?;
        Ok(body.holdings)
    }
}
