use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::traits::QuoteProvider;
use super::ProviderError;
use crate::config::ProvidersConfig;

const NAME: &str = "Alpha Vantage";

/// Alpha Vantage `GLOBAL_QUOTE` lookups for stock prices.
///
/// The free tier allows a handful of requests per minute; when it is
/// exhausted the API answers 200 with a `Note` or `Information` field
/// instead of a quote, which surfaces here as an API error.
pub struct AlphaVantageProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl AlphaVantageProvider {
    pub fn new(config: &ProvidersConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.alpha_vantage_timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: config.alpha_vantage_base_url.trim_end_matches('/').to_string(),
            api_key: config.alpha_vantage_api_key.clone(),
        }
    }
}

#[derive(Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
}

#[derive(Deserialize)]
struct GlobalQuote {
    #[serde(rename = "05. price")]
    price: Option<String>,
}

#[async_trait]
impl QuoteProvider for AlphaVantageProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn latest_price(&self, symbol: &str) -> Result<f64, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ProviderError::MissingKey("ALPHA_VANTAGE_API_KEY"))?;

        let response = self
            .client
            .get(format!("{}/query", self.base_url))
            .query(&[("function", "GLOBAL_QUOTE"), ("symbol", symbol), ("apikey", api_key)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::api(NAME, format!("HTTP {} for {}", response.status(), symbol)));
        }

        let body: GlobalQuoteResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::api(NAME, format!("Failed to parse quote for {symbol}: {e}")))?;

        if let Some(message) = body.error_message.or(body.note).or(body.information) {
            return Err(ProviderError::api(NAME, message));
        }

        let price_str = body
            .global_quote
            .and_then(|q| q.price)
            .ok_or_else(|| ProviderError::api(NAME, format!("No quote data for {symbol}")))?;

        price_str
            .trim()
            .parse()
            .map_err(|e| ProviderError::api(NAME, format!("Invalid price format for {symbol}: {e}")))
    }
}
