use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use super::traits::{NavProvider, SchemeMatch};
use super::{loose_f64, ProviderError};
use crate::config::ProvidersConfig;

const NAME: &str = "IndianAPI";

/// IndianAPI mutual fund search and NAV endpoints, authenticated with
/// the `X-Api-Key` header.
pub struct IndianApiProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl IndianApiProvider {
    pub fn new(config: &ProvidersConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.indian_api_timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: config.indian_api_base_url.trim_end_matches('/').to_string(),
            api_key: config.indian_api_key.clone(),
        }
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, ProviderError> {
        let api_key = self.api_key.as_deref().ok_or(ProviderError::MissingKey("INDIAN_API_KEY"))?;

        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header("X-Api-Key", api_key)
            .query(query)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::api(NAME, format!("HTTP {} from {}", response.status(), path)));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::api(NAME, format!("Failed to parse {path}: {e}")))
    }
}

#[async_trait]
impl NavProvider for IndianApiProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn search_scheme(&self, query: &str) -> Result<Option<SchemeMatch>, ProviderError> {
        let body = self.get("/mutual_funds", &[("search", query)]).await?;

        let first = match body {
            Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
            _ => return Ok(None),
        };

        serde_json::from_value(first)
            .map(Some)
            .map_err(|e| ProviderError::api(NAME, format!("Unexpected search result: {e}")))
    }

    async fn latest_nav(&self, scheme_code: &str) -> Result<f64, ProviderError> {
        let body = self.get("/mutual_funds/nav", &[("scheme_code", scheme_code)]).await?;

        body.get("nav")
            .and_then(loose_f64)
            .ok_or_else(|| ProviderError::api(NAME, format!("No NAV for scheme {scheme_code}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn provider(url: &str) -> IndianApiProvider {
        let config = ProvidersConfig {
            indian_api_base_url: url.to_string(),
            indian_api_key: Some("indian-key".to_string()),
            ..ProvidersConfig::default()
        };
        IndianApiProvider::new(&config)
    }

    #[tokio::test]
    async fn search_takes_first_match_with_numeric_code() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/mutual_funds")
            .match_query(Matcher::UrlEncoded("search".into(), "Axis Bluechip Fund".into()))
            .match_header("x-api-key", "indian-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"scheme_code": 120465, "scheme_name": "Axis Bluechip Fund"}, {"scheme_code": "1"}]"#)
            .create_async()
            .await;

        let found = provider(&server.url()).search_scheme("Axis Bluechip Fund").await.unwrap().unwrap();
        assert_eq!(found.scheme_code, "120465");
    }

    #[tokio::test]
    async fn empty_search_is_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/mutual_funds")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("[]")
            .create_async()
            .await;

        assert!(provider(&server.url()).search_scheme("Nothing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn nav_accepts_string_values() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/mutual_funds/nav")
            .match_query(Matcher::UrlEncoded("scheme_code".into(), "120465".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"nav": "58.1234"}"#)
            .create_async()
            .await;

        assert_eq!(provider(&server.url()).latest_nav("120465").await.unwrap(), 58.1234);
    }

    #[test]
    fn unconfigured_without_key() {
        let provider = IndianApiProvider::new(&ProvidersConfig::default());
        assert!(!provider.is_configured());
    }
}
