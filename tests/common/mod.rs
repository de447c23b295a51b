#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use portfolio_tracker_api::config::AppConfig;
use portfolio_tracker_api::database::MemoryStore;
use portfolio_tracker_api::providers::{
    BrokerHolding, BrokerHoldingsProvider, NavProvider, ProviderError, QuoteProvider, SchemeMatch,
};
use portfolio_tracker_api::{app, AppState, Backends};

pub const BOUNDARY: &str = "folio-test-boundary";

/// Quotes served from a fixed table
#[derive(Default)]
pub struct StaticQuotes(pub HashMap<String, f64>);

#[async_trait]
impl QuoteProvider for StaticQuotes {
    fn name(&self) -> &str {
        "static"
    }

    async fn latest_price(&self, symbol: &str) -> Result<f64, ProviderError> {
        self.0.get(symbol).copied().ok_or_else(|| ProviderError::Api {
            provider: "static".to_string(),
            message: format!("no quote for {}", symbol),
        })
    }
}

/// NAVs keyed by exact fund-name query
#[derive(Default)]
pub struct StaticNavs(pub HashMap<String, f64>);

#[async_trait]
impl NavProvider for StaticNavs {
    fn name(&self) -> &str {
        "static"
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn search_scheme(&self, query: &str) -> Result<Option<SchemeMatch>, ProviderError> {
        Ok(self.0.contains_key(query).then(|| SchemeMatch {
            scheme_code: query.to_string(),
            scheme_name: None,
        }))
    }

    async fn latest_nav(&self, scheme_code: &str) -> Result<f64, ProviderError> {
        Ok(self.0.get(scheme_code).copied().unwrap_or(0.0))
    }
}

#[derive(Default)]
pub struct StaticBroker(pub Vec<BrokerHolding>);

#[async_trait]
impl BrokerHoldingsProvider for StaticBroker {
    fn name(&self) -> &str {
        "static"
    }

    async fn holdings(&self, _user_id: Uuid) -> Result<Vec<BrokerHolding>, ProviderError> {
        Ok(self.0.clone())
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

/// The real router over an in-memory store, driven with `oneshot`
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(AppConfig::for_tests(), StaticQuotes::default(), StaticNavs::default(), StaticBroker::default())
    }

    pub fn with_config(config: AppConfig) -> Self {
        Self::build(config, StaticQuotes::default(), StaticNavs::default(), StaticBroker::default())
    }

    pub fn with_quotes(quotes: &[(&str, f64)]) -> Self {
        let quotes = StaticQuotes(quotes.iter().map(|(s, p)| (s.to_string(), *p)).collect());
        Self::build(AppConfig::for_tests(), quotes, StaticNavs::default(), StaticBroker::default())
    }

    pub fn with_broker(holdings: Vec<BrokerHolding>) -> Self {
        Self::build(AppConfig::for_tests(), StaticQuotes::default(), StaticNavs::default(), StaticBroker(holdings))
    }

    pub fn build(config: AppConfig, quotes: StaticQuotes, navs: StaticNavs, broker: StaticBroker) -> Self {
        let store = Arc::new(MemoryStore::new(config.security.clone()));
        let state = AppState::from_parts(
            config,
            Backends {
                store: store.clone(),
                identity: store.clone(),
                quotes: Arc::new(quotes),
                navs: Arc::new(navs),
                broker: Arc::new(broker),
            },
        );
        Self {
            router: app(state.clone()),
            store,
            state,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("read body");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        TestResponse { status, headers, body }
    }

    fn builder(method: Method, path: &str, token: Option<&str>) -> axum::http::request::Builder {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> TestResponse {
        let request = Self::builder(Method::GET, path, token).body(Body::empty()).unwrap();
        self.send(request).await
    }

    pub async fn post(&self, path: &str, token: Option<&str>) -> TestResponse {
        let request = Self::builder(Method::POST, path, token).body(Body::empty()).unwrap();
        self.send(request).await
    }

    pub async fn post_json(&self, path: &str, token: Option<&str>, body: Value) -> TestResponse {
        let request = Self::builder(Method::POST, path, token)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn post_raw(&self, path: &str, token: Option<&str>, content_type: &str, body: Vec<u8>) -> TestResponse {
        let request = Self::builder(Method::POST, path, token)
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Uploads `bytes` as the multipart field `field`
    pub async fn upload(&self, token: &str, field: &str, filename: &str, bytes: &[u8]) -> TestResponse {
        self.post_raw(
            "/api/transactions/upload-csv",
            Some(token),
            &format!("multipart/form-data; boundary={}", BOUNDARY),
            multipart_body(field, filename, bytes),
        )
        .await
    }

    /// Creates an account and returns its bearer token and id
    pub async fn login_as(&self, username: &str) -> (String, Uuid) {
        let credentials = json!({ "username": username, "password": "correct horse" });
        let signup = self.post_json("/api/user/signup", None, credentials.clone()).await;
        assert_eq!(signup.status, StatusCode::OK, "signup failed: {}", signup.body);

        let login = self.post_json("/api/user/login", None, credentials).await;
        assert_eq!(login.status, StatusCode::OK, "login failed: {}", login.body);

        let token = login.body["token"].as_str().expect("token").to_string();
        let id = login.body["user"]["id"].as_str().expect("user id").parse().expect("uuid");
        (token, id)
    }

    pub async fn create_transaction(&self, token: &str, body: Value) -> TestResponse {
        self.post_json("/api/transactions", Some(token), body).await
    }
}

pub fn multipart_body(field: &str, filename: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
        b = BOUNDARY
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}
