use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use super::models::{
    HoldingRow, Identity, NewSecurity, NewTransaction, Security, Session, SummaryRow, Transaction,
    TransactionWithSecurity,
};
use super::{DatabaseError, IdentityProvider, PortfolioStore, StoreResult};
use crate::config::BackendConfig;
use crate::types::SecurityType;

const SECURITIES: &str = "securities_master";
const TRANSACTIONS: &str = "transactions";
const WITH_SECURITY: &str = "*,security:securities_master(*)";

// PostgREST code for "zero rows where one was requested"
const NO_ROWS: &str = "PGRST116";

/// Client for a Supabase project: PostgREST rows and RPCs with the service
/// key, GoTrue password auth with the anon key.
pub struct SupabaseClient {
    http: Client,
    base_url: String,
    anon_key: String,
    service_key: String,
}

#[derive(Debug, Default, Deserialize)]
struct PostgrestError {
    // String for PostgREST, numeric for GoTrue
    #[serde(default)]
    code: Value,
    #[serde(default)]
    message: Option<String>,
    // GoTrue reports errors under several keys depending on version
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

impl PostgrestError {
    fn text(&self) -> String {
        self.message
            .clone()
            .or_else(|| self.msg.clone())
            .or_else(|| self.error_description.clone())
            .unwrap_or_else(|| "unknown error".to_string())
    }
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: Value,
}

impl AuthUser {
    fn into_identity(self) -> Identity {
        let username = self
            .user_metadata
            .get("username")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or(self.email)
            .unwrap_or_default();
        Identity { id: self.id, username }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: AuthUser,
}

impl SupabaseClient {
    pub fn new(config: &BackendConfig) -> Result<Self, DatabaseError> {
        if config.supabase_url.is_empty() {
            return Err(DatabaseError::ConfigMissing("SUPABASE_URL"));
        }
        if config.supabase_service_key.is_empty() {
            return Err(DatabaseError::ConfigMissing("SUPABASE_SERVICE_KEY"));
        }
        url::Url::parse(&config.supabase_url).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;

        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        // Auth calls fall back to the service key when no anon key is set
        let anon_key = if config.supabase_anon_key.is_empty() {
            config.supabase_service_key.clone()
        } else {
            config.supabase_anon_key.clone()
        };

        Ok(Self {
            http,
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key,
            service_key: config.supabase_service_key.clone(),
        })
    }

    fn rest(&self, method: Method, table: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/rest/v1/{}", self.base_url, table))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    fn auth(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/auth/v1/{}", self.base_url, path))
            .header("apikey", &self.anon_key)
    }

    async fn rejection(response: Response) -> DatabaseError {
        let status = response.status();
        let body: PostgrestError = response.json().await.unwrap_or_default();
        let message = body.text();

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => DatabaseError::Unauthorized(message),
            StatusCode::NOT_FOUND => DatabaseError::NotFound(message),
            StatusCode::CONFLICT => DatabaseError::Conflict(message),
            _ => DatabaseError::Upstream {
                status: status.as_u16(),
                message,
            },
        }
    }

    async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> StoreResult<T> {
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }
        Ok(response.json().await?)
    }

    async fn send_empty(request: RequestBuilder) -> StoreResult<()> {
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }
        Ok(())
    }

    async fn insert_one<T: DeserializeOwned>(&self, table: &str, body: &impl serde::Serialize) -> StoreResult<T> {
        let rows: Vec<T> = Self::send_json(
            self.rest(Method::POST, table)
                .header("Prefer", "return=representation")
                .json(body),
        )
        .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| DatabaseError::QueryError(format!("insert into {} returned no row", table)))
    }

    async fn rpc<T: DeserializeOwned>(&self, function: &str, user_id: Uuid) -> StoreResult<Vec<T>> {
        debug!(function, %user_id, "Calling RPC");
        let value: Value = Self::send_json(
            self.rest(Method::POST, &format!("rpc/{}", function))
                .json(&json!({ "p_user_id": user_id })),
        )
        .await?;

        // Set-returning functions answer with an array, scalar composites with an object
        let rows = match value {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => vec![other],
        };
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(|e| DatabaseError::QueryError(e.to_string())))
            .collect()
    }
}

fn in_list(types: &[SecurityType]) -> String {
    let values: Vec<&str> = types.iter().flat_map(|t| t.db_values().iter().copied()).collect();
    format!("in.({})", values.join(","))
}

#[async_trait]
impl PortfolioStore for SupabaseClient {
    async fn find_security(
        &self,
        symbol: &str,
        security_type: SecurityType,
    ) -> StoreResult<Option<Security>> {
        let response = self
            .rest(Method::GET, SECURITIES)
            .header("Accept", "application/vnd.pgrst.object+json")
            .query(&[
                ("select", "*".to_string()),
                ("symbol", format!("eq.{}", symbol)),
                ("security_type", in_list(&[security_type])),
                ("order", "id.asc".to_string()),
                ("limit", "1".to_string()),
            ])
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(Some(response.json().await?));
        }

        let status = response.status();
        let body: PostgrestError = response.json().await.unwrap_or_default();
        if body.code.as_str() == Some(NO_ROWS) {
            return Ok(None);
        }
        Err(DatabaseError::Upstream {
            status: status.as_u16(),
            message: body.text(),
        })
    }

    async fn insert_security(&self, security: NewSecurity) -> StoreResult<Security> {
        self.insert_one(SECURITIES, &security).await
    }

    async fn securities_by_type(&self, types: &[SecurityType]) -> StoreResult<Vec<Security>> {
        Self::send_json(
            self.rest(Method::GET, SECURITIES)
                .query(&[("select", "*".to_string()), ("security_type", in_list(types))]),
        )
        .await
    }

    async fn update_security_price(&self, id: i64, price: f64, at: DateTime<Utc>) -> StoreResult<()> {
        Self::send_empty(
            self.rest(Method::PATCH, SECURITIES)
                .query(&[("id", format!("eq.{}", id))])
                .json(&json!({ "last_price": price, "last_updated": at })),
        )
        .await
    }

    async fn update_price_by_symbol(
        &self,
        symbol: &str,
        price: f64,
        at: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let rows: Vec<Value> = Self::send_json(
            self.rest(Method::PATCH, SECURITIES)
                .header("Prefer", "return=representation")
                .query(&[("symbol", format!("eq.{}", symbol)), ("select", "id".to_string())])
                .json(&json!({ "last_price": price, "last_updated": at })),
        )
        .await?;
        Ok(rows.len() as u64)
    }

    async fn insert_transaction(&self, transaction: NewTransaction) -> StoreResult<Transaction> {
        self.insert_one(TRANSACTIONS, &transaction).await
    }

    async fn transactions_for_user(&self, user_id: Uuid) -> StoreResult<Vec<TransactionWithSecurity>> {
        Self::send_json(self.rest(Method::GET, TRANSACTIONS).query(&[
            ("select", WITH_SECURITY.to_string()),
            ("user_id", format!("eq.{}", user_id)),
            ("order", "transaction_date.desc".to_string()),
        ]))
        .await
    }

    async fn transactions_for_security(
        &self,
        user_id: Uuid,
        security_id: i64,
    ) -> StoreResult<Vec<TransactionWithSecurity>> {
        Self::send_json(self.rest(Method::GET, TRANSACTIONS).query(&[
            ("select", WITH_SECURITY.to_string()),
            ("user_id", format!("eq.{}", user_id)),
            ("security_id", format!("eq.{}", security_id)),
            ("order", "transaction_date.desc".to_string()),
        ]))
        .await
    }

    async fn stock_holdings(&self, user_id: Uuid) -> StoreResult<Vec<HoldingRow>> {
        self.rpc("get_stock_holdings", user_id).await
    }

    async fn mutual_fund_holdings(&self, user_id: Uuid) -> StoreResult<Vec<HoldingRow>> {
        self.rpc("get_mutual_fund_holdings", user_id).await
    }

    async fn portfolio_summary(&self, user_id: Uuid) -> StoreResult<Option<SummaryRow>> {
        let rows: Vec<SummaryRow> = self.rpc("get_portfolio_summary", user_id).await?;
        Ok(rows.into_iter().next())
    }

    async fn health_check(&self) -> StoreResult<()> {
        Self::send_empty(
            self.rest(Method::GET, SECURITIES)
                .query(&[("select", "id"), ("limit", "1")]),
        )
        .await
    }
}

#[async_trait]
impl IdentityProvider for SupabaseClient {
    async fn sign_up(&self, username: &str, password: &str) -> StoreResult<Identity> {
        let response = self
            .auth(Method::POST, "signup")
            .json(&json!({
                "email": username,
                "password": password,
                "data": { "username": username },
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body: PostgrestError = response.json().await.unwrap_or_default();
            let message = body.text();
            if message.to_lowercase().contains("already") {
                return Err(DatabaseError::Conflict("User already exists".to_string()));
            }
            warn!(status = status.as_u16(), "Sign-up rejected by auth service");
            return Err(DatabaseError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        // With auto-confirm the user is nested next to a session, otherwise it is the body
        let mut body: Value = response.json().await?;
        let user = match body.get_mut("user") {
            Some(user) => user.take(),
            None => body,
        };
        let user: AuthUser = serde_json::from_value(user).map_err(|e| DatabaseError::QueryError(e.to_string()))?;
        Ok(user.into_identity())
    }

    async fn sign_in(&self, username: &str, password: &str) -> StoreResult<Session> {
        let response = self
            .auth(Method::POST, "token")
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": username, "password": password }))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            let body: PostgrestError = response.json().await.unwrap_or_default();
            return Err(DatabaseError::Unauthorized(body.text()));
        }
        if !status.is_success() {
            return Err(Self::rejection(response).await);
        }

        let token: TokenResponse = response.json().await?;
        Ok(Session {
            token: token.access_token,
            identity: token.user.into_identity(),
        })
    }

    async fn verify_token(&self, token: &str) -> StoreResult<Identity> {
        let response = self.auth(Method::GET, "user").bearer_auth(token).send().await?;

        if !response.status().is_success() {
            let body: PostgrestError = response.json().await.unwrap_or_default();
            return Err(DatabaseError::Unauthorized(body.text()));
        }

        let user: AuthUser = response.json().await?;
        Ok(user.into_identity())
    }
}
