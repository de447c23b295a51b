pub mod manager;
pub mod memory;
pub mod migrations;
pub mod models;
pub mod postgres;
pub mod supabase;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::types::SecurityType;
use models::{
    HoldingRow, Identity, NewSecurity, NewTransaction, Security, Session, SummaryRow, Transaction,
    TransactionWithSecurity,
};

pub use manager::{DatabaseError, DatabaseManager};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use supabase::SupabaseClient;

pub type StoreResult<T> = Result<T, DatabaseError>;

/// Row access for securities, transactions and the holdings aggregates
#[async_trait]
pub trait PortfolioStore: Send + Sync {
    async fn find_security(
        &self,
        symbol: &str,
        security_type: SecurityType,
    ) -> StoreResult<Option<Security>>;

    async fn insert_security(&self, security: NewSecurity) -> StoreResult<Security>;

    async fn securities_by_type(&self, types: &[SecurityType]) -> StoreResult<Vec<Security>>;

    async fn update_security_price(&self, id: i64, price: f64, at: DateTime<Utc>) -> StoreResult<()>;

    /// Returns the number of securities updated
    async fn update_price_by_symbol(
        &self,
        symbol: &str,
        price: f64,
        at: DateTime<Utc>,
    ) -> StoreResult<u64>;

    async fn insert_transaction(&self, transaction: NewTransaction) -> StoreResult<Transaction>;

    /// Newest first
    async fn transactions_for_user(&self, user_id: Uuid) -> StoreResult<Vec<TransactionWithSecurity>>;

    /// Newest first, restricted to the caller's rows
    async fn transactions_for_security(
        &self,
        user_id: Uuid,
        security_id: i64,
    ) -> StoreResult<Vec<TransactionWithSecurity>>;

    async fn stock_holdings(&self, user_id: Uuid) -> StoreResult<Vec<HoldingRow>>;

    async fn mutual_fund_holdings(&self, user_id: Uuid) -> StoreResult<Vec<HoldingRow>>;

    async fn portfolio_summary(&self, user_id: Uuid) -> StoreResult<Option<SummaryRow>>;

    async fn health_check(&self) -> StoreResult<()>;
}

/// Password sign-up/sign-in and bearer token verification
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(&self, username: &str, password: &str) -> StoreResult<Identity>;

    async fn sign_in(&self, username: &str, password: &str) -> StoreResult<Session>;

    async fn verify_token(&self, token: &str) -> StoreResult<Identity>;
}
