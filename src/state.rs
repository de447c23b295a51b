//! Shared application state handed to every handler.
//!
//! Cloning is cheap: every field is an `Arc` or a pool handle.

use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

use crate::config::{AppConfig, BackendKind};
use crate::database::{
    DatabaseError, DatabaseManager, IdentityProvider, MemoryStore, PgStore, PortfolioStore, SupabaseClient,
};
use crate::jobs::JobContext;
use crate::middleware::RateLimiter;
use crate::providers::{
    AlphaVantageProvider, BrokerHoldingsProvider, IndianApiProvider, MotilalOswalProvider, NavProvider,
    QuoteProvider,
};
use crate::services::{PortfolioService, TransactionService, UserCaches, UserService};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn PortfolioStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub quotes: Arc<dyn QuoteProvider>,
    pub navs: Arc<dyn NavProvider>,
    pub users: Arc<UserService>,
    pub portfolio: Arc<PortfolioService>,
    pub transactions: Arc<TransactionService>,
    pub rate_limiter: Arc<RateLimiter>,
    /// Present for the self-hosted Postgres backend only
    pub db_pool: Option<PgPool>,
}

/// Store, identity and market-data handles a state is built from
pub struct Backends {
    pub store: Arc<dyn PortfolioStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub quotes: Arc<dyn QuoteProvider>,
    pub navs: Arc<dyn NavProvider>,
    pub broker: Arc<dyn BrokerHoldingsProvider>,
}

impl AppState {
    /// Connects the configured backend and the HTTP providers
    pub async fn from_config(config: AppConfig) -> Result<Self, DatabaseError> {
        let mut db_pool = None;

        let (store, identity): (Arc<dyn PortfolioStore>, Arc<dyn IdentityProvider>) = match config.backend.kind {
            BackendKind::Supabase => {
                let client = Arc::new(SupabaseClient::new(&config.backend)?);
                (client.clone(), client)
            }
            BackendKind::Postgres => {
                let pool = DatabaseManager::connect(&config.backend).await?;
                let store = Arc::new(PgStore::new(pool.clone(), config.security.clone()));
                db_pool = Some(pool);
                (store.clone(), store)
            }
            BackendKind::Memory => {
                let store = Arc::new(MemoryStore::new(config.security.clone()));
                (store.clone(), store)
            }
        };
        info!(backend = ?config.backend.kind, "Store ready");

        let backends = Backends {
            store,
            identity,
            quotes: Arc::new(AlphaVantageProvider::new(&config.providers)),
            navs: Arc::new(IndianApiProvider::new(&config.providers)),
            broker: Arc::new(MotilalOswalProvider::new(&config.providers)),
        };

        let mut state = Self::from_parts(config, backends);
        state.db_pool = db_pool;
        Ok(state)
    }

    pub fn from_parts(config: AppConfig, backends: Backends) -> Self {
        let caches = Arc::new(UserCaches::new(&config.cache));

        Self {
            users: Arc::new(UserService::new(backends.identity.clone())),
            portfolio: Arc::new(PortfolioService::new(
                backends.store.clone(),
                backends.quotes.clone(),
                caches.clone(),
            )),
            transactions: Arc::new(TransactionService::new(backends.store.clone(), backends.broker, caches)),
            rate_limiter: Arc::new(RateLimiter::from_config(&config.api)),
            config: Arc::new(config),
            store: backends.store,
            identity: backends.identity,
            quotes: backends.quotes,
            navs: backends.navs,
            db_pool: None,
        }
    }

    pub fn job_context(&self) -> JobContext {
        JobContext {
            store: self.store.clone(),
            quotes: self.quotes.clone(),
            navs: self.navs.clone(),
        }
    }
}
