pub mod portfolio_service;
pub mod transaction_service;
pub mod user_service;

use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::cache::TtlCache;
use crate::config::CacheConfig;
use crate::database::models::TransactionWithSecurity;
use crate::database::DatabaseError;
use crate::import::ImportError;
use crate::providers::ProviderError;

pub use portfolio_service::{EnrichedHolding, PortfolioOverview, PortfolioService, PortfolioSummary, PriceRefresh};
pub use transaction_service::{CreateTransactionRequest, SyncSummary, TransactionService};
pub use user_service::{Credentials, UserService};

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Request body failed schema validation
    #[error("{0}")]
    Validation(String),

    /// Well-formed request with unusable values
    #[error("{0}")]
    InvalidInput(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Import(#[from] ImportError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Per-user response caches. Transaction writes drop both entries for the
/// writing user.
pub struct UserCaches {
    pub overview: TtlCache<Uuid, Arc<PortfolioOverview>>,
    pub transactions: TtlCache<Uuid, Arc<Vec<TransactionWithSecurity>>>,
}

impl UserCaches {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            overview: TtlCache::new(config.portfolio_ttl(), config.portfolio_cooldown()),
            transactions: TtlCache::new(config.transactions_ttl(), config.transactions_cooldown()),
        }
    }

    pub async fn invalidate_user(&self, user_id: &Uuid) {
        self.overview.invalidate(user_id).await;
        self.transactions.invalidate(user_id).await;
    }
}
