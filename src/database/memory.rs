use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::{
    HoldingRow, Identity, NewSecurity, NewTransaction, Security, Session, SummaryRow, Transaction,
    TransactionWithSecurity, UserRow,
};
use super::{DatabaseError, IdentityProvider, PortfolioStore, StoreResult};
use crate::auth;
use crate::config::SecurityConfig;
use crate::types::{SecurityType, TransactionType};

#[derive(Default)]
struct Tables {
    securities: Vec<Security>,
    transactions: Vec<Transaction>,
    users: HashMap<String, UserRow>,
    next_security_id: i64,
    next_transaction_id: i64,
}

/// In-process store used by `BACKEND=memory` and the test suite
pub struct MemoryStore {
    tables: RwLock<Tables>,
    security: SecurityConfig,
}

impl MemoryStore {
    pub fn new(security: SecurityConfig) -> Self {
        Self {
            tables: RwLock::new(Tables {
                next_security_id: 1,
                next_transaction_id: 1,
                ..Tables::default()
            }),
            security,
        }
    }

    async fn joined(&self, user_id: Uuid, security_id: Option<i64>) -> Vec<TransactionWithSecurity> {
        let tables = self.tables.read().await;
        let mut rows: Vec<TransactionWithSecurity> = tables
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id)
            .filter(|t| security_id.map_or(true, |id| t.security_id == id))
            .map(|t| TransactionWithSecurity {
                transaction: t.clone(),
                security: tables.securities.iter().find(|s| s.id == t.security_id).cloned(),
            })
            .collect();
        rows.sort_by(|a, b| b.transaction.transaction_date.cmp(&a.transaction.transaction_date));
        rows
    }

    async fn holdings(&self, user_id: Uuid, types: &[SecurityType]) -> Vec<HoldingRow> {
        let tables = self.tables.read().await;
        aggregate_holdings(&tables.securities, &tables.transactions, user_id, types, Utc::now())
    }
}

// Net quantities at or below this are treated as closed positions
pub(crate) const QUANTITY_EPSILON: f64 = 1e-9;

/// Folds a user's transactions into one row per security.
pub(crate) fn aggregate_holdings(
    securities: &[Security],
    transactions: &[Transaction],
    user_id: Uuid,
    types: &[SecurityType],
    now: DateTime<Utc>,
) -> Vec<HoldingRow> {
    let mut rows = Vec::new();

    for security in securities.iter().filter(|s| types.contains(&s.security_type)) {
        let txs: Vec<&Transaction> = transactions
            .iter()
            .filter(|t| t.user_id == user_id && t.security_id == security.id)
            .collect();
        if txs.is_empty() {
            continue;
        }

        let (mut bought, mut sold, mut buy_amount) = (0.0, 0.0, 0.0);
        for t in &txs {
            match t.transaction_type {
                TransactionType::Buy => {
                    bought += t.quantity;
                    buy_amount += t.total_amount;
                }
                TransactionType::Sell => sold += t.quantity,
            }
        }

        let quantity = bought - sold;
        if quantity <= QUANTITY_EPSILON {
            continue;
        }

        let avg_price = if bought > 0.0 { buy_amount / bought } else { 0.0 };
        let current_price = security.last_price.unwrap_or(avg_price);
        let first = txs.iter().map(|t| t.transaction_date).min();
        let last = txs.iter().map(|t| t.transaction_date).max();

        rows.push(HoldingRow {
            security_id: Some(security.id),
            symbol: security.symbol.clone(),
            name: security.name.clone(),
            current_price,
            total_quantity: quantity,
            avg_price,
            total_investment: quantity * avg_price,
            holding_days: first.map_or(0, |d| (now - d).num_days().max(0)),
            current_value: quantity * current_price,
            last_transaction_date: last,
            extra: Default::default(),
        });
    }

    rows.sort_by(|a, b| b.current_value.total_cmp(&a.current_value));
    rows
}

#[async_trait]
impl PortfolioStore for MemoryStore {
    async fn find_security(
        &self,
        symbol: &str,
        security_type: SecurityType,
    ) -> StoreResult<Option<Security>> {
        let tables = self.tables.read().await;
        Ok(tables
            .securities
            .iter()
            .find(|s| s.symbol == symbol && s.security_type == security_type)
            .cloned())
    }

    async fn insert_security(&self, security: NewSecurity) -> StoreResult<Security> {
        let mut tables = self.tables.write().await;
        if tables
            .securities
            .iter()
            .any(|s| s.symbol == security.symbol && s.security_type == security.security_type)
        {
            return Err(DatabaseError::Conflict(format!("security {} already exists", security.symbol)));
        }

        let row = Security {
            id: tables.next_security_id,
            symbol: security.symbol,
            name: security.name,
            security_type: security.security_type,
            isin: security.isin,
            exchange: security.exchange,
            last_price: security.last_price,
            last_updated: security.last_updated,
            created_at: Some(Utc::now()),
        };
        tables.next_security_id += 1;
        tables.securities.push(row.clone());
        Ok(row)
    }

    async fn securities_by_type(&self, types: &[SecurityType]) -> StoreResult<Vec<Security>> {
        let tables = self.tables.read().await;
        Ok(tables
            .securities
            .iter()
            .filter(|s| types.contains(&s.security_type))
            .cloned()
            .collect())
    }

    async fn update_security_price(&self, id: i64, price: f64, at: DateTime<Utc>) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let security = tables
            .securities
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| DatabaseError::NotFound(format!("security {}", id)))?;
        security.last_price = Some(price);
        security.last_updated = Some(at);
        Ok(())
    }

    async fn update_price_by_symbol(
        &self,
        symbol: &str,
        price: f64,
        at: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;
        let mut updated = 0;
        for security in tables.securities.iter_mut().filter(|s| s.symbol == symbol) {
            security.last_price = Some(price);
            security.last_updated = Some(at);
            updated += 1;
        }
        Ok(updated)
    }

    async fn insert_transaction(&self, transaction: NewTransaction) -> StoreResult<Transaction> {
        let mut tables = self.tables.write().await;
        if !tables.securities.iter().any(|s| s.id == transaction.security_id) {
            return Err(DatabaseError::QueryError(format!(
                "security {} does not exist",
                transaction.security_id
            )));
        }

        let row = Transaction {
            id: tables.next_transaction_id,
            user_id: transaction.user_id,
            security_id: transaction.security_id,
            transaction_type: transaction.transaction_type,
            transaction_date: transaction.transaction_date,
            quantity: transaction.quantity,
            price_per_unit: transaction.price_per_unit,
            total_amount: transaction.total_amount,
            source: transaction.source,
            created_at: Some(Utc::now()),
        };
        tables.next_transaction_id += 1;
        tables.transactions.push(row.clone());
        Ok(row)
    }

    async fn transactions_for_user(&self, user_id: Uuid) -> StoreResult<Vec<TransactionWithSecurity>> {
        Ok(self.joined(user_id, None).await)
    }

    async fn transactions_for_security(
        &self,
        user_id: Uuid,
        security_id: i64,
    ) -> StoreResult<Vec<TransactionWithSecurity>> {
        Ok(self.joined(user_id, Some(security_id)).await)
    }

    async fn stock_holdings(&self, user_id: Uuid) -> StoreResult<Vec<HoldingRow>> {
        Ok(self.holdings(user_id, &[SecurityType::Stock]).await)
    }

    async fn mutual_fund_holdings(&self, user_id: Uuid) -> StoreResult<Vec<HoldingRow>> {
        Ok(self.holdings(user_id, &[SecurityType::MutualFund]).await)
    }

    async fn portfolio_summary(&self, user_id: Uuid) -> StoreResult<Option<SummaryRow>> {
        let rows = self
            .holdings(user_id, &[SecurityType::Stock, SecurityType::MutualFund])
            .await;
        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(SummaryRow {
            total_investment: rows.iter().map(|r| r.total_investment).sum(),
            current_value: rows.iter().map(|r| r.current_value).sum(),
        }))
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for MemoryStore {
    async fn sign_up(&self, username: &str, password: &str) -> StoreResult<Identity> {
        let password_hash =
            auth::hash_password(password).map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        let mut tables = self.tables.write().await;
        if tables.users.contains_key(username) {
            return Err(DatabaseError::Conflict("User already exists".to_string()));
        }

        let user = UserRow {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash,
            created_at: Utc::now(),
        };
        let identity = Identity {
            id: user.id,
            username: user.username.clone(),
        };
        tables.users.insert(username.to_string(), user);
        Ok(identity)
    }

    async fn sign_in(&self, username: &str, password: &str) -> StoreResult<Session> {
        let user = {
            let tables = self.tables.read().await;
            tables
                .users
                .get(username)
                .cloned()
                .ok_or_else(|| DatabaseError::Unauthorized("User does not exist".to_string()))?
        };

        auth::verify_password(password, &user.password_hash)
            .map_err(|e| DatabaseError::Unauthorized(e.to_string()))?;

        let token = auth::generate_jwt(&self.security, user.id, &user.username)
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        Ok(Session {
            token,
            identity: Identity {
                id: user.id,
                username: user.username,
            },
        })
    }

    async fn verify_token(&self, token: &str) -> StoreResult<Identity> {
        let claims = auth::validate_jwt(&self.security, token)
            .map_err(|e| DatabaseError::Unauthorized(e.to_string()))?;

        let tables = self.tables.read().await;
        match tables.users.get(&claims.username) {
            Some(user) if user.id == claims.sub => Ok(Identity {
                id: user.id,
                username: user.username.clone(),
            }),
            _ => Err(DatabaseError::Unauthorized("User not found".to_string())),
        }
    }
}
