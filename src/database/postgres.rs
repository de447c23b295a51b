use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::models::{
    HoldingRow, Identity, NewSecurity, NewTransaction, Security, Session, SummaryRow, Transaction,
    TransactionWithSecurity, UserRow,
};
use super::{DatabaseError, DatabaseManager, IdentityProvider, PortfolioStore, StoreResult};
use crate::auth;
use crate::config::SecurityConfig;
use crate::types::{SecurityType, TransactionType};

const SECURITY_COLUMNS: &str =
    "id, symbol, name, security_type, isin, exchange, last_price, last_updated, created_at";

const TRANSACTION_WITH_SECURITY: &str = "SELECT t.id, t.user_id, t.security_id, t.transaction_type,
        t.transaction_date, t.quantity, t.price_per_unit, t.total_amount, t.source, t.created_at,
        s.id AS s_id, s.symbol AS s_symbol, s.name AS s_name, s.security_type AS s_security_type,
        s.isin AS s_isin, s.exchange AS s_exchange, s.last_price AS s_last_price,
        s.last_updated AS s_last_updated, s.created_at AS s_created_at
    FROM transactions t
    LEFT JOIN securities_master s ON s.id = t.security_id";

/// Self-hosted Postgres store. Holdings come from the SQL functions
/// installed by the migrations, identity from the local `users` table.
pub struct PgStore {
    pool: PgPool,
    security: SecurityConfig,
}

impl PgStore {
    pub fn new(pool: PgPool, security: SecurityConfig) -> Self {
        Self { pool, security }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn holdings(&self, function: &str, user_id: Uuid) -> StoreResult<Vec<HoldingRow>> {
        let sql = format!("SELECT * FROM {}($1)", function);
        let rows = sqlx::query(&sql).bind(user_id).fetch_all(&self.pool).await?;
        rows.iter().map(holding_from_row).collect()
    }
}

fn parse_security_type(raw: &str) -> StoreResult<SecurityType> {
    raw.parse().map_err(DatabaseError::QueryError)
}

fn security_from_row(row: &PgRow, prefix: &str) -> StoreResult<Security> {
    let col = |name: &str| format!("{}{}", prefix, name);
    let security_type: String = row.try_get(col("security_type").as_str())?;

    Ok(Security {
        id: row.try_get(col("id").as_str())?,
        symbol: row.try_get(col("symbol").as_str())?,
        name: row.try_get(col("name").as_str())?,
        security_type: parse_security_type(&security_type)?,
        isin: row.try_get(col("isin").as_str())?,
        exchange: row.try_get(col("exchange").as_str())?,
        last_price: row.try_get(col("last_price").as_str())?,
        last_updated: row.try_get(col("last_updated").as_str())?,
        created_at: row.try_get(col("created_at").as_str())?,
    })
}

fn transaction_from_row(row: &PgRow) -> StoreResult<Transaction> {
    let transaction_type: String = row.try_get("transaction_type")?;

    Ok(Transaction {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        security_id: row.try_get("security_id")?,
        transaction_type: transaction_type.parse::<TransactionType>().map_err(DatabaseError::QueryError)?,
        transaction_date: row.try_get("transaction_date")?,
        quantity: row.try_get("quantity")?,
        price_per_unit: row.try_get("price_per_unit")?,
        total_amount: row.try_get("total_amount")?,
        source: row.try_get("source")?,
        created_at: row.try_get("created_at")?,
    })
}

fn joined_from_row(row: &PgRow) -> StoreResult<TransactionWithSecurity> {
    let security_id: Option<i64> = row.try_get("s_id")?;
    let security = match security_id {
        Some(_) => Some(security_from_row(row, "s_")?),
        None => None,
    };
    Ok(TransactionWithSecurity {
        transaction: transaction_from_row(row)?,
        security,
    })
}

fn holding_from_row(row: &PgRow) -> StoreResult<HoldingRow> {
    Ok(HoldingRow {
        security_id: row.try_get("security_id")?,
        symbol: row.try_get("symbol")?,
        name: row.try_get("name")?,
        current_price: row.try_get("current_price")?,
        total_quantity: row.try_get("total_quantity")?,
        avg_price: row.try_get("avg_price")?,
        total_investment: row.try_get("total_investment")?,
        holding_days: row.try_get::<Option<i64>, _>("holding_days")?.unwrap_or(0),
        current_value: row.try_get("current_value")?,
        last_transaction_date: row.try_get("last_transaction_date")?,
        extra: Default::default(),
    })
}

fn conflict_on_unique(err: sqlx::Error, message: String) -> DatabaseError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return DatabaseError::Conflict(message);
        }
    }
    DatabaseError::Sqlx(err)
}

fn type_values(types: &[SecurityType]) -> Vec<String> {
    types
        .iter()
        .flat_map(|t| t.db_values().iter().map(|v| v.to_string()))
        .collect()
}

#[async_trait]
impl PortfolioStore for PgStore {
    async fn find_security(
        &self,
        symbol: &str,
        security_type: SecurityType,
    ) -> StoreResult<Option<Security>> {
        let sql = format!(
            "SELECT {} FROM securities_master WHERE symbol = $1 AND security_type = ANY($2) ORDER BY id LIMIT 1",
            SECURITY_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(symbol)
            .bind(type_values(&[security_type]))
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(|r| security_from_row(r, "")).transpose()
    }

    async fn insert_security(&self, security: NewSecurity) -> StoreResult<Security> {
        let sql = format!(
            "INSERT INTO securities_master (symbol, name, security_type, isin, exchange, last_price, last_updated)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {}",
            SECURITY_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(&security.symbol)
            .bind(&security.name)
            .bind(security.security_type.as_str())
            .bind(&security.isin)
            .bind(&security.exchange)
            .bind(security.last_price)
            .bind(security.last_updated)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, format!("security {} already exists", security.symbol)))?;

        security_from_row(&row, "")
    }

    async fn securities_by_type(&self, types: &[SecurityType]) -> StoreResult<Vec<Security>> {
        let sql = format!(
            "SELECT {} FROM securities_master WHERE security_type = ANY($1) ORDER BY id",
            SECURITY_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(type_values(types))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(|r| security_from_row(r, "")).collect()
    }

    async fn update_security_price(&self, id: i64, price: f64, at: DateTime<Utc>) -> StoreResult<()> {
        let result = sqlx::query("UPDATE securities_master SET last_price = $1, last_updated = $2 WHERE id = $3")
            .bind(price)
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("security {}", id)));
        }
        Ok(())
    }

    async fn update_price_by_symbol(
        &self,
        symbol: &str,
        price: f64,
        at: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let result =
            sqlx::query("UPDATE securities_master SET last_price = $1, last_updated = $2 WHERE symbol = $3")
                .bind(price)
                .bind(at)
                .bind(symbol)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }

    async fn insert_transaction(&self, transaction: NewTransaction) -> StoreResult<Transaction> {
        let row = sqlx::query(
            "INSERT INTO transactions
                (user_id, security_id, transaction_type, transaction_date, quantity, price_per_unit, total_amount, source)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING id, user_id, security_id, transaction_type, transaction_date,
                       quantity, price_per_unit, total_amount, source, created_at",
        )
        .bind(transaction.user_id)
        .bind(transaction.security_id)
        .bind(transaction.transaction_type.as_str())
        .bind(transaction.transaction_date)
        .bind(transaction.quantity)
        .bind(transaction.price_per_unit)
        .bind(transaction.total_amount)
        .bind(&transaction.source)
        .fetch_one(&self.pool)
        .await?;

        transaction_from_row(&row)
    }

    async fn transactions_for_user(&self, user_id: Uuid) -> StoreResult<Vec<TransactionWithSecurity>> {
        let sql = format!(
            "{} WHERE t.user_id = $1 ORDER BY t.transaction_date DESC",
            TRANSACTION_WITH_SECURITY
        );
        let rows = sqlx::query(&sql).bind(user_id).fetch_all(&self.pool).await?;
        rows.iter().map(joined_from_row).collect()
    }

    async fn transactions_for_security(
        &self,
        user_id: Uuid,
        security_id: i64,
    ) -> StoreResult<Vec<TransactionWithSecurity>> {
        let sql = format!(
            "{} WHERE t.user_id = $1 AND t.security_id = $2 ORDER BY t.transaction_date DESC",
            TRANSACTION_WITH_SECURITY
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(security_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(joined_from_row).collect()
    }

    async fn stock_holdings(&self, user_id: Uuid) -> StoreResult<Vec<HoldingRow>> {
        self.holdings("get_stock_holdings", user_id).await
    }

    async fn mutual_fund_holdings(&self, user_id: Uuid) -> StoreResult<Vec<HoldingRow>> {
        self.holdings("get_mutual_fund_holdings", user_id).await
    }

    async fn portfolio_summary(&self, user_id: Uuid) -> StoreResult<Option<SummaryRow>> {
        let row = sqlx::query("SELECT total_investment, current_value FROM get_portfolio_summary($1)")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| -> StoreResult<SummaryRow> {
            Ok(SummaryRow {
                total_investment: r.try_get("total_investment")?,
                current_value: r.try_get("current_value")?,
            })
        })
        .transpose()
    }

    async fn health_check(&self) -> StoreResult<()> {
        DatabaseManager::health_check(&self.pool).await
    }
}

#[async_trait]
impl IdentityProvider for PgStore {
    async fn sign_up(&self, username: &str, password: &str) -> StoreResult<Identity> {
        let existing = sqlx::query("SELECT id FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        if existing.is_some() {
            return Err(DatabaseError::Conflict("User already exists".to_string()));
        }

        let password_hash =
            auth::hash_password(password).map_err(|e| DatabaseError::QueryError(e.to_string()))?;
        let id = Uuid::new_v4();

        sqlx::query("INSERT INTO users (id, username, password_hash) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(username)
            .bind(&password_hash)
            .execute(&self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, "User already exists".to_string()))?;

        Ok(Identity {
            id,
            username: username.to_string(),
        })
    }

    async fn sign_in(&self, username: &str, password: &str) -> StoreResult<Session> {
        let user: UserRow = sqlx::query_as(
            "SELECT id, username, password_hash, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::Unauthorized("User does not exist".to_string()))?;

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

        let row = sqlx::query("SELECT id, username FROM users WHERE id = $1")
            .bind(claims.sub)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::Unauthorized("User not found".to_string()))?;

        Ok(Identity {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutual_fund_binds_both_spellings() {
        assert_eq!(type_values(&[SecurityType::MutualFund]), vec!["MF", "MUTUAL_FUND"]);
        assert_eq!(
            type_values(&[SecurityType::Stock, SecurityType::MutualFund]),
            vec!["STOCK", "MF", "MUTUAL_FUND"]
        );
    }

    #[test]
    fn stored_type_spellings_parse() {
        assert_eq!(parse_security_type("MF").unwrap(), SecurityType::MutualFund);
        assert!(matches!(parse_security_type("BOND"), Err(DatabaseError::QueryError(_))));
    }
}
