use sqlx::{PgPool, Row};
use tracing::info;

use super::memory::QUANTITY_EPSILON;
use super::DatabaseError;

/// A named schema change, applied once and recorded in `migrations`
pub struct Migration {
    pub name: &'static str,
    pub statements: Vec<String>,
}

const LEDGER: &str = "CREATE TABLE IF NOT EXISTS migrations (
    id BIGSERIAL PRIMARY KEY,
    name VARCHAR(255) NOT NULL UNIQUE,
    executed_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)";

// Column list shared by the holdings functions
const HOLDING_COLUMNS: &str = "security_id BIGINT,
    symbol TEXT,
    name TEXT,
    current_price DOUBLE PRECISION,
    total_quantity DOUBLE PRECISION,
    avg_price DOUBLE PRECISION,
    total_investment DOUBLE PRECISION,
    holding_days BIGINT,
    current_value DOUBLE PRECISION,
    last_transaction_date TIMESTAMPTZ";

/// `get_holdings_by_type`, dropping rows whose net quantity is at or below
/// `min_quantity`
fn holdings_by_type(min_quantity: f64) -> String {
    format!(
        "CREATE OR REPLACE FUNCTION get_holdings_by_type(p_user_id UUID, p_types TEXT[])
        RETURNS TABLE ({HOLDING_COLUMNS})
        LANGUAGE sql STABLE AS $$
            WITH agg AS (
                SELECT s.id, s.symbol, s.name, s.last_price,
                    SUM(CASE WHEN t.transaction_type = 'BUY' THEN t.quantity ELSE 0 END) AS bought,
                    SUM(CASE WHEN t.transaction_type = 'SELL' THEN t.quantity ELSE 0 END) AS sold,
                    SUM(CASE WHEN t.transaction_type = 'BUY' THEN t.total_amount ELSE 0 END) AS buy_amount,
                    MIN(t.transaction_date) AS first_date,
                    MAX(t.transaction_date) AS last_date
                FROM transactions t
                JOIN securities_master s ON s.id = t.security_id
                WHERE t.user_id = p_user_id AND s.security_type = ANY(p_types)
                GROUP BY s.id, s.symbol, s.name, s.last_price
            ), h AS (
                SELECT agg.*,
                    bought - sold AS qty,
                    CASE WHEN bought > 0 THEN buy_amount / bought ELSE 0 END AS avg
                FROM agg
            )
            SELECT id, symbol, name,
                COALESCE(last_price, avg),
                qty,
                avg,
                qty * avg,
                GREATEST(EXTRACT(DAY FROM NOW() - first_date), 0)::BIGINT,
                qty * COALESCE(last_price, avg),
                last_date
            FROM h
            WHERE qty > {min_quantity}
            ORDER BY qty * COALESCE(last_price, avg) DESC
        $$"
    )
}

/// Every migration in application order
pub fn all() -> Vec<Migration> {
    vec![
        Migration {
            name: "001_core_tables",
            statements: vec![
                "CREATE TABLE IF NOT EXISTS securities_master (
                    id BIGSERIAL PRIMARY KEY,
                    symbol TEXT NOT NULL,
                    name TEXT NOT NULL,
                    security_type TEXT NOT NULL CHECK (security_type IN ('STOCK', 'MF', 'MUTUAL_FUND')),
                    isin TEXT,
                    exchange TEXT,
                    last_price DOUBLE PRECISION,
                    last_updated TIMESTAMPTZ,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    UNIQUE (symbol, security_type)
                )"
                .to_string(),
                "CREATE TABLE IF NOT EXISTS transactions (
                    id BIGSERIAL PRIMARY KEY,
                    user_id UUID NOT NULL,
                    security_id BIGINT NOT NULL REFERENCES securities_master(id),
                    transaction_type TEXT NOT NULL CHECK (transaction_type IN ('BUY', 'SELL')),
                    transaction_date TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    quantity DOUBLE PRECISION NOT NULL CHECK (quantity > 0),
                    price_per_unit DOUBLE PRECISION NOT NULL CHECK (price_per_unit > 0),
                    total_amount DOUBLE PRECISION NOT NULL,
                    source TEXT NOT NULL DEFAULT 'MANUAL',
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )"
                .to_string(),
                "CREATE INDEX IF NOT EXISTS transactions_user_date_idx
                    ON transactions (user_id, transaction_date DESC)"
                    .to_string(),
                "CREATE INDEX IF NOT EXISTS transactions_security_idx ON transactions (security_id)".to_string(),
            ],
        },
        Migration {
            name: "002_users",
            statements: vec!["CREATE TABLE IF NOT EXISTS users (
                    id UUID PRIMARY KEY,
                    username TEXT NOT NULL UNIQUE,
                    password_hash TEXT NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )"
            .to_string()],
        },
        Migration {
            name: "003_holdings_functions",
            statements: vec![
                holdings_by_type(0.0),
                format!(
                    "CREATE OR REPLACE FUNCTION get_stock_holdings(p_user_id UUID)
                    RETURNS TABLE ({HOLDING_COLUMNS})
                    LANGUAGE sql STABLE AS $$
                        SELECT * FROM get_holdings_by_type(p_user_id, ARRAY['STOCK'])
                    $$"
                ),
                format!(
                    "CREATE OR REPLACE FUNCTION get_mutual_fund_holdings(p_user_id UUID)
                    RETURNS TABLE ({HOLDING_COLUMNS})
                    LANGUAGE sql STABLE AS $$
                        SELECT * FROM get_holdings_by_type(p_user_id, ARRAY['MF', 'MUTUAL_FUND'])
                    $$"
                ),
                "CREATE OR REPLACE FUNCTION get_portfolio_summary(p_user_id UUID)
                RETURNS TABLE (total_investment DOUBLE PRECISION, current_value DOUBLE PRECISION)
                LANGUAGE sql STABLE AS $$
                    SELECT COALESCE(SUM(h.total_investment), 0), COALESCE(SUM(h.current_value), 0)
                    FROM get_holdings_by_type(p_user_id, ARRAY['STOCK', 'MF', 'MUTUAL_FUND']) h
                $$"
                .to_string(),
            ],
        },
        Migration {
            name: "004_holdings_quantity_epsilon",
            statements: vec![holdings_by_type(QUANTITY_EPSILON)],
        },
    ]
}

/// Migrations whose names are not in `applied`, in order
pub fn pending<'a>(migrations: &'a [Migration], applied: &[String]) -> Vec<&'a Migration> {
    migrations
        .iter()
        .filter(|m| !applied.iter().any(|name| name == m.name))
        .collect()
}

/// Creates the ledger and applies pending migrations, each in its own
/// transaction. Returns the names applied by this run.
pub async fn run(pool: &PgPool) -> Result<Vec<&'static str>, DatabaseError> {
    sqlx::query(LEDGER).execute(pool).await?;

    let applied: Vec<String> = sqlx::query("SELECT name FROM migrations ORDER BY id")
        .fetch_all(pool)
        .await?
        .iter()
        .map(|row| row.try_get("name"))
        .collect::<Result<_, _>>()?;

    let migrations = all();
    let mut executed = Vec::new();

    for migration in pending(&migrations, &applied) {
        let mut tx = pool.begin().await?;
        for statement in &migration.statements {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| DatabaseError::MigrationError(format!("{}: {}", migration.name, e)))?;
        }
        sqlx::query("INSERT INTO migrations (name) VALUES ($1)")
            .bind(migration.name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(migration = migration.name, "Applied migration");
        executed.push(migration.name);
    }

    if executed.is_empty() {
        info!("Database schema is up to date");
    }
    Ok(executed)
}
