use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Security;
use crate::types::TransactionType;

/// Row of `transactions`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: Uuid,
    pub security_id: i64,
    pub transaction_type: TransactionType,
    #[serde(deserialize_with = "date_or_datetime")]
    pub transaction_date: DateTime<Utc>,
    pub quantity: f64,
    pub price_per_unit: f64,
    pub total_amount: f64,
    pub source: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Transaction row with its security embedded, as PostgREST returns it
/// for `select=*,security:securities_master(*)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionWithSecurity {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub security: Option<Security>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewTransaction {
    pub user_id: Uuid,
    pub security_id: i64,
    pub transaction_type: TransactionType,
    pub transaction_date: DateTime<Utc>,
    pub quantity: f64,
    pub price_per_unit: f64,
    pub total_amount: f64,
    pub source: String,
}

// `transaction_date` may be a `date` column on older schemas
fn date_or_datetime<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(dt.and_utc());
    }
    chrono::NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| serde::de::Error::custom(format!("invalid transaction_date '{}'", raw)))
}
