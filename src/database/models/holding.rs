use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One row of the holdings RPCs (`get_stock_holdings`,
/// `get_mutual_fund_holdings`). Columns not modelled here are kept in
/// `extra` and serialized back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_id: Option<i64>,
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub current_price: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total_quantity: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub avg_price: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total_investment: f64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub holding_days: i64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub current_value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transaction_date: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// First row of `get_portfolio_summary`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total_investment: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub current_value: f64,
}

// Postgres numeric columns come back from PostgREST as strings or numbers
// depending on precision. Null and unparsable values read as 0.
fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}
