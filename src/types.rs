/// Shared types used across the codebase

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of tradable instrument stored in `securities_master`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityType {
    Stock,
    #[serde(alias = "MF")]
    MutualFund,
}

impl SecurityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityType::Stock => "STOCK",
            SecurityType::MutualFund => "MUTUAL_FUND",
        }
    }

    /// Column values that identify this type in the database. Older rows
    /// store mutual funds as `MF`.
    pub fn db_values(&self) -> &'static [&'static str] {
        match self {
            SecurityType::Stock => &["STOCK"],
            SecurityType::MutualFund => &["MF", "MUTUAL_FUND"],
        }
    }
}

impl fmt::Display for SecurityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecurityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STOCK" => Ok(SecurityType::Stock),
            "MF" | "MUTUAL_FUND" => Ok(SecurityType::MutualFund),
            other => Err(format!("Unknown security type '{}'", other)),
        }
    }
}

/// Direction of a recorded transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    #[default]
    Buy,
    Sell,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Buy => "BUY",
            TransactionType::Sell => "SELL",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(TransactionType::Buy),
            "SELL" => Ok(TransactionType::Sell),
            other => Err(format!("Unknown transaction type '{}'", other)),
        }
    }
}

/// Where a transaction was recorded from
pub mod source {
    pub const MANUAL: &str = "MANUAL";
    pub const CSV_UPLOAD: &str = "CSV_UPLOAD";
    pub const MOTILAL_API: &str = "MOTILAL_API";
}
