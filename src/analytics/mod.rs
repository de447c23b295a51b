//! Derived holding and portfolio metrics.
//!
//! Everything here is pure arithmetic over the rows the store returns.
//! Non-finite inputs (NaN, infinities) are read as zero so a single bad
//! price never poisons a portfolio total.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::database::models::{HoldingRow, SummaryRow};

const MS_PER_DAY: i64 = 86_400_000;

/// How long ago a holding was last traded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgingBand {
    Recent,
    Medium,
    Long,
}

impl AgingBand {
    pub fn from_days(days: i64) -> Self {
        if days > 365 {
            AgingBand::Long
        } else if days > 180 {
            AgingBand::Medium
        } else {
            AgingBand::Recent
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoldingMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_id: Option<i64>,
    pub symbol: String,
    pub name: String,
    pub quantity: f64,
    pub average_price: f64,
    pub current_price: f64,
    pub total_investment: f64,
    pub current_value: f64,
    pub gain_loss: f64,
    pub gain_loss_percent: f64,
    pub aging_days: Option<i64>,
    pub aging: Option<AgingBand>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PortfolioMetrics {
    pub stocks_value: f64,
    pub mutual_funds_value: f64,
    pub total_investment: f64,
    pub current_value: f64,
    pub total_gain_loss: f64,
    pub gain_loss_percent: f64,
}

pub fn safe(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Gain as a percentage of investment, 0 when nothing was invested
pub fn percent_of(gain: f64, investment: f64) -> f64 {
    if investment > 0.0 {
        gain / investment * 100.0
    } else {
        0.0
    }
}

/// Two-decimal percent string used by the holdings endpoints
pub fn percent_string(gain: f64, investment: f64) -> String {
    format!("{:.2}", safe(percent_of(safe(gain), safe(investment))))
}

/// Whole days since `last`, rounded up. Future dates count as 0.
pub fn aging_days(last: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let ms = (now - last).num_milliseconds();
    if ms <= 0 {
        return 0;
    }
    (ms + MS_PER_DAY - 1) / MS_PER_DAY
}

pub fn holding_metrics(row: &HoldingRow, now: DateTime<Utc>) -> HoldingMetrics {
    let quantity = safe(row.total_quantity);
    let average_price = safe(row.avg_price);
    let current_price = match safe(row.current_price) {
        p if p > 0.0 => p,
        _ => average_price,
    };
    let total_investment = match safe(row.total_investment) {
        v if v > 0.0 => v,
        _ => quantity * average_price,
    };
    let current_value = quantity * current_price;
    let gain_loss = current_value - total_investment;
    let aging_days = row.last_transaction_date.map(|last| aging_days(last, now));

    HoldingMetrics {
        security_id: row.security_id,
        symbol: row.symbol.clone(),
        name: row.name.clone(),
        quantity,
        average_price,
        current_price,
        total_investment,
        current_value,
        gain_loss,
        gain_loss_percent: percent_of(gain_loss, total_investment),
        aging_days,
        aging: aging_days.map(AgingBand::from_days),
    }
}

pub fn portfolio_metrics(
    stocks: &[HoldingMetrics],
    mutual_funds: &[HoldingMetrics],
    summary: Option<&SummaryRow>,
) -> PortfolioMetrics {
    let stocks_value: f64 = stocks.iter().map(|h| h.current_value).sum();
    let mutual_funds_value: f64 = mutual_funds.iter().map(|h| h.current_value).sum();

    let summary_investment = summary.map_or(0.0, |s| safe(s.total_investment));
    let total_investment = if summary_investment != 0.0 {
        summary_investment
    } else {
        stocks
            .iter()
            .chain(mutual_funds.iter())
            .map(|h| h.total_investment)
            .sum()
    };

    let current_value = stocks_value + mutual_funds_value;
    let total_gain_loss = current_value - total_investment;

    PortfolioMetrics {
        stocks_value,
        mutual_funds_value,
        total_investment,
        current_value,
        total_gain_loss,
        gain_loss_percent: percent_of(total_gain_loss, total_investment),
    }
}
