use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::{ServiceResult, UserCaches};
use crate::analytics::{self, HoldingMetrics, PortfolioMetrics};
use crate::database::models::HoldingRow;
use crate::database::PortfolioStore;
use crate::providers::QuoteProvider;

/// Holdings row plus gain/loss, serialized flat
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedHolding {
    #[serde(flatten)]
    pub row: HoldingRow,
    pub gain_loss: f64,
    pub gain_loss_percent: String,
}

impl From<HoldingRow> for EnrichedHolding {
    fn from(row: HoldingRow) -> Self {
        let gain_loss = row.current_value - row.total_investment;
        Self {
            gain_loss_percent: analytics::percent_string(gain_loss, row.total_investment),
            gain_loss,
            row,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSummary {
    pub total_investment: f64,
    pub current_value: f64,
    pub total_gain_loss: f64,
    pub gain_loss_percent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioOverview {
    pub stocks: Vec<HoldingMetrics>,
    pub mutual_funds: Vec<HoldingMetrics>,
    pub metrics: PortfolioMetrics,
    pub refreshed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceRefresh {
    pub symbol: String,
    pub price: f64,
    pub updated: u64,
}

pub struct PortfolioService {
    store: Arc<dyn PortfolioStore>,
    quotes: Arc<dyn QuoteProvider>,
    caches: Arc<UserCaches>,
}

impl PortfolioService {
    pub fn new(store: Arc<dyn PortfolioStore>, quotes: Arc<dyn QuoteProvider>, caches: Arc<UserCaches>) -> Self {
        Self { store, quotes, caches }
    }

    /// Stock holdings, largest current value first
    pub async fn stock_holdings(&self, user_id: Uuid) -> ServiceResult<Vec<EnrichedHolding>> {
        let mut holdings: Vec<EnrichedHolding> = self
            .store
            .stock_holdings(user_id)
            .await?
            .into_iter()
            .map(EnrichedHolding::from)
            .collect();
        holdings.sort_by(|a, b| b.row.current_value.total_cmp(&a.row.current_value));
        Ok(holdings)
    }

    /// Mutual fund holdings in the order the store returns them
    pub async fn mutual_fund_holdings(&self, user_id: Uuid) -> ServiceResult<Vec<EnrichedHolding>> {
        Ok(self
            .store
            .mutual_fund_holdings(user_id)
            .await?
            .into_iter()
            .map(EnrichedHolding::from)
            .collect())
    }

    pub async fn summary(&self, user_id: Uuid) -> ServiceResult<PortfolioSummary> {
        let row = self.store.portfolio_summary(user_id).await?.unwrap_or_default();
        let total_gain_loss = row.current_value - row.total_investment;
        let divisor = if row.total_investment == 0.0 { 1.0 } else { row.total_investment };

        Ok(PortfolioSummary {
            total_investment: row.total_investment,
            current_value: row.current_value,
            total_gain_loss,
            gain_loss_percent: format!("{:.2}", analytics::safe(total_gain_loss / divisor * 100.0)),
        })
    }

    /// Holdings with derived metrics, cached per user. A failed refresh
    /// falls back to the last cached overview when one exists.
    pub async fn overview(&self, user_id: Uuid, force: bool) -> ServiceResult<Arc<PortfolioOverview>> {
        if let Some(cached) = self.caches.overview.fresh(&user_id, force).await {
            return Ok(cached);
        }

        match self.load_overview(user_id).await {
            Ok(overview) => {
                let overview = Arc::new(overview);
                self.caches.overview.insert(user_id, overview.clone()).await;
                Ok(overview)
            }
            Err(e) => match self.caches.overview.stale(&user_id).await {
                Some(stale) => {
                    warn!(user_id = %user_id, error = %e, "Using cached portfolio (latest refresh failed)");
                    Ok(stale)
                }
                None => Err(e),
            },
        }
    }

    async fn load_overview(&self, user_id: Uuid) -> ServiceResult<PortfolioOverview> {
        let (stocks, funds, summary) = tokio::try_join!(
            self.store.stock_holdings(user_id),
            self.store.mutual_fund_holdings(user_id),
            self.store.portfolio_summary(user_id),
        )?;

        let now = Utc::now();
        let stocks: Vec<HoldingMetrics> = stocks.iter().map(|r| analytics::holding_metrics(r, now)).collect();
        let mutual_funds: Vec<HoldingMetrics> = funds.iter().map(|r| analytics::holding_metrics(r, now)).collect();
        let metrics = analytics::portfolio_metrics(&stocks, &mutual_funds, summary.as_ref());

        Ok(PortfolioOverview {
            stocks,
            mutual_funds,
            metrics,
            refreshed_at: now,
        })
    }

    /// Fetches the latest quote for one symbol and stores it
    pub async fn refresh_price(&self, symbol: &str) -> ServiceResult<PriceRefresh> {
        let symbol = symbol.trim().to_uppercase();
        let price = self.quotes.latest_price(&symbol).await?;
        let updated = self.store.update_price_by_symbol(&symbol, price, Utc::now()).await?;
        info!(symbol = %symbol, price, updated, "Refreshed price");
        Ok(PriceRefresh { symbol, price, updated })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::database::MemoryStore;
    use crate::services::ServiceError;
    use crate::testing::{seed_security, seed_transaction, test_store, FixedQuotes};
    use crate::types::{SecurityType, TransactionType};

    fn service(store: Arc<MemoryStore>, quotes: FixedQuotes) -> PortfolioService {
        let caches = Arc::new(UserCaches::new(&AppConfig::for_tests().cache));
        PortfolioService::new(store, Arc::new(quotes), caches)
    }

    #[tokio::test]
    async fn enriches_and_sorts_stock_holdings() {
        let store = Arc::new(test_store());
        let user = Uuid::new_v4();
        let tcs = seed_security(&store, "TCS", SecurityType::Stock, Some(120.0)).await;
        let infy = seed_security(&store, "INFY", SecurityType::Stock, Some(90.0)).await;
        seed_transaction(&store, user, &tcs, TransactionType::Buy, 1.0, 100.0, "2024-01-10T00:00:00Z").await;
        seed_transaction(&store, user, &infy, TransactionType::Buy, 10.0, 100.0, "2024-01-10T00:00:00Z").await;

        let holdings = service(store, FixedQuotes::new(&[])).stock_holdings(user).await.unwrap();
        assert_eq!(holdings[0].row.symbol, "INFY");
        assert_eq!(holdings[0].gain_loss, -100.0);
        assert_eq!(holdings[0].gain_loss_percent, "-10.00");
        assert_eq!(holdings[1].gain_loss_percent, "20.00");
    }

    #[test]
    fn zero_investment_reports_zero_percent() {
        let row: HoldingRow = serde_json::from_value(serde_json::json!({
            "symbol": "FREE", "name": "Bonus", "current_value": 50, "total_investment": 0
        }))
        .unwrap();
        let enriched = EnrichedHolding::from(row);
        assert_eq!(enriched.gain_loss, 50.0);
        assert_eq!(enriched.gain_loss_percent, "0.00");

        let json = serde_json::to_value(&enriched).unwrap();
        assert_eq!(json["symbol"], "FREE");
        assert_eq!(json["gain_loss_percent"], "0.00");
    }

    #[tokio::test]
    async fn empty_summary_is_zeros() {
        let summary = service(Arc::new(test_store()), FixedQuotes::new(&[]))
            .summary(Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(summary.total_investment, 0.0);
        assert_eq!(summary.total_gain_loss, 0.0);
        assert_eq!(summary.gain_loss_percent, "0.00");
    }

    #[tokio::test]
    async fn overview_is_cached_until_forced() {
        let store = Arc::new(test_store());
        let user = Uuid::new_v4();
        let tcs = seed_security(&store, "TCS", SecurityType::Stock, Some(110.0)).await;
        seed_transaction(&store, user, &tcs, TransactionType::Buy, 2.0, 100.0, "2024-01-10T00:00:00Z").await;

        let service = service(store.clone(), FixedQuotes::new(&[]));
        let first = service.overview(user, false).await.unwrap();
        assert_eq!(first.metrics.current_value, 220.0);
        assert_eq!(first.metrics.total_gain_loss, 20.0);

        seed_transaction(&store, user, &tcs, TransactionType::Buy, 1.0, 100.0, "2024-01-11T00:00:00Z").await;
        let cached = service.overview(user, false).await.unwrap();
        assert!(Arc::ptr_eq(&first, &cached));

        let forced = service.overview(user, true).await.unwrap();
        assert_eq!(forced.metrics.current_value, 330.0);
    }

    #[tokio::test]
    async fn refresh_price_updates_by_symbol() {
        let store = Arc::new(test_store());
        seed_security(&store, "TCS", SecurityType::Stock, Some(1.0)).await;

        let service = service(store.clone(), FixedQuotes::new(&[("TCS", 3900.0)]));
        let refreshed = service.refresh_price("tcs").await.unwrap();
        assert_eq!(refreshed.updated, 1);

        let found = store.find_security("TCS", SecurityType::Stock).await.unwrap().unwrap();
        assert_eq!(found.last_price, Some(3900.0));

        let err = service.refresh_price("NOPE").await.unwrap_err();
        assert!(matches!(err, ServiceError::Provider(_)));
    }
}
