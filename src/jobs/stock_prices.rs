use chrono::Utc;
use std::time::Instant;
use tracing::{debug, error, warn};

use super::JobStats;
use crate::database::{PortfolioStore, StoreResult};
use crate::providers::{ProviderError, QuoteProvider};
use crate::types::SecurityType;

pub const JOB_NAME: &str = "stock_prices";

/// Refreshes `last_price` for every STOCK security from the quote provider.
/// Per-security failures are logged and counted; only listing failures abort.
pub async fn run(store: &dyn PortfolioStore, quotes: &dyn QuoteProvider) -> StoreResult<JobStats> {
    let started = Instant::now();
    let securities = store.securities_by_type(&[SecurityType::Stock]).await?;
    let mut stats = JobStats::new(securities.len());

    for security in &securities {
        let price = match quotes.latest_price(&security.symbol).await {
            Ok(price) => price,
            Err(ProviderError::MissingKey(key)) => {
                warn!(provider = quotes.name(), key, "Quote provider not configured, stopping run");
                stats.skipped = stats.total - stats.updated - stats.errors;
                break;
            }
            Err(e) => {
                error!(symbol = %security.symbol, error = %e, "Failed to fetch stock price");
                stats.errors += 1;
                continue;
            }
        };

        if !price.is_finite() {
            debug!(symbol = %security.symbol, "Quote returned no usable price");
            stats.skipped += 1;
            continue;
        }

        match store.update_security_price(security.id, price, Utc::now()).await {
            Ok(()) => {
                debug!(symbol = %security.symbol, price, "Updated stock price");
                stats.updated += 1;
            }
            Err(e) => {
                error!(symbol = %security.symbol, error = %e, "Failed to store stock price");
                stats.errors += 1;
            }
        }
    }

    stats.elapsed = started.elapsed();
    Ok(stats)
}
