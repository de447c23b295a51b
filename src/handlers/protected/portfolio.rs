// handlers/protected/portfolio.rs - /api/portfolio/* handlers

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use serde::Deserialize;

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::{EnrichedHolding, PortfolioSummary, PriceRefresh};
use crate::state::AppState;

/// `?force=true` bypasses the response cache
#[derive(Debug, Default, Deserialize)]
pub struct ForceQuery {
    #[serde(default)]
    pub force: Option<String>,
}

impl ForceQuery {
    pub fn is_forced(&self) -> bool {
        matches!(self.force.as_deref(), Some("true") | Some("1"))
    }
}

/// GET /api/portfolio/stocks - stock holdings with gain/loss
pub async fn stocks_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Vec<EnrichedHolding>> {
    let holdings = state.portfolio.stock_holdings(user.id).await?;
    Ok(ApiResponse::success("stockHoldings", holdings))
}

/// GET /api/portfolio/mutual-funds - mutual fund holdings with gain/loss
pub async fn mutual_funds_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Vec<EnrichedHolding>> {
    let holdings = state.portfolio.mutual_fund_holdings(user.id).await?;
    Ok(ApiResponse::success("mutualFundHoldings", holdings))
}

/// GET /api/portfolio/summary - invested vs current value
pub async fn summary_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<PortfolioSummary> {
    let summary = state.portfolio.summary(user.id).await?;
    Ok(ApiResponse::success("summary", summary))
}

/// GET /api/portfolio/overview - holdings with derived metrics (cached)
pub async fn overview_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ForceQuery>,
) -> Result<Response, ApiError> {
    let overview = state.portfolio.overview(user.id, query.is_forced()).await?;
    Ok(ApiResponse::success("overview", &*overview).into_response())
}

/// POST /api/portfolio/prices/:symbol/refresh - fetch and store one quote
pub async fn price_refresh_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(symbol): Path<String>,
) -> ApiResult<PriceRefresh> {
    tracing::debug!(user_id = %user.id, symbol = %symbol, "Price refresh requested");
    let refreshed = state.portfolio.refresh_price(&symbol).await?;
    Ok(ApiResponse::success("data", refreshed))
}
