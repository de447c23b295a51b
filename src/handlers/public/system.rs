// handlers/public/system.rs - GET /, /health and /test

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /test - liveness probe kept for existing clients
pub async fn test_get() -> Json<Value> {
    Json(json!({ "message": "Backend running!" }))
}

/// GET / - service description
pub async fn root_get(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "name": "Portfolio Tracker API",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
        "endpoints": {
            "user": "/api/user/signup, /api/user/login (public)",
            "portfolio": "/api/portfolio/stocks, /mutual-funds, /summary, /overview (protected)",
            "prices": "/api/portfolio/prices/:symbol/refresh (protected)",
            "transactions": "/api/transactions, /user, /security/:securityId, /upload-csv, /motilal-oswal (protected)",
        }
    }))
}

/// GET /health - store connectivity
pub async fn health_get(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "timestamp": now,
                "database": "ok"
            })),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "error",
                    "message": "database unavailable",
                    "timestamp": now
                })),
            )
        }
    }
}
