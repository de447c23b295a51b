// handlers/public/user.rs - POST /api/user/signup and /api/user/login

use axum::extract::{rejection::JsonRejection, State};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use crate::database::models::Identity;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::Credentials;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: Identity,
}

/// POST /api/user/signup - create an account
///
/// Body: `{"username": string, "password": string}`. Schema failures are
/// 406, an existing username is 409.
pub async fn signup_post(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<&'static str> {
    let Json(body) = body?;
    let credentials = Credentials::from_json(&body)?;
    state.users.sign_up(&credentials).await?;
    Ok(ApiResponse::message("User created"))
}

/// POST /api/user/login - exchange credentials for a bearer token
pub async fn login_post(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<LoginResponse> {
    let Json(body) = body?;
    let credentials = Credentials::from_json(&body)?;
    let session = state.users.login(&credentials).await.map_err(|e| {
        tracing::info!(username = %credentials.username, "Login rejected");
        ApiError::from(e)
    })?;

    Ok(ApiResponse::merged(LoginResponse {
        token: session.token,
        user: session.identity,
    }))
}
