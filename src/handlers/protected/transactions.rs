// handlers/protected/transactions.rs - /api/transactions/* handlers
//
// Create and list return bare rows rather than the `status` envelope;
// existing clients read them that way.

use axum::extract::{multipart::MultipartError, rejection::JsonRejection, Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};

use super::portfolio::ForceQuery;
use crate::error::ApiError;
use crate::import::{FileKind, ImportSummary};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::{CreateTransactionRequest, SyncSummary};
use crate::state::AppState;

/// POST /api/transactions - record a BUY or SELL
pub async fn create_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: Result<Json<CreateTransactionRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = body?;
    let transaction = state.transactions.create(user.id, request).await?;
    Ok((StatusCode::CREATED, Json(transaction)).into_response())
}

/// GET /api/transactions/user - the caller's transactions, newest first
pub async fn user_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ForceQuery>,
) -> Result<Response, ApiError> {
    let rows = state.transactions.list(user.id, query.is_forced()).await?;
    Ok(Json(&*rows).into_response())
}

/// GET /api/transactions/security/:securityId
pub async fn security_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(security_id): Path<String>,
) -> Result<Response, ApiError> {
    let security_id: i64 = security_id
        .parse()
        .map_err(|_| ApiError::bad_request("Invalid securityId"))?;
    let rows = state.transactions.for_security(user.id, security_id).await?;
    Ok(Json(rows).into_response())
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large("File too large")
    } else {
        ApiError::bad_request(err.body_text())
    }
}

/// POST /api/transactions/upload-csv - multipart field `file`, CSV or Excel
pub async fn upload_csv_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    mut multipart: Multipart,
) -> ApiResult<ImportSummary> {
    let max_size = state.config.api.max_upload_size_bytes;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        if FileKind::from_filename(&filename).is_none() {
            return Err(ApiError::bad_request("Invalid file format"));
        }

        let bytes = field.bytes().await.map_err(multipart_error)?;
        if bytes.len() > max_size {
            return Err(ApiError::payload_too_large("File too large"));
        }

        let summary = state.transactions.import_file(user.id, &filename, &bytes).await?;
        return Ok(ApiResponse::success("data", summary));
    }

    Err(ApiError::bad_request("No file uploaded"))
}

/// POST /api/transactions/motilal-oswal - import broker holdings as BUYs
pub async fn motilal_oswal_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<SyncSummary> {
    let summary = state.transactions.broker_sync(user.id).await?;
    Ok(ApiResponse::success("data", summary))
}
