// HTTP API Error Types
use axum::extract::rejection::JsonRejection;
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::database::DatabaseError;
use crate::import::ImportError;
use crate::providers::ProviderError;
use crate::services::ServiceError;

// Message for failures whose detail stays in the logs
const SERVER_ERROR: &str = "server error";

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    InvalidJson(String),

    // 401 Unauthorized (credentials rejected)
    Unauthorized(String),

    // 401 Unauthorized (bearer token missing or invalid)
    AuthenticationFailed { details: String },

    // 404 Not Found
    NotFound(String),

    // 406 Not Acceptable (request body failed validation)
    NotAcceptable(String),

    // 409 Conflict
    Conflict(String),

    // 413 Payload Too Large
    PayloadTooLarge(String),

    // 429 Too Many Requests
    TooManyRequests(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable (database or upstream API failures)
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::InvalidJson(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::AuthenticationFailed { .. } => 401,
            ApiError::NotFound(_) => 404,
            ApiError::NotAcceptable(_) => 406,
            ApiError::Conflict(_) => 409,
            ApiError::PayloadTooLarge(_) => 413,
            ApiError::TooManyRequests(_) => 429,
            ApiError::InternalServerError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::InvalidJson(msg) => msg,
            ApiError::Unauthorized(msg) => msg,
            ApiError::AuthenticationFailed { .. } => "Unauthorized",
            ApiError::NotFound(msg) => msg,
            ApiError::NotAcceptable(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::PayloadTooLarge(msg) => msg,
            ApiError::TooManyRequests(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "status": "error",
            "message": self.message(),
            "code": self.error_code()
        });
        if let ApiError::AuthenticationFailed { details } = self {
            body["details"] = json!(details);
        }
        body
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::InvalidJson(_) => "INVALID_JSON",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::AuthenticationFailed { .. } => "UNAUTHORIZED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::NotAcceptable(_) => "VALIDATION_ERROR",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ApiError::TooManyRequests(_) => "TOO_MANY_REQUESTS",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn invalid_json(message: impl Into<String>) -> Self {
        ApiError::InvalidJson(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn authentication_failed(details: impl Into<String>) -> Self {
        ApiError::AuthenticationFailed { details: details.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn not_acceptable(message: impl Into<String>) -> Self {
        ApiError::NotAcceptable(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        ApiError::PayloadTooLarge(message.into())
    }

    pub fn too_many_requests(message: impl Into<String>) -> Self {
        ApiError::TooManyRequests(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

// Convert other error types to ApiError
impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(msg) => ApiError::not_found(msg),
            DatabaseError::Conflict(msg) => ApiError::conflict(msg),
            DatabaseError::Unauthorized(msg) => ApiError::unauthorized(msg),
            other => {
                // Don't expose store internals to clients
                tracing::error!(error = %other, "Store error");
                ApiError::service_unavailable(SERVER_ERROR)
            }
        }
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        tracing::error!(error = %err, "Provider error");
        ApiError::service_unavailable(SERVER_ERROR)
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(msg) => ApiError::not_acceptable(msg),
            ServiceError::InvalidInput(msg) => ApiError::bad_request(msg),
            ServiceError::Database(e) => e.into(),
            ServiceError::Provider(e) => e.into(),
            ServiceError::Import(e) => e.into(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::invalid_json(rejection.body_text())
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authentication_failure_carries_details() {
        let body = ApiError::authentication_failed("No token provided").to_json();
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "Unauthorized");
        assert_eq!(body["details"], "No token provided");
    }

    #[test]
    fn store_internals_are_hidden() {
        let err: ApiError = DatabaseError::QueryError("relation does not exist".to_string()).into();
        assert_eq!(err.status_code(), 503);
        assert_eq!(err.message(), "server error");

        let err: ApiError = DatabaseError::Conflict("User already exists".to_string()).into();
        assert_eq!(err.status_code(), 409);
        assert_eq!(err.message(), "User already exists");
    }

    #[test]
    fn service_errors_map_to_statuses() {
        let validation: ApiError = ServiceError::Validation("\"username\" is required".to_string()).into();
        assert_eq!(validation.status_code(), 406);

        let input: ApiError = ServiceError::InvalidInput("Missing required fields".to_string()).into();
        assert_eq!(input.status_code(), 400);

        let empty: ApiError = ServiceError::Import(ImportError::Empty).into();
        assert_eq!(empty.status_code(), 400);
        assert_eq!(empty.message(), "File is empty");
    }
}
