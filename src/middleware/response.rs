use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::{json, Map, Value};

/// Success envelope: `{"status": "ok", "<key>": data}`.
///
/// Without a key the data must serialize to an object, whose fields are
/// merged into the envelope (`{"status": "ok", "token": .., "user": ..}`).
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub key: Option<&'static str>,
    pub data: T,
    pub status_code: Option<StatusCode>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Data under `key` with a 200 status
    pub fn success(key: &'static str, data: T) -> Self {
        Self {
            key: Some(key),
            data,
            status_code: None,
        }
    }

    /// Object fields merged into the envelope
    pub fn merged(data: T) -> Self {
        Self {
            key: None,
            data,
            status_code: None,
        }
    }

    pub fn with_status(mut self, status_code: StatusCode) -> Self {
        self.status_code = Some(status_code);
        self
    }
}

impl ApiResponse<&'static str> {
    /// `{"status": "ok", "message": ...}`
    pub fn message(message: &'static str) -> Self {
        Self::success("message", message)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status_code.unwrap_or(StatusCode::OK);

        let data_value = match serde_json::to_value(&self.data) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("Failed to serialize response data: {}", e);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "status": "error",
                        "message": "Failed to serialize response data"
                    })),
                )
                    .into_response();
            }
        };

        let mut envelope = Map::new();
        envelope.insert("status".to_string(), Value::from("ok"));
        match (self.key, data_value) {
            (Some(key), value) => {
                envelope.insert(key.to_string(), value);
            }
            (None, Value::Object(fields)) => envelope.extend(fields),
            (None, other) => {
                envelope.insert("data".to_string(), other);
            }
        }

        (status, Json(Value::Object(envelope))).into_response()
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, crate::error::ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn wraps_data_under_key() {
        let response = ApiResponse::success("summary", json!({"current_value": 1})).into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(response).await, json!({"status": "ok", "summary": {"current_value": 1}}));
    }

    #[tokio::test]
    async fn merges_object_fields() {
        let response = ApiResponse::merged(json!({"token": "t", "user": {"id": 1}}))
            .with_status(StatusCode::CREATED)
            .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body(response).await, json!({"status": "ok", "token": "t", "user": {"id": 1}}));
    }

    #[tokio::test]
    async fn message_envelope() {
        let response = ApiResponse::message("User created").into_response();
        assert_eq!(body(response).await, json!({"status": "ok", "message": "User created"}));
    }
}
