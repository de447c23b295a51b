use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use super::{ServiceError, ServiceResult};
use crate::database::models::Session;
use crate::database::IdentityProvider;

const FIELDS: [&str; 2] = ["username", "password"];

/// Validated sign-up/login body
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Both fields are required non-empty strings and nothing else is
    /// accepted. The first problem found is reported.
    pub fn from_json(body: &Value) -> ServiceResult<Self> {
        let object = body
            .as_object()
            .ok_or_else(|| ServiceError::Validation("\"value\" must be of type object".to_string()))?;

        let field = |name: &str| -> ServiceResult<String> {
            match object.get(name) {
                None | Some(Value::Null) => Err(ServiceError::Validation(format!("\"{}\" is required", name))),
                Some(Value::String(s)) if s.is_empty() => Err(ServiceError::Validation(format!(
                    "\"{}\" is not allowed to be empty",
                    name
                ))),
                Some(Value::String(s)) => Ok(s.clone()),
                Some(_) => Err(ServiceError::Validation(format!("\"{}\" must be a string", name))),
            }
        };

        let username = field("username")?;
        let password = field("password")?;

        if let Some(extra) = object.keys().find(|k| !FIELDS.contains(&k.as_str())) {
            return Err(ServiceError::Validation(format!("\"{}\" is not allowed", extra)));
        }

        Ok(Self { username, password })
    }
}

pub struct UserService {
    identity: Arc<dyn IdentityProvider>,
}

impl UserService {
    pub fn new(identity: Arc<dyn IdentityProvider>) -> Self {
        Self { identity }
    }

    pub async fn sign_up(&self, credentials: &Credentials) -> ServiceResult<()> {
        let identity = self
            .identity
            .sign_up(&credentials.username, &credentials.password)
            .await?;
        info!(user_id = %identity.id, "User signed up");
        Ok(())
    }

    pub async fn login(&self, credentials: &Credentials) -> ServiceResult<Session> {
        let session = self
            .identity
            .sign_in(&credentials.username, &credentials.password)
            .await?;
        info!(user_id = %session.identity.id, "User logged in");
        Ok(session)
    }
}
