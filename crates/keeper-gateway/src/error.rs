//! Server error types.

use keeper_core::protocol::{JsonRpcError, StatusCode};
use keeper_secrets::SecretError;
use thiserror::Error;

/// Errors raised while serving a call.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MethodNotFound(_) => StatusCode::MethodNotFound,
            Self::InvalidParams(_) => StatusCode::InvalidParams,
            Self::Json(_) => StatusCode::ParseError,
            Self::Unauthenticated(_) => StatusCode::Unauthenticated,
            Self::NotFound(_) => StatusCode::NotFound,
            Self::AlreadyExists(_) => StatusCode::AlreadyExists,
            Self::Unavailable(_) => StatusCode::Unavailable,
            Self::Io(_) | Self::WebSocket(_) | Self::Internal(_) => StatusCode::Internal,
        }
    }

    /// Get the JSON-RPC error code.
    pub fn code(&self) -> i32 {
        self.status().code()
    }

    pub fn to_rpc_error(&self) -> JsonRpcError {
        JsonRpcError::new(self.status(), self.to_string())
    }
}

impl From<SecretError> for GatewayError {
    fn from(err: SecretError) -> Self {
        match err {
            SecretError::WrongPassword => Self::Unauthenticated("incorrect session password".to_string()),
            SecretError::NotFound(msg) => Self::NotFound(msg),
            SecretError::AlreadyExists(msg) => Self::AlreadyExists(msg),
            SecretError::Unauthenticated(msg) => Self::Unauthenticated(msg),
            SecretError::InvalidSecret(msg) => Self::InvalidParams(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}
