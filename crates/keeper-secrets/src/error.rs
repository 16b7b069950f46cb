//! Error taxonomy shared by the stores, the crypto engine and the client.

use keeper_core::protocol::StatusCode;
use thiserror::Error;

/// Errors surfaced to callers of a [`crate::SecretStore`].
#[derive(Debug, Error)]
pub enum SecretError {
    /// AEAD authentication failed: the password does not match.
    #[error("incorrect password")]
    WrongPassword,

    /// The sealed data is malformed (truncated, undecodable).
    #[error("corrupt data: {0}")]
    CorruptData(String),

    #[error("secret not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("server unavailable: {0}")]
    Unavailable(String),

    /// A streaming transfer ended before its terminal frame.
    #[error("transfer interrupted: {0}")]
    TransferInterrupted(String),

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("invalid secret: {0}")]
    InvalidSecret(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SecretError {
    /// Map a server status to the matching kind.
    pub fn from_status(status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            StatusCode::Unauthenticated => Self::Unauthenticated(message),
            StatusCode::AlreadyExists => Self::AlreadyExists(message),
            StatusCode::NotFound => Self::NotFound(message),
            StatusCode::Unavailable => Self::Unavailable(message),
            _ => Self::Internal(message),
        }
    }

    /// Short text suitable for showing to the user.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::WrongPassword => "incorrect password",
            Self::CorruptData(_) => "the stored data is damaged",
            Self::NotFound(_) => "secret not found",
            Self::AlreadyExists(_) => "user already exists",
            Self::Unauthenticated(_) => "bad auth credentials",
            Self::Unavailable(_) => "server unavailable",
            Self::TransferInterrupted(_) => "file transfer interrupted",
            Self::InvalidSecret(_) => "invalid secret",
            Self::EncryptionFailed(_)
            | Self::Internal(_)
            | Self::Io(_)
            | Self::Json(_) => "internal error",
        }
    }
}

impl From<keeper_core::Error> for SecretError {
    fn from(err: keeper_core::Error) -> Self {
        match err {
            keeper_core::Error::InvalidSecret(msg) => Self::InvalidSecret(msg),
            keeper_core::Error::Io(e) => Self::Io(e),
            keeper_core::Error::Json(e) => Self::Json(e),
            other => Self::Internal(other.to_string()),
        }
    }
}

/// Convenience result alias for secret operations.
pub type Result<T> = std::result::Result<T, SecretError>;
