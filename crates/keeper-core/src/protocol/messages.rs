//! Request and response bodies for unary calls, and streaming frames.

use crate::encoding::base64_bytes;
use crate::secret::SecretString;
use crate::types::{ClientId, SealedSecret, SecretId};
use serde::{Deserialize, Serialize};

/// Params of `users.register` and `users.login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsParams {
    pub login: String,
    pub password: SecretString,
}

/// Result of `users.register` and `users.login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResult {
    pub access_token: SecretString,
}

/// Params of `secrets.save`. An envelope with id 0 is created, any other
/// id updates the existing secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveSecretParams {
    pub secret: SealedSecret,
}

/// Result of `secrets.save`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveSecretResult {
    pub id: SecretId,
}

/// Params of `secrets.get` and `secrets.delete`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SecretIdParams {
    pub id: SecretId,
}

/// Result of `secrets.get`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetSecretResult {
    pub secret: SealedSecret,
}

/// Result of `secrets.list`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListSecretsResult {
    pub secrets: Vec<SealedSecret>,
}

/// Result of `health.ping`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResult {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Change event pushed to the other sessions of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub secret_id: SecretId,
    /// `false` for a newly created secret, `true` for an update or delete.
    pub updated: bool,
}

/// One message on a streaming call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamFrame {
    /// Client to server, repeated: one piece of an uploaded file.
    UploadChunk {
        metadata: String,
        file_name: String,
        session_password: SecretString,
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
    },

    /// Client to server: request a stored file.
    Download {
        id: SecretId,
        session_password: SecretString,
    },

    /// Client to server: start receiving notifications.
    Subscribe { client_id: ClientId },

    /// Server to client: one piece of a downloaded file.
    Chunk {
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
    },

    /// Server to client: a change notification.
    Notification(Notification),

    /// Server to client: upload of `chunks` chunks stored under `id`.
    Ack { id: SecretId, chunks: usize },

    /// Either direction: no more chunks follow.
    End,

    /// Server to client: the call failed.
    Error { code: i32, message: String },
}

impl StreamFrame {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Short tag for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::UploadChunk { .. } => "upload_chunk",
            Self::Download { .. } => "download",
            Self::Subscribe { .. } => "subscribe",
            Self::Chunk { .. } => "chunk",
            Self::Notification(_) => "notification",
            Self::Ack { .. } => "ack",
            Self::End => "end",
            Self::Error { .. } => "error",
        }
    }
}
