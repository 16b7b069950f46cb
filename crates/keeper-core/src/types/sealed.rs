//! Envelope form of a secret: plaintext header, encrypted body.

use super::secret::{SecretId, SecretKind};
use crate::encoding::base64_bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A secret as it crosses the client/server boundary.
///
/// `title` and `metadata` stay readable so the server can list and the
/// client can render a browser without the password. `payload` holds the
/// serialized variant encrypted with the user's session password; the
/// server never sees inside it. Blob envelopes carry an empty payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedSecret {
    #[serde(default)]
    pub id: SecretId,
    pub title: String,
    #[serde(default)]
    pub metadata: String,
    pub kind: SecretKind,
    #[serde(default, with = "base64_bytes")]
    pub payload: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SealedSecret {
    /// Envelope for an uploaded file named `file_name`.
    pub fn blob(file_name: impl Into<String>, metadata: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            title: file_name.into(),
            metadata: metadata.into(),
            kind: SecretKind::Blob,
            payload: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}
