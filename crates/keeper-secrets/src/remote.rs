//! [`SecretStore`] backed by the remote secrets service.
//!
//! Only the typed variant is encrypted; title, metadata and timestamps
//! travel in the clear so the server can list them. The session password
//! is used locally and never sent on this path.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use keeper_core::{
    Blob, Card, Credential, SealedSecret, Secret, SecretData, SecretId, SecretKind, SecretString,
    Text,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use zeroize::Zeroizing;

use crate::crypto::Encrypter;
use crate::error::{Result, SecretError};
use crate::store::SecretStore;

/// Unary secrets calls offered by a transport client.
#[async_trait]
pub trait SecretsApi: Send + Sync {
    /// Create (id 0) or update an envelope; returns the stored id.
    async fn save_secret(&self, secret: &SealedSecret) -> Result<SecretId>;

    async fn load_secret(&self, id: SecretId) -> Result<SealedSecret>;

    async fn load_secrets(&self) -> Result<Vec<SealedSecret>>;

    async fn delete_secret(&self, id: SecretId) -> Result<()>;

    /// Where the calls go, for display.
    fn endpoint(&self) -> String;
}

/// Remote store: seals variants client-side and delegates to a [`SecretsApi`].
pub struct RemoteSecretStore {
    api: Arc<dyn SecretsApi>,
    password: SecretString,
    encrypter: Encrypter,
}

impl RemoteSecretStore {
    pub fn new(api: Arc<dyn SecretsApi>, password: SecretString) -> Self {
        Self::with_encrypter(api, password, Encrypter::default())
    }

    pub fn with_encrypter(
        api: Arc<dyn SecretsApi>,
        password: SecretString,
        encrypter: Encrypter,
    ) -> Self {
        Self {
            api,
            password,
            encrypter,
        }
    }

    fn seal_part<T: Serialize>(&self, part: &T) -> Result<Vec<u8>> {
        let plain = Zeroizing::new(serde_json::to_vec(part)?);
        self.encrypter.encrypt(&plain, self.password.expose_secret())
    }

    fn open_part<T: DeserializeOwned>(&self, payload: &[u8]) -> Result<T> {
        let plain = Zeroizing::new(self.encrypter.decrypt(payload, self.password.expose_secret())?);
        serde_json::from_slice(&plain)
            .map_err(|e| SecretError::CorruptData(format!("secret payload: {e}")))
    }

    /// Encrypt the variant of `secret` into an envelope.
    pub fn seal(&self, secret: &Secret) -> Result<SealedSecret> {
        let payload = match &secret.data {
            SecretData::Credential(c) => self.seal_part(c)?,
            SecretData::Text(t) => self.seal_part(t)?,
            SecretData::Card(c) => self.seal_part(c)?,
            SecretData::Blob(_) => {
                return Err(SecretError::InvalidSecret(
                    "files are stored through the upload stream".to_string(),
                ))
            }
            SecretData::Unknown => {
                return Err(SecretError::InvalidSecret(
                    "secret has no typed content".to_string(),
                ))
            }
        };

        Ok(SealedSecret {
            id: secret.id,
            title: secret.title.clone(),
            metadata: secret.metadata.clone(),
            kind: secret.kind(),
            payload,
            created_at: secret.created_at,
            updated_at: secret.updated_at,
        })
    }

    /// Decrypt an envelope into its typed variant.
    ///
    /// Blob envelopes carry no payload and open to an empty [`Blob`] named
    /// after the title.
    pub fn open(&self, sealed: SealedSecret) -> Result<Secret> {
        let data = match sealed.kind {
            SecretKind::Credential => SecretData::Credential(self.open_part::<Credential>(&sealed.payload)?),
            SecretKind::Text => SecretData::Text(self.open_part::<Text>(&sealed.payload)?),
            SecretKind::Card => SecretData::Card(self.open_part::<Card>(&sealed.payload)?),
            SecretKind::Blob => SecretData::Blob(Blob {
                file_name: sealed.title.clone(),
                file_bytes: Vec::new(),
            }),
            SecretKind::Unknown => SecretData::Unknown,
        };

        Ok(Secret {
            id: sealed.id,
            title: sealed.title,
            metadata: sealed.metadata,
            data,
            created_at: sealed.created_at,
            updated_at: sealed.updated_at,
        })
    }
}

impl fmt::Display for RemoteSecretStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.api.endpoint())
    }
}

#[async_trait]
impl SecretStore for RemoteSecretStore {
    async fn get(&self, id: SecretId) -> Result<Secret> {
        let sealed = self.api.load_secret(id).await?;
        self.open(sealed)
    }

    async fn get_all(&self) -> Result<Vec<Secret>> {
        let sealed = self.api.load_secrets().await?;
        let mut secrets = sealed
            .into_iter()
            .map(|s| self.open(s))
            .collect::<Result<Vec<_>>>()?;
        secrets.sort_by_key(|s| s.id);
        debug!(count = secrets.len(), "loaded remote secrets");
        Ok(secrets)
    }

    async fn create(&self, mut secret: Secret) -> Result<SecretId> {
        secret.id = 0;
        let sealed = self.seal(&secret)?;
        let id = self.api.save_secret(&sealed).await?;
        debug!(id, kind = %secret.kind(), "created remote secret");
        Ok(id)
    }

    async fn update(&self, secret: Secret) -> Result<()> {
        if secret.id == 0 {
            return Err(SecretError::InvalidSecret(
                "cannot update a secret without an id".to_string(),
            ));
        }
        let sealed = self.seal(&secret)?;
        self.api.save_secret(&sealed).await?;
        Ok(())
    }

    async fn delete(&self, id: SecretId) -> Result<()> {
        self.api.delete_secret(id).await
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// In-process stand-in for the transport client.
    #[derive(Default)]
    struct FakeApi {
        secrets: Mutex<BTreeMap<SecretId, SealedSecret>>,
    }

    #[async_trait]
    impl SecretsApi for FakeApi {
        async fn save_secret(&self, secret: &SealedSecret) -> Result<SecretId> {
            let mut secrets = self.secrets.lock().unwrap();
            let mut secret = secret.clone();
            if secret.id == 0 {
                secret.id = secrets.keys().next_back().copied().unwrap_or(0) + 1;
            } else if !secrets.contains_key(&secret.id) {
                return Err(SecretError::NotFound(secret.id.to_string()));
            }
            let id = secret.id;
            secrets.insert(id, secret);
            Ok(id)
        }

        async fn load_secret(&self, id: SecretId) -> Result<SealedSecret> {
            self.secrets
                .lock()
                .unwrap()
                .get(&id)
                .cloned()
                .ok_or_else(|| SecretError::NotFound(id.to_string()))
        }

        async fn load_secrets(&self) -> Result<Vec<SealedSecret>> {
            Ok(self.secrets.lock().unwrap().values().cloned().collect())
        }

        async fn delete_secret(&self, id: SecretId) -> Result<()> {
            self.secrets
                .lock()
                .unwrap()
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| SecretError::NotFound(id.to_string()))
        }

        fn endpoint(&self) -> String {
            "fake://secrets".to_string()
        }
    }

    fn store_with(api: Arc<FakeApi>, password: &str) -> RemoteSecretStore {
        RemoteSecretStore::new(api, SecretString::new(password))
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let api = Arc::new(FakeApi::default());
        let store = store_with(api.clone(), "pw1");

        let id = store
            .create(Secret::new("mail", "personal", SecretData::credential("alice", "s3cret")))
            .await
            .unwrap();
        assert_eq!(id, 1);

        let secret = store.get(id).await.unwrap();
        assert_eq!(secret.title, "mail");
        assert_eq!(secret.metadata, "personal");
        assert_eq!(secret.data, SecretData::credential("alice", "s3cret"));
    }

    #[tokio::test]
    async fn test_payload_is_encrypted_variant_only() {
        let api = Arc::new(FakeApi::default());
        let store = store_with(api.clone(), "pw1");
        store
            .create(Secret::new("mail", "", SecretData::credential("alice", "s3cret")))
            .await
            .unwrap();

        let sealed = api.load_secret(1).await.unwrap();
        assert_eq!(sealed.kind, SecretKind::Credential);
        assert!(!String::from_utf8_lossy(&sealed.payload).contains("s3cret"));

        let plain = crate::crypto::decrypt(&sealed.payload, "pw1").unwrap();
        let value: serde_json::Value = serde_json::from_slice(&plain).unwrap();
        assert_eq!(value, serde_json::json!({"login": "alice", "password": "s3cret"}));
    }

    #[tokio::test]
    async fn test_other_password_cannot_open() {
        let api = Arc::new(FakeApi::default());
        store_with(api.clone(), "pw1")
            .create(Secret::new("note", "", SecretData::text("hi")))
            .await
            .unwrap();

        let result = store_with(api, "pw2").get(1).await;
        assert!(matches!(result, Err(SecretError::WrongPassword)));
    }

    #[tokio::test]
    async fn test_blob_rejected_on_create() {
        let store = store_with(Arc::new(FakeApi::default()), "pw");
        let result = store
            .create(Secret::new("f", "", SecretData::Blob(Blob::default())))
            .await;
        assert!(matches!(result, Err(SecretError::InvalidSecret(_))));
    }

    #[tokio::test]
    async fn test_blob_envelope_opens_without_decrypt() {
        let api = Arc::new(FakeApi::default());
        api.save_secret(&SealedSecret::blob("report.pdf", "q3")).await.unwrap();

        let all = store_with(api, "pw").get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        match &all[0].data {
            SecretData::Blob(blob) => {
                assert_eq!(blob.file_name, "report.pdf");
                assert!(blob.file_bytes.is_empty());
            }
            other => panic!("expected blob, got {:?}", other.kind()),
        }
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let api = Arc::new(FakeApi::default());
        let store = store_with(api, "pw");
        let id = store
            .create(Secret::new("note", "", SecretData::text("v1")))
            .await
            .unwrap();

        let mut secret = store.get(id).await.unwrap();
        secret.data = SecretData::text("v2");
        store.update(secret).await.unwrap();
        assert_eq!(store.get(id).await.unwrap().data, SecretData::text("v2"));

        store.delete(id).await.unwrap();
        assert!(store.get_all().await.unwrap().is_empty());
        assert!(matches!(store.get(id).await, Err(SecretError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_without_id() {
        let store = store_with(Arc::new(FakeApi::default()), "pw");
        let result = store.update(Secret::new("n", "", SecretData::text("x"))).await;
        assert!(matches!(result, Err(SecretError::InvalidSecret(_))));
    }

    #[tokio::test]
    async fn test_display_is_endpoint() {
        let store = store_with(Arc::new(FakeApi::default()), "pw");
        assert_eq!(store.to_string(), "fake://secrets");
    }
}
