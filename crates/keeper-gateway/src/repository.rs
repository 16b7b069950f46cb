//! Storage contract behind the server, plus an in-memory implementation.
//!
//! The server only ever sees sealed payloads: secret content is encrypted
//! by the client, and uploaded files are sealed by the upload handler
//! before they reach a repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keeper_core::{SealedSecret, SecretId, UserId};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::GatewayError;
use crate::Result;

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub login: String,
    /// PHC string; never the plaintext.
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `AlreadyExists` when `login` is taken.
    async fn create_user(&self, login: &str, password_hash: &str) -> Result<User>;

    async fn find_by_login(&self, login: &str) -> Result<Option<User>>;
}

#[async_trait]
pub trait SecretRepository: Send + Sync {
    /// Store a new secret, assigning its id.
    async fn create_secret(&self, user_id: UserId, secret: SealedSecret) -> Result<SecretId>;

    /// Replace an existing secret owned by `user_id`.
    async fn update_secret(&self, user_id: UserId, secret: SealedSecret) -> Result<()>;

    async fn get_secret(&self, user_id: UserId, id: SecretId) -> Result<SealedSecret>;

    /// All secrets of `user_id`, ordered by id.
    async fn list_secrets(&self, user_id: UserId) -> Result<Vec<SealedSecret>>;

    /// Remove a secret and any file stored with it.
    async fn delete_secret(&self, user_id: UserId, id: SecretId) -> Result<()>;

    /// Store a blob envelope together with its sealed file.
    async fn save_file(
        &self,
        user_id: UserId,
        envelope: SealedSecret,
        sealed_file: Vec<u8>,
    ) -> Result<SecretId>;

    /// Sealed file bytes of a blob secret.
    async fn load_file(&self, user_id: UserId, id: SecretId) -> Result<Vec<u8>>;
}

/// Everything the handlers need from storage.
pub trait Repository: UserRepository + SecretRepository {}

impl<T: UserRepository + SecretRepository> Repository for T {}

struct StoredSecret {
    owner: UserId,
    secret: SealedSecret,
    file: Option<Vec<u8>>,
}

/// Process-local repository. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryRepository {
    users: RwLock<HashMap<String, User>>,
    secrets: RwLock<BTreeMap<SecretId, StoredSecret>>,
    last_user_id: AtomicU64,
    last_secret_id: AtomicU64,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_secret_id(&self) -> SecretId {
        self.last_secret_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn insert(&self, user_id: UserId, mut secret: SealedSecret, file: Option<Vec<u8>>) -> SecretId {
        let id = self.next_secret_id();
        let now = Utc::now();
        secret.id = id;
        secret.created_at = now;
        secret.updated_at = now;
        self.secrets.write().insert(
            id,
            StoredSecret {
                owner: user_id,
                secret,
                file,
            },
        );
        id
    }
}

fn not_found(id: SecretId) -> GatewayError {
    GatewayError::NotFound(format!("secret {id}"))
}

#[async_trait]
impl UserRepository for MemoryRepository {
    async fn create_user(&self, login: &str, password_hash: &str) -> Result<User> {
        let mut users = self.users.write();
        if users.contains_key(login) {
            return Err(GatewayError::AlreadyExists(format!("user {login}")));
        }

        let user = User {
            id: self.last_user_id.fetch_add(1, Ordering::SeqCst) + 1,
            login: login.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        users.insert(login.to_string(), user.clone());
        Ok(user)
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<User>> {
        Ok(self.users.read().get(login).cloned())
    }
}

#[async_trait]
impl SecretRepository for MemoryRepository {
    async fn create_secret(&self, user_id: UserId, secret: SealedSecret) -> Result<SecretId> {
        Ok(self.insert(user_id, secret, None))
    }

    async fn update_secret(&self, user_id: UserId, mut secret: SealedSecret) -> Result<()> {
        let mut secrets = self.secrets.write();
        let stored = secrets
            .get_mut(&secret.id)
            .filter(|s| s.owner == user_id)
            .ok_or_else(|| not_found(secret.id))?;

        secret.created_at = stored.secret.created_at;
        secret.updated_at = Utc::now();
        stored.secret = secret;
        Ok(())
    }

    async fn get_secret(&self, user_id: UserId, id: SecretId) -> Result<SealedSecret> {
        self.secrets
            .read()
            .get(&id)
            .filter(|s| s.owner == user_id)
            .map(|s| s.secret.clone())
            .ok_or_else(|| not_found(id))
    }

    async fn list_secrets(&self, user_id: UserId) -> Result<Vec<SealedSecret>> {
        Ok(self
            .secrets
            .read()
            .values()
            .filter(|s| s.owner == user_id)
            .map(|s| s.secret.clone())
            .collect())
    }

    async fn delete_secret(&self, user_id: UserId, id: SecretId) -> Result<()> {
        let mut secrets = self.secrets.write();
        match secrets.get(&id) {
            Some(stored) if stored.owner == user_id => {
                secrets.remove(&id);
                Ok(())
            }
            _ => Err(not_found(id)),
        }
    }

    async fn save_file(
        &self,
        user_id: UserId,
        envelope: SealedSecret,
        sealed_file: Vec<u8>,
    ) -> Result<SecretId> {
        Ok(self.insert(user_id, envelope, Some(sealed_file)))
    }

    async fn load_file(&self, user_id: UserId, id: SecretId) -> Result<Vec<u8>> {
        let secrets = self.secrets.read();
        let stored = secrets
            .get(&id)
            .filter(|s| s.owner == user_id)
            .ok_or_else(|| not_found(id))?;

        stored
            .file
            .clone()
            .ok_or_else(|| GatewayError::InvalidParams(format!("secret {id} has no file")))
    }
}
