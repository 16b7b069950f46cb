//! Secret storage backends.
//!
//! Defines the [`SecretStore`] trait and provides [`FileSecretStore`], a
//! single-file vault: the whole secret map is serialized, sealed with the
//! master password and rewritten on every mutation.

use std::collections::BTreeMap;
use std::fmt;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use keeper_core::{Secret, SecretId, SecretString};
use serde::{Deserialize, Serialize};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::debug;
use zeroize::Zeroizing;

use crate::crypto::Encrypter;
use crate::error::{Result, SecretError};

/// Contract shared by the local vault and the remote adapter.
///
/// `Display` names the backing location (a path or a server address).
#[async_trait]
pub trait SecretStore: fmt::Display + Send + Sync {
    /// Fetch one secret by id.
    async fn get(&self, id: SecretId) -> Result<Secret>;

    /// Fetch every secret, ascending by id.
    async fn get_all(&self) -> Result<Vec<Secret>>;

    /// Persist a new secret and return its assigned id. The incoming id is
    /// ignored.
    async fn create(&self, secret: Secret) -> Result<SecretId>;

    /// Replace the secret with the same id.
    async fn update(&self, secret: Secret) -> Result<()>;

    /// Remove a secret by id.
    async fn delete(&self, id: SecretId) -> Result<()>;

    /// Flush and release the backing resource.
    async fn close(&self) -> Result<()>;
}

/// Plaintext layout of the vault before sealing.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    /// Highest id ever handed out; ids are never reused.
    #[serde(default)]
    last_id: SecretId,
    #[serde(default)]
    secrets: BTreeMap<SecretId, Secret>,
}

impl Snapshot {
    fn next_id(&self) -> SecretId {
        let max_key = self.secrets.keys().next_back().copied().unwrap_or(0);
        self.last_id.max(max_key) + 1
    }
}

struct Inner {
    /// `None` once the store is closed.
    file: Option<File>,
    snapshot: Snapshot,
}

/// Encrypted single-file vault.
///
/// One mutex covers both the in-memory map and the file handle for the
/// whole of each operation, so concurrent callers see a serial history.
pub struct FileSecretStore {
    path: PathBuf,
    password: SecretString,
    encrypter: Encrypter,
    inner: Mutex<Inner>,
}

impl FileSecretStore {
    /// Open the vault at `path`, creating it if absent.
    pub async fn open(path: impl AsRef<Path>, password: SecretString) -> Result<Self> {
        Self::open_with(path, password, Encrypter::default()).await
    }

    /// Open with an explicit [`Encrypter`] (iteration count).
    pub async fn open_with(
        path: impl AsRef<Path>,
        password: SecretString,
        encrypter: Encrypter,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if tokio::fs::try_exists(&path).await? {
            let mut file = OpenOptions::new().read(true).write(true).open(&path).await?;
            let mut sealed = Vec::new();
            file.read_to_end(&mut sealed).await?;
            file.seek(SeekFrom::Start(0)).await?;

            let plain = Zeroizing::new(encrypter.decrypt(&sealed, password.expose_secret())?);
            let snapshot: Snapshot = serde_json::from_slice(&plain)
                .map_err(|e| SecretError::CorruptData(format!("vault contents: {e}")))?;

            debug!(path = %path.display(), secrets = snapshot.secrets.len(), "opened vault");
            return Ok(Self {
                path,
                password,
                encrypter,
                inner: Mutex::new(Inner {
                    file: Some(file),
                    snapshot,
                }),
            });
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut options = OpenOptions::new();
        options.read(true).write(true).create_new(true);
        #[cfg(unix)]
        options.mode(0o600);
        let file = options.open(&path).await?;

        let store = Self {
            path,
            password,
            encrypter,
            inner: Mutex::new(Inner {
                file: Some(file),
                snapshot: Snapshot::default(),
            }),
        };

        // A fresh vault is sealed immediately; it is never left empty.
        {
            let mut inner = store.inner.lock().await;
            store.dump(&mut inner).await?;
        }
        debug!(path = %store.path.display(), "created vault");

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Seal the snapshot and rewrite the file from offset 0.
    async fn dump(&self, inner: &mut Inner) -> Result<()> {
        let plain = Zeroizing::new(serde_json::to_vec(&inner.snapshot)?);
        let sealed = self.encrypter.encrypt(&plain, self.password.expose_secret())?;

        let file = inner.file.as_mut().ok_or_else(closed)?;
        file.set_len(0).await?;
        file.seek(SeekFrom::Start(0)).await?;
        file.write_all(&sealed).await?;
        file.flush().await?;
        file.sync_data().await?;
        file.seek(SeekFrom::Start(0)).await?;

        debug!(path = %self.path.display(), bytes = sealed.len(), "vault written");
        Ok(())
    }
}

fn closed() -> SecretError {
    SecretError::Internal("store is closed".to_string())
}

fn not_found(id: SecretId) -> SecretError {
    SecretError::NotFound(format!("id {id}"))
}

impl fmt::Display for FileSecretStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

#[async_trait]
impl SecretStore for FileSecretStore {
    async fn get(&self, id: SecretId) -> Result<Secret> {
        let inner = self.inner.lock().await;
        if inner.file.is_none() {
            return Err(closed());
        }
        inner
            .snapshot
            .secrets
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    async fn get_all(&self) -> Result<Vec<Secret>> {
        let inner = self.inner.lock().await;
        if inner.file.is_none() {
            return Err(closed());
        }
        Ok(inner.snapshot.secrets.values().cloned().collect())
    }

    async fn create(&self, mut secret: Secret) -> Result<SecretId> {
        let mut inner = self.inner.lock().await;
        if inner.file.is_none() {
            return Err(closed());
        }

        let id = inner.snapshot.next_id();
        let previous_last = inner.snapshot.last_id;
        secret.id = id;
        secret.updated_at = Utc::now();
        inner.snapshot.secrets.insert(id, secret);
        inner.snapshot.last_id = id;

        if let Err(e) = self.dump(&mut inner).await {
            inner.snapshot.secrets.remove(&id);
            inner.snapshot.last_id = previous_last;
            return Err(e);
        }

        debug!(id, "secret created");
        Ok(id)
    }

    async fn update(&self, mut secret: Secret) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.file.is_none() {
            return Err(closed());
        }

        let id = secret.id;
        let previous = inner
            .snapshot
            .secrets
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(id))?;

        secret.created_at = previous.created_at;
        secret.updated_at = Utc::now();
        inner.snapshot.secrets.insert(id, secret);

        if let Err(e) = self.dump(&mut inner).await {
            inner.snapshot.secrets.insert(id, previous);
            return Err(e);
        }

        debug!(id, "secret updated");
        Ok(())
    }

    async fn delete(&self, id: SecretId) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.file.is_none() {
            return Err(closed());
        }

        let removed = inner
            .snapshot
            .secrets
            .remove(&id)
            .ok_or_else(|| not_found(id))?;

        if let Err(e) = self.dump(&mut inner).await {
            inner.snapshot.secrets.insert(id, removed);
            return Err(e);
        }

        debug!(id, "secret deleted");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.file.is_none() {
            return Ok(());
        }
        self.dump(&mut inner).await?;
        inner.file = None;
        debug!(path = %self.path.display(), "vault closed");
        Ok(())
    }
}
