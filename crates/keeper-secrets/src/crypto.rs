//! Password-based AES-256-GCM sealing.
//!
//! Every call draws a fresh salt and nonce and re-derives the key with
//! PBKDF2-HMAC-SHA256, so a sealed blob is self-contained given the
//! password:
//!
//! ```text
//! nonce (12) || ciphertext || tag (16) || salt (16)
//! ```

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{Result, SecretError};

pub const NONCE_SIZE: usize = 12;
pub const SALT_SIZE: usize = 16;
pub const TAG_SIZE: usize = 16;
const KEY_SIZE: usize = 32;

/// Lowest accepted iteration count, and the default.
pub const MIN_ITERATIONS: u32 = 4096;

/// Shortest input [`Encrypter::decrypt`] will attempt to open.
pub const MIN_SEALED_LEN: usize = NONCE_SIZE + TAG_SIZE + SALT_SIZE;

/// Seals and opens byte buffers under a password.
#[derive(Debug, Clone, Copy)]
pub struct Encrypter {
    iterations: u32,
}

impl Default for Encrypter {
    fn default() -> Self {
        Self {
            iterations: MIN_ITERATIONS,
        }
    }
}

impl Encrypter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `iterations` PBKDF2 rounds, never fewer than [`MIN_ITERATIONS`].
    ///
    /// Blobs do not record the count: data sealed with one setting opens
    /// only with the same setting.
    pub fn with_iterations(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(MIN_ITERATIONS),
        }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    fn derive_key(&self, password: &[u8], salt: &[u8]) -> Zeroizing<[u8; KEY_SIZE]> {
        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, self.iterations, key.as_mut_slice());
        key
    }

    /// Seal `plaintext` under `password`.
    pub fn encrypt(&self, plaintext: &[u8], password: &str) -> Result<Vec<u8>> {
        let mut salt = [0u8; SALT_SIZE];
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        let mut rng = rand::thread_rng();
        rng.fill_bytes(&mut salt);
        rng.fill_bytes(&mut nonce_bytes);

        let key = self.derive_key(password.as_bytes(), &salt);
        let cipher = Aes256Gcm::new_from_slice(key.as_slice())
            .map_err(|e| SecretError::EncryptionFailed(e.to_string()))?;

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|e| SecretError::EncryptionFailed(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len() + SALT_SIZE);
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        sealed.extend_from_slice(&salt);
        Ok(sealed)
    }

    /// Open a blob produced by [`Encrypter::encrypt`].
    ///
    /// Input shorter than [`MIN_SEALED_LEN`] is `CorruptData`; a failed
    /// authentication tag is `WrongPassword`.
    pub fn decrypt(&self, sealed: &[u8], password: &str) -> Result<Vec<u8>> {
        if sealed.len() < MIN_SEALED_LEN {
            return Err(SecretError::CorruptData(format!(
                "sealed data is {} bytes, need at least {}",
                sealed.len(),
                MIN_SEALED_LEN
            )));
        }

        let (body, salt) = sealed.split_at(sealed.len() - SALT_SIZE);
        let (nonce_bytes, ciphertext) = body.split_at(NONCE_SIZE);

        let key = self.derive_key(password.as_bytes(), salt);
        let cipher = Aes256Gcm::new_from_slice(key.as_slice())
            .map_err(|e| SecretError::Internal(e.to_string()))?;

        cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| SecretError::WrongPassword)
    }
}

/// Seal with the default iteration count.
pub fn encrypt(plaintext: &[u8], password: &str) -> Result<Vec<u8>> {
    Encrypter::default().encrypt(plaintext, password)
}

/// Open with the default iteration count.
pub fn decrypt(sealed: &[u8], password: &str) -> Result<Vec<u8>> {
    Encrypter::default().decrypt(sealed, password)
}
