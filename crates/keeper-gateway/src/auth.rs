//! Password hashing and access tokens.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use keeper_core::{SecretString, UserId};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::GatewayError;
use crate::Result;

/// `iss` claim of every token this server signs.
pub const TOKEN_ISSUER: &str = "keeper";

/// Claims carried in an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: UserId,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// Hash `password` with Argon2id into a PHC string.
pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| GatewayError::Internal(format!("salt encoding: {e}")))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| GatewayError::Internal(format!("password hashing: {e}")))
}

/// Check `password` against a stored PHC hash. Malformed hashes never match.
pub fn check_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Sign an HS256 token for `user_id` that expires at `expires_at`.
pub fn create_token(user_id: UserId, expires_at: DateTime<Utc>, key: &[u8]) -> Result<String> {
    let claims = Claims {
        user_id,
        iat: Utc::now().timestamp(),
        exp: expires_at.timestamp(),
        iss: TOKEN_ISSUER.to_string(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(key),
    )
    .map_err(|e| GatewayError::Internal(format!("token signing: {e}")))
}

/// Verify signature, algorithm (HS256 only), issuer and expiry.
pub fn verify_token(token: &str, key: &[u8]) -> Result<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_issuer(&[TOKEN_ISSUER]);
    validation.set_required_spec_claims(&["exp", "iss"]);

    decode::<Claims>(token, &DecodingKey::from_secret(key), &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            debug!("token rejected: {}", e);
            GatewayError::Unauthenticated(format!("invalid access token: {e}"))
        })
}

/// Issues and checks tokens with one signing key and lifetime.
#[derive(Clone)]
pub struct TokenAuthority {
    key: SecretString,
    lifetime: Duration,
}

impl TokenAuthority {
    pub fn new(key: SecretString, lifetime: std::time::Duration) -> Self {
        let lifetime = Duration::from_std(lifetime).unwrap_or_else(|_| Duration::hours(24));
        Self { key, lifetime }
    }

    /// Authority with a random 32-byte key, for servers without a
    /// configured one.
    pub fn random(lifetime: std::time::Duration) -> Self {
        use base64::Engine;

        let mut key = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut key);
        let encoded = base64::engine::general_purpose::STANDARD.encode(key);
        Self::new(SecretString::new(encoded), lifetime)
    }

    pub fn issue(&self, user_id: UserId) -> Result<SecretString> {
        create_token(
            user_id,
            Utc::now() + self.lifetime,
            self.key.expose_secret().as_bytes(),
        )
        .map(SecretString::new)
    }

    pub fn verify(&self, token: &str) -> Result<Claims> {
        verify_token(token, self.key.expose_secret().as_bytes())
    }
}
