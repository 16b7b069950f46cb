//! Shared data types.

mod sealed;
mod secret;

pub use sealed::SealedSecret;
pub use secret::{
    luhn_check, Blob, Card, Credential, Secret, SecretData, SecretId, SecretKind, Text,
};

/// Server-assigned user identifier.
pub type UserId = u64;

/// Per-process client identifier, sent in the `Client-ID` header.
pub type ClientId = u32;
