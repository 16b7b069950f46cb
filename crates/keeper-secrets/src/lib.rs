//! Password-based encryption and secret stores for Keeper.
//!
//! Two [`SecretStore`] implementations share one contract: a local
//! single-file vault sealed with the master password, and a remote adapter
//! that seals each secret's content before it leaves the process.

pub mod crypto;
pub mod error;
pub mod remote;
pub mod store;

pub use crypto::Encrypter;
pub use error::{Result, SecretError};
pub use remote::{RemoteSecretStore, SecretsApi};
pub use store::{FileSecretStore, SecretStore};
