//! # keeper-core
//!
//! Core types, wire protocol, and configuration for Keeper.
//!
//! This crate provides shared functionality used across all Keeper crates:
//!
//! - **Types**: The typed [`Secret`] model and its sealed transport envelope
//! - **Protocol**: JSON-RPC envelopes, status codes, stream frames, headers
//! - **Configuration**: Loading, validation, and environment overrides
//! - **Utilities**: Path resolution, environment handling, secure strings

pub mod config;
pub mod encoding;
pub mod env;
pub mod error;
pub mod paths;
pub mod protocol;
pub mod secret;
pub mod types;

// Re-exports for convenience
pub use config::Config;
pub use error::{Error, Result};
pub use secret::SecretString;
pub use types::*;
