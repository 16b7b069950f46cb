//! CLI command implementations.

pub mod config;
pub mod local;
pub mod remote;
pub mod server;
pub mod store;

use anyhow::Context;
use keeper_core::SecretString;

/// Use `given` if present, otherwise prompt without echo.
pub(crate) fn password_or_prompt(given: Option<String>, prompt: &str) -> anyhow::Result<SecretString> {
    let password = match given {
        Some(p) => p,
        None => rpassword::prompt_password(prompt).context("Failed to read password")?,
    };
    if password.is_empty() {
        anyhow::bail!("Password must not be empty");
    }
    Ok(SecretString::new(password))
}
