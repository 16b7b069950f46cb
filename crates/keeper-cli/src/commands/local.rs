//! Local vault commands.

use anyhow::Context;
use clap::Args;
use keeper_core::{paths, Config};
use keeper_secrets::{Encrypter, FileSecretStore, SecretStore};
use std::path::PathBuf;

use super::password_or_prompt;
use super::store::{self, StoreCommand};

/// Local vault arguments.
#[derive(Args)]
pub struct LocalArgs {
    /// Vault file (defaults to the configured or standard location)
    #[arg(long, env = "KEEPER_VAULT")]
    pub vault: Option<PathBuf>,

    /// Master password (prompted if omitted)
    #[arg(long, env = "KEEPER_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    #[command(subcommand)]
    pub command: StoreCommand,
}

/// Run a local vault command.
pub async fn run(args: LocalArgs, config: &Config) -> anyhow::Result<()> {
    let path = match args.vault.or_else(|| config.client.vault_file.clone()) {
        Some(path) => path,
        None => paths::default_vault_file().context("Cannot determine vault location")?,
    };
    let password = password_or_prompt(args.password, "Master password: ")?;

    let encrypter = Encrypter::with_iterations(config.client.kdf_iterations);
    let vault = FileSecretStore::open_with(&path, password, encrypter)
        .await
        .map_err(|e| anyhow::anyhow!("Cannot open {}: {}", path.display(), e.user_message()))?;

    let result = store::execute(&vault, args.command).await;
    vault
        .close()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to close vault: {}", e))?;
    result
}
