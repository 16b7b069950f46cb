//! Secret operations shared by the local and remote commands.

use anyhow::Context;
use clap::Subcommand;
use console::style;
use keeper_core::types::{Card, Credential, Text};
use keeper_core::{Secret, SecretData, SecretId, SecretKind};
use keeper_secrets::SecretStore;

use super::password_or_prompt;

#[derive(Subcommand, Debug)]
pub enum StoreCommand {
    /// List stored secrets (titles only)
    List,

    /// Print a decrypted secret
    Get {
        /// Secret id
        id: SecretId,
    },

    /// Store a login/password pair
    AddCredential {
        title: String,

        #[arg(long)]
        login: String,

        /// Password to store (prompted if omitted)
        #[arg(long)]
        secret: Option<String>,

        #[arg(long, default_value = "")]
        metadata: String,
    },

    /// Store a free-form note
    AddText {
        title: String,

        #[arg(long)]
        content: String,

        #[arg(long, default_value = "")]
        metadata: String,
    },

    /// Store a payment card
    AddCard {
        title: String,

        #[arg(long)]
        number: String,

        #[arg(long)]
        exp_month: u32,

        #[arg(long)]
        exp_year: u32,

        #[arg(long)]
        cvv: u32,

        #[arg(long, default_value = "")]
        metadata: String,
    },

    /// Delete a secret
    Delete {
        /// Secret id
        id: SecretId,
    },
}

/// Build the secret an `add-*` command describes. `None` for other commands.
pub fn secret_from_command(command: &StoreCommand) -> anyhow::Result<Option<Secret>> {
    let secret = match command {
        StoreCommand::AddCredential {
            title,
            login,
            secret,
            metadata,
        } => {
            let password = password_or_prompt(secret.clone(), "Password to store: ")?;
            Secret::new(
                title,
                metadata,
                SecretData::Credential(Credential {
                    login: login.clone(),
                    password: password.expose_secret().to_string(),
                }),
            )
        }
        StoreCommand::AddText {
            title,
            content,
            metadata,
        } => Secret::new(
            title,
            metadata,
            SecretData::Text(Text {
                content: content.clone(),
            }),
        ),
        StoreCommand::AddCard {
            title,
            number,
            exp_month,
            exp_year,
            cvv,
            metadata,
        } => Secret::new(
            title,
            metadata,
            SecretData::Card(Card {
                number: number.clone(),
                exp_month: *exp_month,
                exp_year: *exp_year,
                cvv: *cvv,
            }),
        ),
        _ => return Ok(None),
    };

    secret.validate().context("Invalid secret")?;
    Ok(Some(secret))
}

/// Run `command` against `store`.
pub async fn execute(store: &dyn SecretStore, command: StoreCommand) -> anyhow::Result<()> {
    if let Some(secret) = secret_from_command(&command)? {
        if let SecretData::Card(card) = &secret.data {
            if card.is_expired(chrono::Utc::now()) {
                eprintln!("{} card is already expired", style("!").yellow().bold());
            }
        }
        let id = store
            .create(secret)
            .await
            .map_err(|e| anyhow::anyhow!("{}", e.user_message()))?;
        println!("Secret {} stored in {}.", style(id).bold(), store);
        return Ok(());
    }

    match command {
        StoreCommand::List => {
            let secrets = store
                .get_all()
                .await
                .map_err(|e| anyhow::anyhow!("{}", e.user_message()))?;
            print_list(&secrets);
        }

        StoreCommand::Get { id } => {
            let secret = store
                .get(id)
                .await
                .map_err(|e| anyhow::anyhow!("{}", e.user_message()))?;
            println!("{} {}", style(&secret.title).bold(), style(secret.kind()).dim());
            if !secret.metadata.is_empty() {
                println!("{}", style(&secret.metadata).dim());
            }
            println!("{}", secret.render_plain());
        }

        StoreCommand::Delete { id } => {
            store
                .delete(id)
                .await
                .map_err(|e| anyhow::anyhow!("{}", e.user_message()))?;
            println!("Secret {} deleted.", id);
        }

        StoreCommand::AddCredential { .. } | StoreCommand::AddText { .. } | StoreCommand::AddCard { .. } => {}
    }

    Ok(())
}

/// Print secrets as a table.
pub fn print_list(secrets: &[Secret]) {
    if secrets.is_empty() {
        println!("No secrets stored.");
        return;
    }

    println!("{:<6} {:<11} {:<32} {}", "ID", "KIND", "TITLE", "UPDATED");
    println!("{}", "-".repeat(72));
    for secret in secrets {
        let kind = match secret.kind() {
            SecretKind::Unknown => style(secret.kind().as_str()).red(),
            kind => style(kind.as_str()),
        };
        println!(
            "{:<6} {:<11} {:<32} {}",
            secret.id,
            kind,
            secret.title,
            secret.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    println!("\n{} secret(s) total.", secrets.len());
}
