//! Configuration commands.

use anyhow::Context;
use clap::{Args, Subcommand};
use keeper_core::{paths, Config, SecretString};
use std::path::{Path, PathBuf};

/// Config command arguments.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration (secrets masked)
    Show,

    /// Print the config file location
    Path,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn config_path(explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => paths::config_file().context("Cannot determine config location"),
    }
}

/// Copy of `config` safe to print.
pub fn redacted(config: &Config) -> Config {
    let mut shown = config.clone();
    shown.server.secret_key = shown
        .server
        .secret_key
        .map(|key| SecretString::new(key.masked()));
    shown
}

/// Run the config command.
pub fn run(args: ConfigArgs, config: &Config, explicit: Option<&Path>) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => {
            println!("{}", redacted(config).to_json5()?);
        }

        ConfigCommand::Path => {
            println!("{}", config_path(explicit)?.display());
        }

        ConfigCommand::Init { force } => {
            let path = config_path(explicit)?;
            if path.exists() && !force {
                anyhow::bail!(
                    "{} already exists, use --force to overwrite",
                    path.display()
                );
            }
            Config::default().save(&path)?;
            println!("Wrote {}", path.display());
        }
    }

    Ok(())
}
