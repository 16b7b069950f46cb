//! Keeper command-line interface.

pub mod commands;

use clap::{Parser, Subcommand};
use keeper_core::config::LogLevel;
use keeper_core::Config;
use std::path::PathBuf;

/// Keeper - encrypted personal secrets manager
#[derive(Parser)]
#[command(name = "keeper")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to config file
    #[arg(short, long, env = "KEEPER_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run the secrets server
    Server(commands::server::ServerArgs),

    /// Work with the local encrypted vault
    Local(commands::local::LocalArgs),

    /// Work with secrets on a server
    Remote(commands::remote::RemoteArgs),

    /// Configuration management
    Config(commands::config::ConfigArgs),

    /// Show version information
    Version,
}

impl Cli {
    /// Log level after applying `-v` on top of the configured one.
    pub fn log_level(&self, configured: LogLevel) -> LogLevel {
        match self.verbose {
            0 => configured,
            1 => match configured {
                LogLevel::Trace => LogLevel::Trace,
                _ => LogLevel::Debug,
            },
            _ => LogLevel::Trace,
        }
    }
}

/// Run the CLI with the given arguments.
pub async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    match cli.command {
        Commands::Server(args) => commands::server::run(args, &config).await,
        Commands::Local(args) => commands::local::run(args, &config).await,
        Commands::Remote(args) => commands::remote::run(args, &config).await,
        Commands::Config(args) => commands::config::run(args, &config, cli.config.as_deref()),
        Commands::Version => {
            println!("keeper {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
