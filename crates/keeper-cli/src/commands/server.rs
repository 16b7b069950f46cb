//! Server command.

use anyhow::Context;
use clap::{Args, Subcommand};
use keeper_core::Config;
use keeper_gateway::{Gateway, MemoryRepository};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Server command arguments.
#[derive(Args)]
pub struct ServerArgs {
    #[command(subcommand)]
    pub command: ServerCommand,
}

#[derive(Subcommand)]
pub enum ServerCommand {
    /// Start the server and run until Ctrl-C
    Run {
        /// Address to listen on (overrides the configured one)
        #[arg(short, long)]
        listen: Option<String>,
    },
}

/// Run the server command.
pub async fn run(args: ServerArgs, config: &Config) -> anyhow::Result<()> {
    match args.command {
        ServerCommand::Run { listen } => {
            let listen = listen.unwrap_or_else(|| config.server.listen_address.clone());
            let addr: SocketAddr = listen
                .parse()
                .with_context(|| format!("Invalid listen address: {listen}"))?;

            info!(
                token_lifetime_hours = config.server.token_lifetime_hours,
                "starting keeper server"
            );
            let gateway =
                Gateway::from_config(&config.server, Arc::new(MemoryRepository::new())).await;
            gateway.run(addr).await.context("Server failed")?;
        }
    }

    Ok(())
}
