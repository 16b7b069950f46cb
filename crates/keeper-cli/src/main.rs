//! Keeper CLI entry point.

use clap::Parser;
use keeper_cli::{run, Cli};
use keeper_core::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CRATES: &[&str] = &[
    "keeper",
    "keeper_cli",
    "keeper_core",
    "keeper_secrets",
    "keeper_gateway",
    "keeper_client",
    "tower_http",
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load_or_default(cli.config.as_deref())?;
    config.validate()?;

    let level = cli.log_level(config.logging.level);
    let default_filter = CRATES
        .iter()
        .map(|krate| format!("{}={}", krate, level.as_str()))
        .collect::<Vec<_>>()
        .join(",");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("warn,{default_filter}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    run(cli, config).await
}
