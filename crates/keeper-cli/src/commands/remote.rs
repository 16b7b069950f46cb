//! Commands against a Keeper server.

use clap::{Args, Subcommand};
use console::style;
use keeper_client::{ApiClient, ClientEvent, NotificationListener};
use keeper_core::{Config, SecretData, SecretId};
use keeper_secrets::{Encrypter, RemoteSecretStore, SecretStore, SecretsApi};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::password_or_prompt;
use super::store::{self, StoreCommand};

/// Remote command arguments.
#[derive(Args)]
pub struct RemoteArgs {
    /// Account login
    #[arg(long, env = "KEEPER_LOGIN")]
    pub login: String,

    /// Account password, also used to encrypt secret contents (prompted if omitted)
    #[arg(long, env = "KEEPER_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Server address (overrides the configured one)
    #[arg(long)]
    pub server: Option<String>,

    #[command(subcommand)]
    pub command: RemoteCommand,
}

#[derive(Subcommand, Debug)]
pub enum RemoteCommand {
    /// Create an account
    Register,

    /// Check that the credentials are accepted
    Login,

    /// Check that the server is up (no login needed)
    Ping,

    /// Upload a file as a new secret
    Upload {
        path: PathBuf,

        #[arg(long, default_value = "")]
        metadata: String,
    },

    /// Download a file secret into the download directory
    Download {
        /// Secret id
        id: SecretId,
    },

    /// Print change notifications until interrupted
    Watch,

    #[command(flatten)]
    Store(StoreCommand),
}

/// Run a remote command.
pub async fn run(args: RemoteArgs, config: &Config) -> anyhow::Result<()> {
    let mut client_config = config.client.clone();
    if let Some(server) = args.server {
        client_config.server_address = server;
    }
    let client = Arc::new(
        ApiClient::new(&client_config).map_err(|e| anyhow::anyhow!("Client setup failed: {}", e))?,
    );

    if let RemoteCommand::Ping = args.command {
        let pong = client
            .health()
            .await
            .map_err(|e| anyhow::anyhow!("{}", e.user_message()))?;
        println!(
            "{} {} (version {}, up {}s)",
            style("ok").green().bold(),
            client.endpoint(),
            pong.version,
            pong.uptime_seconds
        );
        return Ok(());
    }

    let password = password_or_prompt(args.password, "Password: ")?;
    let auth = match args.command {
        RemoteCommand::Register => client.register(&args.login, &password).await,
        _ => client.login(&args.login, &password).await,
    };
    auth.map_err(|e| anyhow::anyhow!("{}", e.user_message()))?;

    match args.command {
        RemoteCommand::Register => println!("Account {} created.", style(&args.login).bold()),
        RemoteCommand::Login => println!("Logged in as {}.", style(&args.login).bold()),
        RemoteCommand::Ping => {}

        RemoteCommand::Upload { path, metadata } => {
            let receipt = client
                .upload_file(&path, &metadata, &password)
                .await
                .map_err(|e| anyhow::anyhow!("{}", e.user_message()))?;
            println!(
                "Uploaded {} as secret {} ({} bytes in {} chunk(s)).",
                path.display(),
                style(receipt.id).bold(),
                receipt.bytes,
                receipt.chunks
            );
        }

        RemoteCommand::Download { id } => {
            let remote = remote_store(client.clone(), &password, config);
            let secret = remote
                .get(id)
                .await
                .map_err(|e| anyhow::anyhow!("{}", e.user_message()))?;
            let SecretData::Blob(blob) = &secret.data else {
                anyhow::bail!("Secret {} is a {}, not a file", id, secret.kind());
            };
            let receipt = client
                .download_file(id, &blob.file_name, &password)
                .await
                .map_err(|e| anyhow::anyhow!("{}", e.user_message()))?;
            println!("Saved {} ({} bytes).", receipt.path.display(), receipt.bytes);
        }

        RemoteCommand::Watch => watch(client, config).await?,

        RemoteCommand::Store(command) => {
            let remote = remote_store(client, &password, config);
            store::execute(&remote, command).await?;
        }
    }

    Ok(())
}

fn remote_store(
    client: Arc<ApiClient>,
    password: &keeper_core::SecretString,
    config: &Config,
) -> RemoteSecretStore {
    RemoteSecretStore::with_encrypter(
        client,
        password.clone(),
        Encrypter::with_iterations(config.client.kdf_iterations),
    )
}

async fn watch(client: Arc<ApiClient>, config: &Config) -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::channel(32);
    let cancel = CancellationToken::new();
    let listener = NotificationListener::new(client, tx, config.client.reconnect_backoff())
        .spawn(cancel.clone());

    println!("Watching for changes, press Ctrl-C to stop.");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = rx.recv() => match event {
                Some(ClientEvent::ReloadSecretList { secret_id, updated }) => {
                    let what = if updated { "changed" } else { "created" };
                    println!("secret {} {}", style(secret_id).bold(), what);
                }
                None => break,
            },
        }
    }

    cancel.cancel();
    let _ = listener.await;
    info!("watch stopped");
    Ok(())
}
