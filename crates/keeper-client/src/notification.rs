//! Background listener that keeps one notification stream open.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use keeper_core::protocol::Notification;
use keeper_core::SecretId;
use keeper_secrets::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Anything that can open a notification stream.
#[async_trait]
pub trait NotificationSource: Send + Sync {
    async fn subscribe(&self) -> Result<BoxStream<'static, Result<Notification>>>;
}

/// Events delivered to the front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEvent {
    /// Another session changed `secret_id`; the list should be reloaded.
    ReloadSecretList { secret_id: SecretId, updated: bool },
}

impl From<Notification> for ClientEvent {
    fn from(n: Notification) -> Self {
        Self::ReloadSecretList {
            secret_id: n.secret_id,
            updated: n.updated,
        }
    }
}

/// Subscribes, forwards notifications as [`ClientEvent`]s, and resubscribes
/// after a fixed backoff whenever the stream fails.
pub struct NotificationListener {
    source: Arc<dyn NotificationSource>,
    events: mpsc::Sender<ClientEvent>,
    backoff: Duration,
}

impl NotificationListener {
    pub fn new(
        source: Arc<dyn NotificationSource>,
        events: mpsc::Sender<ClientEvent>,
        backoff: Duration,
    ) -> Self {
        Self {
            source,
            events,
            backoff,
        }
    }

    /// Run until `cancel` fires or the event receiver is dropped.
    pub async fn run(self, cancel: CancellationToken) {
        info!("notification listener started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                keep_going = self.listen_once() => {
                    if !keep_going {
                        break;
                    }
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.backoff) => {}
            }
        }
        info!("notification listener stopped");
    }

    /// One subscription attempt. Returns `false` when nobody is listening
    /// for events any more.
    async fn listen_once(&self) -> bool {
        let mut stream = match self.source.subscribe().await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("subscribe failed, retrying in {:?}: {}", self.backoff, e);
                return true;
            }
        };

        while let Some(item) = stream.next().await {
            match item {
                Ok(notification) => {
                    debug!(secret_id = notification.secret_id, "notification received");
                    if self.events.send(notification.into()).await.is_err() {
                        return false;
                    }
                }
                Err(e) => {
                    warn!("notification stream failed, retrying in {:?}: {}", self.backoff, e);
                    return true;
                }
            }
        }

        warn!("notification stream ended, retrying in {:?}", self.backoff);
        true
    }

    /// Spawn [`Self::run`] on the current runtime.
    pub fn spawn(self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}
