//! Per-user fan-out of change notifications.

use dashmap::DashMap;
use keeper_core::protocol::Notification;
use keeper_core::{ClientId, UserId};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

struct Subscription {
    key: u64,
    client_id: ClientId,
    sender: mpsc::UnboundedSender<Notification>,
    done: Option<oneshot::Sender<()>>,
}

impl Subscription {
    fn finish(&mut self) {
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
    }
}

/// Receiving half of a registration, held by the stream handler.
pub struct SubscriptionHandle {
    pub user_id: UserId,
    pub client_id: ClientId,
    key: u64,
    pub notifications: mpsc::UnboundedReceiver<Notification>,
    /// Fires when the registry finishes this subscription.
    pub done: oneshot::Receiver<()>,
}

/// Live notification streams, keyed by user.
#[derive(Default)]
pub struct SubscriberRegistry {
    subscribers: DashMap<UserId, Vec<Subscription>>,
    next_key: AtomicU64,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, user_id: UserId, client_id: ClientId) -> SubscriptionHandle {
        let (sender, notifications) = mpsc::unbounded_channel();
        let (done_tx, done) = oneshot::channel();
        let key = self.next_key.fetch_add(1, Ordering::Relaxed);

        self.subscribers.entry(user_id).or_default().push(Subscription {
            key,
            client_id,
            sender,
            done: Some(done_tx),
        });
        info!(user_id, client_id, "subscriber registered");

        SubscriptionHandle {
            user_id,
            client_id,
            key,
            notifications,
            done,
        }
    }

    /// Remove the registration behind `handle`, if still present.
    pub fn unregister(&self, handle: &SubscriptionHandle) {
        if let Some(mut subs) = self.subscribers.get_mut(&handle.user_id) {
            subs.retain(|sub| sub.key != handle.key);
        }
        self.subscribers
            .remove_if(&handle.user_id, |_, subs| subs.is_empty());
        debug!(
            user_id = handle.user_id,
            client_id = handle.client_id,
            "subscriber unregistered"
        );
    }

    /// Push `notification` to every stream of `user_id` except the one
    /// belonging to `origin`. Returns the number of streams reached.
    pub fn broadcast(
        &self,
        user_id: UserId,
        origin: Option<ClientId>,
        notification: Notification,
    ) -> usize {
        let mut delivered = 0;

        if let Some(mut subs) = self.subscribers.get_mut(&user_id) {
            subs.retain_mut(|sub| {
                if origin == Some(sub.client_id) {
                    return true;
                }
                match sub.sender.send(notification) {
                    Ok(()) => {
                        delivered += 1;
                        true
                    }
                    Err(_) => {
                        warn!(user_id, client_id = sub.client_id, "dropping dead subscriber");
                        sub.finish();
                        false
                    }
                }
            });
        }
        self.subscribers.remove_if(&user_id, |_, subs| subs.is_empty());

        debug!(
            user_id,
            secret_id = notification.secret_id,
            delivered,
            "notification broadcast"
        );
        delivered
    }

    /// Finish every subscription. Used on shutdown.
    pub fn close_all(&self) {
        self.subscribers.retain(|_, subs| {
            for sub in subs.iter_mut() {
                sub.finish();
            }
            false
        });
        info!("all subscribers closed");
    }

    pub fn subscriber_count(&self, user_id: UserId) -> usize {
        self.subscribers
            .get(&user_id)
            .map(|subs| subs.len())
            .unwrap_or(0)
    }

    pub fn has_user(&self, user_id: UserId) -> bool {
        self.subscribers.contains_key(&user_id)
    }
}
