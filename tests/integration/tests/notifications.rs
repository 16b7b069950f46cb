//! Change notifications fan out to a user's other sessions.

use keeper_client::{ApiClient, ClientEvent, NotificationListener};
use keeper_core::{Secret, SecretData};
use keeper_integration_tests::{wait_until, TestServer, FIRST_USER, TEST_ITERATIONS};
use keeper_secrets::{Encrypter, RemoteSecretStore, SecretStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct Session {
    client: Arc<ApiClient>,
    events: mpsc::Receiver<ClientEvent>,
    cancel: CancellationToken,
    listener: JoinHandle<()>,
}

impl Session {
    async fn start(client: Arc<ApiClient>) -> Self {
        let (tx, events) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let listener = NotificationListener::new(client.clone(), tx, Duration::from_millis(100))
            .spawn(cancel.clone());
        Self {
            client,
            events,
            cancel,
            listener,
        }
    }

    fn store(&self) -> RemoteSecretStore {
        RemoteSecretStore::with_encrypter(
            self.client.clone(),
            "pw1".into(),
            Encrypter::with_iterations(TEST_ITERATIONS),
        )
    }

    async fn stop(self) {
        self.cancel.cancel();
        self.listener.await.unwrap();
    }
}

async fn next_event(events: &mut mpsc::Receiver<ClientEvent>) -> ClientEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("no notification arrived")
        .expect("listener stopped")
}

#[tokio::test]
async fn test_changes_reach_other_sessions_only() {
    let server = TestServer::spawn().await;
    let dir = tempfile::tempdir().unwrap();

    let a = server.client(dir.path());
    a.register("alice", &"pw1".into()).await.unwrap();
    let b = server.client(dir.path());
    b.login("alice", &"pw1".into()).await.unwrap();

    let mut a = Session::start(a).await;
    let mut b = Session::start(b).await;
    assert!(wait_until(|| server.subscribers.subscriber_count(FIRST_USER) == 2).await);

    let id = a
        .store()
        .create(Secret::new("wifi", "", SecretData::text("p4ss")))
        .await
        .unwrap();
    assert_eq!(
        next_event(&mut b.events).await,
        ClientEvent::ReloadSecretList {
            secret_id: id,
            updated: false
        }
    );

    b.store().delete(id).await.unwrap();
    assert_eq!(
        next_event(&mut a.events).await,
        ClientEvent::ReloadSecretList {
            secret_id: id,
            updated: true
        }
    );

    // Neither session hears about its own changes.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(a.events.try_recv().is_err());
    assert!(b.events.try_recv().is_err());

    b.stop().await;
    assert!(wait_until(|| server.subscribers.subscriber_count(FIRST_USER) == 1).await);

    a.stop().await;
    assert!(wait_until(|| !server.subscribers.has_user(FIRST_USER)).await);

    server.stop().await;
}

#[tokio::test]
async fn test_other_users_are_not_notified() {
    let server = TestServer::spawn().await;
    let dir = tempfile::tempdir().unwrap();

    let alice = server.client(dir.path());
    alice.register("alice", &"pw1".into()).await.unwrap();
    let bob = server.client(dir.path());
    bob.register("bob", &"pw1".into()).await.unwrap();

    let mut bob = Session::start(bob).await;
    assert!(wait_until(|| server.subscribers.subscriber_count(FIRST_USER + 1) == 1).await);

    RemoteSecretStore::with_encrypter(
        alice,
        "pw1".into(),
        Encrypter::with_iterations(TEST_ITERATIONS),
    )
    .create(Secret::new("alice only", "", SecretData::text("x")))
    .await
    .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(bob.events.try_recv().is_err());

    bob.stop().await;
    server.stop().await;
}

#[tokio::test]
async fn test_upload_notifies_other_sessions() {
    let server = TestServer::spawn().await;
    let dir = tempfile::tempdir().unwrap();

    let a = server.client(dir.path());
    a.register("alice", &"pw1".into()).await.unwrap();
    let b = server.client(dir.path());
    b.login("alice", &"pw1".into()).await.unwrap();
    let mut b = Session::start(b).await;
    assert!(wait_until(|| server.subscribers.subscriber_count(FIRST_USER) == 1).await);

    let source = dir.path().join("photo.jpg");
    tokio::fs::write(&source, b"jpeg bytes").await.unwrap();
    let receipt = a.upload_file(&source, "", &"pw1".into()).await.unwrap();

    assert_eq!(
        next_event(&mut b.events).await,
        ClientEvent::ReloadSecretList {
            secret_id: receipt.id,
            updated: false
        }
    );

    b.stop().await;
    server.stop().await;
}

#[tokio::test]
async fn test_server_shutdown_ends_subscriptions() {
    let server = TestServer::spawn().await;
    let dir = tempfile::tempdir().unwrap();

    let a = server.client(dir.path());
    a.register("alice", &"pw1".into()).await.unwrap();
    let a = Session::start(a).await;
    assert!(wait_until(|| server.subscribers.subscriber_count(FIRST_USER) == 1).await);

    let subscribers = server.subscribers.clone();
    server.stop().await;
    assert!(!subscribers.has_user(FIRST_USER));

    a.stop().await;
}
