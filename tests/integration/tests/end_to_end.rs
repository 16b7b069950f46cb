//! Register, log in and run the secret lifecycle through a live server.

use keeper_core::{Secret, SecretData};
use keeper_integration_tests::{registered_client, TestServer, TEST_ITERATIONS};
use keeper_secrets::{Encrypter, RemoteSecretStore, SecretError, SecretStore};

fn store(client: std::sync::Arc<keeper_client::ApiClient>, password: &str) -> RemoteSecretStore {
    RemoteSecretStore::with_encrypter(
        client,
        password.into(),
        Encrypter::with_iterations(TEST_ITERATIONS),
    )
}

#[tokio::test]
async fn test_credential_lifecycle() {
    let server = TestServer::spawn().await;
    let dir = tempfile::tempdir().unwrap();
    let client = registered_client(&server, dir.path(), "alice", "pw1").await;
    let remote = store(client, "pw1");

    let id = remote
        .create(Secret::new(
            "github",
            "work account",
            SecretData::credential("alice", "hunter2"),
        ))
        .await
        .unwrap();
    assert!(id > 0);

    let all = remote.get_all().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].title, "github");
    assert_eq!(all[0].data, SecretData::credential("alice", "hunter2"));

    let mut secret = remote.get(id).await.unwrap();
    secret.data = SecretData::credential("alice", "correct horse");
    remote.update(secret).await.unwrap();
    assert_eq!(
        remote.get(id).await.unwrap().data,
        SecretData::credential("alice", "correct horse")
    );

    remote.delete(id).await.unwrap();
    assert!(remote.get_all().await.unwrap().is_empty());
    assert!(matches!(remote.get(id).await, Err(SecretError::NotFound(_))));

    server.stop().await;
}

#[tokio::test]
async fn test_second_session_sees_same_secrets() {
    let server = TestServer::spawn().await;
    let dir = tempfile::tempdir().unwrap();
    let first = store(registered_client(&server, dir.path(), "alice", "pw1").await, "pw1");
    first
        .create(Secret::new("note", "", SecretData::text("remember the milk")))
        .await
        .unwrap();

    let client = server.client(dir.path());
    client.login("alice", &"pw1".into()).await.unwrap();
    let second = store(client, "pw1");
    let all = second.get_all().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].data, SecretData::text("remember the milk"));

    server.stop().await;
}

#[tokio::test]
async fn test_users_are_isolated() {
    let server = TestServer::spawn().await;
    let dir = tempfile::tempdir().unwrap();
    let alice = store(registered_client(&server, dir.path(), "alice", "pw1").await, "pw1");
    let bob = store(registered_client(&server, dir.path(), "bob", "pw2").await, "pw2");

    let id = alice
        .create(Secret::new("mine", "", SecretData::text("private")))
        .await
        .unwrap();

    assert!(bob.get_all().await.unwrap().is_empty());
    assert!(matches!(bob.get(id).await, Err(SecretError::NotFound(_))));
    assert!(bob.delete(id).await.is_err());
    assert_eq!(alice.get_all().await.unwrap().len(), 1);

    server.stop().await;
}

#[tokio::test]
async fn test_account_errors() {
    let server = TestServer::spawn().await;
    let dir = tempfile::tempdir().unwrap();
    registered_client(&server, dir.path(), "alice", "pw1").await;

    let client = server.client(dir.path());
    assert!(matches!(
        client.register("alice", &"other".into()).await,
        Err(SecretError::AlreadyExists(_))
    ));
    assert!(matches!(
        client.login("alice", &"wrong".into()).await,
        Err(SecretError::Unauthenticated(_))
    ));
    assert!(matches!(
        client.login("nobody", &"pw1".into()).await,
        Err(SecretError::Unauthenticated(_))
    ));

    server.stop().await;
}

#[tokio::test]
async fn test_ping() {
    let server = TestServer::spawn().await;
    let dir = tempfile::tempdir().unwrap();
    let client = registered_client(&server, dir.path(), "alice", "pw1").await;

    let pong = client.ping().await.unwrap();
    assert_eq!(pong.status, "ok");

    server.stop().await;
}
