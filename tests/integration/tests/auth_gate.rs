//! Calls without a valid access token never reach a handler.

use chrono::{Duration, Utc};
use keeper_client::NotificationSource;
use keeper_gateway::auth::create_token;
use keeper_integration_tests::{registered_client, TestServer, FIRST_USER, TEST_SIGNING_KEY};
use keeper_secrets::{SecretError, SecretsApi};

#[tokio::test]
async fn test_missing_token_rejected() {
    let server = TestServer::spawn().await;
    let dir = tempfile::tempdir().unwrap();
    let client = server.client(dir.path());

    assert!(matches!(
        client.load_secrets().await,
        Err(SecretError::Unauthenticated(_))
    ));
    assert!(matches!(
        client.ping().await,
        Err(SecretError::Unauthenticated(_))
    ));
    assert!(matches!(
        client.subscribe().await,
        Err(SecretError::Unauthenticated(_))
    ));

    server.stop().await;
}

#[tokio::test]
async fn test_health_needs_no_token() {
    let server = TestServer::spawn().await;
    let dir = tempfile::tempdir().unwrap();
    let client = server.client(dir.path());

    let pong = client.health().await.unwrap();
    assert_eq!(pong.status, "ok");

    server.stop().await;
}

#[tokio::test]
async fn test_expired_token_rejected() {
    let server = TestServer::spawn().await;
    let dir = tempfile::tempdir().unwrap();
    let client = registered_client(&server, dir.path(), "alice", "pw1").await;
    assert!(client.load_secrets().await.is_ok());

    let expired = create_token(
        FIRST_USER,
        Utc::now() - Duration::seconds(1),
        TEST_SIGNING_KEY.as_bytes(),
    )
    .unwrap();
    client.interceptor().set_token(expired.into());

    assert!(matches!(
        client.load_secrets().await,
        Err(SecretError::Unauthenticated(_))
    ));
    assert!(matches!(
        client.subscribe().await,
        Err(SecretError::Unauthenticated(_))
    ));

    server.stop().await;
}

#[tokio::test]
async fn test_forged_token_rejected() {
    let server = TestServer::spawn().await;
    let dir = tempfile::tempdir().unwrap();
    let client = server.client(dir.path());

    let forged = create_token(
        FIRST_USER,
        Utc::now() + Duration::hours(1),
        b"not-the-server-key",
    )
    .unwrap();
    client.interceptor().set_token(forged.into());

    assert!(matches!(
        client.load_secrets().await,
        Err(SecretError::Unauthenticated(_))
    ));

    server.stop().await;
}
