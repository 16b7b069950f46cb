//! Chunked upload and download of file secrets.

use keeper_client::ApiClient;
use keeper_core::SecretData;
use keeper_integration_tests::{TestServer, TEST_ITERATIONS};
use keeper_secrets::{Encrypter, RemoteSecretStore, SecretError, SecretStore};
use std::sync::Arc;

async fn client_with_chunk_size(
    server: &TestServer,
    download_dir: &std::path::Path,
    chunk_size: usize,
) -> Arc<ApiClient> {
    let mut config = server.client_config(download_dir);
    config.chunk_size = chunk_size;
    let client = Arc::new(ApiClient::new(&config).unwrap());
    client.register("alice", &"pw1".into()).await.unwrap();
    client
}

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

#[tokio::test]
async fn test_upload_then_download() {
    let server = TestServer::spawn().await;
    let work = tempfile::tempdir().unwrap();
    let downloads = tempfile::tempdir().unwrap();
    let client = client_with_chunk_size(&server, downloads.path(), 1000).await;

    let source = work.path().join("report.pdf");
    let bytes = payload(2500);
    tokio::fs::write(&source, &bytes).await.unwrap();

    let receipt = client
        .upload_file(&source, "quarterly", &"pw1".into())
        .await
        .unwrap();
    assert_eq!(receipt.chunks, 3);
    assert_eq!(receipt.stored_chunks, 3);
    assert_eq!(receipt.bytes, 2500);

    let remote = RemoteSecretStore::with_encrypter(
        client.clone(),
        "pw1".into(),
        Encrypter::with_iterations(TEST_ITERATIONS),
    );
    let listed = remote.get_all().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, receipt.id);
    assert_eq!(listed[0].metadata, "quarterly");
    match &listed[0].data {
        SecretData::Blob(blob) => assert_eq!(blob.file_name, "report.pdf"),
        other => panic!("expected blob, got {other:?}"),
    }

    let download = client
        .download_file(receipt.id, "report.pdf", &"pw1".into())
        .await
        .unwrap();
    assert_eq!(download.path, downloads.path().join("report.pdf"));
    // The server sends at its own chunk size, which holds the whole file.
    assert_eq!(download.chunks, 1);
    assert_eq!(download.bytes, 2500);
    assert_eq!(tokio::fs::read(&download.path).await.unwrap(), bytes);

    server.stop().await;
}

#[tokio::test]
async fn test_exact_multiple_of_chunk_size() {
    let server = TestServer::spawn().await;
    let work = tempfile::tempdir().unwrap();
    let client = client_with_chunk_size(&server, work.path(), 512).await;

    let source = work.path().join("even.bin");
    tokio::fs::write(&source, payload(1024)).await.unwrap();

    let receipt = client.upload_file(&source, "", &"pw1".into()).await.unwrap();
    assert_eq!(receipt.chunks, 2);
    assert_eq!(receipt.stored_chunks, 2);
    assert_eq!(receipt.bytes, 1024);

    server.stop().await;
}

#[tokio::test]
async fn test_empty_file() {
    let server = TestServer::spawn().await;
    let work = tempfile::tempdir().unwrap();
    let downloads = tempfile::tempdir().unwrap();
    let client = client_with_chunk_size(&server, downloads.path(), 1000).await;

    let source = work.path().join("empty.txt");
    tokio::fs::write(&source, b"").await.unwrap();

    let receipt = client.upload_file(&source, "", &"pw1".into()).await.unwrap();
    assert_eq!(receipt.chunks, 1);
    assert_eq!(receipt.stored_chunks, 1);
    assert_eq!(receipt.bytes, 0);

    let download = client
        .download_file(receipt.id, "empty.txt", &"pw1".into())
        .await
        .unwrap();
    assert_eq!(download.bytes, 0);
    assert!(tokio::fs::read(&download.path).await.unwrap().is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_wrong_session_password_leaves_no_file() {
    let server = TestServer::spawn().await;
    let work = tempfile::tempdir().unwrap();
    let downloads = tempfile::tempdir().unwrap();
    let client = client_with_chunk_size(&server, downloads.path(), 1000).await;

    let source = work.path().join("keys.txt");
    tokio::fs::write(&source, payload(300)).await.unwrap();
    let receipt = client.upload_file(&source, "", &"pw1".into()).await.unwrap();

    let result = client
        .download_file(receipt.id, "keys.txt", &"not-pw1".into())
        .await;
    assert!(matches!(result, Err(SecretError::Unauthenticated(_))));
    assert!(!downloads.path().join("keys.txt").exists());
    assert!(!downloads.path().join(".keys.txt.part").exists());

    server.stop().await;
}

#[tokio::test]
async fn test_server_counts_ceil_of_size_over_chunk() {
    let server = TestServer::spawn().await;
    let work = tempfile::tempdir().unwrap();
    let client = client_with_chunk_size(&server, work.path(), 700).await;

    for (i, size) in [1usize, 699, 700, 701, 2100, 5000].into_iter().enumerate() {
        let source = work.path().join(format!("file-{i}.bin"));
        tokio::fs::write(&source, payload(size)).await.unwrap();
        let receipt = client.upload_file(&source, "", &"pw1".into()).await.unwrap();
        assert_eq!(receipt.stored_chunks, size.div_ceil(700), "size {size}");
    }

    server.stop().await;
}

#[tokio::test]
async fn test_failed_download_keeps_existing_file() {
    let server = TestServer::spawn().await;
    let work = tempfile::tempdir().unwrap();
    let downloads = tempfile::tempdir().unwrap();
    let client = client_with_chunk_size(&server, downloads.path(), 1000).await;

    let source = work.path().join("notes.txt");
    tokio::fs::write(&source, b"new contents").await.unwrap();
    let receipt = client.upload_file(&source, "", &"pw1".into()).await.unwrap();

    let existing = downloads.path().join("notes.txt");
    tokio::fs::write(&existing, b"keep me").await.unwrap();

    let result = client
        .download_file(receipt.id, "notes.txt", &"not-pw1".into())
        .await;
    assert!(matches!(result, Err(SecretError::Unauthenticated(_))));
    assert_eq!(tokio::fs::read(&existing).await.unwrap(), b"keep me");
    assert!(!downloads.path().join(".notes.txt.part").exists());

    let download = client
        .download_file(receipt.id, "notes.txt", &"pw1".into())
        .await
        .unwrap();
    assert_eq!(download.path, existing);
    assert_eq!(tokio::fs::read(&existing).await.unwrap(), b"new contents");

    server.stop().await;
}

#[tokio::test]
async fn test_download_unknown_id() {
    let server = TestServer::spawn().await;
    let downloads = tempfile::tempdir().unwrap();
    let client = client_with_chunk_size(&server, downloads.path(), 1000).await;

    let result = client.download_file(999, "ghost.bin", &"pw1".into()).await;
    assert!(matches!(result, Err(SecretError::NotFound(_))));
    assert!(!downloads.path().join("ghost.bin").exists());

    server.stop().await;
}

#[tokio::test]
async fn test_download_name_stays_in_download_dir() {
    let server = TestServer::spawn().await;
    let work = tempfile::tempdir().unwrap();
    let downloads = tempfile::tempdir().unwrap();
    let client = client_with_chunk_size(&server, downloads.path(), 1000).await;

    let source = work.path().join("plain.txt");
    tokio::fs::write(&source, b"hello").await.unwrap();
    let receipt = client.upload_file(&source, "", &"pw1".into()).await.unwrap();

    let download = client
        .download_file(receipt.id, "../../escape.txt", &"pw1".into())
        .await
        .unwrap();
    assert_eq!(download.path, downloads.path().join("escape.txt"));

    server.stop().await;
}
