//! Helpers for running a live server on an ephemeral port.

use keeper_client::ApiClient;
use keeper_core::config::ClientConfig;
use keeper_core::UserId;
use keeper_gateway::{Gateway, MemoryRepository, SubscriberRegistry, TokenAuthority};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Signing key of every test server, so tests can mint their own tokens.
pub const TEST_SIGNING_KEY: &str = "integration-test-signing-key";

/// PBKDF2 iteration count used by test clients.
pub const TEST_ITERATIONS: u32 = 4096;

pub struct TestServer {
    pub addr: SocketAddr,
    pub subscribers: Arc<SubscriberRegistry>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<keeper_gateway::Result<()>>,
}

impl TestServer {
    pub async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let authority = TokenAuthority::new(TEST_SIGNING_KEY.into(), Duration::from_secs(3600));
        let gateway = Gateway::new(Arc::new(MemoryRepository::new()), authority)
            .await
            .with_shutdown_timeout(Duration::from_secs(2));
        let subscribers = gateway.subscribers();

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(gateway.serve(listener, async {
            let _ = rx.await;
        }));

        Self {
            addr,
            subscribers,
            shutdown: Some(tx),
            handle,
        }
    }

    pub fn client_config(&self, download_dir: &Path) -> ClientConfig {
        ClientConfig {
            server_address: self.addr.to_string(),
            download_dir: Some(download_dir.to_path_buf()),
            kdf_iterations: TEST_ITERATIONS,
            ..ClientConfig::default()
        }
    }

    pub fn client(&self, download_dir: &Path) -> Arc<ApiClient> {
        Arc::new(ApiClient::new(&self.client_config(download_dir)).unwrap())
    }

    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        tokio::time::timeout(Duration::from_secs(10), &mut self.handle)
            .await
            .expect("server did not stop")
            .unwrap()
            .unwrap();
    }
}

/// Register `login`, returning a client that holds its token.
pub async fn registered_client(
    server: &TestServer,
    download_dir: &Path,
    login: &str,
    password: &str,
) -> Arc<ApiClient> {
    let client = server.client(download_dir);
    client.register(login, &password.into()).await.unwrap();
    client
}

/// Poll `condition` every 20 ms for up to 5 s.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..250 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}

/// Users are numbered from 1 in registration order.
pub const FIRST_USER: UserId = 1;
