//! Transport to the secrets server.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{SinkExt, StreamExt};
use keeper_core::config::ClientConfig;
use keeper_core::protocol::{
    methods, CredentialsParams, GetSecretResult, JsonRpcRequest, JsonRpcResponse,
    ListSecretsResult, Notification, PingResult, SaveSecretParams, SaveSecretResult,
    SecretIdParams, StatusCode, StreamFrame, TokenResult, DEFAULT_CHUNK_SIZE, DOWNLOAD_PATH,
    HEALTH_PATH, RPC_PATH, SUBSCRIBE_PATH, UPLOAD_PATH,
};
use keeper_core::{paths, SealedSecret, SecretId, SecretString};
use keeper_secrets::{Result, SecretError, SecretsApi};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::interceptor::CallInterceptor;
use crate::notification::NotificationSource;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Outcome of a finished upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadReceipt {
    pub id: SecretId,
    /// Chunks sent.
    pub chunks: usize,
    /// Chunks the server reports having stored.
    pub stored_chunks: usize,
    pub bytes: u64,
}

/// Outcome of a finished download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReceipt {
    pub path: PathBuf,
    pub chunks: usize,
    pub bytes: u64,
}

/// Unary and streaming calls against one server.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    ws_url: String,
    interceptor: Arc<CallInterceptor>,
    chunk_size: usize,
    download_dir: PathBuf,
}

fn unavailable(err: impl std::fmt::Display) -> SecretError {
    SecretError::Unavailable(err.to_string())
}

fn interrupted(err: impl std::fmt::Display) -> SecretError {
    SecretError::TransferInterrupted(err.to_string())
}

fn frame_error(code: i32, message: String) -> SecretError {
    SecretError::from_status(StatusCode::from_code(code), message)
}

impl ApiClient {
    /// Client for the server in `config`. No connection is made until the
    /// first call.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let download_dir = match &config.download_dir {
            Some(dir) => dir.clone(),
            None => paths::downloads_dir().map_err(|e| SecretError::Internal(e.to_string()))?,
        };
        let http = reqwest::Client::builder()
            .connect_timeout(config.request_timeout())
            .build()
            .map_err(|e| SecretError::Internal(format!("http client: {e}")))?;

        let base_url = config.base_url();
        let ws_url = match base_url.strip_prefix("https://") {
            Some(rest) => format!("wss://{rest}"),
            None => format!("ws://{}", base_url.trim_start_matches("http://")),
        };

        Ok(Self {
            http,
            base_url,
            ws_url,
            interceptor: Arc::new(CallInterceptor::new(config.request_timeout())),
            chunk_size: if config.chunk_size == 0 {
                DEFAULT_CHUNK_SIZE
            } else {
                config.chunk_size
            },
            download_dir,
        })
    }

    pub fn interceptor(&self) -> &Arc<CallInterceptor> {
        &self.interceptor
    }

    pub fn client_id(&self) -> u32 {
        self.interceptor.client_id()
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Issue one unary call.
    pub async fn call<P, R>(&self, method: &str, params: Option<P>) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let mut request = JsonRpcRequest::new(method);
        if let Some(params) = params {
            request = request.with_params(serde_json::to_value(params)?);
        }

        let builder = self
            .http
            .post(format!("{}{}", self.base_url, RPC_PATH))
            .json(&request);
        let response = self
            .interceptor
            .apply_unary(builder)
            .send()
            .await
            .map_err(unavailable)?;

        let body: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| SecretError::Internal(format!("malformed response: {e}")))?;

        if let Some(err) = body.error {
            debug!(method, code = err.code, "call failed: {}", err.message);
            return Err(SecretError::from_status(err.status(), err.message));
        }
        Ok(serde_json::from_value(
            body.result.unwrap_or(serde_json::Value::Null),
        )?)
    }

    async fn authenticate(&self, method: &str, login: &str, password: &SecretString) -> Result<()> {
        let params = CredentialsParams {
            login: login.to_string(),
            password: password.clone(),
        };
        let result: TokenResult = self.call(method, Some(params)).await?;
        self.interceptor.set_token(result.access_token);
        info!(login, "authenticated");
        Ok(())
    }

    /// Create an account and keep the returned token.
    pub async fn register(&self, login: &str, password: &SecretString) -> Result<()> {
        self.authenticate(methods::REGISTER, login, password).await
    }

    /// Log in and keep the returned token.
    pub async fn login(&self, login: &str, password: &SecretString) -> Result<()> {
        self.authenticate(methods::LOGIN, login, password).await
    }

    /// Authenticated liveness check (`health.ping`).
    pub async fn ping(&self) -> Result<PingResult> {
        self.call(methods::PING, None::<()>).await
    }

    /// Liveness check against `GET /health`; needs no login.
    pub async fn health(&self) -> Result<PingResult> {
        self.http
            .get(format!("{}{}", self.base_url, HEALTH_PATH))
            .timeout(self.interceptor.timeout())
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(unavailable)?
            .json()
            .await
            .map_err(|e| SecretError::Internal(format!("malformed health response: {e}")))
    }

    async fn open_stream(&self, path: &str) -> Result<Socket> {
        let mut request = format!("{}{}", self.ws_url, path)
            .into_client_request()
            .map_err(|e| SecretError::Internal(format!("stream request: {e}")))?;
        self.interceptor.apply_stream(&mut request)?;

        match connect_async(request).await {
            Ok((socket, _)) => Ok(socket),
            Err(tungstenite::Error::Http(response)) if response.status() == 401 => Err(
                SecretError::Unauthenticated("stream rejected by server".to_string()),
            ),
            Err(e) => Err(unavailable(e)),
        }
    }

    async fn send_frame(socket: &mut Socket, frame: &StreamFrame) -> Result<()> {
        socket
            .send(Message::Text(frame.to_json()?))
            .await
            .map_err(interrupted)
    }

    /// Next frame from the server, or `None` once it closed the stream.
    async fn next_frame(socket: &mut Socket) -> Result<Option<StreamFrame>> {
        while let Some(msg) = socket.next().await {
            match msg.map_err(interrupted)? {
                Message::Text(text) => return Ok(Some(StreamFrame::from_json(&text)?)),
                Message::Binary(bytes) => return Ok(Some(serde_json::from_slice(&bytes)?)),
                Message::Close(_) => return Ok(None),
                _ => continue,
            }
        }
        Ok(None)
    }

    /// Stream the file at `path` to the server in fixed-size chunks.
    pub async fn upload_file(
        &self,
        path: &Path,
        metadata: &str,
        session_password: &SecretString,
    ) -> Result<UploadReceipt> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| SecretError::InvalidSecret(format!("no file name in {}", path.display())))?
            .to_string();
        let mut file = tokio::fs::File::open(path).await?;

        let mut socket = self.open_stream(UPLOAD_PATH).await?;
        let mut buf = vec![0u8; self.chunk_size];
        let mut chunks = 0;
        let mut bytes = 0u64;

        loop {
            let n = read_chunk(&mut file, &mut buf).await?;
            // An empty file still sends one chunk so the name reaches the server.
            if n == 0 && chunks > 0 {
                break;
            }
            let frame = StreamFrame::UploadChunk {
                metadata: metadata.to_string(),
                file_name: file_name.clone(),
                session_password: session_password.clone(),
                data: buf[..n].to_vec(),
            };
            Self::send_frame(&mut socket, &frame).await?;
            chunks += 1;
            bytes += n as u64;
            if n < buf.len() {
                break;
            }
        }
        Self::send_frame(&mut socket, &StreamFrame::End).await?;

        let (id, stored_chunks) = match Self::next_frame(&mut socket).await? {
            Some(StreamFrame::Ack { id, chunks }) => (id, chunks),
            Some(StreamFrame::Error { code, message }) => return Err(frame_error(code, message)),
            Some(other) => {
                return Err(interrupted(format!("unexpected {} frame", other.name())))
            }
            None => return Err(interrupted("upload closed before acknowledgement")),
        };
        let _ = socket.close(None).await;

        info!(secret_id = id, file = %file_name, chunks, bytes, "file uploaded");
        Ok(UploadReceipt {
            id,
            chunks,
            stored_chunks,
            bytes,
        })
    }

    /// Fetch blob `id` into `<download_dir>/<file_name>`.
    ///
    /// Chunks are written to a `.part` file that replaces the target only
    /// once the server sends `end`; a failed transfer removes it and leaves
    /// any existing file untouched.
    pub async fn download_file(
        &self,
        id: SecretId,
        file_name: &str,
        session_password: &SecretString,
    ) -> Result<DownloadReceipt> {
        let name = Path::new(file_name)
            .file_name()
            .ok_or_else(|| SecretError::InvalidSecret(format!("bad file name {file_name:?}")))?;
        tokio::fs::create_dir_all(&self.download_dir).await?;
        let path = self.download_dir.join(name);
        let part = partial_path(&path);

        let mut socket = self.open_stream(DOWNLOAD_PATH).await?;
        let request = StreamFrame::Download {
            id,
            session_password: session_password.clone(),
        };
        Self::send_frame(&mut socket, &request).await?;

        let mut file = tokio::fs::File::create(&part).await?;
        let received = match Self::receive_file(&mut socket, &mut file).await {
            Ok(counts) => file.flush().await.map(|_| counts).map_err(SecretError::from),
            Err(e) => Err(e),
        };
        drop(file);

        let (chunks, bytes) = match received {
            Ok(counts) => counts,
            Err(e) => {
                if let Err(rm) = tokio::fs::remove_file(&part).await {
                    warn!("could not remove partial download {}: {}", part.display(), rm);
                }
                return Err(e);
            }
        };
        tokio::fs::rename(&part, &path).await?;
        let _ = socket.close(None).await;

        info!(secret_id = id, path = %path.display(), chunks, bytes, "file downloaded");
        Ok(DownloadReceipt {
            path,
            chunks,
            bytes,
        })
    }

    async fn receive_file(socket: &mut Socket, file: &mut tokio::fs::File) -> Result<(usize, u64)> {
        let mut chunks = 0;
        let mut bytes = 0u64;
        loop {
            match Self::next_frame(socket).await? {
                Some(StreamFrame::Chunk { data }) => {
                    file.write_all(&data).await?;
                    chunks += 1;
                    bytes += data.len() as u64;
                }
                Some(StreamFrame::End) => return Ok((chunks, bytes)),
                Some(StreamFrame::Error { code, message }) => return Err(frame_error(code, message)),
                Some(other) => {
                    return Err(interrupted(format!("unexpected {} frame", other.name())))
                }
                None => return Err(interrupted("download closed before end")),
            }
        }
    }
}

/// `<dir>/.<name>.part` next to `path`.
fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.part"))
}

/// Fill `buf` from `file`, stopping early only at end of file.
async fn read_chunk(file: &mut tokio::fs::File, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[async_trait]
impl SecretsApi for ApiClient {
    async fn save_secret(&self, secret: &SealedSecret) -> Result<SecretId> {
        let params = SaveSecretParams {
            secret: secret.clone(),
        };
        let result: SaveSecretResult = self.call(methods::SAVE_SECRET, Some(params)).await?;
        Ok(result.id)
    }

    async fn load_secret(&self, id: SecretId) -> Result<SealedSecret> {
        let result: GetSecretResult = self
            .call(methods::GET_SECRET, Some(SecretIdParams { id }))
            .await?;
        Ok(result.secret)
    }

    async fn load_secrets(&self) -> Result<Vec<SealedSecret>> {
        let result: ListSecretsResult = self.call(methods::LIST_SECRETS, None::<()>).await?;
        Ok(result.secrets)
    }

    async fn delete_secret(&self, id: SecretId) -> Result<()> {
        let _: serde_json::Value = self
            .call(methods::DELETE_SECRET, Some(SecretIdParams { id }))
            .await?;
        Ok(())
    }

    fn endpoint(&self) -> String {
        self.base_url.clone()
    }
}

#[async_trait]
impl NotificationSource for ApiClient {
    async fn subscribe(&self) -> Result<BoxStream<'static, Result<Notification>>> {
        let mut socket = self.open_stream(SUBSCRIBE_PATH).await?;
        let request = StreamFrame::Subscribe {
            client_id: self.client_id(),
        };
        Self::send_frame(&mut socket, &request).await?;
        debug!(client_id = self.client_id(), "subscribed to notifications");

        let notifications = socket.filter_map(|msg| async move {
            let text = match msg {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(_)) => {
                    return Some(Err(unavailable("notification stream closed")))
                }
                Ok(_) => return None,
                Err(e) => return Some(Err(unavailable(e))),
            };
            match StreamFrame::from_json(&text) {
                Ok(StreamFrame::Notification(notification)) => Some(Ok(notification)),
                Ok(StreamFrame::Error { code, message }) => Some(Err(frame_error(code, message))),
                Ok(other) => {
                    debug!(frame = other.name(), "ignoring frame on notification stream");
                    None
                }
                Err(e) => Some(Err(e.into())),
            }
        });
        Ok(notifications.boxed())
    }
}
