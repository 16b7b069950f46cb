//! Chunked file upload and download.
//!
//! Files are sealed server-side with the session password carried in the
//! frames, and stored as a blob envelope plus the sealed bytes.

use super::HandlerContext;
use crate::error::GatewayError;
use crate::interceptor::AuthenticatedStream;
use crate::Result;
use keeper_core::protocol::{Notification, StreamFrame, DEFAULT_CHUNK_SIZE};
use keeper_core::{SealedSecret, SecretId, SecretString};
use keeper_secrets::crypto;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Accumulates `upload_chunk` frames in arrival order.
#[derive(Default)]
struct Upload {
    file_name: String,
    metadata: String,
    session_password: Option<SecretString>,
    data: Vec<u8>,
    chunks: usize,
}

impl Upload {
    fn push(&mut self, frame: StreamFrame) -> Result<()> {
        match frame {
            StreamFrame::UploadChunk {
                metadata,
                file_name,
                session_password,
                data,
            } => {
                if self.chunks == 0 {
                    self.file_name = file_name;
                    self.metadata = metadata;
                    self.session_password = Some(session_password);
                }
                self.data.extend_from_slice(&data);
                self.chunks += 1;
                Ok(())
            }
            other => Err(GatewayError::InvalidParams(format!(
                "unexpected {} frame during upload",
                other.name()
            ))),
        }
    }

    fn finish(self) -> Result<(SealedSecret, SecretString, Vec<u8>)> {
        let password = self
            .session_password
            .ok_or_else(|| GatewayError::InvalidParams("upload carried no chunks".to_string()))?;
        if self.file_name.is_empty() {
            return Err(GatewayError::InvalidParams("file name must not be empty".to_string()));
        }
        Ok((SealedSecret::blob(self.file_name, self.metadata), password, self.data))
    }
}

/// Handle one upload stream: consume chunks until `end`, then reply `ack`.
pub async fn upload(mut stream: AuthenticatedStream, context: Arc<HandlerContext>) {
    match receive_upload(&mut stream, &context).await {
        Ok(Some((id, chunks))) => {
            if let Err(e) = stream.send(&StreamFrame::Ack { id, chunks }).await {
                warn!("could not acknowledge upload {}: {}", id, e);
            }
        }
        Ok(None) => {}
        Err(e) => {
            warn!("upload failed: {}", e);
            stream.send_error(&e).await;
        }
    }
    stream.close().await;
}

async fn receive_upload(
    stream: &mut AuthenticatedStream,
    context: &HandlerContext,
) -> Result<Option<(SecretId, usize)>> {
    let user_id = stream.user_id()?;
    let mut upload = Upload::default();

    loop {
        match stream.recv().await? {
            Some(StreamFrame::End) => break,
            Some(frame) => upload.push(frame)?,
            None => {
                warn!(user_id, chunks = upload.chunks, "upload closed before end");
                return Ok(None);
            }
        }
    }

    let chunks = upload.chunks;
    let (envelope, password, data) = upload.finish()?;
    let size = data.len();
    let sealed = tokio::task::spawn_blocking(move || crypto::encrypt(&data, password.expose_secret()))
        .await
        .map_err(|e| GatewayError::Internal(format!("sealing task: {e}")))??;

    let file_name = envelope.title.clone();
    let id = context.repository.save_file(user_id, envelope, sealed).await?;
    info!(user_id, secret_id = id, file = %file_name, chunks, size, "file uploaded");

    let origin = stream.context().client_id;
    let notification = Notification {
        secret_id: id,
        updated: false,
    };
    context.subscribers.broadcast(user_id, origin, notification);
    Ok(Some((id, chunks)))
}

/// Handle one download stream: read the request, then send chunks and `end`.
pub async fn download(mut stream: AuthenticatedStream, context: Arc<HandlerContext>) {
    if let Err(e) = send_download(&mut stream, &context).await {
        warn!("download failed: {}", e);
        stream.send_error(&e).await;
    }
    stream.close().await;
}

async fn send_download(stream: &mut AuthenticatedStream, context: &HandlerContext) -> Result<()> {
    let user_id = stream.user_id()?;

    let (id, password) = match stream.recv().await? {
        Some(StreamFrame::Download {
            id,
            session_password,
        }) => (id, session_password),
        Some(other) => {
            return Err(GatewayError::InvalidParams(format!(
                "expected download request, got {}",
                other.name()
            )))
        }
        None => return Ok(()),
    };

    let sealed = context.repository.load_file(user_id, id).await?;
    let data = tokio::task::spawn_blocking(move || crypto::decrypt(&sealed, password.expose_secret()))
        .await
        .map_err(|e| GatewayError::Internal(format!("opening task: {e}")))??;

    let mut chunks = 0;
    for piece in data.chunks(DEFAULT_CHUNK_SIZE) {
        stream
            .send(&StreamFrame::Chunk {
                data: piece.to_vec(),
            })
            .await?;
        chunks += 1;
    }
    stream.send(&StreamFrame::End).await?;

    debug!(user_id, secret_id = id, chunks, size = data.len(), "file downloaded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(name: &str, data: &[u8]) -> StreamFrame {
        StreamFrame::UploadChunk {
            metadata: "meta".to_string(),
            file_name: name.to_string(),
            session_password: "pw".into(),
            data: data.to_vec(),
        }
    }

    #[test]
    fn test_upload_concatenates_in_order() {
        let mut upload = Upload::default();
        upload.push(chunk("a.bin", b"abc")).unwrap();
        upload.push(chunk("ignored", b"def")).unwrap();
        upload.push(chunk("ignored", b"g")).unwrap();
        assert_eq!(upload.chunks, 3);

        let (envelope, password, data) = upload.finish().unwrap();
        assert_eq!(envelope.title, "a.bin");
        assert_eq!(envelope.metadata, "meta");
        assert_eq!(password.expose_secret(), "pw");
        assert_eq!(data, b"abcdefg");
    }

    #[test]
    fn test_upload_rejects_other_frames() {
        let mut upload = Upload::default();
        assert!(matches!(
            upload.push(StreamFrame::Chunk { data: vec![1] }),
            Err(GatewayError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_empty_upload_rejected() {
        assert!(Upload::default().finish().is_err());

        let mut upload = Upload::default();
        upload.push(chunk("", b"x")).unwrap();
        assert!(upload.finish().is_err());
    }
}
