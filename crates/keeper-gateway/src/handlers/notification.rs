//! Server side of the notification stream.

use super::HandlerContext;
use crate::error::GatewayError;
use crate::interceptor::AuthenticatedStream;
use crate::Result;
use keeper_core::protocol::StreamFrame;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Register the caller and forward notifications until the client leaves
/// or the registry finishes the subscription.
pub async fn subscribe(mut stream: AuthenticatedStream, context: Arc<HandlerContext>) {
    if let Err(e) = run(&mut stream, &context).await {
        warn!("subscription ended with error: {}", e);
        stream.send_error(&e).await;
    }
    stream.close().await;
}

async fn run(stream: &mut AuthenticatedStream, context: &HandlerContext) -> Result<()> {
    let user_id = stream.user_id()?;

    let client_id = match stream.recv().await? {
        Some(StreamFrame::Subscribe { client_id }) => client_id,
        Some(other) => {
            return Err(GatewayError::InvalidParams(format!(
                "expected subscribe request, got {}",
                other.name()
            )))
        }
        None => return Ok(()),
    };

    let mut handle = context.subscribers.register(user_id, client_id);
    let result = loop {
        tokio::select! {
            _ = &mut handle.done => {
                debug!(user_id, client_id, "subscription finished by server");
                break Ok(());
            }
            incoming = stream.recv() => match incoming {
                Ok(None) => {
                    debug!(user_id, client_id, "subscriber disconnected");
                    break Ok(());
                }
                Ok(Some(frame)) => {
                    debug!(user_id, client_id, frame = frame.name(), "ignoring client frame");
                }
                Err(e) => break Err(e),
            },
            next = handle.notifications.recv() => match next {
                Some(notification) => {
                    if let Err(e) = stream.send(&StreamFrame::Notification(notification)).await {
                        break Err(e);
                    }
                }
                None => break Ok(()),
            },
        }
    };

    context.subscribers.unregister(&handle);
    info!(user_id, client_id, "subscription closed");
    result
}
