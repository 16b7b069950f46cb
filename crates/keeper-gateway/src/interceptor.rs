//! Authentication gates in front of every call.
//!
//! Unary calls pass through [`authorize_unary`] before dispatch; stream
//! upgrades pass through [`authorize_stream`] and hand the resulting
//! context to handlers inside an [`AuthenticatedStream`].

use axum::extract::ws::{Message, WebSocket};
use axum::http::HeaderMap;
use futures::{SinkExt, StreamExt};
use keeper_core::protocol::{methods, StreamFrame, ACCESS_TOKEN_HEADER, CLIENT_ID_HEADER};
use keeper_core::{ClientId, UserId};
use tracing::{debug, warn};

use crate::auth::TokenAuthority;
use crate::error::GatewayError;
use crate::Result;

/// Identity attached to a call after authentication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallContext {
    /// `None` only for allow-listed methods called without a token.
    pub user_id: Option<UserId>,
    pub client_id: Option<ClientId>,
}

impl CallContext {
    pub fn authenticated(user_id: UserId, client_id: Option<ClientId>) -> Self {
        Self {
            user_id: Some(user_id),
            client_id,
        }
    }

    /// The calling user, or `Unauthenticated`.
    pub fn user(&self) -> Result<UserId> {
        self.user_id
            .ok_or_else(|| GatewayError::Unauthenticated("missing access token".to_string()))
    }
}

fn client_id(headers: &HeaderMap) -> Option<ClientId> {
    headers
        .get(CLIENT_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

fn verify_headers(headers: &HeaderMap, authority: &TokenAuthority) -> Result<CallContext> {
    let token = headers
        .get(ACCESS_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| GatewayError::Unauthenticated("missing access token".to_string()))?;

    let claims = authority.verify(token)?;
    Ok(CallContext::authenticated(claims.user_id, client_id(headers)))
}

/// Gate a unary call. Allow-listed methods pass without a token.
pub fn authorize_unary(
    method: &str,
    headers: &HeaderMap,
    authority: &TokenAuthority,
) -> Result<CallContext> {
    if methods::is_public(method) {
        return Ok(CallContext {
            user_id: None,
            client_id: client_id(headers),
        });
    }

    verify_headers(headers, authority).map_err(|e| {
        warn!(method, "unary call rejected: {}", e);
        e
    })
}

/// Gate a stream upgrade. Every stream requires a valid token.
pub fn authorize_stream(headers: &HeaderMap, authority: &TokenAuthority) -> Result<CallContext> {
    verify_headers(headers, authority).map_err(|e| {
        warn!("stream rejected: {}", e);
        e
    })
}

/// An upgraded socket paired with the identity that opened it.
pub struct AuthenticatedStream {
    socket: WebSocket,
    ctx: CallContext,
}

impl AuthenticatedStream {
    pub fn new(socket: WebSocket, ctx: CallContext) -> Self {
        Self { socket, ctx }
    }

    pub fn context(&self) -> CallContext {
        self.ctx
    }

    pub fn user_id(&self) -> Result<UserId> {
        self.ctx.user()
    }

    pub async fn send(&mut self, frame: &StreamFrame) -> Result<()> {
        let text = frame.to_json()?;
        self.socket
            .send(Message::Text(text))
            .await
            .map_err(|e| GatewayError::WebSocket(e.to_string()))
    }

    /// Send a terminal error frame; delivery failures are ignored.
    pub async fn send_error(&mut self, err: &GatewayError) {
        let frame = StreamFrame::Error {
            code: err.code(),
            message: err.to_string(),
        };
        if let Err(e) = self.send(&frame).await {
            debug!("could not deliver error frame: {}", e);
        }
    }

    /// Next frame, or `None` once the peer has closed.
    pub async fn recv(&mut self) -> Result<Option<StreamFrame>> {
        while let Some(msg) = self.socket.next().await {
            match msg.map_err(|e| GatewayError::WebSocket(e.to_string()))? {
                Message::Text(text) => return Ok(Some(StreamFrame::from_json(&text)?)),
                Message::Binary(bytes) => return Ok(Some(serde_json::from_slice(&bytes)?)),
                Message::Close(_) => return Ok(None),
                Message::Ping(_) | Message::Pong(_) => continue,
            }
        }
        Ok(None)
    }

    pub async fn close(mut self) {
        let _ = self.socket.close().await;
    }
}
