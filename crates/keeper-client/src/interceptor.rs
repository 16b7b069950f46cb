//! Outgoing call decoration: access token, client id and unary timeout.

use keeper_core::protocol::{ACCESS_TOKEN_HEADER, CLIENT_ID_HEADER};
use keeper_core::{ClientId, SecretString};
use keeper_secrets::{Result, SecretError};
use parking_lot::RwLock;
use rand::Rng;
use std::time::Duration;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};

/// Holds the session token and stamps it onto every call.
pub struct CallInterceptor {
    token: RwLock<Option<SecretString>>,
    client_id: ClientId,
    timeout: Duration,
}

impl CallInterceptor {
    /// New interceptor with a random 31-bit client id.
    pub fn new(timeout: Duration) -> Self {
        let client_id = rand::thread_rng().gen_range(0..=i32::MAX as u32);
        Self::with_client_id(client_id, timeout)
    }

    pub fn with_client_id(client_id: ClientId, timeout: Duration) -> Self {
        Self {
            token: RwLock::new(None),
            client_id,
            timeout,
        }
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_token(&self, token: SecretString) {
        *self.token.write() = Some(token);
    }

    pub fn clear_token(&self) {
        *self.token.write() = None;
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.read().is_some()
    }

    /// Decorate a unary request. Before login only the timeout is applied.
    pub fn apply_unary(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.timeout(self.timeout);
        match self.token.read().as_ref() {
            Some(token) => builder
                .header(ACCESS_TOKEN_HEADER, token.expose_secret())
                .header(CLIENT_ID_HEADER, self.client_id.to_string()),
            None => builder,
        }
    }

    /// Decorate a stream upgrade request.
    pub fn apply_stream(&self, request: &mut Request) -> Result<()> {
        let token = self.token.read();
        let Some(token) = token.as_ref() else {
            return Ok(());
        };

        let headers = request.headers_mut();
        headers.insert(
            header_name(ACCESS_TOKEN_HEADER)?,
            HeaderValue::from_str(token.expose_secret())
                .map_err(|e| SecretError::Internal(format!("access token header: {e}")))?,
        );
        headers.insert(header_name(CLIENT_ID_HEADER)?, HeaderValue::from(self.client_id));
        Ok(())
    }
}

fn header_name(name: &str) -> Result<HeaderName> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| SecretError::Internal(format!("header name {name}: {e}")))
}
