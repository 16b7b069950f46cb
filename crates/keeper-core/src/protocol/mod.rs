//! Wire protocol shared by the server and the client.
//!
//! Unary calls are JSON-RPC 2.0 over `POST /rpc`. Streaming calls upgrade
//! `GET /stream/{upload,download,subscribe}` to a WebSocket that carries
//! JSON-encoded [`StreamFrame`]s.

mod messages;
mod rpc;

pub use messages::*;
pub use rpc::*;

/// Header carrying the bearer token.
pub const ACCESS_TOKEN_HEADER: &str = "Access-Token";

/// Header carrying the per-process client identifier.
pub const CLIENT_ID_HEADER: &str = "Client-ID";

/// Default file transfer chunk size (2 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 2 * 1024 * 1024;

/// Largest accepted chunk size (8 MiB). A chunk travels base64-encoded in a
/// text frame, which must stay under the 16 MiB WebSocket frame limit.
pub const MAX_CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Frame size limit of the WebSocket stacks on both ends.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// HTTP route for unary calls.
pub const RPC_PATH: &str = "/rpc";

/// HTTP route for the liveness check.
pub const HEALTH_PATH: &str = "/health";

/// WebSocket route for file uploads.
pub const UPLOAD_PATH: &str = "/stream/upload";

/// WebSocket route for file downloads.
pub const DOWNLOAD_PATH: &str = "/stream/download";

/// WebSocket route for change notifications.
pub const SUBSCRIBE_PATH: &str = "/stream/subscribe";

/// Unary method names.
pub mod methods {
    pub const REGISTER: &str = "users.register";
    pub const LOGIN: &str = "users.login";
    pub const SAVE_SECRET: &str = "secrets.save";
    pub const GET_SECRET: &str = "secrets.get";
    pub const LIST_SECRETS: &str = "secrets.list";
    pub const DELETE_SECRET: &str = "secrets.delete";
    pub const PING: &str = "health.ping";

    /// Methods callable without an access token.
    pub const PUBLIC: &[&str] = &[REGISTER, LOGIN];

    pub fn is_public(method: &str) -> bool {
        PUBLIC.contains(&method)
    }
}
