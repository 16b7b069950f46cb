//! Keeper secrets server.
//!
//! Unary calls arrive as JSON-RPC over `POST /rpc` and pass the unary
//! interceptor before reaching the [`methods::MethodRegistry`]. Streaming
//! calls (file upload, file download, notifications) are WebSocket upgrades
//! guarded by the stream interceptor.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod interceptor;
pub mod methods;
pub mod notify;
pub mod repository;
pub mod server;

pub use auth::TokenAuthority;
pub use error::GatewayError;
pub use interceptor::CallContext;
pub use notify::SubscriberRegistry;
pub use repository::{MemoryRepository, Repository};
pub use server::Gateway;

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
