//! Method and stream handlers.
//!
//! Unary handlers are registered in the [`MethodRegistry`]; stream handlers
//! (`files`, `notification`) are plain async functions the router calls
//! after the WebSocket upgrade.

pub mod files;
pub mod health;
pub mod notification;
pub mod secrets;
pub mod users;

use crate::auth::TokenAuthority;
use crate::methods::MethodRegistry;
use crate::notify::SubscriberRegistry;
use crate::repository::Repository;
use keeper_core::protocol::methods;
use std::sync::Arc;
use std::time::Instant;

pub use health::PingHandler;
pub use secrets::{DeleteSecretHandler, GetSecretHandler, ListSecretsHandler, SaveSecretHandler};
pub use users::{LoginHandler, RegisterHandler};

/// Shared state handed to every handler.
pub struct HandlerContext {
    pub repository: Arc<dyn Repository>,
    pub authority: TokenAuthority,
    pub subscribers: Arc<SubscriberRegistry>,
    pub started_at: Instant,
}

impl HandlerContext {
    pub fn new(
        repository: Arc<dyn Repository>,
        authority: TokenAuthority,
        subscribers: Arc<SubscriberRegistry>,
    ) -> Self {
        Self {
            repository,
            authority,
            subscribers,
            started_at: Instant::now(),
        }
    }
}

/// Register every unary method.
pub async fn register_all(registry: &MethodRegistry, ctx: Arc<HandlerContext>) {
    registry
        .register(methods::REGISTER, Arc::new(RegisterHandler::new(ctx.clone())))
        .await;
    registry
        .register(methods::LOGIN, Arc::new(LoginHandler::new(ctx.clone())))
        .await;

    registry
        .register(methods::SAVE_SECRET, Arc::new(SaveSecretHandler::new(ctx.clone())))
        .await;
    registry
        .register(methods::GET_SECRET, Arc::new(GetSecretHandler::new(ctx.clone())))
        .await;
    registry
        .register(methods::LIST_SECRETS, Arc::new(ListSecretsHandler::new(ctx.clone())))
        .await;
    registry
        .register(methods::DELETE_SECRET, Arc::new(DeleteSecretHandler::new(ctx.clone())))
        .await;

    registry
        .register(methods::PING, Arc::new(PingHandler::new(ctx)))
        .await;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::repository::MemoryRepository;
    use std::time::Duration;

    pub fn context() -> Arc<HandlerContext> {
        Arc::new(HandlerContext::new(
            Arc::new(MemoryRepository::new()),
            TokenAuthority::new("handler-test-key".into(), Duration::from_secs(3600)),
            Arc::new(SubscriberRegistry::new()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_all() {
        let registry = MethodRegistry::new();
        register_all(&registry, test_support::context()).await;

        assert_eq!(
            registry.list().await,
            vec![
                "health.ping",
                "secrets.delete",
                "secrets.get",
                "secrets.list",
                "secrets.save",
                "users.login",
                "users.register",
            ]
        );
    }
}
