//! Secret CRUD. Payloads arrive sealed by the client and are stored as-is.

use super::HandlerContext;
use crate::interceptor::CallContext;
use crate::methods::{parse_params, MethodHandler};
use crate::Result;
use async_trait::async_trait;
use keeper_core::protocol::{
    GetSecretResult, ListSecretsResult, Notification, SaveSecretParams, SaveSecretResult,
    SecretIdParams,
};
use keeper_core::{SecretId, UserId};
use std::sync::Arc;
use tracing::info;

impl HandlerContext {
    /// Tell the caller's other sessions that `secret_id` changed.
    pub(crate) fn notify(&self, ctx: &CallContext, user_id: UserId, secret_id: SecretId, updated: bool) {
        self.subscribers
            .broadcast(user_id, ctx.client_id, Notification { secret_id, updated });
    }
}

/// `secrets.save`: create when `id == 0`, otherwise update.
pub struct SaveSecretHandler {
    context: Arc<HandlerContext>,
}

impl SaveSecretHandler {
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl MethodHandler for SaveSecretHandler {
    async fn call(&self, ctx: CallContext, params: Option<serde_json::Value>) -> Result<serde_json::Value> {
        let user_id = ctx.user()?;
        let SaveSecretParams { secret } = parse_params(params)?;
        let repo = &self.context.repository;

        let (id, updated) = if secret.id == 0 {
            (repo.create_secret(user_id, secret).await?, false)
        } else {
            let id = secret.id;
            repo.update_secret(user_id, secret).await?;
            (id, true)
        };

        info!(user_id, secret_id = id, updated, "secret saved");
        self.context.notify(&ctx, user_id, id, updated);
        Ok(serde_json::to_value(SaveSecretResult { id })?)
    }
}

/// `secrets.get`
pub struct GetSecretHandler {
    context: Arc<HandlerContext>,
}

impl GetSecretHandler {
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl MethodHandler for GetSecretHandler {
    async fn call(&self, ctx: CallContext, params: Option<serde_json::Value>) -> Result<serde_json::Value> {
        let user_id = ctx.user()?;
        let SecretIdParams { id } = parse_params(params)?;
        let secret = self.context.repository.get_secret(user_id, id).await?;
        Ok(serde_json::to_value(GetSecretResult { secret })?)
    }
}

/// `secrets.list`
pub struct ListSecretsHandler {
    context: Arc<HandlerContext>,
}

impl ListSecretsHandler {
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl MethodHandler for ListSecretsHandler {
    async fn call(&self, ctx: CallContext, _params: Option<serde_json::Value>) -> Result<serde_json::Value> {
        let user_id = ctx.user()?;
        let secrets = self.context.repository.list_secrets(user_id).await?;
        Ok(serde_json::to_value(ListSecretsResult { secrets })?)
    }
}

/// `secrets.delete`
pub struct DeleteSecretHandler {
    context: Arc<HandlerContext>,
}

impl DeleteSecretHandler {
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl MethodHandler for DeleteSecretHandler {
    async fn call(&self, ctx: CallContext, params: Option<serde_json::Value>) -> Result<serde_json::Value> {
        let user_id = ctx.user()?;
        let SecretIdParams { id } = parse_params(params)?;
        self.context.repository.delete_secret(user_id, id).await?;

        info!(user_id, secret_id = id, "secret deleted");
        self.context.notify(&ctx, user_id, id, true);
        Ok(serde_json::json!({}))
    }
}
