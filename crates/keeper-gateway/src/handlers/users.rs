//! Account registration and login.

use super::HandlerContext;
use crate::auth::{check_password, hash_password};
use crate::error::GatewayError;
use crate::interceptor::CallContext;
use crate::methods::{parse_params, MethodHandler};
use crate::Result;
use async_trait::async_trait;
use keeper_core::protocol::{CredentialsParams, TokenResult};
use std::sync::Arc;
use tracing::{info, warn};

const BAD_CREDENTIALS: &str = "bad auth credentials";

fn validate(params: &CredentialsParams) -> Result<()> {
    if params.login.trim().is_empty() {
        return Err(GatewayError::InvalidParams("login must not be empty".to_string()));
    }
    if params.password.is_empty() {
        return Err(GatewayError::InvalidParams("password must not be empty".to_string()));
    }
    Ok(())
}

fn token_result(token: keeper_core::SecretString) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(TokenResult {
        access_token: token,
    })?)
}

/// `users.register`
pub struct RegisterHandler {
    context: Arc<HandlerContext>,
}

impl RegisterHandler {
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl MethodHandler for RegisterHandler {
    async fn call(&self, _ctx: CallContext, params: Option<serde_json::Value>) -> Result<serde_json::Value> {
        let params: CredentialsParams = parse_params(params)?;
        validate(&params)?;

        let password = params.password.clone();
        let hash = tokio::task::spawn_blocking(move || hash_password(password.expose_secret()))
            .await
            .map_err(|e| GatewayError::Internal(format!("hashing task: {e}")))??;

        let user = self
            .context
            .repository
            .create_user(&params.login, &hash)
            .await?;
        info!(user_id = user.id, login = %user.login, "user registered");

        token_result(self.context.authority.issue(user.id)?)
    }
}

/// `users.login`
pub struct LoginHandler {
    context: Arc<HandlerContext>,
}

impl LoginHandler {
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl MethodHandler for LoginHandler {
    async fn call(&self, _ctx: CallContext, params: Option<serde_json::Value>) -> Result<serde_json::Value> {
        let params: CredentialsParams = parse_params(params)?;

        let Some(user) = self.context.repository.find_by_login(&params.login).await? else {
            warn!(login = %params.login, "login for unknown user");
            return Err(GatewayError::Unauthenticated(BAD_CREDENTIALS.to_string()));
        };

        let hash = user.password_hash.clone();
        let password = params.password.clone();
        let matches = tokio::task::spawn_blocking(move || check_password(&hash, password.expose_secret()))
            .await
            .map_err(|e| GatewayError::Internal(format!("hashing task: {e}")))?;

        if !matches {
            warn!(user_id = user.id, "login with wrong password");
            return Err(GatewayError::Unauthenticated(BAD_CREDENTIALS.to_string()));
        }

        info!(user_id = user.id, "user logged in");
        token_result(self.context.authority.issue(user.id)?)
    }
}
