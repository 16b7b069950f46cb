//! Liveness.

use super::HandlerContext;
use crate::interceptor::CallContext;
use crate::methods::MethodHandler;
use crate::Result;
use async_trait::async_trait;
use keeper_core::protocol::PingResult;
use std::sync::Arc;

impl HandlerContext {
    pub fn ping(&self) -> PingResult {
        PingResult {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.started_at.elapsed().as_secs(),
        }
    }
}

/// `health.ping`
pub struct PingHandler {
    context: Arc<HandlerContext>,
}

impl PingHandler {
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl MethodHandler for PingHandler {
    async fn call(&self, _ctx: CallContext, _params: Option<serde_json::Value>) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self.context.ping())?)
    }
}
