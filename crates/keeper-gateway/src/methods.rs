//! Unary method registry.

use crate::error::GatewayError;
use crate::interceptor::CallContext;
use crate::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// A unary method.
#[async_trait]
pub trait MethodHandler: Send + Sync {
    async fn call(
        &self,
        ctx: CallContext,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value>;
}

/// Maps method names to handlers.
pub struct MethodRegistry {
    methods: RwLock<HashMap<String, Arc<dyn MethodHandler>>>,
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self {
            methods: RwLock::new(HashMap::new()),
        }
    }

    pub async fn register(&self, name: impl Into<String>, handler: Arc<dyn MethodHandler>) {
        self.methods.write().await.insert(name.into(), handler);
    }

    pub async fn call(
        &self,
        name: &str,
        ctx: CallContext,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let handler = self
            .methods
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| GatewayError::MethodNotFound(name.to_string()))?;

        debug!(method = name, user_id = ?ctx.user_id, "dispatching");
        handler.call(ctx, params).await
    }

    /// Registered method names, sorted.
    pub async fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.methods.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Decode required params into `T`.
pub fn parse_params<T: DeserializeOwned>(params: Option<serde_json::Value>) -> Result<T> {
    let value = params.ok_or_else(|| GatewayError::InvalidParams("missing params".to_string()))?;
    serde_json::from_value(value).map_err(|e| GatewayError::InvalidParams(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    struct Echo;

    #[async_trait]
    impl MethodHandler for Echo {
        async fn call(
            &self,
            ctx: CallContext,
            params: Option<serde_json::Value>,
        ) -> Result<serde_json::Value> {
            Ok(serde_json::json!({ "user": ctx.user_id, "params": params }))
        }
    }

    #[tokio::test]
    async fn test_register_and_call() {
        let registry = MethodRegistry::new();
        registry.register("echo", Arc::new(Echo)).await;

        let ctx = CallContext::authenticated(3, None);
        let value = registry
            .call("echo", ctx, Some(serde_json::json!(1)))
            .await
            .unwrap();
        assert_eq!(value["user"], 3);
        assert_eq!(value["params"], 1);
        assert_eq!(registry.list().await, vec!["echo".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let registry = MethodRegistry::new();
        let result = registry.call("nope", CallContext::default(), None).await;
        assert!(matches!(result, Err(GatewayError::MethodNotFound(_))));
    }

    #[test]
    fn test_parse_params() {
        #[derive(Deserialize)]
        struct P {
            id: u64,
        }

        let p: P = parse_params(Some(serde_json::json!({ "id": 9 }))).unwrap();
        assert_eq!(p.id, 9);
        assert!(matches!(
            parse_params::<P>(None),
            Err(GatewayError::InvalidParams(_))
        ));
        assert!(matches!(
            parse_params::<P>(Some(serde_json::json!({ "id": "x" }))),
            Err(GatewayError::InvalidParams(_))
        ));
    }
}
