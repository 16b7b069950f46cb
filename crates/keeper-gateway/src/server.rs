//! HTTP and WebSocket server.

use crate::auth::TokenAuthority;
use crate::error::GatewayError;
use crate::handlers::{self, files, notification, HandlerContext};
use crate::interceptor::{authorize_stream, authorize_unary, AuthenticatedStream};
use crate::methods::MethodRegistry;
use crate::notify::SubscriberRegistry;
use crate::repository::Repository;
use crate::Result;
use axum::{
    extract::{State, WebSocketUpgrade},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use keeper_core::config::ServerConfig;
use keeper_core::protocol::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, PingResult, DOWNLOAD_PATH, HEALTH_PATH,
    RPC_PATH, SUBSCRIBE_PATH, UPLOAD_PATH,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Shared router state.
pub struct GatewayState {
    pub methods: Arc<MethodRegistry>,
    pub context: Arc<HandlerContext>,
}

/// The secrets server.
pub struct Gateway {
    state: Arc<GatewayState>,
    shutdown_timeout: Duration,
}

impl Gateway {
    /// Build a server with every handler registered.
    pub async fn new(repository: Arc<dyn Repository>, authority: TokenAuthority) -> Self {
        let context = Arc::new(HandlerContext::new(
            repository,
            authority,
            Arc::new(SubscriberRegistry::new()),
        ));
        let methods = Arc::new(MethodRegistry::new());
        handlers::register_all(&methods, context.clone()).await;

        Self {
            state: Arc::new(GatewayState { methods, context }),
            shutdown_timeout: Duration::from_secs(30),
        }
    }

    /// Build a server from configuration. Without a configured signing key
    /// a random one is generated, so tokens do not survive a restart.
    pub async fn from_config(config: &ServerConfig, repository: Arc<dyn Repository>) -> Self {
        let authority = match &config.secret_key {
            Some(key) => TokenAuthority::new(key.clone(), config.token_lifetime()),
            None => {
                warn!("no server secret key configured, generating a random one");
                TokenAuthority::random(config.token_lifetime())
            }
        };

        Self::new(repository, authority)
            .await
            .with_shutdown_timeout(config.shutdown_timeout())
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn subscribers(&self) -> Arc<SubscriberRegistry> {
        self.state.context.subscribers.clone()
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route(RPC_PATH, post(rpc_handler))
            .route(HEALTH_PATH, get(health_handler))
            .route(UPLOAD_PATH, get(upload_handler))
            .route(DOWNLOAD_PATH, get(download_handler))
            .route(SUBSCRIBE_PATH, get(subscribe_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Bind `addr` and serve until Ctrl-C.
    pub async fn run(self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Serve on `listener` until `shutdown` resolves.
    ///
    /// On shutdown, new connections stop, every subscription is finished,
    /// and in-flight work gets `shutdown_timeout` before the server task is
    /// aborted.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener.local_addr()?;
        let app = self.router();
        let subscribers = self.subscribers();
        let (fired_tx, fired_rx) = oneshot::channel();

        let signal = async move {
            shutdown.await;
            info!("shutdown requested");
            subscribers.close_all();
            let _ = fired_tx.send(());
        };

        info!("listening on {}", local_addr);
        let mut task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(signal)
                .await
        });

        tokio::select! {
            joined = &mut task => return flatten(joined),
            _ = fired_rx => {}
        }

        match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
            Ok(joined) => flatten(joined),
            Err(_) => {
                warn!(
                    "connections still open after {:?}, aborting",
                    self.shutdown_timeout
                );
                task.abort();
                Ok(())
            }
        }
    }
}

fn flatten(
    joined: std::result::Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<()> {
    match joined {
        Ok(served) => {
            served?;
            info!("server stopped");
            Ok(())
        }
        Err(e) if e.is_cancelled() => Ok(()),
        Err(e) => Err(GatewayError::Internal(format!("server task: {e}"))),
    }
}

async fn rpc_handler(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    body: String,
) -> Json<JsonRpcResponse> {
    Json(handle_rpc(&state, &headers, &body).await)
}

async fn handle_rpc(state: &GatewayState, headers: &HeaderMap, body: &str) -> JsonRpcResponse {
    let request: JsonRpcRequest = match serde_json::from_str(body) {
        Ok(req) => req,
        Err(e) => return JsonRpcResponse::error(None, JsonRpcError::parse_error(e.to_string())),
    };

    if request.jsonrpc != "2.0" {
        return JsonRpcResponse::error(
            request.id,
            JsonRpcError::invalid_request("jsonrpc must be \"2.0\""),
        );
    }

    let ctx = match authorize_unary(&request.method, headers, &state.context.authority) {
        Ok(ctx) => ctx,
        Err(e) => return JsonRpcResponse::error(request.id, e.to_rpc_error()),
    };

    match state.methods.call(&request.method, ctx, request.params).await {
        Ok(result) => JsonRpcResponse::success(request.id, result),
        Err(e) => {
            debug!(method = %request.method, "call failed: {}", e);
            JsonRpcResponse::error(request.id, e.to_rpc_error())
        }
    }
}

async fn health_handler(State(state): State<Arc<GatewayState>>) -> Json<PingResult> {
    Json(state.context.ping())
}

/// Authenticate the upgrade request, then hand the socket to `handler`.
fn upgrade<F, Fut>(
    state: &GatewayState,
    ws: WebSocketUpgrade,
    headers: &HeaderMap,
    handler: F,
) -> Response
where
    F: FnOnce(AuthenticatedStream, Arc<HandlerContext>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let ctx = match authorize_stream(headers, &state.context.authority) {
        Ok(ctx) => ctx,
        Err(_) => return StatusCode::UNAUTHORIZED.into_response(),
    };

    let context = state.context.clone();
    ws.on_upgrade(move |socket| handler(AuthenticatedStream::new(socket, ctx), context))
}

async fn upload_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<Arc<GatewayState>>,
) -> Response {
    upgrade(&state, ws, &headers, files::upload)
}

async fn download_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<Arc<GatewayState>>,
) -> Response {
    upgrade(&state, ws, &headers, files::download)
}

async fn subscribe_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<Arc<GatewayState>>,
) -> Response {
    upgrade(&state, ws, &headers, notification::subscribe)
}
