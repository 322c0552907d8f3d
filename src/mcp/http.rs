//! HTTP surface: per-product MCP endpoints, health, and the manifest.
//!
//! One axum server mounts `POST|GET|DELETE /mcp/{product_id}` for every
//! configured product plus `/health` and a content-negotiated `/`.
//! Session correlation runs over the `mcp-session-id` header: generated
//! at initialize time, echoed by the client on every subsequent request.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::config::ResolvedConfig;
use crate::mcp::context::{RequestContext, with_context};
use crate::mcp::protocol::{
    ClientInfo, INVALID_REQUEST, JsonRpcRequest, JsonRpcResponse, SESSION_NOT_FOUND,
};
use crate::mcp::server::McpServer;
use crate::mcp::session::{SWEEP_INTERVAL, SessionPool};
use crate::search::Searcher;

/// Session correlation header.
pub const SESSION_HEADER: &str = "mcp-session-id";

/// One product endpoint: configuration, shared searcher, live sessions.
pub struct ProductState {
    /// Resolved product configuration.
    pub config: Arc<ResolvedConfig>,
    /// Shared searcher for this product's collection.
    pub searcher: Arc<Searcher>,
    /// Live sessions keyed by id.
    pub sessions: SessionPool,
}

impl ProductState {
    /// Creates the state for one product endpoint.
    #[must_use]
    pub fn new(config: Arc<ResolvedConfig>, searcher: Arc<Searcher>) -> Self {
        Self {
            config,
            searcher,
            sessions: SessionPool::new(),
        }
    }
}

/// Shared state of the whole HTTP server.
pub struct AppState {
    /// Product endpoints keyed by product id.
    pub products: HashMap<String, Arc<ProductState>>,
}

impl AppState {
    /// Creates app state over the given product endpoints.
    #[must_use]
    pub fn new(products: HashMap<String, Arc<ProductState>>) -> Self {
        Self { products }
    }
}

/// Builds the router with CORS and all routes mounted.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static(SESSION_HEADER)]);

    Router::new()
        .route("/health", get(health))
        .route("/", get(manifest))
        .route(
            "/mcp/{product_id}",
            get(mcp_get).post(mcp_post).delete(mcp_delete),
        )
        .layer(cors)
        .with_state(state)
}

/// Binds and serves until SIGTERM/SIGINT; in-flight requests drain first.
///
/// # Errors
///
/// Returns an error when binding or serving fails.
pub async fn serve(state: Arc<AppState>, host: &str, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    tracing::info!(host, port, "docdex listening");

    // Detached: dies with the process, never delays shutdown.
    spawn_sweeper(Arc::clone(&state));

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    Ok(())
}

/// Spawns the periodic session reaper over every product pool.
pub fn spawn_sweeper(state: Arc<AppState>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            for (product_id, product) in &state.products {
                let evicted = product.sessions.sweep().await;
                if evicted > 0 {
                    tracing::info!(product_id, evicted, "reaped idle sessions");
                }
            }
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => tracing::error!(error = %err, "failed to install SIGTERM handler"),
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

async fn health(State(state): State<Arc<AppState>>) -> Response {
    axum::Json(manifest_json(&state)).into_response()
}

fn manifest_json(state: &AppState) -> serde_json::Value {
    let mut products: Vec<_> = state
        .products
        .values()
        .map(|p| {
            json!({
                "id": p.config.product_id,
                "name": p.config.name,
                "lang": p.config.lang,
                "collection": p.config.collection,
                "endpoint": format!("/mcp/{}", p.config.product_id),
            })
        })
        .collect();
    products.sort_by_key(|p| p["id"].as_str().map(str::to_string));
    json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "products": products,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })
}

async fn manifest(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let wants_markdown = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/markdown"));
    if !wants_markdown {
        return axum::Json(manifest_json(&state)).into_response();
    }

    let mut body = format!(
        "# docdex\n\nDocumentation retrieval over MCP. Version {}.\n\n## Products\n\n",
        env!("CARGO_PKG_VERSION")
    );
    let mut products: Vec<_> = state.products.values().collect();
    products.sort_by(|a, b| a.config.product_id.cmp(&b.config.product_id));
    for product in products {
        let config = &product.config;
        body.push_str(&format!(
            "### {} (`{}`)\n\n{}\n\n- Endpoint: `POST /mcp/{}`\n- Language: `{}`\n- Collection: `{}`\n\n",
            config.name,
            config.product_id,
            config.description.as_deref().unwrap_or("Product documentation."),
            config.product_id,
            config.lang,
            config.collection,
        ));
        body.push_str(&format!(
            "Client configuration:\n\n```json\n{{\n  \"mcpServers\": {{\n    \"{}-docs\": {{\n      \"url\": \"http://localhost:8900/mcp/{}\"\n    }}\n  }}\n}}\n```\n\n",
            config.product_id, config.product_id,
        ));
    }

    (
        [(header::CONTENT_TYPE, HeaderValue::from_static("text/markdown; charset=utf-8"))],
        body,
    )
        .into_response()
}

fn rpc_error(status: StatusCode, code: i64, message: &str) -> Response {
    (
        status,
        axum::Json(JsonRpcResponse::error(None, code, message)),
    )
        .into_response()
}

fn session_header_value(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn mcp_post(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<String>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let Some(product) = state.products.get(&product_id) else {
        return rpc_error(
            StatusCode::NOT_FOUND,
            INVALID_REQUEST,
            &format!("Unknown product endpoint: {product_id}"),
        );
    };

    let Ok(request) = serde_json::from_str::<JsonRpcRequest>(&body) else {
        return rpc_error(
            StatusCode::BAD_REQUEST,
            INVALID_REQUEST,
            "Invalid JSON-RPC request body.",
        );
    };

    match session_header_value(&headers) {
        Some(session_id) => match product.sessions.touch(&session_id).await {
            Some(handle) => {
                // One request at a time per session.
                let permit = Arc::clone(&handle.lock);
                let _serialized = permit.lock().await;
                let context = RequestContext {
                    request_id: Uuid::new_v4().to_string(),
                    session_id: session_id.clone(),
                    product_id: product_id.clone(),
                    client_info: handle.client_info.clone(),
                    client_ip: Some(peer.ip().to_string()),
                };
                let response =
                    with_context(context, handle.server.handle(request)).await;
                finish(response, None)
            }
            None => rpc_error(
                StatusCode::NOT_FOUND,
                SESSION_NOT_FOUND,
                "Session not found. Client must re-initialize.",
            ),
        },
        None if request.is_initialize() => {
            let client_info = request
                .params
                .get("clientInfo")
                .and_then(|v| serde_json::from_value::<ClientInfo>(v.clone()).ok())
                .map(|info| info.label());

            let server = Arc::new(McpServer::new(
                Arc::clone(&product.config),
                Arc::clone(&product.searcher),
            ));
            let session_id = product
                .sessions
                .insert(Arc::clone(&server), client_info.clone())
                .await;
            tracing::info!(
                product_id,
                session_id,
                client_info = client_info.as_deref(),
                "session created"
            );

            let context = RequestContext {
                request_id: Uuid::new_v4().to_string(),
                session_id: session_id.clone(),
                product_id: product_id.clone(),
                client_info,
                client_ip: Some(peer.ip().to_string()),
            };
            let response = with_context(context, server.handle(request)).await;
            finish(response, Some(&session_id))
        }
        None => rpc_error(
            StatusCode::BAD_REQUEST,
            INVALID_REQUEST,
            "Missing session ID or not an initialize request.",
        ),
    }
}

/// Shapes the server's optional response into HTTP: notifications become
/// 202 Accepted, everything else 200 with the JSON body, plus the session
/// header on initialize.
fn finish(response: Option<JsonRpcResponse>, session_id: Option<&str>) -> Response {
    let mut http_response = match response {
        Some(response) => (StatusCode::OK, axum::Json(response)).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    };
    if let Some(session_id) = session_id
        && let Ok(value) = HeaderValue::from_str(session_id)
    {
        http_response
            .headers_mut()
            .insert(HeaderName::from_static(SESSION_HEADER), value);
    }
    http_response
}

async fn mcp_get(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<String>,
) -> Response {
    if !state.products.contains_key(&product_id) {
        return rpc_error(
            StatusCode::NOT_FOUND,
            INVALID_REQUEST,
            &format!("Unknown product endpoint: {product_id}"),
        );
    }
    // This transport never pushes server-initiated messages.
    rpc_error(
        StatusCode::METHOD_NOT_ALLOWED,
        INVALID_REQUEST,
        "GET is not supported: server-initiated streaming is not available.",
    )
}

async fn mcp_delete(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let Some(product) = state.products.get(&product_id) else {
        return rpc_error(
            StatusCode::NOT_FOUND,
            INVALID_REQUEST,
            &format!("Unknown product endpoint: {product_id}"),
        );
    };
    match session_header_value(&headers) {
        Some(session_id) => {
            if product.sessions.remove(&session_id).await {
                tracing::info!(product_id, session_id, "session closed");
                StatusCode::NO_CONTENT.into_response()
            } else {
                rpc_error(
                    StatusCode::NOT_FOUND,
                    SESSION_NOT_FOUND,
                    "Session not found. Client must re-initialize.",
                )
            }
        }
        None => rpc_error(
            StatusCode::BAD_REQUEST,
            INVALID_REQUEST,
            "Missing session ID.",
        ),
    }
}
