// SPDX-FileCopyrightText: 2026 Strand Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the chat pipeline.

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::get,
    Router,
};
use strand_config::{LimitsConfig, StreamConfig};
use strand_core::traits::{StreamBroker, TokenProducer};
use strand_core::StrandError;
use strand_storage::Database;
use tower_http::cors::CorsLayer;

use crate::auth::{auth_middleware, AuthRegistry};
use crate::handlers;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Single-writer SQLite handle.
    pub db: Database,
    /// Model service behind the uniform chunk-sequence interface.
    pub producer: Arc<dyn TokenProducer>,
    /// Resumable transport; `DisabledBroker` when not configured.
    pub broker: Arc<dyn StreamBroker>,
    /// Token -> caller registry.
    pub auth: AuthRegistry,
    /// Per-tier daily message quotas.
    pub limits: LimitsConfig,
    /// Streaming/resumption knobs (staleness window, turn ceiling).
    pub stream: StreamConfig,
    /// Model used when a turn's selection is unrecognized or empty.
    pub default_model: String,
}

/// Network configuration for the server (mirrors `[server]` in config).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Build the gateway router.
///
/// `/chat` requires bearer auth; `/health` is public so process supervisors
/// can probe liveness without credentials.
pub fn build_router(state: AppState) -> Router {
    let auth_state = state.auth.clone();

    let public_routes = Router::new().route("/health", get(handlers::get_health));

    let api_routes = Router::new()
        .route(
            "/chat",
            get(handlers::get_chat)
                .post(handlers::post_chat)
                .delete(handlers::delete_chat),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            auth_state,
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(CorsLayer::permissive())
}

/// Bind and serve until the process is shut down.
pub async fn start_server(config: &ServerConfig, state: AppState) -> Result<(), StrandError> {
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| StrandError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .await
        .map_err(|e| StrandError::Internal(format!("gateway server error: {e}")))?;

    Ok(())
}
