//! HTTP server
//!
//! Routes:
//! - `GET /` and `GET /health` - status
//! - `GET /api/url?code=..` - Kite login URL
//! - `GET /api/token?code=..&request_token=..` - exchange and persist a session

pub mod handlers;
mod types;

use crate::state::AppState;
use axum::{routing::get, Router};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use types::{TokenQuery, UrlQuery};

/// Build the router with all routes
pub fn build_router(state: Arc<AppState>) -> Router {
    // Any origin may call the API
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::status))
        .route("/health", get(handlers::status))
        .route("/api/url", get(handlers::login_url))
        .route("/api/token", get(handlers::exchange_token))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Serve until `shutdown` resolves, then drain in-flight requests
pub async fn serve<F>(addr: SocketAddr, state: Arc<AppState>, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Starting Kite App server on {}", listener.local_addr()?);
    info!("  GET  http://{}/", addr);
    info!("  GET  http://{}/api/url?code=..", addr);
    info!("  GET  http://{}/api/token?code=..&request_token=..", addr);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("HTTP server stopped");
    Ok(())
}
