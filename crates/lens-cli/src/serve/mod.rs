//! Local HTTP server exposing computed views.
//!
//! Every route is a thin wrapper over [`ViewService`]; rendering is left to
//! a browser client such as Sigma.js.
//!
//! # Module Structure
//!
//! - `handlers` - HTTP route handlers and error mapping
//! - `models` - API request/response types (DTOs)
//! - `graph` - default layout and Sigma element formatter

mod graph;
mod handlers;
mod models;

pub use graph::{CircleLayout, SigmaFormatter};

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use lens_core::ViewService;

// =============================================================================
// Server Configuration
// =============================================================================

/// Configuration for the view server.
pub struct ServeConfig {
    pub host: String,
    pub port: u16,
}

// =============================================================================
// Server Entry Point
// =============================================================================

/// API routes over a shared service.
pub fn router(service: Arc<ViewService>) -> Router {
    Router::new()
        .route("/api/views", get(handlers::api_views))
        .route("/api/view", post(handlers::api_view))
        .route("/api/layout", post(handlers::api_layout))
        .route("/api/patterns", post(handlers::api_patterns))
        .route("/api/health", get(handlers::api_health))
        .route("/api/cache", delete(handlers::api_clear_cache))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(service)
}

/// Serve until the process is stopped.
pub async fn start_server(service: Arc<ViewService>, config: ServeConfig) -> std::io::Result<()> {
    let app = router(service);

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    let addr = listener.local_addr()?;
    info!(%addr, "View server listening");

    println!("Semantic Lens API: http://{}/api/views", addr);
    println!("Press Ctrl+C to stop\n");

    axum::serve(listener, app).await
}
