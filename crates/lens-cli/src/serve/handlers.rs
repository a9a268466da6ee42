//! HTTP route handlers for the view server.
//!
//! Handlers are kept thin, delegating to [`ViewService`].

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use tracing::warn;

use lens_core::projection::{CacheStats, ViewResponse};
use lens_core::{ErrorCode, LensError, ViewConfig, ViewService};

use super::models::{
    ErrorResponse, HealthResponse, LayoutRequest, LayoutResponse, PatternsRequest,
    PatternsResponse, ViewTypeInfo,
};

// =============================================================================
// Errors
// =============================================================================

/// A [`LensError`] rendered as an HTTP response.
pub struct ApiError(LensError);

impl From<LensError> for ApiError {
    fn from(err: LensError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self.0.code() {
            ErrorCode::ValidationError | ErrorCode::ParseError | ErrorCode::ConfigError => {
                StatusCode::BAD_REQUEST
            }
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::ConnectionError => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::DatabaseError | ErrorCode::IoError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            warn!(error = %self.0, "Request failed");
        }
        let body = ErrorResponse {
            code: self.0.code().to_string(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// =============================================================================
// API Handlers
// =============================================================================

/// GET `/api/views` - Supported view types.
pub async fn api_views(State(service): State<Arc<ViewService>>) -> Json<Vec<ViewTypeInfo>> {
    Json(
        service
            .view_types()
            .iter()
            .map(|v| ViewTypeInfo {
                id: *v,
                description: v.description(),
            })
            .collect(),
    )
}

/// POST `/api/view` - Project, lay out and format a view.
///
/// The body is a view configuration:
/// ```json
/// {"view_type": "neighborhood", "root_ids": ["class-a"], "max_depth": 2}
/// ```
pub async fn api_view(
    State(service): State<Arc<ViewService>>,
    Json(body): Json<Value>,
) -> ApiResult<ViewResponse> {
    let config = ViewConfig::from_value(body)?;
    Ok(Json(service.compute_view(&config).await?))
}

/// POST `/api/layout` - Positions for a caller-supplied node list.
pub async fn api_layout(
    State(service): State<Arc<ViewService>>,
    Json(body): Json<LayoutRequest>,
) -> Json<LayoutResponse> {
    Json(LayoutResponse {
        positions: service.layout(&body.nodes, &body.edges),
    })
}

/// POST `/api/patterns` - Detect patterns in the store or a node subset.
pub async fn api_patterns(
    State(service): State<Arc<ViewService>>,
    body: Option<Json<PatternsRequest>>,
) -> ApiResult<PatternsResponse> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let matches = match request.node_ids {
        Some(ids) => service.detect_patterns_within(&ids).await?,
        None => service.detect_patterns().await?,
    };
    Ok(Json(PatternsResponse {
        count: matches.len(),
        matches,
    }))
}

/// GET `/api/health` - Store and cache status.
pub async fn api_health(State(service): State<Arc<ViewService>>) -> ApiResult<HealthResponse> {
    let stats = service.store().stats().await?;
    Ok(Json(HealthResponse {
        status: "ok",
        backend: service.store().backend(),
        node_count: stats.node_count,
        edge_count: stats.edge_count,
        patterns: service.catalog().len(),
        cache: service.cache_stats(),
    }))
}

/// DELETE `/api/cache` - Drop every cached view; returns the emptied stats.
pub async fn api_clear_cache(State(service): State<Arc<ViewService>>) -> Json<CacheStats> {
    service.clear_cache();
    Json(service.cache_stats())
}
