//! HTTP surface: handlers and route table.

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

pub mod handlers {
    pub use crate::handlers::*;
}

use crate::handlers::AppState;

/// Request size limit for API routes.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// `/api/v1` routes with the body size limit applied.
///
/// Rate limiting is layered on by the server binary, since it needs the peer
/// address from the listener.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/vendors", get(handlers::list_vendors))
        .route("/api/v1/analyze", post(handlers::analyze))
        .route(
            "/api/v1/records",
            get(handlers::list_records).delete(handlers::clear_records),
        )
        .route("/api/v1/records/stats", get(handlers::record_stats))
        .route(
            "/api/v1/records/:vendor",
            get(handlers::get_record).delete(handlers::delete_record),
        )
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
}

/// Health check plus API routes, without rate limiting.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .merge(routes())
        .with_state(state)
}
