use crate::config::Config;
use crate::errors::AppError;
use crate::models::{AnalyzeRequest, BatchReport, ComparisonRecord};
use crate::pipeline::{Analyzer, BatchOptions};
use crate::store::{RecordStore, StoreStats};
use crate::vendors::VendorEntry;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Largest batch accepted by `POST /api/v1/analyze`.
pub const MAX_BATCH_SIZE: usize = 25;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Pipeline runner shared by all requests.
    pub analyzer: Arc<Analyzer>,
    /// Persisted comparison records.
    pub store: Arc<dyn RecordStore>,
}

/// Health check endpoint.
///
/// # Returns
///
/// * `(StatusCode, Json<serde_json::Value>)` - HTTP 200 OK with health status JSON.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "crm-intel",
            "version": env!("CARGO_PKG_VERSION"),
            "ai_enabled": state.config.openai_api_key.is_some(),
        })),
    )
}

/// GET /api/v1/vendors
///
/// Lists the vendors the fetcher can resolve, with their aliases.
pub async fn list_vendors(State(state): State<Arc<AppState>>) -> Json<Vec<VendorEntry>> {
    Json(state.analyzer.directory().entries().to_vec())
}

/// POST /api/v1/analyze
///
/// Runs a batch and persists the resulting records.
///
/// The batch runs on its own task. If the client goes away, vendors not yet
/// started are cancelled; pipelines already running finish and are saved.
///
/// # Returns
///
/// * `Result<Json<BatchReport>, AppError>` - Ordered records plus summary, or 400 on invalid input.
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<BatchReport>, AppError> {
    validate_request(&request)?;
    tracing::info!(
        "POST /analyze - {} vendors (refresh: {})",
        request.vendors.len(),
        request.refresh
    );

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let options = BatchOptions {
        refresh: request.refresh,
        cancel,
    };
    let names = request.vendors;
    let task_state = Arc::clone(&state);

    let handle = tokio::spawn(async move {
        let report = task_state.analyzer.analyze_with(&names, options).await;
        // A failed save must not lose the analysis the caller is waiting for.
        if let Err(e) = task_state.store.save(&report.records).await {
            tracing::error!("Failed to persist batch {}: {}", report.batch_id, e);
        }
        report
    });

    let report = handle
        .await
        .map_err(|e| AppError::InternalError(format!("Batch task failed: {}", e)))?;

    Ok(Json(report))
}

fn validate_request(request: &AnalyzeRequest) -> Result<(), AppError> {
    if request.vendors.is_empty() {
        return Err(AppError::BadRequest(
            "At least one vendor name is required".to_string(),
        ));
    }
    if request.vendors.len() > MAX_BATCH_SIZE {
        return Err(AppError::BadRequest(format!(
            "At most {} vendors per batch ({} given)",
            MAX_BATCH_SIZE,
            request.vendors.len()
        )));
    }
    if request.vendors.iter().any(|name| name.trim().is_empty()) {
        return Err(AppError::BadRequest(
            "Vendor names cannot be blank".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
pub struct RecordsQuery {
    /// Only records updated at or after this instant (RFC 3339).
    pub since: Option<DateTime<Utc>>,
}

/// GET /api/v1/records
///
/// Full history, oldest first; with `?since=` only recent records, newest
/// first.
pub async fn list_records(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RecordsQuery>,
) -> Result<Json<Vec<ComparisonRecord>>, AppError> {
    let records = match query.since {
        Some(since) => state.store.recent(since).await?,
        None => state.store.load_all().await?,
    };
    Ok(Json(records))
}

/// DELETE /api/v1/records
pub async fn clear_records(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let removed = state.store.clear().await?;
    Ok(Json(json!({ "removed": removed })))
}

/// GET /api/v1/records/stats
pub async fn record_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StoreStats>, AppError> {
    Ok(Json(state.store.stats().await?))
}

/// GET /api/v1/records/:vendor
///
/// Case-insensitive lookup of a persisted record.
pub async fn get_record(
    State(state): State<Arc<AppState>>,
    Path(vendor): Path<String>,
) -> Result<Json<ComparisonRecord>, AppError> {
    tracing::info!("GET /records/{}", vendor);

    state
        .store
        .find(&vendor)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No record for vendor '{}'", vendor)))
}

/// DELETE /api/v1/records/:vendor
///
/// Removes a vendor's whole history.
pub async fn delete_record(
    State(state): State<Arc<AppState>>,
    Path(vendor): Path<String>,
) -> Result<StatusCode, AppError> {
    tracing::info!("DELETE /records/{}", vendor);

    match state.store.remove(&vendor).await? {
        0 => Err(AppError::NotFound(format!("No record for vendor '{}'", vendor))),
        _ => Ok(StatusCode::NO_CONTENT),
    }
}
