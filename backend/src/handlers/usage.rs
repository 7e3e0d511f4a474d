//! HTTP handlers for usage log endpoints

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};

use crate::error::AppResult;
use crate::services::usage::{RecordUsageInput, UsageEntry, UsageFilter, UsageService};
use crate::AppState;

/// List usage entries
pub async fn list_usage(
    State(state): State<AppState>,
    Query(filter): Query<UsageFilter>,
) -> AppResult<Json<Vec<UsageEntry>>> {
    let service = UsageService::new(state.db);
    Ok(Json(service.list_usage(filter).await?))
}

/// Record usage against a batch
pub async fn record_usage(
    State(state): State<AppState>,
    Json(input): Json<RecordUsageInput>,
) -> AppResult<(StatusCode, Json<UsageEntry>)> {
    let service = UsageService::new(state.db);
    let entry = service.record_usage(input).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}
