//! HTTP handlers for inventory snapshot endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::Snapshot;

use crate::error::AppResult;
use crate::services::snapshot::{SnapshotFilter, SnapshotService, SnapshotSummary};
use crate::AppState;

/// List snapshots, newest first
pub async fn list_snapshots(
    State(state): State<AppState>,
    Query(filter): Query<SnapshotFilter>,
) -> AppResult<Json<Vec<SnapshotSummary>>> {
    let service = SnapshotService::new(state.db);
    Ok(Json(service.list_snapshots(filter).await?))
}

/// Capture the current inventory as a snapshot of the given type
pub async fn capture_snapshot(
    State(state): State<AppState>,
    Path(snapshot_type): Path<String>,
) -> AppResult<(StatusCode, Json<Snapshot>)> {
    let service = SnapshotService::new(state.db);
    let snapshot = service.capture(&snapshot_type).await?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

/// Get a snapshot with its entries
pub async fn get_snapshot(
    State(state): State<AppState>,
    Path(snapshot_id): Path<i32>,
) -> AppResult<Json<Snapshot>> {
    let service = SnapshotService::new(state.db);
    Ok(Json(service.get_snapshot(snapshot_id).await?))
}
