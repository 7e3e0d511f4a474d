//! HTTP handlers for batch endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::error::AppResult;
use crate::services::batch::{
    Batch, BatchFilter, BatchOverview, BatchService, CreateBatchInput, UpdateBatchInput,
};
use crate::AppState;

/// List batches, optionally for one product or only those needing reorder
pub async fn list_batches(
    State(state): State<AppState>,
    Query(filter): Query<BatchFilter>,
) -> AppResult<Json<Vec<BatchOverview>>> {
    let service = BatchService::new(state.db);
    Ok(Json(service.list_batches(filter).await?))
}

/// Get a batch
pub async fn get_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<i32>,
) -> AppResult<Json<Batch>> {
    let service = BatchService::new(state.db);
    Ok(Json(service.get_batch(batch_id).await?))
}

/// Create a batch
pub async fn create_batch(
    State(state): State<AppState>,
    Json(input): Json<CreateBatchInput>,
) -> AppResult<(StatusCode, Json<Batch>)> {
    let service = BatchService::new(state.db);
    let batch = service.create_batch(input).await?;
    Ok((StatusCode::CREATED, Json(batch)))
}

/// Update a batch
pub async fn update_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<i32>,
    Json(input): Json<UpdateBatchInput>,
) -> AppResult<Json<Batch>> {
    let service = BatchService::new(state.db);
    Ok(Json(service.update_batch(batch_id, input).await?))
}

/// Delete a batch
pub async fn delete_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<i32>,
) -> AppResult<StatusCode> {
    let service = BatchService::new(state.db);
    service.delete_batch(batch_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
