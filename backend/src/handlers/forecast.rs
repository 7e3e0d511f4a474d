//! HTTP handlers for usage forecasts

use std::convert::Infallible;

use axum::{
    extract::{Query, State},
    http::header,
    response::{sse::Event, IntoResponse, Response, Sse},
    Json,
};
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use shared::{Alpha, ForecastReport};

use super::{narrative_service, sse_response};
use crate::error::AppResult;
use crate::services::{ForecastService, ReportingService};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ForecastQuery {
    /// Overrides the configured smoothing factor
    pub alpha: Option<f64>,
    pub format: Option<String>, // "json" or "csv"
}

#[derive(Debug, Serialize)]
pub struct ForecastSummaryResponse {
    pub alpha: f64,
    pub batches: usize,
    pub summary: String,
}

async fn compute(state: &AppState, query: &ForecastQuery) -> AppResult<ForecastReport> {
    let alpha = Alpha::new(query.alpha.unwrap_or(state.config.forecast.alpha))?;
    ForecastService::new(state.db.clone()).compute(alpha).await
}

/// Stream a narrative analysis of the current forecasts
pub async fn stream_forecast(
    State(state): State<AppState>,
    Query(query): Query<ForecastQuery>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let report = compute(&state, &query).await?;
    let frames = narrative_service(&state).stream_forecast(&report).await;
    Ok(sse_response(frames))
}

/// Forecast data as JSON, or CSV with `format=csv`
pub async fn get_forecast_data(
    State(state): State<AppState>,
    Query(query): Query<ForecastQuery>,
) -> AppResult<Response> {
    let report = compute(&state, &query).await?;

    if query.format.as_deref() == Some("csv") {
        let csv = ReportingService::export_to_csv(&ForecastService::csv_rows(&report))?;
        Ok((
            [
                (header::CONTENT_TYPE, "text/csv"),
                (header::CONTENT_DISPOSITION, "attachment; filename=\"forecast.csv\""),
            ],
            csv,
        )
            .into_response())
    } else {
        Ok(Json(report).into_response())
    }
}

/// Single-completion narrative analysis of the current forecasts
pub async fn get_forecast_summary(
    State(state): State<AppState>,
    Query(query): Query<ForecastQuery>,
) -> AppResult<Json<ForecastSummaryResponse>> {
    let report = compute(&state, &query).await?;
    let summary = narrative_service(&state).forecast_summary(&report).await?;

    Ok(Json(ForecastSummaryResponse {
        alpha: report.alpha,
        batches: report.forecasts.len(),
        summary,
    }))
}
