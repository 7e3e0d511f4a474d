//! Reporting handlers for weekly reports and data export

use std::convert::Infallible;

use axum::{
    extract::{Query, State},
    http::header,
    response::{sse::Event, IntoResponse, Response, Sse},
    Json,
};
use chrono::{NaiveDate, Utc};
use futures_util::Stream;
use serde::Deserialize;
use shared::WeeklyReport;

use super::{narrative_service, sse_response};
use crate::error::AppResult;
use crate::services::ReportingService;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct WeeklyReportQuery {
    /// Reference date for the expiry window; defaults to today (UTC)
    pub today: Option<NaiveDate>,
    pub format: Option<String>, // "json" or "csv"
}

fn reporting_service(state: &AppState) -> AppResult<ReportingService> {
    ReportingService::new(state.db.clone(), &state.config.report)
}

/// Week-over-week inventory report
pub async fn get_weekly_report(
    State(state): State<AppState>,
    Query(query): Query<WeeklyReportQuery>,
) -> AppResult<Json<WeeklyReport>> {
    let today = query.today.unwrap_or_else(|| Utc::now().date_naive());
    let report = reporting_service(&state)?.weekly_report(today).await?;
    Ok(Json(report))
}

/// Stream a narrative summary of the weekly report
pub async fn stream_weekly_report(
    State(state): State<AppState>,
    Query(query): Query<WeeklyReportQuery>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let today = query.today.unwrap_or_else(|| Utc::now().date_naive());
    let report = reporting_service(&state)?.weekly_report(today).await?;
    let frames = narrative_service(&state).stream_weekly_report(&report).await;
    Ok(sse_response(frames))
}

/// Usage totals for the latest reporting period
pub async fn get_weekly_usage(
    State(state): State<AppState>,
    Query(query): Query<WeeklyReportQuery>,
) -> AppResult<Response> {
    let totals = reporting_service(&state)?.weekly_usage().await?;

    if query.format.as_deref() == Some("csv") {
        let csv = ReportingService::export_to_csv(&totals)?;
        Ok((
            [
                (header::CONTENT_TYPE, "text/csv"),
                (header::CONTENT_DISPOSITION, "attachment; filename=\"weekly_usage.csv\""),
            ],
            csv,
        )
            .into_response())
    } else {
        Ok(Json(totals).into_response())
    }
}
