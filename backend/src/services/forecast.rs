//! Forecast service: loads usage history and runs the forecast engine

use serde::Serialize;
use shared::{forecast_all, group_by_batch, Alpha, ForecastReport, ForecastResult};
use sqlx::PgPool;

use crate::error::AppResult;
use crate::services::usage::UsageService;

/// Forecast service
#[derive(Clone)]
pub struct ForecastService {
    usage: UsageService,
}

/// Flat forecast row for CSV export
#[derive(Debug, Serialize)]
pub struct ForecastCsvRow {
    pub batch_id: i32,
    pub batch_number: String,
    pub name: String,
    pub strength: String,
    pub forecast: f64,
    pub current_stock: i32,
    pub initial_stock: i32,
    pub reorder_threshold: i32,
    pub supplier_lead_time: i32,
    pub quantity_used_total: i64,
    pub estimated_stockout_days: Option<f64>,
    pub usage_events: usize,
    pub first_usage: String,
    pub last_usage: String,
}

impl From<&ForecastResult> for ForecastCsvRow {
    fn from(f: &ForecastResult) -> Self {
        let first = f.dates.first().map(|d| d.to_string()).unwrap_or_default();
        let last = f.dates.last().map(|d| d.to_string()).unwrap_or_default();
        ForecastCsvRow {
            batch_id: f.batch_id,
            batch_number: f.batch_number.clone(),
            name: f.name.clone(),
            strength: f.strength.clone().unwrap_or_default(),
            forecast: f.forecast,
            current_stock: f.current_stock,
            initial_stock: f.initial_stock,
            reorder_threshold: f.reorder_threshold,
            supplier_lead_time: f.supplier_lead_time,
            quantity_used_total: f.quantity_used_total,
            estimated_stockout_days: f.estimated_stockout_days,
            usage_events: f.dates.len(),
            first_usage: first,
            last_usage: last,
        }
    }
}

impl ForecastService {
    /// Create a new ForecastService instance
    pub fn new(db: PgPool) -> Self {
        Self {
            usage: UsageService::new(db),
        }
    }

    /// Forecast every batch that has logged usage
    pub async fn compute(&self, alpha: Alpha) -> AppResult<ForecastReport> {
        let rows = self.usage.usage_rows().await?;
        let row_count = rows.len();

        let series = group_by_batch(rows).into_values().map(|s| s.into_sorted());
        let report = forecast_all(series, alpha);

        for failure in &report.failures {
            tracing::warn!(batch_id = failure.batch_id, error = %failure.error, "batch forecast failed");
        }
        tracing::debug!(
            rows = row_count,
            batches = report.forecasts.len(),
            failures = report.failures.len(),
            alpha = alpha.value(),
            "forecast computed"
        );

        Ok(report)
    }

    /// Flatten forecasts for CSV export
    pub fn csv_rows(report: &ForecastReport) -> Vec<ForecastCsvRow> {
        report.forecasts.iter().map(ForecastCsvRow::from).collect()
    }
}
