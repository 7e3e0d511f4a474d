//! Forecast output models

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Smoothed usage forecast for one batch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForecastResult {
    pub batch_id: i32,
    /// Smoothed estimate of recent per-event usage
    pub forecast: f64,
    pub name: String,
    pub strength: Option<String>,
    pub batch_number: String,
    pub reorder_threshold: i32,
    pub supplier_lead_time: i32,
    pub initial_stock: i32,
    pub current_stock: i32,
    pub quantity_used_total: i64,
    /// `None` exactly when `forecast <= 0`
    pub estimated_stockout_days: Option<f64>,
    pub dates: Vec<NaiveDate>,
}

/// A batch whose forecast could not be computed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchFailure {
    pub batch_id: i32,
    pub error: String,
}

/// Forecasts for every batch with usage, plus per-batch failures
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForecastReport {
    pub alpha: f64,
    pub forecasts: Vec<ForecastResult>,
    pub failures: Vec<BatchFailure>,
}
