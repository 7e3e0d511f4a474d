//! Forecast engine: single exponential smoothing per batch
//!
//! The smoothed value starts at the first record's quantity and folds every
//! later record in as `s = alpha * q + (1 - alpha) * s`. Days without logged
//! usage are simply absent from a series, so sparse logging biases the
//! estimate upward.

use serde::{Deserialize, Serialize};

use super::aggregate::SortedSeries;
use crate::error::{CoreError, CoreResult};
use crate::models::{BatchFailure, ForecastReport, ForecastResult, UsageRecord};
use crate::validation::validate_alpha;

pub const DEFAULT_ALPHA: f64 = 0.4;

/// Smoothing factor in (0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Alpha(f64);

impl Alpha {
    pub fn new(value: f64) -> CoreResult<Self> {
        validate_alpha(value)
            .map(|_| Alpha(value))
            .map_err(|msg| CoreError::invalid(format!("{} (got {})", msg, value)))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl Default for Alpha {
    fn default() -> Self {
        Alpha(DEFAULT_ALPHA)
    }
}

impl TryFrom<f64> for Alpha {
    type Error = CoreError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Alpha::new(value)
    }
}

impl From<Alpha> for f64 {
    fn from(alpha: Alpha) -> Self {
        alpha.0
    }
}

fn checked_quantity(record: &UsageRecord) -> CoreResult<f64> {
    if record.quantity_used < 0 {
        return Err(CoreError::invalid(format!(
            "negative quantity {} logged for batch {} on {}",
            record.quantity_used, record.batch_id, record.date
        )));
    }
    Ok(f64::from(record.quantity_used))
}

/// Smooth a series of usage records, oldest first.
///
/// Fails with `InvalidInput` on an empty slice or a negative quantity.
pub fn exponential_smoothing(records: &[UsageRecord], alpha: Alpha) -> CoreResult<f64> {
    let (first, rest) = records
        .split_first()
        .ok_or_else(|| CoreError::invalid("cannot smooth an empty usage series"))?;
    let a = alpha.value();
    rest.iter().try_fold(checked_quantity(first)?, |smoothed, record| {
        Ok(a * checked_quantity(record)? + (1.0 - a) * smoothed)
    })
}

/// Days until stock runs out at the forecast rate; `None` when the forecast
/// is not positive.
pub fn estimated_stockout_days(current_stock: i32, forecast: f64) -> Option<f64> {
    if forecast > 0.0 {
        Some(f64::from(current_stock) / forecast)
    } else {
        None
    }
}

/// Forecast one batch
pub fn forecast_batch(series: &SortedSeries, alpha: Alpha) -> CoreResult<ForecastResult> {
    let forecast = exponential_smoothing(series.records(), alpha)?;
    let profile = series.profile();

    Ok(ForecastResult {
        batch_id: series.batch_id(),
        forecast,
        name: profile.product_name.clone(),
        strength: profile.strength.clone(),
        batch_number: profile.batch_number.clone(),
        reorder_threshold: profile.reorder_threshold,
        supplier_lead_time: profile.supplier_lead_time,
        initial_stock: profile.initial_stock,
        current_stock: profile.current_stock,
        quantity_used_total: series
            .records()
            .iter()
            .map(|r| i64::from(r.quantity_used))
            .sum(),
        estimated_stockout_days: estimated_stockout_days(profile.current_stock, forecast),
        dates: series.records().iter().map(|r| r.date).collect(),
    })
}

/// Forecast every batch. A batch that fails is reported in `failures`
/// without affecting the others.
pub fn forecast_all<I>(series: I, alpha: Alpha) -> ForecastReport
where
    I: IntoIterator<Item = SortedSeries>,
{
    let mut forecasts = Vec::new();
    let mut failures = Vec::new();

    for s in series {
        match forecast_batch(&s, alpha) {
            Ok(result) => forecasts.push(result),
            Err(err) => failures.push(BatchFailure {
                batch_id: s.batch_id(),
                error: err.to_string(),
            }),
        }
    }

    ForecastReport {
        alpha: alpha.value(),
        forecasts,
        failures,
    }
}
