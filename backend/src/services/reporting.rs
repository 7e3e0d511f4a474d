//! Reporting service for weekly inventory reports and data export

use chrono::NaiveDate;
use serde::Serialize;
use shared::{compose_weekly_report, ExpiryWindow, SnapshotPair, UsageTotal, WeeklyReport};
use sqlx::PgPool;

use crate::config::ReportConfig;
use crate::error::{AppError, AppResult};
use crate::services::snapshot::SnapshotService;
use crate::services::usage::UsageService;

/// Reporting service
#[derive(Clone)]
pub struct ReportingService {
    snapshots: SnapshotService,
    usage: UsageService,
    opening_type: String,
    closing_type: String,
    expiry_window: ExpiryWindow,
}

impl ReportingService {
    /// Create a new ReportingService instance
    pub fn new(db: PgPool, config: &ReportConfig) -> AppResult<Self> {
        Ok(Self {
            snapshots: SnapshotService::new(db.clone()),
            usage: UsageService::new(db),
            opening_type: config.opening_snapshot_type.clone(),
            closing_type: config.closing_snapshot_type.clone(),
            expiry_window: ExpiryWindow::days(config.expiry_window_days)?,
        })
    }

    /// The latest opening and closing snapshots, ordered by capture time
    async fn latest_pair(&self) -> AppResult<SnapshotPair> {
        let snapshots = self
            .snapshots
            .latest_of_types(&[self.opening_type.as_str(), self.closing_type.as_str()])
            .await?;
        Ok(SnapshotPair::from_kinds(
            snapshots,
            &self.opening_type,
            &self.closing_type,
        )?)
    }

    /// Build the week-over-week report from the latest snapshot pair
    pub async fn weekly_report(&self, today: NaiveDate) -> AppResult<WeeklyReport> {
        let pair = self.latest_pair().await?;
        let usage_summary = self.usage.usage_totals(pair.period()).await?;

        let report = compose_weekly_report(&pair, usage_summary, self.expiry_window, today)?;

        tracing::debug!(
            previous = pair.previous().snapshot_id,
            current = pair.current().snapshot_id,
            added = report.inventory_changes.added.len(),
            removed = report.inventory_changes.removed.len(),
            changed = report.inventory_changes.stock_changes.len(),
            expiring = report.expiring_soon.len(),
            "weekly report composed"
        );
        Ok(report)
    }

    /// Usage totals for the period covered by the latest snapshot pair
    pub async fn weekly_usage(&self) -> AppResult<Vec<UsageTotal>> {
        let pair = self.latest_pair().await?;
        self.usage.usage_totals(pair.period()).await
    }

    /// Export data to CSV format
    pub fn export_to_csv<T: Serialize>(data: &[T]) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for record in data {
            wtr.serialize(record)
                .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?;
        String::from_utf8(bytes)
            .map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_usage_totals_to_csv() {
        let totals = vec![UsageTotal {
            batch_id: 1,
            product_id: 2,
            product_name: "Metformin".to_string(),
            batch_number: "MET-9".to_string(),
            total_used: 35,
            usage_events: 4,
        }];
        let csv = ReportingService::export_to_csv(&totals).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("batch_id,product_id,product_name,batch_number,total_used,usage_events")
        );
        assert_eq!(lines.next(), Some("1,2,Metformin,MET-9,35,4"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_export_empty_is_empty() {
        let csv = ReportingService::export_to_csv::<UsageTotal>(&[]).unwrap();
        assert!(csv.is_empty());
    }
}
