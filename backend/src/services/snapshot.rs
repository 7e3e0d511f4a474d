//! Inventory snapshot service
//!
//! A snapshot freezes every batch row as a JSON array. Stored payloads are
//! decoded through the lenient numeric helpers in `shared::numeric`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shared::{validate_snapshot_type, BatchSnapshotEntry, Snapshot};
use sqlx::{FromRow, PgPool};

use crate::error::{AppError, AppResult};

const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 500;

/// Snapshot service
#[derive(Clone)]
pub struct SnapshotService {
    db: PgPool,
}

/// Snapshot metadata without the payload
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SnapshotSummary {
    pub snapshot_id: i32,
    pub snapshot_type: String,
    pub snapshot_date: DateTime<Utc>,
    pub entry_count: i32,
}

/// Filters for listing snapshots
#[derive(Debug, Default, Deserialize)]
pub struct SnapshotFilter {
    pub snapshot_type: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, FromRow)]
struct SnapshotRow {
    snapshot_id: i32,
    snapshot_type: String,
    snapshot_date: DateTime<Utc>,
    snapshot_data: serde_json::Value,
}

impl TryFrom<SnapshotRow> for Snapshot {
    type Error = AppError;

    fn try_from(row: SnapshotRow) -> Result<Self, Self::Error> {
        let entries: Vec<BatchSnapshotEntry> =
            serde_json::from_value(row.snapshot_data).map_err(|e| {
                tracing::warn!(snapshot_id = row.snapshot_id, error = %e, "malformed snapshot payload");
                AppError::InvalidInput(format!(
                    "Snapshot {} has a malformed payload: {}",
                    row.snapshot_id, e
                ))
            })?;

        Ok(Snapshot {
            snapshot_id: row.snapshot_id,
            snapshot_type: row.snapshot_type,
            snapshot_date: row.snapshot_date,
            entries,
        })
    }
}

/// Current batch state captured into a snapshot
#[derive(Debug, FromRow)]
struct BatchStateRow {
    batch_id: i32,
    product_id: i32,
    batch_number: String,
    current_stock: i32,
    initial_stock: i32,
    expiry_date: NaiveDate,
    product_name: String,
    strength: Option<String>,
    reorder_threshold: i32,
    supplier_lead_time: i32,
}

impl From<BatchStateRow> for BatchSnapshotEntry {
    fn from(row: BatchStateRow) -> Self {
        BatchSnapshotEntry {
            batch_id: row.batch_id,
            product_id: row.product_id,
            batch_number: row.batch_number,
            current_stock: row.current_stock,
            initial_stock: row.initial_stock,
            expiry_date: row.expiry_date,
            product_name: row.product_name,
            strength: row.strength,
            reorder_threshold: Some(row.reorder_threshold),
            supplier_lead_time: Some(row.supplier_lead_time),
        }
    }
}

fn list_limit(requested: Option<i64>) -> i64 {
    requested
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT)
}

impl SnapshotService {
    /// Create a new SnapshotService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Capture every batch as a new snapshot of the given type
    pub async fn capture(&self, snapshot_type: &str) -> AppResult<Snapshot> {
        validate_snapshot_type(snapshot_type).map_err(|msg| AppError::Validation {
            field: "snapshot_type".to_string(),
            message: msg.to_string(),
        })?;

        let entries: Vec<BatchSnapshotEntry> = sqlx::query_as::<_, BatchStateRow>(
            r#"
            SELECT d.batch_id, d.product_id, d.batch_number, d.current_stock, d.initial_stock,
                   d.expiry_date, p.product_name, p.strength, p.reorder_threshold,
                   p.supplier_lead_time
            FROM product_details d
            JOIN product_inventory p ON p.product_id = d.product_id
            ORDER BY d.batch_id
            "#,
        )
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(BatchSnapshotEntry::from)
        .collect();

        let payload = serde_json::to_value(&entries)
            .map_err(|e| AppError::Internal(format!("Failed to encode snapshot: {}", e)))?;

        let (snapshot_id, snapshot_date) = sqlx::query_as::<_, (i32, DateTime<Utc>)>(
            r#"
            INSERT INTO inventory_snapshots (snapshot_type, snapshot_data)
            VALUES ($1, $2)
            RETURNING snapshot_id, snapshot_date
            "#,
        )
        .bind(snapshot_type)
        .bind(&payload)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(
            snapshot_id,
            snapshot_type,
            batches = entries.len(),
            "inventory snapshot captured"
        );

        Ok(Snapshot {
            snapshot_id,
            snapshot_type: snapshot_type.to_string(),
            snapshot_date,
            entries,
        })
    }

    /// List snapshots, newest first
    pub async fn list_snapshots(&self, filter: SnapshotFilter) -> AppResult<Vec<SnapshotSummary>> {
        let summaries = sqlx::query_as::<_, SnapshotSummary>(
            r#"
            SELECT snapshot_id, snapshot_type, snapshot_date,
                   CASE WHEN jsonb_typeof(snapshot_data) = 'array'
                        THEN jsonb_array_length(snapshot_data) ELSE 0 END AS entry_count
            FROM inventory_snapshots
            WHERE ($1::TEXT IS NULL OR snapshot_type = $1)
            ORDER BY snapshot_date DESC, snapshot_id DESC
            LIMIT $2
            "#,
        )
        .bind(filter.snapshot_type)
        .bind(list_limit(filter.limit))
        .fetch_all(&self.db)
        .await?;

        Ok(summaries)
    }

    /// Get a snapshot with its entries
    pub async fn get_snapshot(&self, snapshot_id: i32) -> AppResult<Snapshot> {
        sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT snapshot_id, snapshot_type, snapshot_date, snapshot_data
            FROM inventory_snapshots
            WHERE snapshot_id = $1
            "#,
        )
        .bind(snapshot_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Snapshot".to_string()))?
        .try_into()
    }

    /// The most recent snapshot of each requested type. Types without any
    /// snapshot are simply absent from the result.
    pub async fn latest_of_types(&self, snapshot_types: &[&str]) -> AppResult<Vec<Snapshot>> {
        let types: Vec<String> = snapshot_types.iter().map(|t| t.to_string()).collect();

        sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT DISTINCT ON (snapshot_type)
                   snapshot_id, snapshot_type, snapshot_date, snapshot_data
            FROM inventory_snapshots
            WHERE snapshot_type = ANY($1)
            ORDER BY snapshot_type, snapshot_date DESC, snapshot_id DESC
            "#,
        )
        .bind(&types)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(Snapshot::try_from)
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn row(data: serde_json::Value) -> SnapshotRow {
        SnapshotRow {
            snapshot_id: 9,
            snapshot_type: "weekly_opening".to_string(),
            snapshot_date: Utc.with_ymd_and_hms(2025, 6, 2, 0, 5, 0).unwrap(),
            snapshot_data: data,
        }
    }

    #[test]
    fn test_stored_payload_with_text_numbers_decodes() {
        let snapshot = Snapshot::try_from(row(json!([{
            "batch_id": "3",
            "product_id": 1,
            "batch_number": "AMX-1",
            "current_stock": "40",
            "initial_stock": 100.0,
            "expiry_date": "2026-01-31T00:00:00.000Z",
            "product_name": "Amoxicillin",
            "strength": "500mg",
            "reorder_threshold": null
        }])))
        .unwrap();

        assert_eq!(snapshot.entries.len(), 1);
        let entry = &snapshot.entries[0];
        assert_eq!(entry.batch_id, 3);
        assert_eq!(entry.current_stock, 40);
        assert_eq!(entry.initial_stock, 100);
        assert_eq!(entry.expiry_date, NaiveDate::from_ymd_opt(2026, 1, 31).unwrap());
        assert_eq!(entry.reorder_threshold, None);
    }

    #[test]
    fn test_malformed_payload_is_invalid_input() {
        let result = Snapshot::try_from(row(json!({"not": "an array"})));
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_list_limit_is_clamped() {
        assert_eq!(list_limit(None), DEFAULT_LIST_LIMIT);
        assert_eq!(list_limit(Some(0)), 1);
        assert_eq!(list_limit(Some(10_000)), MAX_LIST_LIMIT);
    }
}
