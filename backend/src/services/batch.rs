//! Batch service for stock-carrying product lots

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shared::{needs_reorder, validate_batch_number};
use sqlx::{FromRow, PgPool};
use validator::{Validate, ValidationError};

use crate::error::{AppError, AppResult};

/// Batch service
#[derive(Clone)]
pub struct BatchService {
    db: PgPool,
}

/// Batch record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Batch {
    pub batch_id: i32,
    pub product_id: i32,
    pub batch_number: String,
    pub current_stock: i32,
    pub initial_stock: i32,
    pub expiry_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Batch joined with its product, as listed to clients
#[derive(Debug, Clone, Serialize)]
pub struct BatchOverview {
    pub batch_id: i32,
    pub product_id: i32,
    pub product_name: String,
    pub strength: Option<String>,
    pub batch_number: String,
    pub current_stock: i32,
    pub initial_stock: i32,
    pub expiry_date: NaiveDate,
    pub reorder_threshold: i32,
    pub needs_reorder: bool,
}

#[derive(Debug, FromRow)]
struct BatchOverviewRow {
    batch_id: i32,
    product_id: i32,
    product_name: String,
    strength: Option<String>,
    batch_number: String,
    current_stock: i32,
    initial_stock: i32,
    expiry_date: NaiveDate,
    reorder_threshold: i32,
}

impl From<BatchOverviewRow> for BatchOverview {
    fn from(row: BatchOverviewRow) -> Self {
        BatchOverview {
            needs_reorder: needs_reorder(row.current_stock, row.reorder_threshold),
            batch_id: row.batch_id,
            product_id: row.product_id,
            product_name: row.product_name,
            strength: row.strength,
            batch_number: row.batch_number,
            current_stock: row.current_stock,
            initial_stock: row.initial_stock,
            expiry_date: row.expiry_date,
            reorder_threshold: row.reorder_threshold,
        }
    }
}

/// Filters for listing batches
#[derive(Debug, Default, Deserialize)]
pub struct BatchFilter {
    pub product_id: Option<i32>,
    /// Only batches at or below their product's reorder threshold
    #[serde(default)]
    pub low_stock: bool,
}

fn batch_number_format(value: &str) -> Result<(), ValidationError> {
    validate_batch_number(value).map_err(|msg| {
        let mut err = ValidationError::new("batch_number");
        err.message = Some(msg.into());
        err
    })
}

/// Input for creating a batch
#[derive(Debug, Deserialize, Validate)]
pub struct CreateBatchInput {
    pub product_id: i32,
    #[validate(custom = "batch_number_format")]
    pub batch_number: String,
    #[validate(range(min = 0, message = "Initial stock cannot be negative"))]
    pub initial_stock: i32,
    /// Defaults to `initial_stock`
    #[validate(range(min = 0, message = "Current stock cannot be negative"))]
    pub current_stock: Option<i32>,
    pub expiry_date: NaiveDate,
}

/// Input for updating a batch
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateBatchInput {
    #[validate(custom = "batch_number_format")]
    pub batch_number: Option<String>,
    #[validate(range(min = 0, message = "Initial stock cannot be negative"))]
    pub initial_stock: Option<i32>,
    #[validate(range(min = 0, message = "Current stock cannot be negative"))]
    pub current_stock: Option<i32>,
    pub expiry_date: Option<NaiveDate>,
}

const BATCH_COLUMNS: &str =
    "batch_id, product_id, batch_number, current_stock, initial_stock, expiry_date, created_at";

const UPDATE_BATCH_SQL: &str = r#"
    UPDATE product_details
    SET batch_number = COALESCE($1, batch_number),
        current_stock = COALESCE($2, current_stock),
        initial_stock = COALESCE($3, initial_stock),
        expiry_date = COALESCE($4, expiry_date)
    WHERE batch_id = $5
"#;

impl BatchService {
    /// Create a new BatchService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List batches with their product attributes
    pub async fn list_batches(&self, filter: BatchFilter) -> AppResult<Vec<BatchOverview>> {
        let rows = sqlx::query_as::<_, BatchOverviewRow>(
            r#"
            SELECT d.batch_id, d.product_id, p.product_name, p.strength, d.batch_number,
                   d.current_stock, d.initial_stock, d.expiry_date, p.reorder_threshold
            FROM product_details d
            JOIN product_inventory p ON p.product_id = d.product_id
            WHERE ($1::INT IS NULL OR d.product_id = $1)
            ORDER BY d.expiry_date, d.batch_id
            "#,
        )
        .bind(filter.product_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(BatchOverview::from)
            .filter(|b| !filter.low_stock || b.needs_reorder)
            .collect())
    }

    /// List the batches of one product
    pub async fn list_product_batches(&self, product_id: i32) -> AppResult<Vec<BatchOverview>> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM product_inventory WHERE product_id = $1)",
        )
        .bind(product_id)
        .fetch_one(&self.db)
        .await?;

        if !exists {
            return Err(AppError::NotFound("Product".to_string()));
        }

        self.list_batches(BatchFilter {
            product_id: Some(product_id),
            low_stock: false,
        })
        .await
    }

    /// Get a batch by ID
    pub async fn get_batch(&self, batch_id: i32) -> AppResult<Batch> {
        sqlx::query_as::<_, Batch>(&format!(
            "SELECT {} FROM product_details WHERE batch_id = $1",
            BATCH_COLUMNS
        ))
        .bind(batch_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Batch".to_string()))
    }

    /// Register a new batch for an existing product
    pub async fn create_batch(&self, input: CreateBatchInput) -> AppResult<Batch> {
        input.validate()?;

        let product_exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM product_inventory WHERE product_id = $1)",
        )
        .bind(input.product_id)
        .fetch_one(&self.db)
        .await?;

        if !product_exists {
            return Err(AppError::NotFound("Product".to_string()));
        }

        let batch = sqlx::query_as::<_, Batch>(&format!(
            r#"
            INSERT INTO product_details (product_id, batch_number, current_stock, initial_stock, expiry_date)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            BATCH_COLUMNS
        ))
        .bind(input.product_id)
        .bind(input.batch_number.trim())
        .bind(input.current_stock.unwrap_or(input.initial_stock))
        .bind(input.initial_stock)
        .bind(input.expiry_date)
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::from_unique_violation(e, "batch_number"))?;

        tracing::info!(batch_id = batch.batch_id, batch_number = %batch.batch_number, "batch created");
        Ok(batch)
    }

    /// Update a batch, keeping fields that are not supplied.
    ///
    /// Omitted columns are left to the database, so a concurrent usage
    /// decrement on `current_stock` is never overwritten with a stale value.
    pub async fn update_batch(&self, batch_id: i32, input: UpdateBatchInput) -> AppResult<Batch> {
        input.validate()?;

        let batch = sqlx::query_as::<_, Batch>(&format!(
            "{} RETURNING {}",
            UPDATE_BATCH_SQL, BATCH_COLUMNS
        ))
        .bind(input.batch_number.as_deref().map(str::trim))
        .bind(input.current_stock)
        .bind(input.initial_stock)
        .bind(input.expiry_date)
        .bind(batch_id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| AppError::from_unique_violation(e, "batch_number"))?
        .ok_or_else(|| AppError::NotFound("Batch".to_string()))?;

        tracing::info!(batch_id, "batch updated");
        Ok(batch)
    }

    /// Delete a batch. Batches with logged usage cannot be deleted.
    pub async fn delete_batch(&self, batch_id: i32) -> AppResult<()> {
        self.get_batch(batch_id).await?;

        let usage_count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM usage_log WHERE batch_id = $1")
                .bind(batch_id)
                .fetch_one(&self.db)
                .await?;

        if usage_count > 0 {
            return Err(AppError::Conflict(format!(
                "Cannot delete batch: {} usage records are linked to it",
                usage_count
            )));
        }

        sqlx::query("DELETE FROM product_details WHERE batch_id = $1")
            .bind(batch_id)
            .execute(&self.db)
            .await?;

        tracing::info!(batch_id, "batch deleted");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn create_input(batch_number: &str) -> CreateBatchInput {
        CreateBatchInput {
            product_id: 1,
            batch_number: batch_number.to_string(),
            initial_stock: 100,
            current_stock: None,
            expiry_date: NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
        }
    }

    #[test]
    fn test_batch_number_format_is_enforced() {
        assert!(create_input("AMX-2025/01").validate().is_ok());

        let err: AppError = create_input("AMX 01").validate().unwrap_err().into();
        assert!(matches!(
            err,
            AppError::Validation { field, message }
                if field == "batch_number" && message.contains("letters, digits")
        ));
    }

    #[test]
    fn test_overview_flags_reorder() {
        let row = BatchOverviewRow {
            batch_id: 3,
            product_id: 1,
            product_name: "Paracetamol".to_string(),
            strength: Some("500mg".to_string()),
            batch_number: "PCM-7".to_string(),
            current_stock: 20,
            initial_stock: 200,
            expiry_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            reorder_threshold: 20,
        };
        assert!(BatchOverview::from(row).needs_reorder);
    }

    /// Parse `column = COALESCE($n, column)` assignments out of a SET clause
    pub(crate) fn coalesced_columns(sql: &str) -> Vec<String> {
        let set = sql.split("SET").nth(1).unwrap().split("WHERE").next().unwrap();
        set.lines()
            .map(|line| line.trim().trim_end_matches(','))
            .filter(|line| !line.is_empty())
            .map(|assignment| {
                let (column, value) = assignment.split_once('=').unwrap();
                let column = column.trim();
                let value = value.trim();
                assert!(
                    value.starts_with("COALESCE($") && value.ends_with(&format!(", {})", column)),
                    "{} is overwritten unconditionally: {}",
                    column,
                    value
                );
                column.to_string()
            })
            .collect()
    }

    #[test]
    fn test_update_only_writes_supplied_columns() {
        let columns = coalesced_columns(UPDATE_BATCH_SQL);
        assert_eq!(
            columns,
            vec!["batch_number", "current_stock", "initial_stock", "expiry_date"]
        );
    }

    #[test]
    fn test_expiry_only_patch_leaves_stock_unbound() {
        let patch: UpdateBatchInput = serde_json::from_str(r#"{"expiry_date":"2026-09-30"}"#).unwrap();
        assert!(patch.validate().is_ok());
        assert!(patch.current_stock.is_none());
        assert!(patch.initial_stock.is_none());
    }

    #[test]
    fn test_filter_defaults() {
        let filter: BatchFilter = serde_json::from_str("{}").unwrap();
        assert!(filter.product_id.is_none());
        assert!(!filter.low_stock);
    }
}
