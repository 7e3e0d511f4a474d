//! Usage log service
//!
//! Usage records are append-only. Recording usage decrements the batch's
//! current stock in the same transaction.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shared::{validate_usage_quantity, BatchProfile, DateRange, UsageRecord, UsageRow, UsageTotal};
use sqlx::{FromRow, PgPool};
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Usage service
#[derive(Clone)]
pub struct UsageService {
    db: PgPool,
}

/// Usage log entry
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UsageEntry {
    pub usagelog_id: i32,
    pub batch_id: i32,
    pub product_id: i32,
    pub date: NaiveDate,
    pub quantity_used: i32,
    pub created_at: DateTime<Utc>,
}

/// Filters for listing usage
#[derive(Debug, Default, Deserialize)]
pub struct UsageFilter {
    pub batch_id: Option<i32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Input for recording usage
#[derive(Debug, Deserialize, Validate)]
pub struct RecordUsageInput {
    pub batch_id: i32,
    #[validate(range(min = 1, message = "Quantity used must be positive"))]
    pub quantity_used: i32,
    /// Defaults to today (UTC)
    pub date: Option<NaiveDate>,
}

/// Joined usage x batch x product row
#[derive(Debug, FromRow)]
struct UsageJoinRow {
    batch_id: i32,
    product_id: i32,
    date: NaiveDate,
    quantity_used: i32,
    batch_number: String,
    product_name: String,
    strength: Option<String>,
    reorder_threshold: i32,
    supplier_lead_time: i32,
    current_stock: i32,
    initial_stock: i32,
    expiry_date: NaiveDate,
}

impl From<UsageJoinRow> for UsageRow {
    fn from(row: UsageJoinRow) -> Self {
        UsageRow {
            record: UsageRecord {
                batch_id: row.batch_id,
                product_id: row.product_id,
                date: row.date,
                quantity_used: row.quantity_used,
            },
            profile: BatchProfile {
                batch_number: row.batch_number,
                product_name: row.product_name,
                strength: row.strength,
                reorder_threshold: row.reorder_threshold,
                supplier_lead_time: row.supplier_lead_time,
                current_stock: row.current_stock,
                initial_stock: row.initial_stock,
                expiry_date: row.expiry_date,
            },
        }
    }
}

#[derive(Debug, FromRow)]
struct StockRow {
    product_id: i32,
    current_stock: i32,
}

impl UsageService {
    /// Create a new UsageService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List usage entries, newest first
    pub async fn list_usage(&self, filter: UsageFilter) -> AppResult<Vec<UsageEntry>> {
        if let (Some(start), Some(end)) = (filter.start_date, filter.end_date) {
            if start > end {
                return Err(AppError::Validation {
                    field: "start_date".to_string(),
                    message: "start_date must not be after end_date".to_string(),
                });
            }
        }

        let entries = sqlx::query_as::<_, UsageEntry>(
            r#"
            SELECT usagelog_id, batch_id, product_id, date, quantity_used, created_at
            FROM usage_log
            WHERE ($1::INT IS NULL OR batch_id = $1)
              AND ($2::DATE IS NULL OR date >= $2)
              AND ($3::DATE IS NULL OR date <= $3)
            ORDER BY date DESC, usagelog_id DESC
            "#,
        )
        .bind(filter.batch_id)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .fetch_all(&self.db)
        .await?;

        Ok(entries)
    }

    /// Record usage against a batch and decrement its stock
    pub async fn record_usage(&self, input: RecordUsageInput) -> AppResult<UsageEntry> {
        input.validate()?;
        let date = input.date.unwrap_or_else(|| Utc::now().date_naive());

        let mut tx = self.db.begin().await?;

        let stock = sqlx::query_as::<_, StockRow>(
            "SELECT product_id, current_stock FROM product_details WHERE batch_id = $1 FOR UPDATE",
        )
        .bind(input.batch_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Batch".to_string()))?;

        validate_usage_quantity(input.quantity_used, stock.current_stock).map_err(|msg| {
            AppError::InsufficientStock(format!(
                "{}: requested {}, available {}",
                msg, input.quantity_used, stock.current_stock
            ))
        })?;

        let entry = sqlx::query_as::<_, UsageEntry>(
            r#"
            INSERT INTO usage_log (batch_id, product_id, date, quantity_used)
            VALUES ($1, $2, $3, $4)
            RETURNING usagelog_id, batch_id, product_id, date, quantity_used, created_at
            "#,
        )
        .bind(input.batch_id)
        .bind(stock.product_id)
        .bind(date)
        .bind(input.quantity_used)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE product_details SET current_stock = current_stock - $1 WHERE batch_id = $2")
            .bind(input.quantity_used)
            .bind(input.batch_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            batch_id = entry.batch_id,
            quantity_used = entry.quantity_used,
            remaining = stock.current_stock - entry.quantity_used,
            "usage recorded"
        );
        Ok(entry)
    }

    /// Every usage row joined with its batch and product, in log order
    pub async fn usage_rows(&self) -> AppResult<Vec<UsageRow>> {
        let rows = sqlx::query_as::<_, UsageJoinRow>(
            r#"
            SELECT u.batch_id, u.product_id, u.date, u.quantity_used,
                   d.batch_number, p.product_name, p.strength, p.reorder_threshold,
                   p.supplier_lead_time, d.current_stock, d.initial_stock, d.expiry_date
            FROM usage_log u
            JOIN product_details d ON d.batch_id = u.batch_id
            JOIN product_inventory p ON p.product_id = d.product_id
            ORDER BY u.usagelog_id
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(UsageRow::from).collect())
    }

    /// Total usage per batch between two dates, both included
    pub async fn usage_totals(&self, period: DateRange) -> AppResult<Vec<UsageTotal>> {
        let totals = sqlx::query_as::<_, UsageTotalRow>(
            r#"
            SELECT u.batch_id, d.product_id, p.product_name, d.batch_number,
                   SUM(u.quantity_used)::BIGINT AS total_used,
                   COUNT(*) AS usage_events
            FROM usage_log u
            JOIN product_details d ON d.batch_id = u.batch_id
            JOIN product_inventory p ON p.product_id = d.product_id
            WHERE u.date BETWEEN $1 AND $2
            GROUP BY u.batch_id, d.product_id, p.product_name, d.batch_number
            ORDER BY total_used DESC, u.batch_id
            "#,
        )
        .bind(period.start)
        .bind(period.end)
        .fetch_all(&self.db)
        .await?;

        Ok(totals.into_iter().map(UsageTotal::from).collect())
    }
}

#[derive(Debug, FromRow)]
struct UsageTotalRow {
    batch_id: i32,
    product_id: i32,
    product_name: String,
    batch_number: String,
    total_used: i64,
    usage_events: i64,
}

impl From<UsageTotalRow> for UsageTotal {
    fn from(row: UsageTotalRow) -> Self {
        UsageTotal {
            batch_id: row.batch_id,
            product_id: row.product_id,
            product_name: row.product_name,
            batch_number: row.batch_number,
            total_used: row.total_used,
            usage_events: row.usage_events,
        }
    }
}
