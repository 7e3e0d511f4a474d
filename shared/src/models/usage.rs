//! Usage log models

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single logged consumption event for a batch. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsageRecord {
    pub batch_id: i32,
    pub product_id: i32,
    pub date: NaiveDate,
    pub quantity_used: i32,
}

/// Batch and product attributes joined onto each usage row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchProfile {
    pub batch_number: String,
    pub product_name: String,
    pub strength: Option<String>,
    pub reorder_threshold: i32,
    pub supplier_lead_time: i32,
    pub current_stock: i32,
    pub initial_stock: i32,
    pub expiry_date: NaiveDate,
}

/// One joined usage x batch x product row as returned by storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageRow {
    pub record: UsageRecord,
    pub profile: BatchProfile,
}

/// Total usage of one batch over a reporting window
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsageTotal {
    pub batch_id: i32,
    pub product_id: i32,
    pub product_name: String,
    pub batch_number: String,
    pub total_used: i64,
    pub usage_events: i64,
}
