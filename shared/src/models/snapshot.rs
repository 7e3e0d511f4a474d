//! Inventory snapshot models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::numeric;

/// Frozen copy of one batch, taken when a snapshot is captured
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchSnapshotEntry {
    #[serde(deserialize_with = "numeric::i32_lenient")]
    pub batch_id: i32,
    #[serde(deserialize_with = "numeric::i32_lenient")]
    pub product_id: i32,
    pub batch_number: String,
    #[serde(deserialize_with = "numeric::i32_lenient")]
    pub current_stock: i32,
    #[serde(deserialize_with = "numeric::i32_lenient")]
    pub initial_stock: i32,
    #[serde(deserialize_with = "numeric::date_lenient")]
    pub expiry_date: NaiveDate,
    pub product_name: String,
    #[serde(default)]
    pub strength: Option<String>,
    #[serde(default, deserialize_with = "numeric::option_i32_lenient")]
    pub reorder_threshold: Option<i32>,
    #[serde(default, deserialize_with = "numeric::option_i32_lenient")]
    pub supplier_lead_time: Option<i32>,
}

/// A persisted full-inventory snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snapshot {
    pub snapshot_id: i32,
    /// Checkpoint label, e.g. `weekly_opening`
    pub snapshot_type: String,
    pub snapshot_date: DateTime<Utc>,
    pub entries: Vec<BatchSnapshotEntry>,
}
