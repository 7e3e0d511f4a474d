//! Weekly report models

use serde::{Deserialize, Serialize};

use super::{BatchSnapshotEntry, UsageTotal};
use crate::types::DateRange;

/// A batch present in the current snapshot but not the previous one
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddedBatch {
    pub batch_id: i32,
    pub product_name: String,
    pub batch_number: String,
    pub initial_stock: i32,
}

/// A batch present in the previous snapshot but gone from the current one
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemovedBatch {
    pub batch_id: i32,
    pub product_name: String,
    pub batch_number: String,
    pub last_known_stock: i32,
}

/// Stock consumed from a batch between two snapshots
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StockChange {
    pub batch_id: i32,
    pub product_name: String,
    pub batch_number: String,
    pub previous_stock: i32,
    pub current_stock: i32,
    /// Always positive; restocks are not reported
    pub used: i64,
}

/// Differences between two snapshots
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeSet {
    pub added: Vec<AddedBatch>,
    pub removed: Vec<RemovedBatch>,
    pub stock_changes: Vec<StockChange>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.stock_changes.is_empty()
    }
}

/// Week-over-week inventory report
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WeeklyReport {
    pub period: DateRange,
    pub previous_snapshot_type: String,
    pub current_snapshot_type: String,
    pub inventory_changes: ChangeSet,
    pub usage_summary: Vec<UsageTotal>,
    pub expiring_soon: Vec<BatchSnapshotEntry>,
}
