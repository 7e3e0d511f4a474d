//! Snapshot differ: added, removed and consumed batches between two snapshots

use std::collections::{HashMap, HashSet};

use crate::error::{CoreError, CoreResult};
use crate::models::{AddedBatch, BatchSnapshotEntry, ChangeSet, RemovedBatch, StockChange};

impl From<&BatchSnapshotEntry> for AddedBatch {
    fn from(entry: &BatchSnapshotEntry) -> Self {
        AddedBatch {
            batch_id: entry.batch_id,
            product_name: entry.product_name.clone(),
            batch_number: entry.batch_number.clone(),
            initial_stock: entry.initial_stock,
        }
    }
}

impl From<&BatchSnapshotEntry> for RemovedBatch {
    fn from(entry: &BatchSnapshotEntry) -> Self {
        RemovedBatch {
            batch_id: entry.batch_id,
            product_name: entry.product_name.clone(),
            batch_number: entry.batch_number.clone(),
            last_known_stock: entry.current_stock,
        }
    }
}

fn index_by_batch<'a>(
    entries: &'a [BatchSnapshotEntry],
    side: &str,
) -> CoreResult<HashMap<i32, &'a BatchSnapshotEntry>> {
    let mut index = HashMap::with_capacity(entries.len());
    for entry in entries {
        if index.insert(entry.batch_id, entry).is_some() {
            return Err(CoreError::invalid(format!(
                "batch {} appears more than once in the {} snapshot",
                entry.batch_id, side
            )));
        }
    }
    Ok(index)
}

fn batch_ids(entries: &[BatchSnapshotEntry], side: &str) -> CoreResult<HashSet<i32>> {
    let mut ids = HashSet::with_capacity(entries.len());
    for entry in entries {
        if !ids.insert(entry.batch_id) {
            return Err(CoreError::invalid(format!(
                "batch {} appears more than once in the {} snapshot",
                entry.batch_id, side
            )));
        }
    }
    Ok(ids)
}

/// Compare two snapshots by batch id.
///
/// `added` and `stock_changes` follow the order of `current`, `removed`
/// follows the order of `previous`. Only positive stock deltas (consumption)
/// are reported; restocks are left out.
pub fn diff_snapshots(
    previous: &[BatchSnapshotEntry],
    current: &[BatchSnapshotEntry],
) -> CoreResult<ChangeSet> {
    let previous_by_batch = index_by_batch(previous, "previous")?;
    let current_ids = batch_ids(current, "current")?;

    let mut changes = ChangeSet::default();

    for entry in current {
        match previous_by_batch.get(&entry.batch_id) {
            None => changes.added.push(AddedBatch::from(entry)),
            Some(before) => {
                let used = i64::from(before.current_stock) - i64::from(entry.current_stock);
                if used > 0 {
                    changes.stock_changes.push(StockChange {
                        batch_id: entry.batch_id,
                        product_name: entry.product_name.clone(),
                        batch_number: entry.batch_number.clone(),
                        previous_stock: before.current_stock,
                        current_stock: entry.current_stock,
                        used,
                    });
                }
            }
        }
    }

    changes.removed = previous
        .iter()
        .filter(|entry| !current_ids.contains(&entry.batch_id))
        .map(RemovedBatch::from)
        .collect();

    Ok(changes)
}
