//! Usage aggregation: flat joined rows into one series per batch

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use crate::error::{CoreError, CoreResult};
use crate::models::{BatchProfile, UsageRecord, UsageRow};

/// One batch's usage records in storage order. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSeries {
    batch_id: i32,
    profile: BatchProfile,
    records: Vec<UsageRecord>,
}

/// One batch's usage records sorted by date. The forecast engine only
/// accepts this kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortedSeries {
    batch_id: i32,
    profile: BatchProfile,
    records: Vec<UsageRecord>,
}

impl RawSeries {
    /// Build a series from already-grouped records. All records must belong
    /// to `batch_id` and there must be at least one.
    pub fn new(batch_id: i32, profile: BatchProfile, records: Vec<UsageRecord>) -> CoreResult<Self> {
        if records.is_empty() {
            return Err(CoreError::invalid(format!(
                "usage series for batch {} is empty",
                batch_id
            )));
        }
        if let Some(stray) = records.iter().find(|r| r.batch_id != batch_id) {
            return Err(CoreError::invalid(format!(
                "usage record for batch {} found in series for batch {}",
                stray.batch_id, batch_id
            )));
        }
        Ok(Self {
            batch_id,
            profile,
            records,
        })
    }

    pub fn batch_id(&self) -> i32 {
        self.batch_id
    }

    pub fn profile(&self) -> &BatchProfile {
        &self.profile
    }

    pub fn records(&self) -> &[UsageRecord] {
        &self.records
    }

    /// Stable sort by date; records logged on the same day keep storage order
    pub fn into_sorted(self) -> SortedSeries {
        let mut records = self.records;
        records.sort_by_key(|r| r.date);
        SortedSeries {
            batch_id: self.batch_id,
            profile: self.profile,
            records,
        }
    }
}

impl SortedSeries {
    pub fn batch_id(&self) -> i32 {
        self.batch_id
    }

    pub fn profile(&self) -> &BatchProfile {
        &self.profile
    }

    pub fn records(&self) -> &[UsageRecord] {
        &self.records
    }
}

/// Group joined usage rows by batch id.
///
/// Rows keep the order they arrive in; nothing is filtered or deduplicated.
/// The batch profile comes from the first row seen for each batch.
pub fn group_by_batch<I>(rows: I) -> BTreeMap<i32, RawSeries>
where
    I: IntoIterator<Item = UsageRow>,
{
    let mut grouped: BTreeMap<i32, RawSeries> = BTreeMap::new();
    for UsageRow { record, profile } in rows {
        match grouped.entry(record.batch_id) {
            Entry::Occupied(mut series) => series.get_mut().records.push(record),
            Entry::Vacant(slot) => {
                slot.insert(RawSeries {
                    batch_id: record.batch_id,
                    profile,
                    records: vec![record],
                });
            }
        }
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn profile(stock: i32) -> BatchProfile {
        BatchProfile {
            batch_number: "B-1".to_string(),
            product_name: "Amoxicillin".to_string(),
            strength: Some("500mg".to_string()),
            reorder_threshold: 20,
            supplier_lead_time: 7,
            current_stock: stock,
            initial_stock: 200,
            expiry_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        }
    }

    fn row(batch_id: i32, day: u32, qty: i32, stock: i32) -> UsageRow {
        UsageRow {
            record: UsageRecord {
                batch_id,
                product_id: 1,
                date: NaiveDate::from_ymd_opt(2025, 5, day).unwrap(),
                quantity_used: qty,
            },
            profile: profile(stock),
        }
    }

    #[test]
    fn test_groups_preserve_row_order() {
        let grouped = group_by_batch(vec![
            row(2, 9, 5, 80),
            row(1, 3, 10, 100),
            row(2, 1, 7, 70),
            row(1, 2, 20, 90),
        ]);

        assert_eq!(grouped.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
        let quantities: Vec<i32> = grouped[&2].records().iter().map(|r| r.quantity_used).collect();
        assert_eq!(quantities, vec![5, 7]);
        // profile taken from first row of the batch
        assert_eq!(grouped[&2].profile().current_stock, 80);
        assert_eq!(grouped[&1].profile().current_stock, 100);
    }

    #[test]
    fn test_no_rows_no_series() {
        assert!(group_by_batch(Vec::new()).is_empty());
    }

    #[test]
    fn test_sorting_is_stable_by_date() {
        let grouped = group_by_batch(vec![
            row(1, 9, 1, 100),
            row(1, 3, 2, 100),
            row(1, 9, 3, 100),
            row(1, 1, 4, 100),
        ]);
        let sorted = grouped.into_values().next().unwrap().into_sorted();
        let quantities: Vec<i32> = sorted.records().iter().map(|r| r.quantity_used).collect();
        assert_eq!(quantities, vec![4, 2, 1, 3]);
    }

    #[test]
    fn test_new_rejects_empty_and_foreign_records() {
        assert!(matches!(
            RawSeries::new(1, profile(10), Vec::new()),
            Err(CoreError::InvalidInput(_))
        ));
        let foreign = row(2, 1, 5, 10).record;
        assert!(matches!(
            RawSeries::new(1, profile(10), vec![foreign]),
            Err(CoreError::InvalidInput(_))
        ));
    }
}
