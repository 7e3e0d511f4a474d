//! Usage forecasting tests
//!
//! Tests for the aggregation and forecast pipeline including:
//! - Smoothing with full weight on the latest record returns that record
//! - Smoothing with vanishing weight stays at the first record
//! - Stockout horizon is null exactly when the forecast is not positive
//! - Aggregation preserves storage order and sorting is stable

use chrono::{Days, NaiveDate};
use proptest::prelude::*;
use shared::{
    estimated_stockout_days, exponential_smoothing, forecast_all, forecast_batch, group_by_batch,
    Alpha, BatchProfile, RawSeries, UsageRecord, UsageRow,
};

const EPSILON: f64 = 1e-9;

fn day(n: u64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 1).unwrap() + Days::new(n)
}

fn record(batch_id: i32, date: NaiveDate, quantity_used: i32) -> UsageRecord {
    UsageRecord {
        batch_id,
        product_id: 1,
        date,
        quantity_used,
    }
}

fn profile(current_stock: i32) -> BatchProfile {
    BatchProfile {
        batch_number: "AMX-2025-01".to_string(),
        product_name: "Amoxicillin".to_string(),
        strength: Some("500mg".to_string()),
        reorder_threshold: 50,
        supplier_lead_time: 7,
        current_stock,
        initial_stock: 200,
        expiry_date: NaiveDate::from_ymd_opt(2026, 6, 30).unwrap(),
    }
}

fn row(batch_id: i32, date: NaiveDate, quantity_used: i32, current_stock: i32) -> UsageRow {
    UsageRow {
        record: record(batch_id, date, quantity_used),
        profile: profile(current_stock),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// 10, 20, 10 at alpha 0.4: 10 -> 14 -> 12.4; 124 in stock lasts 10 units
    #[test]
    fn test_worked_example() {
        let rows = vec![
            row(1, day(0), 10, 124),
            row(1, day(1), 20, 124),
            row(1, day(2), 10, 124),
        ];
        let series = group_by_batch(rows).remove(&1).unwrap().into_sorted();
        let result = forecast_batch(&series, Alpha::new(0.4).unwrap()).unwrap();

        assert!((result.forecast - 12.4).abs() < EPSILON);
        let stockout = result.estimated_stockout_days.unwrap();
        assert!((stockout - 10.0).abs() < EPSILON);
        assert_eq!(result.quantity_used_total, 40);
        assert_eq!(result.dates, vec![day(0), day(1), day(2)]);
        assert_eq!(result.name, "Amoxicillin");
        assert_eq!(result.batch_number, "AMX-2025-01");
    }

    /// Records arrive out of date order and are sorted before smoothing
    #[test]
    fn test_unsorted_storage_order_is_sorted_by_date() {
        let rows = vec![
            row(1, day(2), 10, 124),
            row(1, day(0), 10, 124),
            row(1, day(1), 20, 124),
        ];
        let raw = group_by_batch(rows).remove(&1).unwrap();
        assert_eq!(raw.records()[0].date, day(2));

        let result = forecast_batch(&raw.into_sorted(), Alpha::default()).unwrap();
        assert!((result.forecast - 12.4).abs() < EPSILON);
        assert_eq!(result.dates, vec![day(0), day(1), day(2)]);
    }

    /// Same-day records keep storage order, so the later log entry wins
    #[test]
    fn test_same_day_records_keep_storage_order() {
        let rows = vec![row(1, day(0), 5, 100), row(1, day(0), 30, 100)];
        let series = group_by_batch(rows).remove(&1).unwrap().into_sorted();
        let quantities: Vec<i32> = series.records().iter().map(|r| r.quantity_used).collect();
        assert_eq!(quantities, vec![5, 30]);
    }

    #[test]
    fn test_all_zero_usage_has_no_stockout() {
        let rows = vec![row(7, day(0), 0, 80), row(7, day(1), 0, 80)];
        let series = group_by_batch(rows).remove(&7).unwrap().into_sorted();
        let result = forecast_batch(&series, Alpha::default()).unwrap();
        assert_eq!(result.forecast, 0.0);
        assert_eq!(result.estimated_stockout_days, None);
    }

    #[test]
    fn test_groups_iterate_in_batch_order() {
        let rows = vec![
            row(30, day(0), 1, 10),
            row(4, day(0), 1, 10),
            row(12, day(0), 1, 10),
            row(4, day(1), 2, 10),
        ];
        let grouped = group_by_batch(rows);
        let ids: Vec<i32> = grouped.keys().copied().collect();
        assert_eq!(ids, vec![4, 12, 30]);
        assert_eq!(grouped[&4].records().len(), 2);
    }

    /// One bad batch does not take the others down
    #[test]
    fn test_failing_batch_is_reported_separately() {
        let rows = vec![
            row(1, day(0), 10, 50),
            row(2, day(0), -3, 50),
            row(3, day(0), 4, 50),
        ];
        let series = group_by_batch(rows).into_values().map(RawSeries::into_sorted);
        let report = forecast_all(series, Alpha::default());

        let ok: Vec<i32> = report.forecasts.iter().map(|f| f.batch_id).collect();
        assert_eq!(ok, vec![1, 3]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].batch_id, 2);
        assert!(report.failures[0].error.contains("negative"));
        assert_eq!(report.alpha, 0.4);
    }

    #[test]
    fn test_empty_series_cannot_be_built() {
        assert!(RawSeries::new(1, profile(10), Vec::new()).is_err());
        assert!(exponential_smoothing(&[], Alpha::default()).is_err());
    }

    #[test]
    fn test_alpha_bounds() {
        assert!(Alpha::new(0.0).is_err());
        assert!(Alpha::new(-0.1).is_err());
        assert!(Alpha::new(1.5).is_err());
        assert!(Alpha::new(f64::NAN).is_err());
        assert!(Alpha::new(1.0).is_ok());
        assert_eq!(Alpha::default().value(), 0.4);
    }

    #[test]
    fn test_forecast_report_serializes_null_stockout() {
        let rows = vec![row(1, day(0), 0, 10)];
        let series = group_by_batch(rows).into_values().map(RawSeries::into_sorted);
        let report = forecast_all(series, Alpha::default());
        let json = serde_json::to_value(&report).unwrap();
        assert!(json["forecasts"][0]["estimated_stockout_days"].is_null());
        assert_eq!(json["forecasts"][0]["dates"][0], "2025-03-01");
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    /// Strategy for non-empty usage quantity series
    fn quantities_strategy() -> impl Strategy<Value = Vec<i32>> {
        prop::collection::vec(0i32..=500, 1..40)
    }

    fn records_of(quantities: &[i32]) -> Vec<UsageRecord> {
        quantities
            .iter()
            .enumerate()
            .map(|(i, q)| record(1, day(i as u64), *q))
            .collect()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Full weight on the newest observation returns the last quantity
        #[test]
        fn prop_alpha_one_yields_last_quantity(quantities in quantities_strategy()) {
            let value = exponential_smoothing(&records_of(&quantities), Alpha::new(1.0).unwrap()).unwrap();
            let last = *quantities.last().unwrap();
            prop_assert!((value - f64::from(last)).abs() < EPSILON);
        }

        /// Vanishing weight keeps the estimate at the first quantity
        #[test]
        fn prop_tiny_alpha_yields_first_quantity(quantities in quantities_strategy()) {
            let value = exponential_smoothing(&records_of(&quantities), Alpha::new(1e-12).unwrap()).unwrap();
            let first = f64::from(quantities[0]);
            prop_assert!((value - first).abs() < 1e-6);
        }

        /// The smoothed value never leaves the range of observed quantities
        #[test]
        fn prop_forecast_within_observed_range(
            quantities in quantities_strategy(),
            alpha in 0.01f64..=1.0,
        ) {
            let value = exponential_smoothing(&records_of(&quantities), Alpha::new(alpha).unwrap()).unwrap();
            let min = f64::from(*quantities.iter().min().unwrap());
            let max = f64::from(*quantities.iter().max().unwrap());
            prop_assert!(value >= min - EPSILON && value <= max + EPSILON);
        }

        /// Stockout horizon is null exactly when the forecast is not positive
        #[test]
        fn prop_stockout_null_iff_forecast_not_positive(
            stock in 0i32..10_000,
            forecast in prop_oneof![Just(0.0f64), -100.0f64..0.0, 0.001f64..500.0],
        ) {
            let horizon = estimated_stockout_days(stock, forecast);
            prop_assert_eq!(horizon.is_none(), forecast <= 0.0);
            if let Some(days) = horizon {
                prop_assert!((days * forecast - f64::from(stock)).abs() < 1e-6);
            }
        }

        /// Grouping keeps each batch's rows in the order they were supplied
        #[test]
        fn prop_grouping_preserves_row_order(
            entries in prop::collection::vec((1i32..5, 0u64..30, 1i32..100), 1..60),
        ) {
            let rows: Vec<UsageRow> = entries
                .iter()
                .map(|(batch, offset, qty)| row(*batch, day(*offset), *qty, 100))
                .collect();
            let grouped = group_by_batch(rows);

            for (batch_id, series) in &grouped {
                let expected: Vec<(NaiveDate, i32)> = entries
                    .iter()
                    .filter(|(b, _, _)| b == batch_id)
                    .map(|(_, offset, qty)| (day(*offset), *qty))
                    .collect();
                let actual: Vec<(NaiveDate, i32)> = series
                    .records()
                    .iter()
                    .map(|r| (r.date, r.quantity_used))
                    .collect();
                prop_assert_eq!(actual, expected);
            }
            let total: usize = grouped.values().map(|s| s.records().len()).sum();
            prop_assert_eq!(total, entries.len());
        }

        /// Sorting orders by date and keeps same-day records in storage order
        #[test]
        fn prop_sort_is_stable(offsets in prop::collection::vec(0u64..5, 1..40)) {
            // quantity doubles as the storage position
            let records: Vec<UsageRecord> = offsets
                .iter()
                .enumerate()
                .map(|(position, offset)| record(1, day(*offset), position as i32))
                .collect();
            let sorted = RawSeries::new(1, profile(100), records).unwrap().into_sorted();

            prop_assert_eq!(sorted.records().len(), offsets.len());
            for pair in sorted.records().windows(2) {
                let (a, b) = (&pair[0], &pair[1]);
                prop_assert!(a.date < b.date || (a.date == b.date && a.quantity_used < b.quantity_used));
            }
        }
    }
}
