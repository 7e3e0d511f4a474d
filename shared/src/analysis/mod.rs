//! Forecasting and snapshot-comparison pipeline
//!
//! rows -> [`group_by_batch`] -> [`RawSeries::into_sorted`] ->
//! [`forecast_all`]; snapshots -> [`SnapshotPair`] -> [`compose_weekly_report`].

mod aggregate;
mod diff;
mod report;
mod smoothing;

pub use aggregate::*;
pub use diff::*;
pub use report::*;
pub use smoothing::*;
