//! Weekly report composer

use chrono::{Days, NaiveDate};

use super::diff::diff_snapshots;
use crate::error::{CoreError, CoreResult};
use crate::models::{BatchSnapshotEntry, Snapshot, UsageTotal, WeeklyReport};
use crate::types::DateRange;
use crate::validation::validate_expiry_window_days;

pub const DEFAULT_EXPIRY_WINDOW_DAYS: u32 = 30;

/// Forward-looking window used to flag batches that expire soon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryWindow {
    days: u32,
}

impl ExpiryWindow {
    pub fn days(days: u32) -> CoreResult<Self> {
        validate_expiry_window_days(days)
            .map(|_| ExpiryWindow { days })
            .map_err(|msg| CoreError::invalid(format!("{} (got {})", msg, days)))
    }

    pub fn len_days(self) -> u32 {
        self.days
    }

    /// Inclusive `[today, today + days]`
    pub fn range_from(self, today: NaiveDate) -> DateRange {
        let end = today
            .checked_add_days(Days::new(u64::from(self.days)))
            .unwrap_or(NaiveDate::MAX);
        DateRange::new(today, end)
    }
}

impl Default for ExpiryWindow {
    fn default() -> Self {
        ExpiryWindow {
            days: DEFAULT_EXPIRY_WINDOW_DAYS,
        }
    }
}

/// Two snapshots ordered by capture time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotPair {
    previous: Snapshot,
    current: Snapshot,
}

impl SnapshotPair {
    /// Pair two snapshots; whichever was captured first becomes `previous`
    pub fn new(a: Snapshot, b: Snapshot) -> Self {
        if a.snapshot_date <= b.snapshot_date {
            SnapshotPair {
                previous: a,
                current: b,
            }
        } else {
            SnapshotPair {
                previous: b,
                current: a,
            }
        }
    }

    /// Pick the most recent snapshot of each of the two kinds.
    ///
    /// Fails with `InsufficientData` when either kind has no snapshot.
    pub fn from_kinds(
        snapshots: Vec<Snapshot>,
        opening_kind: &str,
        closing_kind: &str,
    ) -> CoreResult<Self> {
        let mut opening: Option<Snapshot> = None;
        let mut closing: Option<Snapshot> = None;

        for snapshot in snapshots {
            let slot = if snapshot.snapshot_type == opening_kind {
                &mut opening
            } else if snapshot.snapshot_type == closing_kind {
                &mut closing
            } else {
                continue;
            };
            let newer = slot
                .as_ref()
                .map_or(true, |held| snapshot.snapshot_date > held.snapshot_date);
            if newer {
                *slot = Some(snapshot);
            }
        }

        match (opening, closing) {
            (Some(a), Some(b)) => Ok(SnapshotPair::new(a, b)),
            (None, _) => Err(CoreError::insufficient(format!(
                "no '{}' snapshot available",
                opening_kind
            ))),
            (_, None) => Err(CoreError::insufficient(format!(
                "no '{}' snapshot available",
                closing_kind
            ))),
        }
    }

    pub fn previous(&self) -> &Snapshot {
        &self.previous
    }

    pub fn current(&self) -> &Snapshot {
        &self.current
    }

    /// Calendar dates of the two capture times, both ends included
    pub fn period(&self) -> DateRange {
        DateRange::new(
            self.previous.snapshot_date.date_naive(),
            self.current.snapshot_date.date_naive(),
        )
    }
}

/// Entries whose expiry date falls within the window starting at `today`
pub fn expiring_within(
    entries: &[BatchSnapshotEntry],
    window: ExpiryWindow,
    today: NaiveDate,
) -> Vec<BatchSnapshotEntry> {
    let range = window.range_from(today);
    entries
        .iter()
        .filter(|e| range.contains(e.expiry_date))
        .cloned()
        .collect()
}

/// Build the weekly report for a snapshot pair.
///
/// `usage_summary` is expected to cover [`SnapshotPair::period`] and is
/// passed through unchanged.
pub fn compose_weekly_report(
    pair: &SnapshotPair,
    usage_summary: Vec<UsageTotal>,
    window: ExpiryWindow,
    today: NaiveDate,
) -> CoreResult<WeeklyReport> {
    let inventory_changes = diff_snapshots(&pair.previous.entries, &pair.current.entries)?;

    Ok(WeeklyReport {
        period: pair.period(),
        previous_snapshot_type: pair.previous.snapshot_type.clone(),
        current_snapshot_type: pair.current.snapshot_type.clone(),
        inventory_changes,
        usage_summary,
        expiring_soon: expiring_within(&pair.current.entries, window, today),
    })
}
