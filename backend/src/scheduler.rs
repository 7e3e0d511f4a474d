//! Weekly snapshot scheduler
//!
//! Captures the opening and closing snapshots at fixed UTC checkpoints.
//! Capture itself is a plain [`SnapshotService`] call.

use std::str::FromStr;

use chrono::{DateTime, Datelike, Days, NaiveTime, TimeZone, Utc, Weekday};
use sqlx::PgPool;
use tokio::task::JoinHandle;

use crate::config::{CheckpointConfig, ReportConfig, SnapshotScheduleConfig};
use crate::error::{AppError, AppResult};
use crate::services::SnapshotService;

/// A weekly capture time for one snapshot type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub snapshot_type: String,
    pub weekday: Weekday,
    pub time: NaiveTime,
}

impl Checkpoint {
    pub fn from_config(snapshot_type: &str, config: &CheckpointConfig) -> AppResult<Self> {
        let weekday = Weekday::from_str(&config.weekday).map_err(|_| {
            AppError::Configuration(format!("invalid checkpoint weekday '{}'", config.weekday))
        })?;
        let time = NaiveTime::from_hms_opt(config.hour, config.minute, 0).ok_or_else(|| {
            AppError::Configuration(format!(
                "invalid checkpoint time {:02}:{:02}",
                config.hour, config.minute
            ))
        })?;

        Ok(Self {
            snapshot_type: snapshot_type.to_string(),
            weekday,
            time,
        })
    }

    /// First occurrence strictly after `now`
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive();
        let days_ahead = (7 + self.weekday.num_days_from_monday()
            - today.weekday().num_days_from_monday())
            % 7;
        let date = today + Days::new(u64::from(days_ahead));
        let candidate = Utc.from_utc_datetime(&date.and_time(self.time));

        if candidate > now {
            candidate
        } else {
            candidate + Days::new(7)
        }
    }
}

/// The checkpoint that comes up first after `now`
pub fn next_due(checkpoints: &[Checkpoint], now: DateTime<Utc>) -> Option<(&Checkpoint, DateTime<Utc>)> {
    checkpoints
        .iter()
        .map(|c| (c, c.next_after(now)))
        .min_by_key(|(_, at)| *at)
}

/// Background task capturing snapshots at their checkpoints
pub struct SnapshotScheduler {
    snapshots: SnapshotService,
    checkpoints: Vec<Checkpoint>,
}

impl SnapshotScheduler {
    pub fn new(
        db: PgPool,
        schedule: &SnapshotScheduleConfig,
        report: &ReportConfig,
    ) -> AppResult<Self> {
        Ok(Self {
            snapshots: SnapshotService::new(db),
            checkpoints: vec![
                Checkpoint::from_config(&report.opening_snapshot_type, &schedule.opening)?,
                Checkpoint::from_config(&report.closing_snapshot_type, &schedule.closing)?,
            ],
        })
    }

    /// Run forever. Failed captures are logged and the next checkpoint is
    /// awaited as usual.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let now = Utc::now();
                let Some((checkpoint, at)) = next_due(&self.checkpoints, now) else {
                    tracing::warn!("no snapshot checkpoints configured, scheduler stopping");
                    return;
                };
                let snapshot_type = checkpoint.snapshot_type.clone();

                tracing::info!(snapshot_type = %snapshot_type, due = %at, "next snapshot scheduled");
                let wait = (at - now).to_std().unwrap_or_default();
                tokio::time::sleep(wait).await;

                match self.snapshots.capture(&snapshot_type).await {
                    Ok(snapshot) => tracing::info!(
                        snapshot_id = snapshot.snapshot_id,
                        snapshot_type = %snapshot_type,
                        batches = snapshot.entries.len(),
                        "scheduled snapshot captured"
                    ),
                    Err(e) => tracing::error!(
                        snapshot_type = %snapshot_type,
                        error = %e,
                        "scheduled snapshot failed"
                    ),
                }
            }
        })
    }
}
