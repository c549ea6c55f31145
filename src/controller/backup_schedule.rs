//! Reconciliation logic for EtcdBackupSchedule resources
//!
//! Creates a new EtcdBackup every creation period, never while one is in
//! flight, and sleeps until the next slot otherwise.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use kube::api::{ListParams, PostParams};
use kube::runtime::controller::Action;
use kube::{Api, ResourceExt};
use tracing::{info, instrument};

use crate::controller::ensure::{done, requeue, requeue_after};
use crate::controller::{Context, Result};
use crate::crd::{EtcdBackup, EtcdBackupSchedule, CLUSTER_LABEL};

/// Main reconciliation function for EtcdBackupSchedule
#[instrument(skip(schedule, ctx), fields(name = %schedule.name_any(), namespace = schedule.namespace().unwrap_or_default()))]
pub async fn reconcile(schedule: Arc<EtcdBackupSchedule>, ctx: Arc<Context>) -> Result<Action> {
    if schedule.metadata.deletion_timestamp.is_some() {
        return Ok(done());
    }

    let ns = schedule.namespace().unwrap_or_default();
    let backups: Api<EtcdBackup> = Api::namespaced(ctx.client.clone(), &ns);

    let selector = format!("{}={}", CLUSTER_LABEL, schedule.name_any());
    let list = backups
        .list(&ListParams::default().labels(&selector))
        .await?;

    let now = Utc::now();
    match schedule_decision(&list.items, schedule.spec.creation_period, now) {
        ScheduleDecision::WaitForInProgress => Ok(requeue()),
        ScheduleDecision::CreateBackup => {
            let backup = schedule.desired_backup(now.timestamp());
            info!(backup = %backup.name_any(), "creating backup");
            backups.create(&PostParams::default(), &backup).await?;
            Ok(requeue())
        }
        ScheduleDecision::NextRunIn(delay) => {
            info!(seconds = delay.as_secs(), "scheduled next run");
            Ok(requeue_after(delay))
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ScheduleDecision {
    /// A backup is still uploading; check again shortly
    WaitForInProgress,
    /// The creation period has elapsed since the last finished backup
    CreateBackup,
    /// Sleep until the next slot
    NextRunIn(Duration),
}

/// Decide what the schedule should do given the backups that exist for its
/// cluster. A cluster that has never finished a backup gets one immediately.
pub fn schedule_decision(
    backups: &[EtcdBackup],
    creation_period: Duration,
    now: DateTime<Utc>,
) -> ScheduleDecision {
    let mut latest_finished: Option<DateTime<Utc>> = None;

    for backup in backups {
        let finished = backup.status.as_ref().and_then(|s| s.finished_time.as_ref());
        match finished {
            None => return ScheduleDecision::WaitForInProgress,
            Some(time) => {
                if latest_finished.is_none_or(|latest| time.0 > latest) {
                    latest_finished = Some(time.0);
                }
            }
        }
    }

    let Some(latest) = latest_finished else {
        return ScheduleDecision::CreateBackup;
    };

    let next_run = latest + creation_period;
    match (next_run - now).to_std() {
        // to_std fails on negative durations, i.e. the slot has passed
        Err(_) => ScheduleDecision::CreateBackup,
        Ok(delay) => ScheduleDecision::NextRunIn(delay),
    }
}
