//! Backup schedule decision tests

use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};

use etcd_operator::controller::backup_schedule::{schedule_decision, ScheduleDecision};

use crate::common::*;

const HOUR: Duration = Duration::from_secs(3600);

#[test]
fn test_cluster_without_backups_gets_one_immediately() {
    assert_eq!(
        schedule_decision(&[], HOUR, Utc::now()),
        ScheduleDecision::CreateBackup
    );
}

#[test]
fn test_no_new_backup_while_one_uploads() {
    let now = Utc::now();
    let backups = vec![
        finished_backup("c", now - ChronoDuration::hours(3)),
        in_flight_backup("c", now - ChronoDuration::minutes(1)),
    ];

    assert_eq!(
        schedule_decision(&backups, HOUR, now),
        ScheduleDecision::WaitForInProgress
    );
}

#[test]
fn test_backup_created_once_period_elapses() {
    let now = Utc::now();
    let backups = vec![finished_backup("c", now - ChronoDuration::minutes(61))];

    assert_eq!(
        schedule_decision(&backups, HOUR, now),
        ScheduleDecision::CreateBackup
    );
}

#[test]
fn test_schedule_sleeps_until_next_slot() {
    let now = Utc::now();
    let backups = vec![finished_backup("c", now - ChronoDuration::minutes(15))];

    match schedule_decision(&backups, HOUR, now) {
        ScheduleDecision::NextRunIn(delay) => {
            assert!(delay > Duration::from_secs(44 * 60));
            assert!(delay <= Duration::from_secs(45 * 60));
        }
        other => panic!("expected NextRunIn, got {other:?}"),
    }
}

#[test]
fn test_only_latest_finished_backup_counts() {
    let now = Utc::now();
    let backups = vec![
        finished_backup("c", now - ChronoDuration::hours(5)),
        finished_backup("c", now - ChronoDuration::hours(4)),
        finished_backup("c", now - ChronoDuration::minutes(30)),
    ];

    assert!(matches!(
        schedule_decision(&backups, HOUR, now),
        ScheduleDecision::NextRunIn(_)
    ));
}
