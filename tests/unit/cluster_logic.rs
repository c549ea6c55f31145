//! Phase aggregation and repair selection

use chrono::{Duration as ChronoDuration, Utc};

use etcd_operator::controller::cluster::{
    aggregate_phase, count_members, select_repair_candidate, RepairDecision,
};
use etcd_operator::crd::{ClusterPhase, MemberPhase};

use crate::common::*;

#[test]
fn test_all_running_aggregates_to_running() {
    let members = vec![
        create_test_member("c", 0),
        create_test_member("c", 1),
        create_test_member("c", 2),
    ];

    let counts = count_members(&members);
    assert_eq!(counts.failed, 0);
    assert_eq!(counts.creating, 0);
    assert_eq!(aggregate_phase(&counts, 3), ClusterPhase::Running);
}

#[test]
fn test_creating_members_keep_cluster_creating() {
    let members = vec![
        create_test_member("c", 0),
        EtcdMemberBuilder::new("c", 1)
            .with_phase(MemberPhase::Creating)
            .build(),
        // A member the reconciler has not seen yet counts as creating
        EtcdMemberBuilder::new("c", 2).build(),
    ];

    let counts = count_members(&members);
    assert_eq!(counts.creating, 2);
    assert_eq!(aggregate_phase(&counts, 3), ClusterPhase::Creating);
}

#[test]
fn test_minority_failure_is_minor() {
    let members = vec![
        create_test_member("c", 0),
        create_test_member("c", 1),
        EtcdMemberBuilder::new("c", 2).failed_at(Utc::now()).build(),
    ];

    let counts = count_members(&members);
    assert_eq!(counts.failed, 1);
    assert_eq!(aggregate_phase(&counts, 3), ClusterPhase::MinorFailure);
}

#[test]
fn test_majority_failure_is_failed() {
    let members = vec![
        create_test_member("c", 0),
        EtcdMemberBuilder::new("c", 1).failed_at(Utc::now()).build(),
        EtcdMemberBuilder::new("c", 2).failed_at(Utc::now()).build(),
    ];

    assert_eq!(aggregate_phase(&count_members(&members), 3), ClusterPhase::Failed);
}

#[test]
fn test_failed_plus_creating_can_lose_quorum() {
    // One failed plus one recreating out of three leaves a bare majority of
    // one; 2*(1+1) >= 3 means the cluster cannot be called minor-failed.
    let members = vec![
        create_test_member("c", 0),
        EtcdMemberBuilder::new("c", 1)
            .with_phase(MemberPhase::Recreating)
            .build(),
        EtcdMemberBuilder::new("c", 2).failed_at(Utc::now()).build(),
    ];

    assert_eq!(aggregate_phase(&count_members(&members), 3), ClusterPhase::Failed);
}

#[test]
fn test_certificate_flags_fold_into_counts() {
    let members = vec![
        create_test_member("c", 0),
        EtcdMemberBuilder::new("c", 1)
            .with_phase(MemberPhase::Running)
            .with_certificate_expires()
            .build(),
        create_test_member("c", 2),
    ];
    assert!(count_members(&members).certificate_expires);

    // A pending rotation request also counts, even if status says fresh
    let members = vec![
        create_test_member("c", 0),
        EtcdMemberBuilder::new("c", 1)
            .with_phase(MemberPhase::Running)
            .with_certificate_update()
            .build(),
        create_test_member("c", 2),
    ];
    assert!(count_members(&members).certificate_expires);
}

#[test]
fn test_repair_waits_for_grace_period() {
    let now = Utc::now();
    let members = vec![
        create_test_member("c", 0),
        create_test_member("c", 1),
        EtcdMemberBuilder::new("c", 2)
            .failed_at(now - ChronoDuration::minutes(2))
            .build(),
    ];

    assert_eq!(
        select_repair_candidate(&members, 3, now),
        RepairDecision::Requeue
    );
}

#[test]
fn test_repair_picks_member_after_grace_period() {
    let now = Utc::now();
    let members = vec![
        create_test_member("c", 0),
        create_test_member("c", 1),
        EtcdMemberBuilder::new("c", 2)
            .failed_at(now - ChronoDuration::minutes(10))
            .build(),
    ];

    assert_eq!(
        select_repair_candidate(&members, 3, now),
        RepairDecision::Repair(2)
    );
}

#[test]
fn test_repair_picks_earliest_failure() {
    let now = Utc::now();
    let members = vec![
        EtcdMemberBuilder::new("c", 0)
            .with_size(5)
            .failed_at(now - ChronoDuration::minutes(10))
            .build(),
        EtcdMemberBuilder::new("c", 1)
            .with_size(5)
            .failed_at(now - ChronoDuration::minutes(30))
            .build(),
        create_test_member("c", 2),
        create_test_member("c", 3),
        create_test_member("c", 4),
    ];

    assert_eq!(
        select_repair_candidate(&members, 5, now),
        RepairDecision::Repair(1)
    );
}

#[test]
fn test_repair_never_acts_without_quorum() {
    let now = Utc::now();
    let members = vec![
        create_test_member("c", 0),
        EtcdMemberBuilder::new("c", 1)
            .failed_at(now - ChronoDuration::minutes(10))
            .build(),
        EtcdMemberBuilder::new("c", 2)
            .failed_at(now - ChronoDuration::minutes(10))
            .build(),
    ];

    assert_eq!(
        select_repair_candidate(&members, 3, now),
        RepairDecision::Settled
    );
}

#[test]
fn test_repair_in_flight_blocks_another() {
    let now = Utc::now();
    let members = vec![
        create_test_member("c", 0),
        EtcdMemberBuilder::new("c", 1).broken().build(),
        EtcdMemberBuilder::new("c", 2)
            .failed_at(now - ChronoDuration::minutes(10))
            .build(),
    ];

    assert_eq!(
        select_repair_candidate(&members, 3, now),
        RepairDecision::Requeue
    );
}

#[test]
fn test_repair_waits_for_creating_members() {
    let now = Utc::now();
    let members = vec![
        create_test_member("c", 0),
        EtcdMemberBuilder::new("c", 1)
            .with_phase(MemberPhase::Recreating)
            .build(),
        EtcdMemberBuilder::new("c", 2)
            .failed_at(now - ChronoDuration::minutes(10))
            .build(),
    ];

    assert_eq!(
        select_repair_candidate(&members, 3, now),
        RepairDecision::Requeue
    );
}
