// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Property-based tests for the quorum-safety and scheduling invariants
//!
//! These verify that:
//! 1. Member naming and token derivation hold for any cluster shape
//! 2. Admission is deterministic and rejects what it must
//! 3. Repair selection never risks quorum and picks at most one victim
//! 4. The backup scheduler never creates while an upload is in flight

use chrono::{Duration as ChronoDuration, Utc};
use proptest::prelude::*;
use std::collections::HashSet;
use std::time::Duration;

use etcd_operator::controller::backup_schedule::{schedule_decision, ScheduleDecision};
use etcd_operator::controller::cluster::{
    aggregate_phase, count_members, select_repair_candidate, RepairDecision,
};
use etcd_operator::crd::{ClusterPhase, EtcdMember, MemberPhase};
use etcd_operator::webhooks::{validate_create, validate_update};

#[path = "../common/mod.rs"]
mod common;
use common::*;

/// Valid (odd) cluster sizes
fn odd_size() -> impl Strategy<Value = i32> {
    (0..5i32).prop_map(|n| 2 * n + 1)
}

/// DNS-label-ish cluster names
fn cluster_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,10}[a-z0-9]"
}

/// One member's observed condition
#[derive(Debug, Clone)]
enum MemberState {
    Running,
    Creating,
    /// Failed this many minutes ago
    Failed(i64),
    Broken,
}

fn member_state() -> impl Strategy<Value = MemberState> {
    prop_oneof![
        3 => Just(MemberState::Running),
        1 => Just(MemberState::Creating),
        2 => (0i64..120).prop_map(MemberState::Failed),
        1 => Just(MemberState::Broken),
    ]
}

fn build_members(cluster: &str, states: &[MemberState]) -> Vec<EtcdMember> {
    let now = Utc::now();
    states
        .iter()
        .enumerate()
        .map(|(num, state)| {
            let builder = EtcdMemberBuilder::new(cluster, num as i32).with_size(states.len() as i32);
            match state {
                MemberState::Running => builder.with_phase(MemberPhase::Running),
                MemberState::Creating => builder.with_phase(MemberPhase::Creating),
                MemberState::Failed(minutes) => {
                    builder.failed_at(now - ChronoDuration::minutes(*minutes))
                }
                MemberState::Broken => builder.with_phase(MemberPhase::Running).broken(),
            }
            .build()
        })
        .collect()
}

proptest! {
    #[test]
    fn prop_member_names_are_distinct_and_sequential(
        name in cluster_name(),
        size in odd_size(),
    ) {
        let cluster = EtcdClusterBuilder::new(&name).with_size(size).build();

        let names = cluster.member_names();
        prop_assert_eq!(names.len(), size as usize);

        let distinct: HashSet<_> = names.iter().collect();
        prop_assert_eq!(distinct.len(), names.len());

        for (num, member_name) in names.iter().enumerate() {
            prop_assert_eq!(member_name, &format!("{}-{}", name, num));
        }
    }

    #[test]
    fn prop_every_member_shares_the_cluster_token(
        name in cluster_name(),
        size in odd_size(),
    ) {
        let cluster = EtcdClusterBuilder::new(&name).with_size(size).build();

        for num in 0..size {
            let member = cluster.desired_member(num);
            prop_assert_eq!(&member.spec.cluster_token, TEST_UID);
            prop_assert_eq!(member.spec.members.len(), size as usize);
        }
    }

    #[test]
    fn prop_even_sizes_never_admitted(size in (0..50i32).prop_map(|n| 2 * n)) {
        let cluster = EtcdClusterBuilder::new("c").with_size(size).build();
        prop_assert!(!validate_create(&cluster).allowed);
    }

    #[test]
    fn prop_odd_sizes_always_admitted(size in (0..50i32).prop_map(|n| 2 * n + 1)) {
        let cluster = EtcdClusterBuilder::new("c").with_size(size).build();
        prop_assert!(validate_create(&cluster).allowed);
    }

    #[test]
    fn prop_size_changes_never_admitted(old_size in odd_size(), new_size in odd_size()) {
        prop_assume!(old_size != new_size);

        let old = EtcdClusterBuilder::new("c").with_size(old_size).build();
        let new = EtcdClusterBuilder::new("c").with_size(new_size).build();

        prop_assert!(!validate_update(&new, &old).allowed);
    }

    #[test]
    fn prop_validation_is_deterministic(size in 0..50i32) {
        let cluster = EtcdClusterBuilder::new("c").with_size(size).build();
        let first = validate_create(&cluster).allowed;
        let second = validate_create(&cluster).allowed;
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_repair_never_risks_quorum(
        states in prop::collection::vec(member_state(), 1..=9),
    ) {
        let size = states.len() as i32;
        let members = build_members("c", &states);

        if let RepairDecision::Repair(victim) = select_repair_candidate(&members, size, Utc::now()) {
            let failed = members
                .iter()
                .filter(|m| m.phase() == Some(MemberPhase::Failed))
                .count();

            // Quorum must survive losing the victim
            prop_assert!(failed * 2 < size as usize);

            // The victim is a failed member past the grace period
            prop_assert_eq!(members[victim].phase(), Some(MemberPhase::Failed));
            let failed_time = members[victim]
                .status
                .as_ref()
                .and_then(|s| s.failed_time.as_ref())
                .unwrap();
            prop_assert!(Utc::now() - failed_time.0 >= ChronoDuration::minutes(5));
        }
    }

    #[test]
    fn prop_repair_waits_while_any_member_is_unsettled(
        states in prop::collection::vec(member_state(), 1..=9),
    ) {
        let size = states.len() as i32;
        let members = build_members("c", &states);
        let decision = select_repair_candidate(&members, size, Utc::now());

        let unsettled = members.iter().any(|m| m.is_creating() || m.spec.broken);
        if unsettled {
            prop_assert_eq!(decision, RepairDecision::Requeue);
        }
    }

    #[test]
    fn prop_minor_failure_implies_quorum_intact(
        states in prop::collection::vec(member_state(), 1..=9),
    ) {
        let size = states.len() as i32;
        let members = build_members("c", &states);
        let counts = count_members(&members);

        match aggregate_phase(&counts, size) {
            ClusterPhase::MinorFailure => {
                prop_assert!(counts.failed >= 1);
                prop_assert!(2 * (counts.failed + counts.creating) < size as usize);
            }
            ClusterPhase::Running => {
                prop_assert_eq!(counts.failed, 0);
                prop_assert_eq!(counts.creating, 0);
            }
            ClusterPhase::Creating => {
                prop_assert_eq!(counts.failed, 0);
                prop_assert!(counts.creating > 0);
            }
            _ => {}
        }
    }

    #[test]
    fn prop_scheduler_never_doubles_up(
        finished_minutes in prop::collection::vec(5i64..240, 0..6),
        in_flight in prop::bool::ANY,
        period_minutes in 1u64..180,
    ) {
        let now = Utc::now();
        let mut backups: Vec<_> = finished_minutes
            .iter()
            .map(|minutes| finished_backup("c", now - ChronoDuration::minutes(*minutes)))
            .collect();
        if in_flight {
            backups.push(in_flight_backup("c", now));
        }

        let decision = schedule_decision(&backups, Duration::from_secs(period_minutes * 60), now);

        if in_flight {
            prop_assert_eq!(decision, ScheduleDecision::WaitForInProgress);
        } else {
            prop_assert!(decision != ScheduleDecision::WaitForInProgress);
        }
    }
}
