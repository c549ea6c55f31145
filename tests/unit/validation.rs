//! Admission policy tests

use etcd_operator::crd::ClusterPhase;
use etcd_operator::webhooks::{validate_create, validate_update};

use crate::common::*;

#[test]
fn test_odd_sizes_accepted() {
    for size in [1, 3, 5, 7] {
        let cluster = create_test_cluster("c", size);
        assert!(validate_create(&cluster).allowed, "size {size} rejected");
    }
}

#[test]
fn test_even_sizes_rejected() {
    for size in [0, 2, 4, 6] {
        let cluster = create_test_cluster("c", size);
        let result = validate_create(&cluster);
        assert!(!result.allowed, "size {size} accepted");
        assert!(result.message.unwrap().contains("should be odd"));
    }
}

#[test]
fn test_size_change_rejected_with_message() {
    let old = create_test_cluster("c", 3);
    let new = create_test_cluster("c", 5);

    let result = validate_update(&new, &old);
    assert!(!result.allowed);
    assert!(result.message.unwrap().contains("changing cluster size"));
}

#[test]
fn test_backup_source_change_rejected() {
    let old = create_test_cluster("c", 3);
    let new = EtcdClusterBuilder::new("c").with_backup("c-1700000000").build();

    assert!(!validate_update(&new, &old).allowed);
}

#[test]
fn test_version_change_rejected_only_while_updating() {
    let old = EtcdClusterBuilder::new("c")
        .with_status(ClusterPhase::Updating, "3.5.6")
        .build();
    let new = EtcdClusterBuilder::new("c").with_version("3.5.7").build();
    assert!(!validate_update(&new, &old).allowed);

    let settled = EtcdClusterBuilder::new("c")
        .with_status(ClusterPhase::Running, "3.5.6")
        .build();
    assert!(validate_update(&new, &settled).allowed);
}

#[test]
fn test_noop_update_allowed_while_updating() {
    let old = EtcdClusterBuilder::new("c")
        .with_status(ClusterPhase::Updating, "3.5.6")
        .build();
    let new = create_test_cluster("c", 3);

    assert!(validate_update(&new, &old).allowed);
}
