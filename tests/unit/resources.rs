//! Resource generator tests

use etcd_operator::crd::{member_fqdn, CLUSTER_LABEL};
use etcd_operator::resources::certificate::{
    generate_ca_certificate, generate_ca_issuer, generate_member_certificate,
};
use etcd_operator::resources::pod::generate_pod;
use etcd_operator::resources::pvc::generate_pvc;
use etcd_operator::resources::service::generate_headless_service;

use crate::common::*;

#[test]
fn test_member_names_and_endpoints() {
    let cluster = create_test_cluster("c", 3);

    assert_eq!(cluster.member_names(), vec!["c-0", "c-1", "c-2"]);
    assert_eq!(
        cluster.endpoints(),
        vec![
            "https://c-0.c.test-ns.svc.cluster.local:2379",
            "https://c-1.c.test-ns.svc.cluster.local:2379",
            "https://c-2.c.test-ns.svc.cluster.local:2379",
        ]
    );
}

#[test]
fn test_every_member_carries_the_cluster_token() {
    let cluster = create_test_cluster("c", 5);

    for num in 0..5 {
        let member = cluster.desired_member(num);
        assert_eq!(member.spec.cluster_token, TEST_UID);
        assert_eq!(member.spec.members.len(), 5);
    }
}

#[test]
fn test_desired_children_are_owned() {
    let cluster = create_test_cluster("c", 3);

    let member = cluster.desired_member(0);
    let owners = member.metadata.owner_references.unwrap();
    assert_eq!(owners.len(), 1);
    assert_eq!(owners[0].kind, "EtcdCluster");
    assert_eq!(owners[0].name, "c");
    assert_eq!(owners[0].controller, Some(true));

    let schedule = cluster.desired_backup_schedule();
    assert!(schedule.metadata.owner_references.is_some());
    assert_eq!(
        schedule.spec.creation_period,
        cluster.spec.backup_creation_period
    );
}

#[test]
fn test_headless_service_matches_member_fqdns() {
    let cluster = create_test_cluster("c", 3);
    let service = generate_headless_service(&cluster);

    assert_eq!(service.metadata.name.as_deref(), Some("c"));
    // The FQDN scheme assumes the service shares the cluster's name
    assert_eq!(
        member_fqdn("c-0", TEST_NAMESPACE, "c"),
        "c-0.c.test-ns.svc.cluster.local"
    );

    let spec = service.spec.unwrap();
    assert_eq!(spec.cluster_ip.as_deref(), Some("None"));
    assert_eq!(spec.publish_not_ready_addresses, Some(true));
}

#[test]
fn test_certificate_chain_is_rooted_in_the_cluster_issuer() {
    let cluster = create_test_cluster("c", 3);

    let ca = generate_ca_certificate(&cluster, "operator-selfsigned");
    assert_eq!(ca.spec.issuer_ref.name, "operator-selfsigned");
    assert_eq!(ca.spec.issuer_ref.kind, "ClusterIssuer");
    assert_eq!(ca.spec.secret_name, "c-ca");

    let issuer = generate_ca_issuer(&cluster);
    assert_eq!(issuer.spec.ca.unwrap().secret_name, "c-ca");

    // Member leaves chain to the cluster's own issuer
    let member = create_test_member("c", 0);
    for suffix in ["peer", "client"] {
        let cert = generate_member_certificate(&member, suffix);
        assert_eq!(cert.spec.issuer_ref.name, "c");
        assert_eq!(cert.spec.issuer_ref.kind, "Issuer");
        assert_eq!(cert.spec.secret_name, format!("c-0-{suffix}"));
    }
}

#[test]
fn test_certificate_secrets_are_labeled_for_cleanup() {
    let cluster = create_test_cluster("c", 3);
    let ca = generate_ca_certificate(&cluster, "issuer");
    assert_eq!(
        ca.spec.secret_template.unwrap().labels.get(CLUSTER_LABEL),
        Some(&"c".to_string())
    );

    let member = create_test_member("c", 1);
    let cert = generate_member_certificate(&member, "peer");
    assert_eq!(
        cert.spec.secret_template.unwrap().labels.get(CLUSTER_LABEL),
        Some(&"c".to_string())
    );
}

#[test]
fn test_pod_mounts_volume_and_both_cert_secrets() {
    let member = create_test_member("c", 0);
    let pod = generate_pod(&member);
    let spec = pod.spec.unwrap();

    let volumes = spec.volumes.unwrap();
    assert_eq!(volumes.len(), 3);
    assert_eq!(
        volumes[0].persistent_volume_claim.as_ref().unwrap().claim_name,
        "c-0"
    );
    assert_eq!(
        volumes[1].secret.as_ref().unwrap().secret_name.as_deref(),
        Some("c-0-peer")
    );
    assert_eq!(
        volumes[2].secret.as_ref().unwrap().secret_name.as_deref(),
        Some("c-0-client")
    );

    let container = &spec.containers[0];
    assert_eq!(container.image.as_deref(), Some("quay.io/coreos/etcd:v3.5.6"));
    let args = container.args.as_ref().unwrap().join(" ");
    assert!(args.contains("--initial-cluster-token test-uid-12345"));
}

#[test]
fn test_pvc_is_named_after_the_member() {
    let member = create_test_member("c", 2);
    let pvc = generate_pvc(&member);

    assert_eq!(pvc.metadata.name.as_deref(), Some("c-2"));
    assert!(pvc.metadata.owner_references.is_some());
}
