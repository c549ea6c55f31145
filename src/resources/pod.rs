//! Member pod generation
//!
//! One pod per member, hostname/subdomain aligned with the headless service
//! so the peer URLs resolve. The pod mounts the member's data volume and its
//! two certificate secrets. When the member is seeded from a backup, an init
//! container restores the snapshot into the data directory first; a member
//! that rejoins an existing quorum after repair skips the restore.

use k8s_openapi::api::core::v1::{
    Container, ContainerPort, HTTPGetAction, PersistentVolumeClaimVolumeSource, Pod, PodSpec,
    Probe, SecretVolumeSource, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::core::ObjectMeta;
use kube::ResourceExt;

use crate::crd::{
    EtcdMember, MemberPhase, CLIENT_PORT, FOREGROUND_DELETION_FINALIZER, PEER_PORT,
};
use crate::resources::common::{
    owner_reference, selector_labels, CLIENT_CERT_DIR, DATA_DIR, PEER_CERT_DIR,
};

const DATA_VOLUME: &str = "data";
const PEER_CERT_VOLUME: &str = "peer-cert";
const CLIENT_CERT_VOLUME: &str = "client-cert";

pub fn generate_pod(member: &EtcdMember) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(member.name_any()),
            namespace: member.namespace(),
            labels: Some(selector_labels(&member.spec.cluster_name)),
            finalizers: Some(vec![FOREGROUND_DELETION_FINALIZER.to_string()]),
            owner_references: owner_reference(member).map(|r| vec![r]),
            ..Default::default()
        },
        spec: Some(PodSpec {
            hostname: Some(member.name_any()),
            subdomain: Some(member.spec.cluster_name.clone()),
            init_containers: restore_init_containers(member),
            containers: vec![etcd_container(member)],
            volumes: Some(vec![
                Volume {
                    name: DATA_VOLUME.to_string(),
                    persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                        claim_name: member.name_any(),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                Volume {
                    name: PEER_CERT_VOLUME.to_string(),
                    secret: Some(SecretVolumeSource {
                        secret_name: Some(member.peer_cert_secret()),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                Volume {
                    name: CLIENT_CERT_VOLUME.to_string(),
                    secret: Some(SecretVolumeSource {
                        secret_name: Some(member.client_cert_secret()),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            ]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn etcd_container(member: &EtcdMember) -> Container {
    Container {
        name: "etcd".to_string(),
        image: Some(member.image()),
        readiness_probe: Some(readiness_probe()),
        ports: Some(vec![
            ContainerPort {
                container_port: CLIENT_PORT,
                ..Default::default()
            },
            ContainerPort {
                container_port: PEER_PORT,
                ..Default::default()
            },
        ]),
        command: Some(vec!["/usr/local/bin/etcd".to_string()]),
        args: Some(etcd_args(member)),
        volume_mounts: Some(vec![
            mount(DATA_VOLUME, DATA_DIR),
            mount(PEER_CERT_VOLUME, PEER_CERT_DIR),
            mount(CLIENT_CERT_VOLUME, CLIENT_CERT_DIR),
        ]),
        ..Default::default()
    }
}

fn etcd_args(member: &EtcdMember) -> Vec<String> {
    vec![
        "--name".to_string(),
        member.name_any(),
        "--initial-advertise-peer-urls".to_string(),
        member.advertise_peer_url(),
        "--listen-peer-urls".to_string(),
        format!("https://0.0.0.0:{PEER_PORT}"),
        "--advertise-client-urls".to_string(),
        member.advertise_client_url(),
        "--listen-client-urls".to_string(),
        format!("https://0.0.0.0:{CLIENT_PORT}"),
        "--initial-cluster".to_string(),
        member.initial_cluster(),
        "--initial-cluster-state".to_string(),
        member.initial_cluster_state().to_string(),
        "--initial-cluster-token".to_string(),
        member.spec.cluster_token.clone(),
        "--data-dir".to_string(),
        DATA_DIR.to_string(),
        "--peer-client-cert-auth".to_string(),
        "--peer-trusted-ca-file".to_string(),
        format!("{PEER_CERT_DIR}/ca.crt"),
        "--peer-cert-file".to_string(),
        format!("{PEER_CERT_DIR}/tls.crt"),
        "--peer-key-file".to_string(),
        format!("{PEER_CERT_DIR}/tls.key"),
        "--cert-file".to_string(),
        format!("{CLIENT_CERT_DIR}/tls.crt"),
        "--key-file".to_string(),
        format!("{CLIENT_CERT_DIR}/tls.key"),
    ]
}

/// Snapshot-restore init container, present only when the member is seeded
/// from a backup and is not rejoining an existing quorum.
fn restore_init_containers(member: &EtcdMember) -> Option<Vec<Container>> {
    member.spec.backup.as_deref().filter(|b| !b.is_empty())?;
    if member.phase() == Some(MemberPhase::Recreating) {
        return None;
    }

    Some(vec![Container {
        name: "etcd-restore".to_string(),
        image: Some(member.image()),
        command: Some(vec!["/usr/local/bin/etcdctl".to_string()]),
        args: Some(vec![
            "snapshot".to_string(),
            "restore".to_string(),
            "snapshot.db".to_string(),
            "--name".to_string(),
            member.name_any(),
            "--initial-cluster".to_string(),
            member.initial_cluster(),
            "--initial-cluster-token".to_string(),
            member.spec.cluster_token.clone(),
            "--initial-advertise-peer-urls".to_string(),
            member.advertise_peer_url(),
            "--data-dir".to_string(),
            DATA_DIR.to_string(),
        ]),
        volume_mounts: Some(vec![mount(DATA_VOLUME, DATA_DIR)]),
        ..Default::default()
    }])
}

fn readiness_probe() -> Probe {
    Probe {
        http_get: Some(HTTPGetAction {
            path: Some("/health".to_string()),
            port: IntOrString::Int(CLIENT_PORT),
            scheme: Some("HTTPS".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn mount(name: &str, path: &str) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: path.to_string(),
        ..Default::default()
    }
}
