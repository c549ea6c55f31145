//! Headless service for peer discovery
//!
//! Every member pod gets a stable DNS name
//! `<member>.<cluster>.<ns>.svc.cluster.local` through this service.
//! Not-ready addresses are published so members can discover each other
//! while the quorum is still bootstrapping.

use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use kube::core::ObjectMeta;
use kube::ResourceExt;

use crate::crd::{EtcdCluster, CLIENT_PORT, FOREGROUND_DELETION_FINALIZER, PEER_PORT};
use crate::resources::common::{cluster_labels, owner_reference, selector_labels};

pub fn generate_headless_service(cluster: &EtcdCluster) -> Service {
    let name = cluster.name_any();

    Service {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            namespace: cluster.namespace(),
            labels: Some(cluster_labels(&name)),
            finalizers: Some(vec![FOREGROUND_DELETION_FINALIZER.to_string()]),
            owner_references: owner_reference(cluster).map(|r| vec![r]),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            selector: Some(selector_labels(&name)),
            cluster_ip: Some("None".to_string()),
            publish_not_ready_addresses: Some(true),
            ports: Some(vec![
                ServicePort {
                    name: Some("etcd-server-ssl".to_string()),
                    port: PEER_PORT,
                    ..Default::default()
                },
                ServicePort {
                    name: Some("etcd-client-ssl".to_string()),
                    port: CLIENT_PORT,
                    ..Default::default()
                },
            ]),
            ..Default::default()
        }),
        ..Default::default()
    }
}
