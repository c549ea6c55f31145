//! Shared helpers for resource generation

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::Resource;

use crate::crd::CLUSTER_LABEL;

/// Field manager name used for all operator writes
pub const FIELD_MANAGER: &str = "etcd-operator";

/// Mount path of the etcd data volume
pub const DATA_DIR: &str = "/var/lib/etcd";

/// Mount path of the peer certificate secret
pub const PEER_CERT_DIR: &str = "/var/lib/ssl/peer";

/// Mount path of the client certificate secret
pub const CLIENT_CERT_DIR: &str = "/var/lib/ssl/client";

/// Controller owner reference pointing at `owner`
///
/// Children carry this so the platform cascades deletion and the watch
/// machinery maps child events back to the owning resource. Returns None
/// when the owner has not been persisted yet (no UID).
pub fn owner_reference<K>(owner: &K) -> Option<OwnerReference>
where
    K: Resource<DynamicType = ()>,
{
    owner.controller_owner_ref(&())
}

/// Labels stamped on every resource belonging to a cluster
pub fn cluster_labels(cluster_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            "app.kubernetes.io/name".to_string(),
            cluster_name.to_string(),
        ),
        (
            "app.kubernetes.io/component".to_string(),
            "etcd".to_string(),
        ),
        (
            "app.kubernetes.io/managed-by".to_string(),
            FIELD_MANAGER.to_string(),
        ),
        (CLUSTER_LABEL.to_string(), cluster_name.to_string()),
    ])
}

/// Selector labels shared by the headless service and the member pods
pub fn selector_labels(cluster_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(
        "app.kubernetes.io/name".to_string(),
        cluster_name.to_string(),
    )])
}
