use std::time::Duration;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::crd::CLUSTER_LABEL;

/// EtcdBackup is the Schema for the etcdbackups API
///
/// One snapshot lifecycle: taken from the live quorum, uploaded to object
/// storage, garbage-collected once the retention period elapses.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "etcd-operator.example.com",
    version = "v1alpha1",
    kind = "EtcdBackup",
    plural = "etcdbackups",
    namespaced,
    status = "EtcdBackupStatus",
    printcolumn = r#"{"name":"Finished", "type":"date", "jsonPath":".status.finishedTime"}"#,
    printcolumn = r#"{"name":"URL", "type":"string", "jsonPath":".status.url"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct EtcdBackupSpec {
    #[serde(default, with = "humantime_serde")]
    #[schemars(with = "String")]
    pub retention_period: Duration,
}

#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct EtcdBackupStatus {
    /// Unset while the snapshot upload is in flight
    #[serde(default)]
    pub finished_time: Option<Time>,

    /// Object-store location of the uploaded snapshot
    #[serde(default)]
    pub url: Option<String>,
}

impl EtcdBackup {
    /// Cluster this backup belongs to. The label is required and immutable;
    /// without it the stored object could never be garbage-collected.
    pub fn cluster_name(&self) -> Option<&str> {
        self.metadata
            .labels
            .as_ref()
            .and_then(|labels| labels.get(CLUSTER_LABEL))
            .map(String::as_str)
    }

    pub fn is_finished(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|s| s.finished_time.is_some())
    }
}
