use std::collections::BTreeMap;
use std::time::Duration;

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::crd::{EtcdBackup, EtcdBackupSpec, CLUSTER_LABEL};

/// EtcdBackupSchedule is the Schema for the etcdbackupschedules API
///
/// One schedule per cluster, named after it. The schedule reconciler creates
/// an EtcdBackup every creation period, never while one is in flight.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "etcd-operator.example.com",
    version = "v1alpha1",
    kind = "EtcdBackupSchedule",
    plural = "etcdbackupschedules",
    namespaced,
    status = "EtcdBackupScheduleStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct EtcdBackupScheduleSpec {
    #[serde(default, with = "humantime_serde")]
    #[schemars(with = "String")]
    pub creation_period: Duration,

    #[serde(default, with = "humantime_serde")]
    #[schemars(with = "String")]
    pub retention_period: Duration,
}

#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, Default)]
pub struct EtcdBackupScheduleStatus {}

impl EtcdBackupSchedule {
    /// A new backup for this schedule's cluster, named with the creation
    /// timestamp so names sort chronologically and never collide.
    pub fn desired_backup(&self, unix_seconds: i64) -> EtcdBackup {
        let mut backup = EtcdBackup::new(
            &format!("{}-{}", self.name_any(), unix_seconds),
            EtcdBackupSpec {
                retention_period: self.spec.retention_period,
            },
        );
        backup.metadata.namespace = self.namespace();
        backup.metadata.labels = Some(BTreeMap::from([(
            CLUSTER_LABEL.to_string(),
            self.name_any(),
        )]));
        backup
    }
}
