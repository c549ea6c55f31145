use std::time::Duration;

use kube::{CustomResource, Resource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::crd::member::client_url;
use crate::crd::{
    EtcdBackupSchedule, EtcdBackupScheduleSpec, EtcdMember, EtcdMemberSpec,
    FOREGROUND_DELETION_FINALIZER,
};

/// EtcdCluster is the Schema for the etcdclusters API
///
/// A cluster declares the desired shape of one replicated etcd deployment:
/// the engine version, the (immutable, odd) member count, an optional backup
/// to seed the initial data from, and the automated backup policy.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "etcd-operator.example.com",
    version = "v1alpha1",
    kind = "EtcdCluster",
    plural = "etcdclusters",
    shortname = "ec",
    namespaced,
    status = "EtcdClusterStatus",
    printcolumn = r#"{"name":"Status", "type":"string", "jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Version", "type":"string", "jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Size", "type":"integer", "jsonPath":".spec.size"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct EtcdClusterSpec {
    /// etcd version, used as the image tag (e.g. "3.5.6")
    #[serde(default)]
    pub version: String,

    /// Number of quorum members. Must be odd; immutable after creation.
    #[serde(default = "default_size")]
    pub size: i32,

    /// Name of a backup to restore the initial cluster data from.
    /// Immutable after creation; empty for a fresh cluster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup: Option<String>,

    /// How often the backup schedule creates a new snapshot
    #[serde(default, with = "humantime_serde")]
    #[schemars(with = "String")]
    pub backup_creation_period: Duration,

    /// How long each snapshot is retained before garbage collection
    #[serde(default, with = "humantime_serde")]
    #[schemars(with = "String")]
    pub backup_retention_period: Duration,
}

fn default_size() -> i32 {
    3
}

/// Observed state of an etcd cluster
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct EtcdClusterStatus {
    /// Current phase of the cluster lifecycle
    #[serde(default)]
    pub phase: Option<ClusterPhase>,

    /// Version the cluster has converged to
    #[serde(default)]
    pub version: String,

    /// True when any member serves a certificate older than its pod
    #[serde(default)]
    pub certificate_expires: bool,
}

/// Cluster lifecycle phase
#[derive(Serialize, Deserialize, Clone, Copy, Debug, JsonSchema, PartialEq, Eq)]
pub enum ClusterPhase {
    /// Members are still being brought up for the first time
    Creating,
    /// All members ready
    Running,
    /// A rolling version or certificate update is in progress
    Updating,
    /// A strict minority of members is unhealthy; quorum intact
    MinorFailure,
    /// Quorum lost
    Failed,
}

impl std::fmt::Display for ClusterPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClusterPhase::Creating => write!(f, "Creating"),
            ClusterPhase::Running => write!(f, "Running"),
            ClusterPhase::Updating => write!(f, "Updating"),
            ClusterPhase::MinorFailure => write!(f, "MinorFailure"),
            ClusterPhase::Failed => write!(f, "Failed"),
        }
    }
}

impl EtcdCluster {
    /// Current phase, if the status has been initialised
    pub fn phase(&self) -> Option<ClusterPhase> {
        self.status.as_ref().and_then(|s| s.phase)
    }

    /// Name of the i-th member
    pub fn member_name(&self, num: i32) -> String {
        format!("{}-{}", self.name_any(), num)
    }

    /// Ordered names of all members
    pub fn member_names(&self) -> Vec<String> {
        (0..self.spec.size).map(|n| self.member_name(n)).collect()
    }

    /// Client endpoints of all members
    pub fn endpoints(&self) -> Vec<String> {
        let ns = self.namespace().unwrap_or_default();
        let service = self.name_any();
        self.member_names()
            .iter()
            .map(|name| client_url(name, &ns, &service))
            .collect()
    }

    /// Common name of the cluster CA certificate
    pub fn common_name(&self) -> String {
        format!(
            "{}.{}.svc.cluster.local",
            self.name_any(),
            self.namespace().unwrap_or_default()
        )
    }

    /// Name of the secret holding the cluster CA key pair
    pub fn ca_secret_name(&self) -> String {
        format!("{}-ca", self.name_any())
    }

    /// Whether a rolling update pass is due: the cluster is Running but the
    /// observed version lags the spec, or a certificate rotation is pending.
    pub fn should_update(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|status| should_update(&self.spec, status))
    }

    /// Desired state of the i-th member.
    ///
    /// The cluster UID doubles as the initial-cluster token: it is stable for
    /// the life of the cluster and lets the quorum distinguish a fresh
    /// cluster from one reformed out of persisted state.
    pub fn desired_member(&self, num: i32) -> EtcdMember {
        let mut member = EtcdMember::new(
            &self.member_name(num),
            EtcdMemberSpec {
                version: self.spec.version.clone(),
                backup: self.spec.backup.clone(),
                cluster_name: self.name_any(),
                cluster_token: self.uid().unwrap_or_default(),
                members: self.member_names(),
                broken: false,
                certificate_update: false,
            },
        );
        member.metadata.namespace = self.namespace();
        member.metadata.finalizers = Some(vec![FOREGROUND_DELETION_FINALIZER.to_string()]);
        member.metadata.owner_references = self.controller_owner_ref(&()).map(|r| vec![r]);
        member
    }

    /// Desired backup schedule, named after the cluster with the periods
    /// copied from the cluster spec.
    pub fn desired_backup_schedule(&self) -> EtcdBackupSchedule {
        let mut schedule = EtcdBackupSchedule::new(
            &self.name_any(),
            EtcdBackupScheduleSpec {
                creation_period: self.spec.backup_creation_period,
                retention_period: self.spec.backup_retention_period,
            },
        );
        schedule.metadata.namespace = self.namespace();
        schedule.metadata.finalizers = Some(vec![FOREGROUND_DELETION_FINALIZER.to_string()]);
        schedule.metadata.owner_references = self.controller_owner_ref(&()).map(|r| vec![r]);
        schedule
    }
}

/// Update predicate over an explicit status, for use while a reconcile is
/// still accumulating status changes it has not written back yet.
pub fn should_update(spec: &EtcdClusterSpec, status: &EtcdClusterStatus) -> bool {
    status.phase == Some(ClusterPhase::Running)
        && (status.version != spec.version || status.certificate_expires)
}
