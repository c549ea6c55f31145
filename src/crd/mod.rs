//! Custom resource definitions for the etcd operator
//!
//! Four resources model the managed state: `EtcdCluster` is the user-facing
//! declarative object, `EtcdMember` is one quorum node derived from it, and
//! `EtcdBackupSchedule`/`EtcdBackup` drive the snapshot lifecycle.

pub mod backup;
pub mod backup_schedule;
pub mod cluster;
pub mod member;

pub use backup::{EtcdBackup, EtcdBackupSpec, EtcdBackupStatus};
pub use backup_schedule::{EtcdBackupSchedule, EtcdBackupScheduleSpec, EtcdBackupScheduleStatus};
pub use cluster::{ClusterPhase, EtcdCluster, EtcdClusterSpec, EtcdClusterStatus};
pub use member::{
    client_url, member_fqdn, peer_url, EtcdMember, EtcdMemberSpec, EtcdMemberStatus, MemberPhase,
};

/// API group for all operator resources
pub const API_GROUP: &str = "etcd-operator.example.com";

/// Label carried by every resource belonging to a cluster, including
/// certificate secrets and backups. The value is the cluster name.
pub const CLUSTER_LABEL: &str = "etcd-operator.example.com/cluster";

/// Finalizer on EtcdCluster objects that defers deletion until the operator
/// has removed the certificate secrets, which are not owner-referenced by
/// the cluster and therefore escape the foreground cascade.
pub const CLEANUP_SECRETS_FINALIZER: &str = "etcd-operator.example.com/cleanup-secrets";

/// Kubernetes foreground-deletion finalizer; placed on every owned child so
/// parents are not removed before their dependents.
pub const FOREGROUND_DELETION_FINALIZER: &str = "foregroundDeletion";

/// Client port of the managed etcd processes
pub const CLIENT_PORT: i32 = 2379;

/// Peer port of the managed etcd processes
pub const PEER_PORT: i32 = 2380;
