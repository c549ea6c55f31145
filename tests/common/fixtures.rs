//! Builders for EtcdCluster, EtcdMember, and EtcdBackup test objects

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::core::ObjectMeta;

use etcd_operator::crd::{
    ClusterPhase, EtcdBackup, EtcdBackupSpec, EtcdBackupStatus, EtcdCluster, EtcdClusterSpec,
    EtcdClusterStatus, EtcdMember, EtcdMemberSpec, EtcdMemberStatus, MemberPhase, CLUSTER_LABEL,
};

pub const TEST_NAMESPACE: &str = "test-ns";
pub const TEST_UID: &str = "test-uid-12345";

/// Create a basic test cluster with minimal configuration
pub fn create_test_cluster(name: &str, size: i32) -> EtcdCluster {
    EtcdClusterBuilder::new(name).with_size(size).build()
}

pub struct EtcdClusterBuilder {
    name: String,
    version: String,
    size: i32,
    backup: Option<String>,
    creation_period: Duration,
    retention_period: Duration,
    status: Option<EtcdClusterStatus>,
}

impl EtcdClusterBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            version: "3.5.6".to_string(),
            size: 3,
            backup: None,
            creation_period: Duration::from_secs(3600),
            retention_period: Duration::from_secs(7200),
            status: None,
        }
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    pub fn with_size(mut self, size: i32) -> Self {
        self.size = size;
        self
    }

    pub fn with_backup(mut self, backup: &str) -> Self {
        self.backup = Some(backup.to_string());
        self
    }

    pub fn with_status(mut self, phase: ClusterPhase, version: &str) -> Self {
        self.status = Some(EtcdClusterStatus {
            phase: Some(phase),
            version: version.to_string(),
            certificate_expires: false,
        });
        self
    }

    pub fn build(self) -> EtcdCluster {
        let mut cluster = EtcdCluster::new(
            &self.name,
            EtcdClusterSpec {
                version: self.version,
                size: self.size,
                backup: self.backup,
                backup_creation_period: self.creation_period,
                backup_retention_period: self.retention_period,
            },
        );
        cluster.metadata = ObjectMeta {
            name: Some(self.name),
            namespace: Some(TEST_NAMESPACE.to_string()),
            uid: Some(TEST_UID.to_string()),
            ..Default::default()
        };
        cluster.status = self.status;
        cluster
    }
}

/// Create a running member of the given cluster
pub fn create_test_member(cluster: &str, num: i32) -> EtcdMember {
    EtcdMemberBuilder::new(cluster, num)
        .with_phase(MemberPhase::Running)
        .build()
}

pub struct EtcdMemberBuilder {
    cluster: String,
    num: i32,
    size: i32,
    version: String,
    broken: bool,
    certificate_update: bool,
    status: EtcdMemberStatus,
    has_status: bool,
}

impl EtcdMemberBuilder {
    pub fn new(cluster: &str, num: i32) -> Self {
        Self {
            cluster: cluster.to_string(),
            num,
            size: 3,
            version: "3.5.6".to_string(),
            broken: false,
            certificate_update: false,
            status: EtcdMemberStatus::default(),
            has_status: false,
        }
    }

    pub fn with_size(mut self, size: i32) -> Self {
        self.size = size;
        self
    }

    pub fn with_phase(mut self, phase: MemberPhase) -> Self {
        self.status.phase = Some(phase);
        self.has_status = true;
        self
    }

    /// Mark the member failed at `failed_at`
    pub fn failed_at(mut self, failed_at: DateTime<Utc>) -> Self {
        self.status.phase = Some(MemberPhase::Failed);
        self.status.failed_time = Some(Time(failed_at));
        self.has_status = true;
        self
    }

    pub fn broken(mut self) -> Self {
        self.broken = true;
        self
    }

    pub fn with_certificate_update(mut self) -> Self {
        self.certificate_update = true;
        self
    }

    pub fn with_certificate_expires(mut self) -> Self {
        self.status.certificate_expires = true;
        self.has_status = true;
        self
    }

    pub fn with_status_version(mut self, version: &str) -> Self {
        self.status.version = version.to_string();
        self.has_status = true;
        self
    }

    pub fn build(self) -> EtcdMember {
        let name = format!("{}-{}", self.cluster, self.num);
        let members = (0..self.size)
            .map(|n| format!("{}-{}", self.cluster, n))
            .collect();

        let mut member = EtcdMember::new(
            &name,
            EtcdMemberSpec {
                version: self.version,
                backup: None,
                cluster_name: self.cluster,
                cluster_token: TEST_UID.to_string(),
                members,
                broken: self.broken,
                certificate_update: self.certificate_update,
            },
        );
        member.metadata = ObjectMeta {
            name: Some(name),
            namespace: Some(TEST_NAMESPACE.to_string()),
            uid: Some(format!("member-uid-{}", self.num)),
            ..Default::default()
        };
        member.status = self.has_status.then_some(self.status);
        member
    }
}

/// A backup whose upload finished at `finished`
pub fn finished_backup(cluster: &str, finished: DateTime<Utc>) -> EtcdBackup {
    let mut backup = backup_for(cluster, finished.timestamp());
    backup.status = Some(EtcdBackupStatus {
        finished_time: Some(Time(finished)),
        url: Some(format!("s3://bucket/{cluster}/backup")),
    });
    backup
}

/// A backup that is still uploading
pub fn in_flight_backup(cluster: &str, created: DateTime<Utc>) -> EtcdBackup {
    backup_for(cluster, created.timestamp())
}

fn backup_for(cluster: &str, unix_seconds: i64) -> EtcdBackup {
    let mut backup = EtcdBackup::new(
        &format!("{cluster}-{unix_seconds}"),
        EtcdBackupSpec {
            retention_period: Duration::from_secs(7200),
        },
    );
    backup.metadata.namespace = Some(TEST_NAMESPACE.to_string());
    backup.metadata.labels = Some(BTreeMap::from([(
        CLUSTER_LABEL.to_string(),
        cluster.to_string(),
    )]));
    backup
}
