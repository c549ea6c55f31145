use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// EtcdMember is the Schema for the etcdmembers API
///
/// One member per quorum node. Members are created by the cluster reconciler
/// and never edited by users; the `broken` and `certificate_update` fields
/// are written by the cluster reconciler to request repair and rotation.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "etcd-operator.example.com",
    version = "v1alpha1",
    kind = "EtcdMember",
    plural = "etcdmembers",
    namespaced,
    status = "EtcdMemberStatus",
    printcolumn = r#"{"name":"Status", "type":"string", "jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Version", "type":"string", "jsonPath":".status.version"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct EtcdMemberSpec {
    #[serde(default)]
    pub version: String,

    /// Backup to restore on first creation; ignored when rejoining a quorum
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup: Option<String>,

    #[serde(default)]
    pub cluster_name: String,

    /// Opaque per-cluster identifier, stable for the cluster lifetime
    #[serde(default)]
    pub cluster_token: String,

    /// Ordered names of all members of the cluster
    #[serde(default)]
    pub members: Vec<String>,

    /// Set by the cluster reconciler to request eviction and rebuild
    #[serde(default)]
    pub broken: bool,

    /// Set by the cluster reconciler to request certificate rotation
    #[serde(default)]
    pub certificate_update: bool,
}

/// Observed state of an etcd cluster member
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct EtcdMemberStatus {
    #[serde(default)]
    pub version: String,

    // Status options serialize as explicit nulls so a merge-patched status
    // write can clear them.
    #[serde(default)]
    pub phase: Option<MemberPhase>,

    /// When the member first entered the Failed phase; cleared on repair
    #[serde(default)]
    pub failed_time: Option<Time>,

    #[serde(default)]
    pub certificate_expires: bool,
}

/// Member lifecycle phase
#[derive(Serialize, Deserialize, Clone, Copy, Debug, JsonSchema, PartialEq, Eq)]
pub enum MemberPhase {
    /// First creation: volume and pod are being provisioned
    Creating,
    /// Rebuild after repair: the pod rejoins an existing quorum
    Recreating,
    Running,
    Updating,
    Failed,
}

impl std::fmt::Display for MemberPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemberPhase::Creating => write!(f, "Creating"),
            MemberPhase::Recreating => write!(f, "Recreating"),
            MemberPhase::Running => write!(f, "Running"),
            MemberPhase::Updating => write!(f, "Updating"),
            MemberPhase::Failed => write!(f, "Failed"),
        }
    }
}

impl EtcdMember {
    pub fn phase(&self) -> Option<MemberPhase> {
        self.status.as_ref().and_then(|s| s.phase)
    }

    /// Whether the member is still converging towards its first (or rebuilt)
    /// pod. An unset phase counts: the member reconciler has not run yet.
    pub fn is_creating(&self) -> bool {
        matches!(
            self.phase(),
            None | Some(MemberPhase::Creating) | Some(MemberPhase::Recreating)
        )
    }

    /// Whether the running pod must be replaced: the observed version lags
    /// the spec, or a requested certificate rotation is confirmed pending.
    pub fn should_update(&self) -> bool {
        let Some(status) = self.status.as_ref() else {
            return false;
        };
        status.phase == Some(MemberPhase::Running)
            && (status.version != self.spec.version
                || (self.spec.certificate_update && status.certificate_expires))
    }

    /// Mark the member failed, anchoring the repair grace period.
    /// Idempotent: an already-failed member keeps its original failed time.
    pub fn set_failed(&mut self) {
        let status = self.status.get_or_insert_with(Default::default);
        if status.phase == Some(MemberPhase::Failed) {
            return;
        }
        status.phase = Some(MemberPhase::Failed);
        status.failed_time = Some(Time(chrono::Utc::now()));
    }

    pub fn fqdn(&self) -> String {
        member_fqdn(
            &self.name_any(),
            &self.namespace().unwrap_or_default(),
            &self.spec.cluster_name,
        )
    }

    pub fn advertise_peer_url(&self) -> String {
        peer_url(
            &self.name_any(),
            &self.namespace().unwrap_or_default(),
            &self.spec.cluster_name,
        )
    }

    pub fn advertise_client_url(&self) -> String {
        client_url(
            &self.name_any(),
            &self.namespace().unwrap_or_default(),
            &self.spec.cluster_name,
        )
    }

    /// `--initial-cluster` value: comma-joined `<name>=<peer-url>` pairs
    pub fn initial_cluster(&self) -> String {
        let ns = self.namespace().unwrap_or_default();
        self.spec
            .members
            .iter()
            .map(|name| format!("{}={}", name, peer_url(name, &ns, &self.spec.cluster_name)))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// `--initial-cluster-state` value. A recreated member joins the
    /// surviving quorum instead of bootstrapping a new one.
    pub fn initial_cluster_state(&self) -> &'static str {
        if self.phase() == Some(MemberPhase::Recreating) {
            "existing"
        } else {
            "new"
        }
    }

    /// Client endpoints of all peers, used to reach the live quorum
    pub fn endpoints(&self) -> Vec<String> {
        let ns = self.namespace().unwrap_or_default();
        self.spec
            .members
            .iter()
            .map(|name| client_url(name, &ns, &self.spec.cluster_name))
            .collect()
    }

    pub fn image(&self) -> String {
        format!("quay.io/coreos/etcd:v{}", self.spec.version)
    }

    pub fn certificate_name(&self, suffix: &str) -> String {
        format!("{}-{}", self.name_any(), suffix)
    }

    pub fn peer_cert_secret(&self) -> String {
        self.certificate_name("peer")
    }

    pub fn client_cert_secret(&self) -> String {
        self.certificate_name("client")
    }
}

/// Pod DNS name within the cluster's headless service
pub fn member_fqdn(name: &str, namespace: &str, service: &str) -> String {
    format!("{name}.{service}.{namespace}.svc.cluster.local")
}

pub fn peer_url(name: &str, namespace: &str, service: &str) -> String {
    format!("https://{}:2380", member_fqdn(name, namespace, service))
}

pub fn client_url(name: &str, namespace: &str, service: &str) -> String {
    format!("https://{}:2379", member_fqdn(name, namespace, service))
}
