//! Reconciliation logic for EtcdCluster resources
//!
//! Top-level convergence: a straight-line sequence of ensure steps (backup
//! schedule, headless service, CA certificate and issuer, members), phase
//! aggregation, minor-failure repair, and the rolling update driver. Any
//! step that makes progress short-circuits the rest with a requeue.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{Secret, Service};
use kube::api::{ListParams, Patch, PatchParams, PostParams};
use kube::runtime::controller::Action;
use kube::{Api, ResourceExt};
use tracing::{info, instrument};

use crate::controller::ensure::{done, ensure, requeue, write_status};
use crate::controller::{Context, Error, Result};
use crate::crd::cluster::should_update;
use crate::crd::{
    ClusterPhase, EtcdBackupSchedule, EtcdCluster, EtcdClusterStatus, EtcdMember, MemberPhase,
    CLEANUP_SECRETS_FINALIZER, CLUSTER_LABEL, FOREGROUND_DELETION_FINALIZER,
};
use crate::resources::certificate::{generate_ca_certificate, generate_ca_issuer};
use crate::resources::service::generate_headless_service;
use crate::resources::{Certificate, Issuer};

/// Grace period before a failed member becomes a repair candidate
const MINOR_FAILED_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Main reconciliation function for EtcdCluster
#[instrument(skip(cluster, ctx), fields(name = %cluster.name_any(), namespace = cluster.namespace().unwrap_or_default()))]
pub async fn reconcile(cluster: Arc<EtcdCluster>, ctx: Arc<Context>) -> Result<Action> {
    let ns = cluster.namespace().unwrap_or_default();

    if cluster.metadata.deletion_timestamp.is_some() {
        return cleanup_secrets(&cluster, &ctx, &ns).await;
    }

    let mut status = cluster.status.clone().unwrap_or_default();
    if status.phase.is_none() {
        status.phase = Some(ClusterPhase::Creating);
    }

    let result = reconcile_inner(&cluster, &mut status, &ctx, &ns).await;

    // Status is written even when a step short-circuits; conflicts are
    // swallowed and the next reconcile writes fresh status.
    let api: Api<EtcdCluster> = Api::namespaced(ctx.client.clone(), &ns);
    write_status(&api, &cluster.name_any(), &status).await;

    result
}

async fn reconcile_inner(
    cluster: &EtcdCluster,
    status: &mut EtcdClusterStatus,
    ctx: &Context,
    ns: &str,
) -> Result<Action> {
    ensure_backup_schedule(cluster, ctx, ns).await?;

    if let Some(action) = ensure_service(cluster, ctx, ns).await? {
        return Ok(action);
    }
    if let Some(action) = ensure_ca(cluster, ctx, ns).await? {
        return Ok(action);
    }

    let members = ensure_members(cluster, status, ctx, ns).await?;

    if status.phase == Some(ClusterPhase::MinorFailure) {
        if let Some(action) = repair_members(cluster, &members, ctx, ns).await? {
            return Ok(action);
        }
    }

    if should_update(&cluster.spec, status) {
        if let Some(action) = update_members(cluster, status, ctx, ns).await? {
            return Ok(action);
        }
    }

    status.version = cluster.spec.version.clone();

    Ok(done())
}

async fn ensure_backup_schedule(cluster: &EtcdCluster, ctx: &Context, ns: &str) -> Result<()> {
    let api: Api<EtcdBackupSchedule> = Api::namespaced(ctx.client.clone(), ns);
    ensure(&api, &cluster.desired_backup_schedule()).await?;
    Ok(())
}

/// Headless service for peer discovery. A freshly created service gets one
/// requeue so the platform can allocate it before members resolve peers.
async fn ensure_service(cluster: &EtcdCluster, ctx: &Context, ns: &str) -> Result<Option<Action>> {
    let api: Api<Service> = Api::namespaced(ctx.client.clone(), ns);
    let result = ensure(&api, &generate_headless_service(cluster)).await?;
    Ok(result.created().then(requeue))
}

async fn ensure_ca(cluster: &EtcdCluster, ctx: &Context, ns: &str) -> Result<Option<Action>> {
    let certs: Api<Certificate> = Api::namespaced(ctx.client.clone(), ns);
    let ca = generate_ca_certificate(cluster, &ctx.cluster_issuer);
    if ensure(&certs, &ca).await?.created() {
        return Ok(Some(requeue()));
    }

    let issuers: Api<Issuer> = Api::namespaced(ctx.client.clone(), ns);
    if ensure(&issuers, &generate_ca_issuer(cluster)).await?.created() {
        return Ok(Some(requeue()));
    }

    Ok(None)
}

/// Ensure all members exist and fold their observed phases into the cluster
/// phase. Returns the live members for the repair and update passes.
async fn ensure_members(
    cluster: &EtcdCluster,
    status: &mut EtcdClusterStatus,
    ctx: &Context,
    ns: &str,
) -> Result<Vec<EtcdMember>> {
    let api: Api<EtcdMember> = Api::namespaced(ctx.client.clone(), ns);

    let mut members = Vec::with_capacity(cluster.spec.size as usize);
    for num in 0..cluster.spec.size {
        let member = ensure(&api, &cluster.desired_member(num)).await?.into_inner();
        members.push(member);
    }

    let counts = count_members(&members);
    status.phase = Some(aggregate_phase(&counts, cluster.spec.size));
    status.certificate_expires = counts.certificate_expires;

    Ok(members)
}

/// Observed member counts folded into a cluster phase
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MemberCounts {
    pub failed: usize,
    pub creating: usize,
    pub certificate_expires: bool,
}

pub fn count_members(members: &[EtcdMember]) -> MemberCounts {
    let mut counts = MemberCounts::default();

    for member in members {
        if member.phase() == Some(MemberPhase::Failed) {
            counts.failed += 1;
        } else if member.is_creating() {
            counts.creating += 1;
        }

        counts.certificate_expires = counts.certificate_expires
            || member
                .status
                .as_ref()
                .is_some_and(|s| s.certificate_expires)
            || member.spec.certificate_update;
    }

    counts
}

pub fn aggregate_phase(counts: &MemberCounts, size: i32) -> ClusterPhase {
    if counts.failed == 0 && counts.creating == 0 {
        ClusterPhase::Running
    } else if counts.failed == 0 {
        ClusterPhase::Creating
    } else if 2 * (counts.failed + counts.creating) < size as usize {
        ClusterPhase::MinorFailure
    } else {
        ClusterPhase::Failed
    }
}

/// What the repair pass should do this tick
#[derive(Debug, PartialEq, Eq)]
pub enum RepairDecision {
    /// Members are still settling (creating, or a repair is in flight), or
    /// no failed member has outlived the grace period yet
    Requeue,
    /// Repairing now would lose quorum; leave the cluster alone
    Settled,
    /// Mark this member (by index) broken
    Repair(usize),
}

/// Pick at most one repair victim: the member with the earliest failure
/// time older than the grace period, and only while a strict minority is
/// failed.
pub fn select_repair_candidate(
    members: &[EtcdMember],
    size: i32,
    now: DateTime<Utc>,
) -> RepairDecision {
    let mut candidate: Option<usize> = None;
    let mut min_failed_time = now - MINOR_FAILED_TIMEOUT;
    let mut failed = 0usize;

    for (num, member) in members.iter().enumerate() {
        if member.is_creating() || member.spec.broken {
            return RepairDecision::Requeue;
        }
        if member.phase() != Some(MemberPhase::Failed) {
            continue;
        }

        failed += 1;
        if let Some(failed_time) = member.status.as_ref().and_then(|s| s.failed_time.as_ref()) {
            if failed_time.0 < min_failed_time {
                min_failed_time = failed_time.0;
                candidate = Some(num);
            }
        }
    }

    match candidate {
        None => RepairDecision::Requeue,
        Some(_) if failed * 2 > size as usize => RepairDecision::Settled,
        Some(num) => RepairDecision::Repair(num),
    }
}

async fn repair_members(
    cluster: &EtcdCluster,
    members: &[EtcdMember],
    ctx: &Context,
    ns: &str,
) -> Result<Option<Action>> {
    match select_repair_candidate(members, cluster.spec.size, Utc::now()) {
        RepairDecision::Requeue => Ok(Some(requeue())),
        RepairDecision::Settled => Ok(None),
        RepairDecision::Repair(num) => {
            let mut member = members[num].clone();
            info!(member = %member.name_any(), "starting repair process");

            member.spec.broken = true;
            let api: Api<EtcdMember> = Api::namespaced(ctx.client.clone(), ns);
            api.replace(&member.name_any(), &PostParams::default(), &member)
                .await?;

            Ok(None)
        }
    }
}

/// Rolling update: at most one member mutating at a time. Bumps one member's
/// spec (version, then certificate rotation) per pass and waits for its
/// observed state to converge before touching the next.
async fn update_members(
    cluster: &EtcdCluster,
    status: &mut EtcdClusterStatus,
    ctx: &Context,
    ns: &str,
) -> Result<Option<Action>> {
    let api: Api<EtcdMember> = Api::namespaced(ctx.client.clone(), ns);

    info!("updating members");

    for num in 0..cluster.spec.size {
        let mut member = ensure(&api, &cluster.desired_member(num)).await?.into_inner();

        if member.is_creating() || member.phase() == Some(MemberPhase::Updating) {
            return Ok(Some(requeue()));
        }

        if cluster.spec.version != member.spec.version {
            member.spec.version = cluster.spec.version.clone();
            status.phase = Some(ClusterPhase::Updating);
            api.replace(&member.name_any(), &PostParams::default(), &member)
                .await?;

            return Ok(Some(requeue()));
        }

        if status.certificate_expires || member.spec.certificate_update {
            let rotation_pending = member
                .status
                .as_ref()
                .is_some_and(|s| s.certificate_expires);

            member.spec.certificate_update = rotation_pending;
            api.replace(&member.name_any(), &PostParams::default(), &member)
                .await?;

            if rotation_pending {
                status.phase = Some(ClusterPhase::Updating);
                return Ok(Some(requeue()));
            }
        }

        if member
            .status
            .as_ref()
            .is_none_or(|s| s.version != cluster.spec.version)
        {
            return Ok(Some(requeue()));
        }
    }

    status.phase = Some(ClusterPhase::Running);
    status.certificate_expires = false;

    Ok(None)
}

/// Deletion path: once the foreground cascade has collected the owned
/// children, remove the certificate secrets (which carry no owner reference)
/// and release the cleanup finalizer.
async fn cleanup_secrets(cluster: &EtcdCluster, ctx: &Context, ns: &str) -> Result<Action> {
    let finalizers = cluster.metadata.finalizers.clone().unwrap_or_default();

    if finalizers.iter().any(|f| f == FOREGROUND_DELETION_FINALIZER) {
        return Ok(requeue());
    }
    if !finalizers.iter().any(|f| f == CLEANUP_SECRETS_FINALIZER) {
        return Ok(done());
    }

    let secrets: Api<Secret> = Api::namespaced(ctx.client.clone(), ns);
    let selector = format!("{}={}", CLUSTER_LABEL, cluster.name_any());
    let list = secrets
        .list(&ListParams::default().labels(&selector))
        .await?;

    for secret in list.items {
        let name = secret
            .metadata
            .name
            .as_deref()
            .ok_or(Error::MissingObjectKey("metadata.name"))?;
        match secrets.delete(name, &Default::default()).await {
            Ok(_) => {}
            Err(kube::Error::Api(e)) if e.code == 404 => {}
            Err(e) => return Err(e.into()),
        }
    }

    let remaining: Vec<String> = finalizers
        .into_iter()
        .filter(|f| f != CLEANUP_SECRETS_FINALIZER)
        .collect();
    let patch = serde_json::json!({ "metadata": { "finalizers": remaining } });
    let api: Api<EtcdCluster> = Api::namespaced(ctx.client.clone(), ns);
    api.patch(
        &cluster.name_any(),
        &PatchParams::default(),
        &Patch::Merge(&patch),
    )
    .await?;

    Ok(done())
}
