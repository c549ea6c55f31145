//! Reconciliation logic for EtcdMember resources
//!
//! Per-member convergence: leaf certificates, the data volume claim, and the
//! pod running the etcd process. Tracks certificate expiry against the pod's
//! creation time, replaces the pod for version updates and confirmed
//! certificate rotations, and repairs a broken member by evicting it from
//! the live quorum and rebuilding its local state.

use std::sync::Arc;

use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod};
use kube::api::PostParams;
use kube::runtime::controller::Action;
use kube::{Api, ResourceExt};
use tracing::{info, instrument, warn};

use crate::controller::ensure::{done, ensure, requeue, write_status};
use crate::controller::{Context, Error, Result};
use crate::crd::{EtcdMember, MemberPhase};
use crate::etcd::QuorumClient;
use crate::resources::certificate::generate_member_certificate;
use crate::resources::pod::generate_pod;
use crate::resources::pvc::generate_pvc;
use crate::resources::Certificate;

const CERTIFICATE_SUFFIXES: [&str; 2] = ["client", "peer"];

/// Main reconciliation function for EtcdMember
#[instrument(skip(member, ctx), fields(name = %member.name_any(), namespace = member.namespace().unwrap_or_default()))]
pub async fn reconcile(member: Arc<EtcdMember>, ctx: Arc<Context>) -> Result<Action> {
    if member.metadata.deletion_timestamp.is_some() {
        return Ok(done());
    }

    let ns = member.namespace().unwrap_or_default();
    let mut member = (*member).clone();

    let result = reconcile_inner(&mut member, &ctx, &ns).await;

    // Deferred status write: runs on every exit path, conflicts swallowed.
    let api: Api<EtcdMember> = Api::namespaced(ctx.client.clone(), &ns);
    if let Some(status) = member.status.as_ref() {
        write_status(&api, &member.name_any(), status).await;
    }

    result
}

async fn reconcile_inner(member: &mut EtcdMember, ctx: &Context, ns: &str) -> Result<Action> {
    if member.spec.broken {
        return repair(member, ctx, ns).await;
    }

    if let Some(action) = ensure_certificates(member, ctx, ns).await? {
        return Ok(action);
    }
    check_certificate_expires(member, ctx, ns).await?;

    if let Some(action) = ensure_pvc(member, ctx, ns).await? {
        return Ok(action);
    }

    if member.should_update() {
        if let Some(action) = delete_pod(member, ctx, ns).await? {
            return Ok(action);
        }
        // Pod is gone; the recreate below runs with the new spec
        member
            .status
            .get_or_insert_with(Default::default)
            .phase = Some(MemberPhase::Updating);
    }

    if let Some(action) = ensure_pod(member, ctx, ns).await? {
        return Ok(action);
    }

    Ok(done())
}

/// Ensure the peer and client certificates exist, requeueing until both have
/// been issued (`status.notBefore` set).
async fn ensure_certificates(
    member: &EtcdMember,
    ctx: &Context,
    ns: &str,
) -> Result<Option<Action>> {
    let api: Api<Certificate> = Api::namespaced(ctx.client.clone(), ns);

    let mut pending = false;
    for suffix in CERTIFICATE_SUFFIXES {
        let cert = ensure(&api, &generate_member_certificate(member, suffix))
            .await?
            .into_inner();

        pending = pending
            || cert
                .status
                .as_ref()
                .and_then(|s| s.not_before.as_ref())
                .is_none();
    }

    Ok(pending.then(requeue))
}

/// A certificate issued after the running pod was created is not the one the
/// pod serves: flag it for rotation. Any expired certificate sets the flag.
async fn check_certificate_expires(
    member: &mut EtcdMember,
    ctx: &Context,
    ns: &str,
) -> Result<()> {
    let pods: Api<Pod> = Api::namespaced(ctx.client.clone(), ns);
    let Some(pod) = pods.get_opt(&member.name_any()).await? else {
        return Ok(());
    };
    let Some(pod_created) = pod.metadata.creation_timestamp else {
        return Ok(());
    };

    let certs: Api<Certificate> = Api::namespaced(ctx.client.clone(), ns);

    let mut expires = false;
    for suffix in CERTIFICATE_SUFFIXES {
        let Some(cert) = certs.get_opt(&member.certificate_name(suffix)).await? else {
            return Ok(());
        };

        if let Some(not_before) = cert.status.as_ref().and_then(|s| s.not_before.as_ref()) {
            expires = expires || not_before.0 > pod_created.0;
        }
    }

    if expires {
        info!("certificate expires");
    }
    member
        .status
        .get_or_insert_with(Default::default)
        .certificate_expires = expires;

    Ok(())
}

/// The volume claim is only provisioned while the member is creating; an
/// established member never has its storage resized or replaced here.
async fn ensure_pvc(member: &EtcdMember, ctx: &Context, ns: &str) -> Result<Option<Action>> {
    if !member.is_creating() {
        return Ok(None);
    }

    let api: Api<PersistentVolumeClaim> = Api::namespaced(ctx.client.clone(), ns);
    let result = ensure(&api, &generate_pvc(member)).await?;

    Ok(result.created().then(requeue))
}

async fn ensure_pod(member: &mut EtcdMember, ctx: &Context, ns: &str) -> Result<Option<Action>> {
    let api: Api<Pod> = Api::namespaced(ctx.client.clone(), ns);

    let result = ensure(&api, &generate_pod(member)).await?;
    if result.created() {
        // A Running member whose pod had to be recreated lost its pod
        // out-of-band; record the failure so the cluster can repair it.
        if member.phase() == Some(MemberPhase::Running) {
            member.set_failed();
        }
        return Ok(Some(requeue()));
    }
    let pod = result.into_inner();

    let ready = pod_ready(&pod);
    let status = member.status.get_or_insert_with(Default::default);

    if status.phase == Some(MemberPhase::Running) && !ready {
        member.set_failed();
    } else if ready {
        status.phase = Some(MemberPhase::Running);
        status.version = member.spec.version.clone();
    }

    Ok(None)
}

/// Ready means every declared container reports ready
fn pod_ready(pod: &Pod) -> bool {
    let Some(spec) = pod.spec.as_ref() else {
        return false;
    };
    let statuses = pod
        .status
        .as_ref()
        .and_then(|s| s.container_statuses.as_ref());

    match statuses {
        Some(statuses) => {
            statuses.len() == spec.containers.len() && statuses.iter().all(|s| s.ready)
        }
        None => false,
    }
}

/// Repair a broken member: remove pod and volume, evict the stale quorum
/// entry and re-add the peer URL, then hand back to the create path in the
/// Recreating phase so the fresh pod joins the existing quorum.
async fn repair(member: &mut EtcdMember, ctx: &Context, ns: &str) -> Result<Action> {
    if let Some(action) = delete_pod(member, ctx, ns).await? {
        return Ok(action);
    }
    if let Some(action) = delete_pvc(member, ctx, ns).await? {
        return Ok(action);
    }

    readd_to_cluster(member, ctx, ns).await?;

    let status = member.status.get_or_insert_with(Default::default);
    status.phase = Some(MemberPhase::Recreating);
    status.failed_time = None;

    member.spec.broken = false;
    let api: Api<EtcdMember> = Api::namespaced(ctx.client.clone(), ns);
    if let Err(e) = api
        .replace(&member.name_any(), &PostParams::default(), member)
        .await
    {
        let err: Error = e.into();
        if !err.is_conflict() {
            warn!("unable to update member: {}", err);
        }
    }

    Ok(requeue())
}

/// Membership surgery against the live quorum: drop every entry matching
/// this member's name, then re-add its peer URL so the rebuilt pod is
/// admitted as the same logical member.
async fn readd_to_cluster(member: &EtcdMember, ctx: &Context, ns: &str) -> Result<()> {
    let ca = QuorumClient::cluster_ca(&ctx.client, ns, &member.spec.cluster_name).await?;
    let mut quorum = QuorumClient::connect(member.endpoints(), ca).await?;

    for entry in quorum.members().await? {
        if entry.name != member.name_any() {
            continue;
        }

        quorum.remove_member(entry.id).await?;
        info!(member = %member.name_any(), "removed broken member from cluster");
    }

    quorum.add_member(member.advertise_peer_url()).await?;

    Ok(())
}

async fn delete_pod(member: &EtcdMember, ctx: &Context, ns: &str) -> Result<Option<Action>> {
    let api: Api<Pod> = Api::namespaced(ctx.client.clone(), ns);

    match api.delete(&member.name_any(), &Default::default()).await {
        Ok(_) => {
            info!(member = %member.name_any(), "removed member's pod");
            Ok(Some(requeue()))
        }
        Err(kube::Error::Api(e)) if e.code == 404 => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn delete_pvc(member: &EtcdMember, ctx: &Context, ns: &str) -> Result<Option<Action>> {
    let api: Api<PersistentVolumeClaim> = Api::namespaced(ctx.client.clone(), ns);

    match api.delete(&member.name_any(), &Default::default()).await {
        Ok(_) => {
            info!(member = %member.name_any(), "removed broken member's pvc");
            Ok(Some(requeue()))
        }
        Err(kube::Error::Api(e)) if e.code == 404 => Ok(None),
        Err(e) => Err(e.into()),
    }
}
