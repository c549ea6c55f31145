//! Reconciliation logic for EtcdBackup resources
//!
//! Streams a snapshot from the live quorum into object storage, then
//! garbage-collects both the stored object and the backup record once the
//! retention period has elapsed.

use std::sync::Arc;

use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::runtime::controller::Action;
use kube::{Api, ResourceExt};
use tracing::{info, instrument};

use crate::controller::ensure::{done, requeue_after, write_status};
use crate::controller::{Context, Error, Result};
use crate::crd::{EtcdBackup, EtcdBackupStatus, EtcdCluster};
use crate::etcd::QuorumClient;
use crate::store::BackupStore;

/// Main reconciliation function for EtcdBackup
#[instrument(skip(backup, ctx), fields(name = %backup.name_any(), namespace = backup.namespace().unwrap_or_default()))]
pub async fn reconcile(backup: Arc<EtcdBackup>, ctx: Arc<Context>) -> Result<Action> {
    if backup.metadata.deletion_timestamp.is_some() {
        return Ok(done());
    }

    let ns = backup.namespace().unwrap_or_default();
    let mut status = backup.status.clone().unwrap_or_default();

    let result = reconcile_inner(&backup, &mut status, &ctx, &ns).await;

    let api: Api<EtcdBackup> = Api::namespaced(ctx.client.clone(), &ns);
    write_status(&api, &backup.name_any(), &status).await;

    result
}

async fn reconcile_inner(
    backup: &EtcdBackup,
    status: &mut EtcdBackupStatus,
    ctx: &Context,
    ns: &str,
) -> Result<Action> {
    let store = ctx
        .store
        .as_ref()
        .ok_or(Error::StoreError("backup store not configured".to_string()))?;

    if status.finished_time.is_none() {
        upload_backup(backup, status, store, ctx, ns).await?;
    }

    remove_stale(backup, store, ctx, ns).await
}

/// Take a snapshot from the cluster this backup is labeled with and upload
/// it. A backup whose cluster has disappeared is left unfinished; it ages
/// out through the retention path.
async fn upload_backup(
    backup: &EtcdBackup,
    status: &mut EtcdBackupStatus,
    store: &BackupStore,
    ctx: &Context,
    ns: &str,
) -> Result<()> {
    let cluster_name = backup.cluster_name().ok_or(Error::MissingClusterLabel)?;

    let clusters: Api<EtcdCluster> = Api::namespaced(ctx.client.clone(), ns);
    let Some(cluster) = clusters.get_opt(cluster_name).await? else {
        return Ok(());
    };

    let ca = QuorumClient::cluster_ca(&ctx.client, ns, cluster_name).await?;
    let mut quorum = QuorumClient::connect(cluster.endpoints(), ca).await?;
    let snapshot = quorum.snapshot().await?;

    let key = store.key(cluster_name, &backup.name_any());
    let url = store.upload(&key, snapshot).await?;
    info!(%url, "uploaded snapshot");

    status.url = Some(url);
    status.finished_time = Some(Time(Utc::now()));

    Ok(())
}

/// Delete the stored object and the backup record once the retention period
/// has elapsed since creation; otherwise sleep until it does.
async fn remove_stale(
    backup: &EtcdBackup,
    store: &BackupStore,
    ctx: &Context,
    ns: &str,
) -> Result<Action> {
    let created = backup
        .metadata
        .creation_timestamp
        .as_ref()
        .ok_or(Error::MissingObjectKey("metadata.creationTimestamp"))?;

    let retention_deadline = created.0 + backup.spec.retention_period;
    let remaining = (retention_deadline - Utc::now()).to_std();

    match remaining {
        Ok(delay) => Ok(requeue_after(delay)),
        // Deadline passed: collect the object first, then the record, so a
        // failure between the two leaves a record that retries the delete.
        Err(_) => {
            let cluster_name = backup.cluster_name().ok_or(Error::MissingClusterLabel)?;
            let key = store.key(cluster_name, &backup.name_any());
            store.delete(&key).await?;
            info!(%key, "removed stale snapshot");

            let api: Api<EtcdBackup> = Api::namespaced(ctx.client.clone(), ns);
            match api.delete(&backup.name_any(), &Default::default()).await {
                Ok(_) => {}
                Err(kube::Error::Api(e)) if e.code == 404 => {}
                Err(e) => return Err(e.into()),
            }

            Ok(done())
        }
    }
}
