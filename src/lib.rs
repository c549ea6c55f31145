pub mod cli;
pub mod controller;
pub mod crd;
pub mod etcd;
pub mod health;
pub mod resources;
pub mod store;
pub mod webhooks;

pub use controller::{error_policy, Context, Error, Result};
pub use crd::{EtcdBackup, EtcdBackupSchedule, EtcdCluster, EtcdMember};

use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod, Service};
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::Api;

use crate::health::HealthState;
use crate::resources::{Certificate, Issuer};

/// Run the EtcdCluster controller
///
/// Watches clusters and every resource they own so membership, service, and
/// certificate changes all re-trigger cluster convergence.
pub async fn run_cluster_controller(ctx: Arc<Context>, health: Option<Arc<HealthState>>) {
    tracing::info!("starting controller for EtcdCluster resources");

    let client = ctx.client.clone();
    let clusters: Api<EtcdCluster> = Api::all(client.clone());
    let members: Api<EtcdMember> = Api::all(client.clone());
    let schedules: Api<EtcdBackupSchedule> = Api::all(client.clone());
    let services: Api<Service> = Api::all(client.clone());
    let certificates: Api<Certificate> = Api::all(client.clone());
    let issuers: Api<Issuer> = Api::all(client);

    let watcher_config = WatcherConfig::default().any_semantic();

    Controller::new(clusters, watcher_config.clone())
        .owns(members, watcher_config.clone())
        .owns(schedules, watcher_config.clone())
        .owns(services, watcher_config.clone())
        .owns(certificates, watcher_config.clone())
        .owns(issuers, watcher_config)
        .run(controller::cluster::reconcile, error_policy, ctx)
        .for_each(|result| {
            let health = health.clone();
            async move {
                match result {
                    Ok((obj, _action)) => {
                        tracing::debug!("reconciled cluster {}", obj.name);
                        if let Some(health) = health {
                            health.metrics.record_reconcile(
                                "cluster",
                                obj.namespace.as_deref().unwrap_or_default(),
                                &obj.name,
                            );
                        }
                    }
                    Err(e) => {
                        tracing::error!("cluster reconciliation error: {:?}", e);
                    }
                }
            }
        })
        .await;

    tracing::error!("cluster controller stream ended unexpectedly");
}

/// Run the EtcdMember controller
pub async fn run_member_controller(ctx: Arc<Context>, health: Option<Arc<HealthState>>) {
    tracing::info!("starting controller for EtcdMember resources");

    let client = ctx.client.clone();
    let members: Api<EtcdMember> = Api::all(client.clone());
    let pods: Api<Pod> = Api::all(client.clone());
    let pvcs: Api<PersistentVolumeClaim> = Api::all(client.clone());
    let certificates: Api<Certificate> = Api::all(client);

    let watcher_config = WatcherConfig::default().any_semantic();

    Controller::new(members, watcher_config.clone())
        .owns(pods, watcher_config.clone())
        .owns(pvcs, watcher_config.clone())
        .owns(certificates, watcher_config)
        .run(controller::member::reconcile, error_policy, ctx)
        .for_each(|result| {
            let health = health.clone();
            async move {
                match result {
                    Ok((obj, _action)) => {
                        tracing::debug!("reconciled member {}", obj.name);
                        if let Some(health) = health {
                            health.metrics.record_reconcile(
                                "member",
                                obj.namespace.as_deref().unwrap_or_default(),
                                &obj.name,
                            );
                        }
                    }
                    Err(e) => {
                        tracing::error!("member reconciliation error: {:?}", e);
                    }
                }
            }
        })
        .await;

    tracing::error!("member controller stream ended unexpectedly");
}

/// Run the EtcdBackupSchedule controller
pub async fn run_backup_schedule_controller(ctx: Arc<Context>) {
    tracing::info!("starting controller for EtcdBackupSchedule resources");

    let client = ctx.client.clone();
    let schedules: Api<EtcdBackupSchedule> = Api::all(client.clone());
    let backups: Api<EtcdBackup> = Api::all(client);

    let watcher_config = WatcherConfig::default().any_semantic();

    Controller::new(schedules, watcher_config.clone())
        .owns(backups, watcher_config)
        .run(controller::backup_schedule::reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((obj, _action)) => tracing::debug!("reconciled backup schedule {}", obj.name),
                Err(e) => tracing::error!("backup schedule reconciliation error: {:?}", e),
            }
        })
        .await;

    tracing::error!("backup schedule controller stream ended unexpectedly");
}

/// Run the EtcdBackup controller
pub async fn run_backup_controller(ctx: Arc<Context>) {
    tracing::info!("starting controller for EtcdBackup resources");

    let backups: Api<EtcdBackup> = Api::all(ctx.client.clone());
    let watcher_config = WatcherConfig::default().any_semantic();

    Controller::new(backups, watcher_config)
        .run(controller::backup::reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((obj, _action)) => tracing::debug!("reconciled backup {}", obj.name),
                Err(e) => tracing::error!("backup reconciliation error: {:?}", e),
            }
        })
        .await;

    tracing::error!("backup controller stream ended unexpectedly");
}
