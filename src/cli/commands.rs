//! Command implementations

use std::time::Duration;

use kube::api::{DeleteParams, ListParams, PostParams};
use kube::core::ObjectMeta;
use kube::runtime::wait::{await_condition, conditions};
use kube::{Api, ResourceExt};

use crate::cli::output::{print_backups, print_cluster, print_clusters, OutputFormat};
use crate::cli::CliClient;
use crate::crd::{
    ClusterPhase, EtcdBackup, EtcdCluster, EtcdClusterSpec, CLEANUP_SECRETS_FINALIZER,
    CLUSTER_LABEL, FOREGROUND_DELETION_FINALIZER,
};

type CliResult = Result<(), Box<dyn std::error::Error>>;

pub struct CreateParams {
    pub name: String,
    pub version: Option<String>,
    pub size: i32,
    pub from_backup: Option<String>,
    pub backup_creation_period: Duration,
    pub backup_retention_period: Duration,
}

pub async fn create(client: &CliClient, params: CreateParams, output: OutputFormat) -> CliResult {
    if params.version.is_none() && params.from_backup.is_none() {
        return Err("one of --from-backup or VERSION is required".into());
    }

    let cluster = EtcdCluster {
        metadata: ObjectMeta {
            name: Some(params.name.clone()),
            namespace: Some(client.namespace.clone()),
            finalizers: Some(vec![
                FOREGROUND_DELETION_FINALIZER.to_string(),
                CLEANUP_SECRETS_FINALIZER.to_string(),
            ]),
            ..Default::default()
        },
        spec: EtcdClusterSpec {
            version: params.version.unwrap_or_default(),
            size: params.size,
            backup: params.from_backup,
            backup_creation_period: params.backup_creation_period,
            backup_retention_period: params.backup_retention_period,
        },
        status: None,
    };

    let api: Api<EtcdCluster> = Api::namespaced(client.client.clone(), &client.namespace);
    api.create(&PostParams::default(), &cluster).await?;

    eprintln!("waiting for cluster \"{}\" to run...", params.name);
    let running = await_condition(api, &params.name, |obj: Option<&EtcdCluster>| {
        obj.is_some_and(|c| c.phase() == Some(ClusterPhase::Running))
    })
    .await?;

    match running {
        Some(cluster) => print_cluster(&cluster, output),
        None => Err(format!("cluster \"{}\" disappeared while waiting", params.name).into()),
    }
}

pub async fn get(client: &CliClient, name: &str, output: OutputFormat) -> CliResult {
    let api: Api<EtcdCluster> = Api::namespaced(client.client.clone(), &client.namespace);

    match api.get_opt(name).await? {
        Some(cluster) => print_cluster(&cluster, output),
        None => Err(format!("cluster \"{name}\" not found").into()),
    }
}

pub async fn list(client: &CliClient, output: OutputFormat) -> CliResult {
    let api: Api<EtcdCluster> = Api::namespaced(client.client.clone(), &client.namespace);
    let clusters = api.list(&ListParams::default()).await?;

    print_clusters(&clusters.items, output)
}

pub struct UpdateParams {
    pub name: String,
    pub size: Option<i32>,
    pub version: Option<String>,
    pub backup_creation_period: Option<Duration>,
    pub backup_retention_period: Option<Duration>,
}

pub async fn update(client: &CliClient, params: UpdateParams, output: OutputFormat) -> CliResult {
    let api: Api<EtcdCluster> = Api::namespaced(client.client.clone(), &client.namespace);

    let Some(mut cluster) = api.get_opt(&params.name).await? else {
        return Err(format!("cluster \"{}\" not found", params.name).into());
    };

    if let Some(size) = params.size {
        cluster.spec.size = size;
    }
    if let Some(ref version) = params.version {
        cluster.spec.version = version.clone();
    }
    if let Some(period) = params.backup_creation_period {
        cluster.spec.backup_creation_period = period;
    }
    if let Some(period) = params.backup_retention_period {
        cluster.spec.backup_retention_period = period;
    }

    api.replace(&params.name, &PostParams::default(), &cluster)
        .await?;

    // A version bump rolls the members; wait for the observed version to
    // converge before printing.
    if let Some(version) = params.version {
        eprintln!("waiting for cluster \"{}\" to update...", params.name);
        let updated = await_condition(api, &params.name, move |obj: Option<&EtcdCluster>| {
            obj.is_some_and(|c| {
                c.status
                    .as_ref()
                    .is_some_and(|s| s.version == version)
            })
        })
        .await?;

        return match updated {
            Some(cluster) => print_cluster(&cluster, output),
            None => Err(format!("cluster \"{}\" disappeared while waiting", params.name).into()),
        };
    }

    match api.get_opt(&params.name).await? {
        Some(cluster) => print_cluster(&cluster, output),
        None => Ok(()),
    }
}

pub async fn delete(client: &CliClient, name: &str) -> CliResult {
    let api: Api<EtcdCluster> = Api::namespaced(client.client.clone(), &client.namespace);

    let Some(cluster) = api.get_opt(name).await? else {
        return Err(format!("cluster \"{name}\" not found").into());
    };
    let uid = cluster.uid().unwrap_or_default();

    api.delete(name, &DeleteParams::default()).await?;

    eprintln!("waiting for cluster \"{name}\" to be deleted...");
    await_condition(api, name, conditions::is_deleted(&uid)).await?;

    Ok(())
}

pub async fn list_backups(
    client: &CliClient,
    cluster: Option<&str>,
    output: OutputFormat,
) -> CliResult {
    let api: Api<EtcdBackup> = Api::namespaced(client.client.clone(), &client.namespace);

    let mut params = ListParams::default();
    if let Some(cluster) = cluster {
        params = params.labels(&format!("{CLUSTER_LABEL}={cluster}"));
    }

    let backups = api.list(&params).await?;
    print_backups(&backups.items, output)
}
