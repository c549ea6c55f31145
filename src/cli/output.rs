//! Output formatting: text tables for lists, YAML/JSON everywhere

use clap::ValueEnum;
use comfy_table::Table;
use kube::ResourceExt;
use serde::Serialize;

use crate::crd::{EtcdBackup, EtcdCluster, EtcdClusterStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Yaml,
    Json,
}

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Cluster trimmed down to the fields a human cares about, durations
/// humanized
#[derive(Serialize)]
struct PrettyCluster {
    name: String,
    namespace: String,
    size: i32,
    version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    backup: Option<String>,
    backup_creation_period: String,
    backup_retention_period: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<EtcdClusterStatus>,
}

impl From<&EtcdCluster> for PrettyCluster {
    fn from(cluster: &EtcdCluster) -> Self {
        Self {
            name: cluster.name_any(),
            namespace: cluster.namespace().unwrap_or_default(),
            size: cluster.spec.size,
            version: cluster.spec.version.clone(),
            backup: cluster.spec.backup.clone(),
            backup_creation_period: humantime::format_duration(cluster.spec.backup_creation_period)
                .to_string(),
            backup_retention_period: humantime::format_duration(
                cluster.spec.backup_retention_period,
            )
            .to_string(),
            status: cluster.status.clone(),
        }
    }
}

#[derive(Serialize)]
struct PrettyBackup {
    name: String,
    namespace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    cluster: Option<String>,
    retention_period: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    finished: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
}

impl From<&EtcdBackup> for PrettyBackup {
    fn from(backup: &EtcdBackup) -> Self {
        let status = backup.status.as_ref();
        Self {
            name: backup.name_any(),
            namespace: backup.namespace().unwrap_or_default(),
            cluster: backup.cluster_name().map(String::from),
            retention_period: humantime::format_duration(backup.spec.retention_period).to_string(),
            finished: status
                .and_then(|s| s.finished_time.as_ref())
                .map(|t| t.0.format(TIME_FORMAT).to_string()),
            url: status.and_then(|s| s.url.clone()),
        }
    }
}

fn print_serialized<T: Serialize>(value: &T, output: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string(value)?),
        // Text output of a single object falls back to YAML
        OutputFormat::Yaml | OutputFormat::Text => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

pub fn print_cluster(
    cluster: &EtcdCluster,
    output: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    print_serialized(&PrettyCluster::from(cluster), output)
}

pub fn print_clusters(
    clusters: &[EtcdCluster],
    output: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    if output != OutputFormat::Text {
        let pretty: Vec<PrettyCluster> = clusters.iter().map(PrettyCluster::from).collect();
        return print_serialized(&pretty, output);
    }

    let mut table = Table::new();
    table.set_header(vec!["NAME", "CREATED AT", "SIZE", "VERSION", "STATUS"]);
    for cluster in clusters {
        table.add_row(vec![
            cluster.name_any(),
            cluster
                .creation_timestamp()
                .map(|t| t.0.format(TIME_FORMAT).to_string())
                .unwrap_or_default(),
            cluster.spec.size.to_string(),
            cluster.spec.version.clone(),
            cluster
                .phase()
                .map(|p| p.to_string())
                .unwrap_or_default(),
        ]);
    }
    println!("{table}");

    Ok(())
}

pub fn print_backups(
    backups: &[EtcdBackup],
    output: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    if output != OutputFormat::Text {
        let pretty: Vec<PrettyBackup> = backups.iter().map(PrettyBackup::from).collect();
        return print_serialized(&pretty, output);
    }

    let mut table = Table::new();
    table.set_header(vec!["NAME", "CLUSTER", "FINISHED AT", "RETENTION", "URL"]);
    for backup in backups {
        let pretty = PrettyBackup::from(backup);
        table.add_row(vec![
            pretty.name,
            pretty.cluster.unwrap_or_default(),
            pretty.finished.unwrap_or_default(),
            pretty.retention_period,
            pretty.url.unwrap_or_default(),
        ]);
    }
    println!("{table}");

    Ok(())
}
