//! The `etcdopsctl` command line interface
//!
//! Imperative wrappers over the declarative resources: create and mutate
//! clusters, inspect them, and list backups. Mutating commands watch the
//! cluster until the operator has converged before printing the result.

mod client;
mod commands;
mod output;

pub use client::CliClient;
pub use output::OutputFormat;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "etcdopsctl", about = "etcdopsctl controls etcd clusters")]
pub struct Cli {
    /// Path to the kubeconfig file to use for CLI requests
    #[arg(long, global = true)]
    pub kubeconfig: Option<PathBuf>,

    /// If present, the namespace scope for this CLI request
    #[arg(long, global = true)]
    pub namespace: Option<String>,

    /// Set the output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create an etcd cluster
    Create {
        name: String,

        /// etcd version; may be omitted when restoring from a backup
        version: Option<String>,

        /// Number of cluster members
        #[arg(long, default_value_t = 3)]
        size: i32,

        /// Backup used for a cluster restoration
        #[arg(long)]
        from_backup: Option<String>,

        /// Creation policy of automated backups
        #[arg(long, value_parser = humantime::parse_duration, default_value = "24h")]
        backup_creation_period: Duration,

        /// Retention policy of automated backups
        #[arg(long, value_parser = humantime::parse_duration, default_value = "7d")]
        backup_retention_period: Duration,
    },

    /// Get information about an etcd cluster
    Get { name: String },

    /// List available etcd clusters
    List,

    /// Update an etcd cluster
    Update {
        name: String,

        /// Number of cluster members
        #[arg(long)]
        size: Option<i32>,

        /// Version used in cluster
        #[arg(long)]
        version: Option<String>,

        /// Creation policy of automated backups
        #[arg(long, value_parser = humantime::parse_duration)]
        backup_creation_period: Option<Duration>,

        /// Retention policy of automated backups
        #[arg(long, value_parser = humantime::parse_duration)]
        backup_retention_period: Option<Duration>,
    },

    /// Delete an etcd cluster
    Delete { name: String },

    /// List available backups in namespace, possibly for a specific etcd cluster
    ListBackups { cluster: Option<String> },
}

pub async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let client = CliClient::new(cli.kubeconfig, cli.namespace).await?;
    let output = cli.output;

    match cli.command {
        Command::Create {
            name,
            version,
            size,
            from_backup,
            backup_creation_period,
            backup_retention_period,
        } => {
            commands::create(
                &client,
                commands::CreateParams {
                    name,
                    version,
                    size,
                    from_backup,
                    backup_creation_period,
                    backup_retention_period,
                },
                output,
            )
            .await
        }
        Command::Get { name } => commands::get(&client, &name, output).await,
        Command::List => commands::list(&client, output).await,
        Command::Update {
            name,
            size,
            version,
            backup_creation_period,
            backup_retention_period,
        } => {
            commands::update(
                &client,
                commands::UpdateParams {
                    name,
                    size,
                    version,
                    backup_creation_period,
                    backup_retention_period,
                },
                output,
            )
            .await
        }
        Command::Delete { name } => commands::delete(&client, &name).await,
        Command::ListBackups { cluster } => {
            commands::list_backups(&client, cluster.as_deref(), output).await
        }
    }
}
