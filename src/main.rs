use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use kube::Client;
use kube_leader_election::{LeaseLock, LeaseLockParams};
use tokio::signal;
use tracing::{error, info, warn};

use etcd_operator::health::{run_health_server, run_metrics_server, HealthState};
use etcd_operator::store::BackupStore;
use etcd_operator::webhooks::{run_webhook_server, WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH};
use etcd_operator::{
    run_backup_controller, run_backup_schedule_controller, run_cluster_controller,
    run_member_controller, Context,
};

/// Lease configuration
const LEASE_NAME: &str = "etcd-operator-leader";
const LEASE_TTL_SECS: u64 = 15;
const LEASE_RENEW_INTERVAL_SECS: u64 = 5;

/// Grace period for in-flight reconciliations to complete during shutdown
const SHUTDOWN_GRACE_PERIOD_SECS: u64 = 5;

#[derive(Parser, Debug)]
#[command(name = "etcd-operator", about = "Operator managing replicated etcd clusters")]
struct Args {
    /// ClusterIssuer resource used to sign each cluster's CA
    #[arg(long, default_value = "")]
    cluster_issuer: String,

    /// Bucket in S3 for backup uploads
    #[arg(long, default_value = "")]
    s3_bucket: String,

    /// Folder in S3 for backup uploads
    #[arg(long, default_value = "")]
    s3_prefix: String,

    /// Override the default S3 URL
    #[arg(long, default_value = "")]
    s3_endpoint: String,

    /// The address the metric endpoint binds to
    #[arg(long, default_value = "0.0.0.0:8080")]
    metrics_bind_address: SocketAddr,

    /// The address the probe endpoint binds to
    #[arg(long, default_value = "0.0.0.0:8081")]
    health_probe_bind_address: SocketAddr,

    /// Enable leader election so only one operator instance reconciles
    #[arg(long)]
    leader_elect: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Install the TLS crypto provider before any TLS operations. A second
    // install attempt fails, which is fine as long as one is in place.
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
        && rustls::crypto::CryptoProvider::get_default().is_none()
    {
        return Err("failed to install rustls crypto provider".into());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("etcd_operator=info".parse()?)
                .add_directive("kube=info".parse()?),
        )
        .init();

    info!("starting etcd-operator");

    let client = Client::try_default().await?;
    info!("connected to Kubernetes cluster");

    let store = BackupStore::new(
        args.s3_bucket,
        args.s3_prefix,
        Some(args.s3_endpoint).filter(|e| !e.is_empty()),
    )
    .await;
    let ctx = Arc::new(Context::new(client.clone(), args.cluster_issuer).with_store(Arc::new(store)));

    let health_state = Arc::new(HealthState::new());

    // Probes and metrics answer even before leadership is acquired
    let health_handle = {
        let health_state = health_state.clone();
        let addr = args.health_probe_bind_address;
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health_state, addr).await {
                error!("health server error: {}", e);
            }
        })
    };
    let metrics_handle = {
        let health_state = health_state.clone();
        let addr = args.metrics_bind_address;
        tokio::spawn(async move {
            if let Err(e) = run_metrics_server(health_state, addr).await {
                error!("metrics server error: {}", e);
            }
        })
    };

    // The webhook answers admission requests regardless of leadership
    let webhook_handle =
        if Path::new(WEBHOOK_CERT_PATH).exists() && Path::new(WEBHOOK_KEY_PATH).exists() {
            info!("TLS certificates found, starting webhook server");
            Some(tokio::spawn(async move {
                if let Err(e) = run_webhook_server(WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH).await {
                    error!("webhook server error: {}", e);
                }
            }))
        } else {
            info!(
                "TLS certificates not found at {} and {}, webhook server disabled",
                WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH
            );
            None
        };

    let lease_renewal_handle = if args.leader_elect {
        Some(acquire_leadership(client.clone()).await)
    } else {
        None
    };

    health_state.set_ready(true).await;

    let cluster_handle = {
        let ctx = ctx.clone();
        let health = health_state.clone();
        tokio::spawn(async move { run_cluster_controller(ctx, Some(health)).await })
    };
    let member_handle = {
        let ctx = ctx.clone();
        let health = health_state.clone();
        tokio::spawn(async move { run_member_controller(ctx, Some(health)).await })
    };
    let schedule_handle = {
        let ctx = ctx.clone();
        tokio::spawn(async move { run_backup_schedule_controller(ctx).await })
    };
    let backup_handle = {
        let ctx = ctx.clone();
        tokio::spawn(async move { run_backup_controller(ctx).await })
    };

    let webhook_future = async {
        match webhook_handle {
            Some(handle) => {
                if let Err(e) = handle.await {
                    error!("webhook server task panicked: {}", e);
                }
            }
            None => std::future::pending::<()>().await,
        }
    };
    let lease_future = async {
        match lease_renewal_handle {
            Some(handle) => {
                if let Err(e) = handle.await {
                    error!("lease renewal task panicked: {}", e);
                }
            }
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        result = cluster_handle => {
            if let Err(e) = result {
                error!("cluster controller task panicked: {}", e);
            }
        }
        result = member_handle => {
            if let Err(e) = result {
                error!("member controller task panicked: {}", e);
            }
        }
        result = schedule_handle => {
            if let Err(e) = result {
                error!("backup schedule controller task panicked: {}", e);
            }
        }
        result = backup_handle => {
            if let Err(e) = result {
                error!("backup controller task panicked: {}", e);
            }
        }
        result = health_handle => {
            if let Err(e) = result {
                error!("health server task panicked: {}", e);
            }
        }
        result = metrics_handle => {
            if let Err(e) = result {
                error!("metrics server task panicked: {}", e);
            }
        }
        _ = webhook_future => {}
        _ = lease_future => {}
        _ = shutdown_signal() => {
            info!("received shutdown signal, initiating graceful shutdown");

            health_state.set_ready(false).await;

            info!(
                "waiting {}s for in-flight reconciliations to complete",
                SHUTDOWN_GRACE_PERIOD_SECS
            );
            tokio::time::sleep(Duration::from_secs(SHUTDOWN_GRACE_PERIOD_SECS)).await;
        }
    }

    info!("operator stopped");
    Ok(())
}

/// Block until this instance holds the leader lease, then keep renewing it
/// in the background. Losing the lease exits the process so the platform
/// restarts it back into the election.
async fn acquire_leadership(client: Client) -> tokio::task::JoinHandle<()> {
    let holder_id = std::env::var("POD_NAME").unwrap_or_else(|_| {
        warn!("POD_NAME not set, using hostname");
        hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string())
    });
    let namespace = std::env::var("POD_NAMESPACE").unwrap_or_else(|_| {
        warn!("POD_NAMESPACE not set, using 'default'");
        "default".to_string()
    });

    info!(
        holder_id = %holder_id,
        namespace = %namespace,
        lease_name = LEASE_NAME,
        "waiting to acquire leadership"
    );

    let lease_lock = LeaseLock::new(
        client,
        &namespace,
        LeaseLockParams {
            holder_id,
            lease_name: LEASE_NAME.to_string(),
            lease_ttl: Duration::from_secs(LEASE_TTL_SECS),
        },
    );

    loop {
        match lease_lock.try_acquire_or_renew().await {
            Ok(result) if result.acquired_lease => {
                info!("acquired leadership");
                break;
            }
            Ok(_) => info!("another instance is leader, waiting"),
            Err(e) => warn!("failed to acquire lease: {}, retrying", e),
        }
        tokio::time::sleep(Duration::from_secs(LEASE_RENEW_INTERVAL_SECS)).await;
    }

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(LEASE_RENEW_INTERVAL_SECS)).await;

            match lease_lock.try_acquire_or_renew().await {
                Ok(result) if !result.acquired_lease => {
                    error!("lost leadership, shutting down");
                    std::process::exit(1);
                }
                Ok(_) => {}
                Err(e) => {
                    error!("failed to renew lease: {}, shutting down", e);
                    std::process::exit(1);
                }
            }
        }
    })
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
