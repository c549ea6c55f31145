//! Kubernetes client construction for the CLI

use std::path::PathBuf;

use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};

/// A client plus the namespace requests are scoped to
pub struct CliClient {
    pub client: Client,
    pub namespace: String,
}

impl CliClient {
    /// Build a client from an explicit kubeconfig path or the inferred
    /// environment (in-cluster config or `$KUBECONFIG`/`~/.kube/config`).
    pub async fn new(
        kubeconfig: Option<PathBuf>,
        namespace: Option<String>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let config = match kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path)?;
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?
            }
            None => Config::infer().await?,
        };

        let namespace = namespace.unwrap_or_else(|| config.default_namespace.clone());

        Ok(Self {
            client: Client::try_from(config)?,
            namespace,
        })
    }
}
