//! Client for the managed quorum's membership and snapshot RPCs
//!
//! The only wire protocol the controllers speak to the data plane. TLS is
//! anchored on the cluster's own generated CA, read back from the CA secret;
//! nothing outside that chain is trusted.

use std::time::Duration;

use etcd_client::{Certificate, ConnectOptions, TlsOptions};
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};

use crate::controller::error::{Error, Result};

/// Dial timeout for reaching any endpoint
const DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-request timeout; bounds repair-time membership surgery
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// One entry of the quorum's member list
#[derive(Debug, Clone)]
pub struct QuorumMember {
    pub id: u64,
    pub name: String,
}

/// Thin wrapper around the etcd client, scoped to the operations the
/// reconcilers need.
pub struct QuorumClient {
    inner: etcd_client::Client,
}

impl QuorumClient {
    /// Read the cluster's CA bundle from its `<cluster>-ca` secret.
    pub async fn cluster_ca(client: &Client, ns: &str, cluster_name: &str) -> Result<Vec<u8>> {
        let secrets: Api<Secret> = Api::namespaced(client.clone(), ns);
        let secret = secrets.get(&format!("{cluster_name}-ca")).await?;

        secret
            .data
            .and_then(|data| data.get("ca.crt").cloned())
            .map(|bytes| bytes.0)
            .ok_or(Error::MissingObjectKey("ca.crt"))
    }

    pub async fn connect(endpoints: Vec<String>, ca_pem: Vec<u8>) -> Result<Self> {
        let tls = TlsOptions::new().ca_certificate(Certificate::from_pem(ca_pem));
        let options = ConnectOptions::new()
            .with_tls(tls)
            .with_connect_timeout(DIAL_TIMEOUT)
            .with_timeout(REQUEST_TIMEOUT);

        let inner = etcd_client::Client::connect(endpoints, Some(options)).await?;

        Ok(Self { inner })
    }

    pub async fn members(&mut self) -> Result<Vec<QuorumMember>> {
        let response = self.inner.member_list().await?;

        Ok(response
            .members()
            .iter()
            .map(|member| QuorumMember {
                id: member.id(),
                name: member.name().to_string(),
            })
            .collect())
    }

    pub async fn remove_member(&mut self, id: u64) -> Result<()> {
        self.inner.member_remove(id).await?;
        Ok(())
    }

    pub async fn add_member(&mut self, peer_url: String) -> Result<()> {
        self.inner.member_add([peer_url], None).await?;
        Ok(())
    }

    /// Stream a point-in-time snapshot of the store into memory
    pub async fn snapshot(&mut self) -> Result<Vec<u8>> {
        let mut stream = self.inner.snapshot().await?;

        let mut buf = Vec::new();
        while let Some(response) = stream.message().await? {
            buf.extend_from_slice(response.blob());
        }

        Ok(buf)
    }
}
