//! Shared context passed to every reconciler

use std::sync::Arc;

use kube::Client;

use crate::store::BackupStore;

/// Shared state for the controllers.
///
/// Holds the single cache-backed client, the name of the operator-wide
/// ClusterIssuer used to sign cluster CAs, and the snapshot store. The store
/// is optional so controllers that never touch it can be exercised without
/// S3 credentials.
#[derive(Clone)]
pub struct Context {
    pub client: Client,
    pub cluster_issuer: String,
    pub store: Option<Arc<BackupStore>>,
}

impl Context {
    pub fn new(client: Client, cluster_issuer: impl Into<String>) -> Self {
        Self {
            client,
            cluster_issuer: cluster_issuer.into(),
            store: None,
        }
    }

    pub fn with_store(mut self, store: Arc<BackupStore>) -> Self {
        self.store = Some(store);
        self
    }
}
