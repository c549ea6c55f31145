//! cert-manager Certificate and Issuer resources
//!
//! Partial client-side models of cert-manager's CRDs, carrying only the
//! fields the operator sets or reads (issuance is observed through
//! `status.notBefore`). The cluster CA is issued by an operator-wide
//! ClusterIssuer; member leaf certificates are issued by the cluster's own
//! CA Issuer.
//!
//! Reference: https://cert-manager.io/docs/concepts/certificate/

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::crd::{EtcdCluster, EtcdMember, CLUSTER_LABEL, FOREGROUND_DELETION_FINALIZER};
use crate::resources::common::owner_reference;

/// cert-manager Certificate
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "cert-manager.io",
    version = "v1",
    kind = "Certificate",
    plural = "certificates",
    namespaced,
    status = "CertificateStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_ca: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common_name: Option<String>,

    /// Name of the Secret cert-manager stores the key pair in
    pub secret_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_template: Option<SecretTemplate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<PrivateKeySpec>,

    pub issuer_ref: IssuerRef,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns_names: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct CertificateStatus {
    /// Start of the issued certificate's validity; unset until issuance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<Time>,
}

#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretTemplate {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrivateKeySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation_policy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<i32>,
}

#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssuerRef {
    pub name: String,
    pub kind: String,
    pub group: String,
}

/// cert-manager Issuer
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "cert-manager.io",
    version = "v1",
    kind = "Issuer",
    plural = "issuers",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct IssuerSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca: Option<CaIssuer>,
}

#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CaIssuer {
    pub secret_name: String,
}

/// Self-signed CA certificate for a cluster, issued by the operator-wide
/// ClusterIssuer. ECDSA-256, CN is the cluster's service domain.
pub fn generate_ca_certificate(cluster: &EtcdCluster, cluster_issuer: &str) -> Certificate {
    let mut ca = Certificate::new(
        &cluster.name_any(),
        CertificateSpec {
            is_ca: Some(true),
            common_name: Some(cluster.common_name()),
            secret_name: cluster.ca_secret_name(),
            secret_template: Some(SecretTemplate {
                labels: BTreeMap::from([(CLUSTER_LABEL.to_string(), cluster.name_any())]),
            }),
            private_key: Some(PrivateKeySpec {
                rotation_policy: None,
                algorithm: Some("ECDSA".to_string()),
                encoding: None,
                size: Some(256),
            }),
            issuer_ref: IssuerRef {
                name: cluster_issuer.to_string(),
                kind: "ClusterIssuer".to_string(),
                group: "cert-manager.io".to_string(),
            },
            dns_names: Vec::new(),
        },
    );
    ca.metadata.namespace = cluster.namespace();
    ca.metadata.finalizers = Some(vec![FOREGROUND_DELETION_FINALIZER.to_string()]);
    ca.metadata.owner_references = owner_reference(cluster).map(|r| vec![r]);
    ca
}

/// CA Issuer backed by the cluster's CA secret
pub fn generate_ca_issuer(cluster: &EtcdCluster) -> Issuer {
    let mut issuer = Issuer::new(
        &cluster.name_any(),
        IssuerSpec {
            ca: Some(CaIssuer {
                secret_name: cluster.ca_secret_name(),
            }),
        },
    );
    issuer.metadata.namespace = cluster.namespace();
    issuer.metadata.finalizers = Some(vec![FOREGROUND_DELETION_FINALIZER.to_string()]);
    issuer.metadata.owner_references = owner_reference(cluster).map(|r| vec![r]);
    issuer
}

/// Leaf certificate for one member, `suffix` is "peer" or "client".
///
/// RSA-2048 with rotation on renewal; the only SAN is the member's pod DNS
/// name within the headless service.
pub fn generate_member_certificate(member: &EtcdMember, suffix: &str) -> Certificate {
    let name = member.certificate_name(suffix);
    let mut cert = Certificate::new(
        &name,
        CertificateSpec {
            is_ca: None,
            common_name: None,
            secret_name: name.clone(),
            secret_template: Some(SecretTemplate {
                labels: BTreeMap::from([(
                    CLUSTER_LABEL.to_string(),
                    member.spec.cluster_name.clone(),
                )]),
            }),
            private_key: Some(PrivateKeySpec {
                rotation_policy: Some("Always".to_string()),
                algorithm: Some("RSA".to_string()),
                encoding: Some("PKCS1".to_string()),
                size: Some(2048),
            }),
            issuer_ref: IssuerRef {
                name: member.spec.cluster_name.clone(),
                kind: "Issuer".to_string(),
                group: "cert-manager.io".to_string(),
            },
            dns_names: vec![member.fqdn()],
        },
    );
    cert.metadata.namespace = member.namespace();
    cert.metadata.finalizers = Some(vec![FOREGROUND_DELETION_FINALIZER.to_string()]);
    cert.metadata.owner_references = owner_reference(member).map(|r| vec![r]);
    cert
}
