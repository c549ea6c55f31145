//! Webhook HTTP server handlers
//!
//! Implements the ValidatingAdmissionWebhook HTTP endpoint.

use axum::{http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::policies::{validate_create, validate_update};
use crate::crd::EtcdCluster;

/// Kubernetes AdmissionReview request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReview {
    pub api_version: String,
    pub kind: String,
    pub request: Option<AdmissionRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRequest {
    pub uid: String,
    pub operation: String,
    pub namespace: Option<String>,
    pub name: Option<String>,
    pub object: Option<serde_json::Value>,
    pub old_object: Option<serde_json::Value>,
}

/// AdmissionReview response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReviewResponse {
    pub api_version: String,
    pub kind: String,
    pub response: AdmissionResponse,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionResponse {
    pub uid: String,
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AdmissionStatus>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionStatus {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

fn create_webhook_router() -> Router {
    Router::new().route("/validate", post(validate_cluster))
}

/// Validate EtcdCluster admission webhook handler
async fn validate_cluster(Json(review): Json<AdmissionReview>) -> impl IntoResponse {
    let request = match review.request {
        Some(req) => req,
        None => {
            error!("admission review missing request");
            return (
                StatusCode::BAD_REQUEST,
                Json(create_response(
                    "",
                    false,
                    "Missing request in AdmissionReview",
                    None,
                )),
            );
        }
    };

    let uid = request.uid.clone();
    info!(
        uid = %uid,
        operation = %request.operation,
        namespace = ?request.namespace,
        name = ?request.name,
        "processing admission request"
    );

    // Deletion is always allowed and carries no object
    if request.operation == "DELETE" {
        return (StatusCode::OK, Json(create_response(&uid, true, "", None)));
    }

    let cluster: EtcdCluster = match request.object {
        Some(obj) => match serde_json::from_value(obj) {
            Ok(c) => c,
            Err(e) => {
                error!(error = %e, "failed to parse EtcdCluster");
                return (
                    StatusCode::OK,
                    Json(create_response(
                        &uid,
                        false,
                        &format!("Failed to parse object: {e}"),
                        None,
                    )),
                );
            }
        },
        None => {
            return (
                StatusCode::OK,
                Json(create_response(&uid, false, "Missing object in request", None)),
            );
        }
    };

    let old_cluster: Option<EtcdCluster> = match &request.old_object {
        Some(obj) => match serde_json::from_value(obj.clone()) {
            Ok(c) => Some(c),
            Err(e) => {
                warn!(error = %e, "failed to parse old EtcdCluster, treating as CREATE");
                None
            }
        },
        None => None,
    };

    let result = match old_cluster {
        Some(ref old) => validate_update(&cluster, old),
        None => validate_create(&cluster),
    };

    if result.allowed {
        info!(uid = %uid, "admission request allowed");
        (StatusCode::OK, Json(create_response(&uid, true, "", None)))
    } else {
        let reason = result.reason.unwrap_or_else(|| "ValidationFailed".to_string());
        let message = result
            .message
            .unwrap_or_else(|| "Validation failed".to_string());
        warn!(uid = %uid, reason = %reason, message = %message, "admission request denied");
        (
            StatusCode::OK,
            Json(create_response(&uid, false, &message, Some(&reason))),
        )
    }
}

fn create_response(
    uid: &str,
    allowed: bool,
    message: &str,
    reason: Option<&str>,
) -> AdmissionReviewResponse {
    AdmissionReviewResponse {
        api_version: "admission.k8s.io/v1".to_string(),
        kind: "AdmissionReview".to_string(),
        response: AdmissionResponse {
            uid: uid.to_string(),
            allowed,
            status: if allowed {
                None
            } else {
                Some(AdmissionStatus {
                    code: 403,
                    message: message.to_string(),
                    reason: reason.map(String::from),
                })
            },
        },
    }
}

/// Default path to webhook TLS certificate
pub const WEBHOOK_CERT_PATH: &str = "/etc/webhook/certs/tls.crt";
/// Default path to webhook TLS private key
pub const WEBHOOK_KEY_PATH: &str = "/etc/webhook/certs/tls.key";
/// Default webhook server port
pub const WEBHOOK_PORT: u16 = 9443;

/// Run the webhook server with TLS
pub async fn run_webhook_server(cert_path: &str, key_path: &str) -> Result<(), WebhookError> {
    use axum_server::tls_rustls::RustlsConfig;
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let app = create_webhook_router();

    let config = RustlsConfig::from_pem_file(PathBuf::from(cert_path), PathBuf::from(key_path))
        .await
        .map_err(|e| WebhookError::TlsConfig(e.to_string()))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], WEBHOOK_PORT));
    info!("webhook server listening on {} with TLS", addr);

    axum_server::bind_rustls(addr, config)
        .serve(app.into_make_service())
        .await
        .map_err(|e| WebhookError::Server(e.to_string()))?;

    Ok(())
}

/// Errors that can occur when running the webhook server
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),
    #[error("webhook server error: {0}")]
    Server(String),
}
