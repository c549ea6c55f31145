//! Validating admission webhook for EtcdCluster resources
//!
//! Enforces the cluster policy before objects are persisted: odd sizes,
//! immutable size and backup source, no version changes mid-update.

mod policies;
mod server;

pub use policies::{validate_create, validate_update, ValidationResult};
pub use server::{
    run_webhook_server, AdmissionRequest, AdmissionResponse, AdmissionReview,
    AdmissionReviewResponse, WebhookError, WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT,
};
