//! The four reconcilers and their shared plumbing
//!
//! Control flow is level-triggered: every reconcile recomputes the full
//! desired state for its resource and applies it idempotently. A reconcile
//! ends in one of three ways: done (wait for the next event), requeue now
//! (progress was made, check again), or requeue after a delay.

pub mod backup;
pub mod backup_schedule;
pub mod cluster;
pub mod context;
pub mod ensure;
pub mod error;
pub mod member;

pub use context::Context;
pub use ensure::{done, ensure, requeue, requeue_after, Ensured};
pub use error::{BackoffConfig, Error, Result};

use std::sync::Arc;

use kube::runtime::controller::Action;
use kube::ResourceExt;
use tracing::{error, warn};

/// Error policy shared by all controllers: classify and requeue with backoff.
pub fn error_policy<K>(obj: Arc<K>, err: &Error, _ctx: Arc<Context>) -> Action
where
    K: kube::Resource,
{
    let name = obj.name_any();
    let delay = BackoffConfig::default().delay_for_error(err, 0);

    if err.is_retryable() {
        warn!("retryable error for {}: {}, requeuing in {:?}", name, err, delay);
    } else {
        error!(
            "non-retryable error for {}: {}, requeuing in {:?} for manual intervention",
            name, err, delay
        );
    }

    Action::requeue(delay)
}
