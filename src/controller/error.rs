//! Error types shared by the reconcilers

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("quorum client error: {0}")]
    EtcdError(#[from] etcd_client::Error),

    #[error("object store error: {0}")]
    StoreError(String),

    #[error("timed out during {0}")]
    Timeout(&'static str),

    #[error("missing object key: {0}")]
    MissingObjectKey(&'static str),

    /// A backup without its cluster label can never be matched to a stored
    /// object again, so reconciling it would orphan the snapshot.
    #[error("backup is not labeled with its cluster")]
    MissingClusterLabel,
}

impl Error {
    /// Whether requeueing can reasonably fix this error
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::KubeError(e) => match e {
                kube::Error::Api(api_err) => {
                    let code = api_err.code;
                    // 409 Conflict and 429 TooManyRequests resolve on retry;
                    // other 4xx need operator intervention
                    if (400..500).contains(&code) {
                        code == 409 || code == 429
                    } else {
                        true
                    }
                }
                _ => true,
            },
            Error::EtcdError(_) => true,
            Error::StoreError(_) => true,
            Error::Timeout(_) => true,
            Error::SerializationError(_) => false,
            Error::MissingObjectKey(_) => false,
            Error::MissingClusterLabel => false,
        }
    }

    /// Whether this is a Kubernetes write conflict (stale resource version)
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::KubeError(kube::Error::Api(e)) if e.code == 409)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Exponential backoff for the error policy
#[derive(Clone, Debug)]
pub struct BackoffConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Random jitter factor (0.0 to 1.0)
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(300),
            multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

impl BackoffConfig {
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay_secs =
            self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);

        let jitter_range = base_delay_secs * self.jitter;
        let jitter = rand::random::<f64>() * jitter_range * 2.0 - jitter_range;
        let delay_with_jitter = (base_delay_secs + jitter).max(0.0);

        Duration::from_secs_f64(delay_with_jitter.min(self.max_delay.as_secs_f64()))
    }

    /// Non-retryable errors wait out the full max delay so a human can step in
    pub fn delay_for_error(&self, error: &Error, attempt: u32) -> Duration {
        if error.is_retryable() {
            self.delay_for_attempt(attempt)
        } else {
            self.max_delay
        }
    }
}
