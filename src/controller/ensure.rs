//! Level-triggered primitives: create-or-skip, requeue, status writes
//!
//! Children whose desired spec is recomputed every reconcile are applied
//! with create-or-skip semantics: an existing child is never overwritten by
//! a re-sync, so fields owned by other writers (repair and rotation flags on
//! members, issued certificate data) survive stale caches and watch replays.
//! Explicit spec mutations go through `kube::Api::replace` instead.

use std::fmt::Debug;
use std::time::Duration;

use kube::api::{Patch, PatchParams, PostParams};
use kube::runtime::controller::Action;
use kube::{Api, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::controller::error::{Error, Result};
use crate::resources::common::FIELD_MANAGER;

/// Outcome of a create-or-skip call
pub enum Ensured<K> {
    /// The object did not exist and was created
    Created(K),
    /// The live object, untouched
    Existing(K),
}

impl<K> Ensured<K> {
    pub fn created(&self) -> bool {
        matches!(self, Ensured::Created(_))
    }

    pub fn into_inner(self) -> K {
        match self {
            Ensured::Created(obj) | Ensured::Existing(obj) => obj,
        }
    }
}

/// Create `desired` unless an object with the same name already exists.
///
/// A create race losing to another writer is indistinguishable from the
/// object having existed all along, so it is reported as `Existing`.
pub async fn ensure<K>(api: &Api<K>, desired: &K) -> Result<Ensured<K>>
where
    K: Resource + Clone + Debug + DeserializeOwned + Serialize,
{
    let name = desired.name_any();

    if let Some(existing) = api.get_opt(&name).await? {
        return Ok(Ensured::Existing(existing));
    }

    match api.create(&PostParams::default(), desired).await {
        Ok(created) => {
            debug!("created {}", name);
            Ok(Ensured::Created(created))
        }
        Err(kube::Error::Api(e)) if e.code == 409 => Ok(Ensured::Existing(api.get(&name).await?)),
        Err(e) => Err(e.into()),
    }
}

/// Best-effort status write: conflicts are swallowed because the next
/// reconcile recomputes status from scratch anyway.
pub async fn write_status<K, S>(api: &Api<K>, name: &str, status: &S)
where
    K: Resource + Clone + Debug + DeserializeOwned,
    S: Serialize,
{
    let patch = serde_json::json!({ "status": status });
    if let Err(e) = api
        .patch_status(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
        .await
    {
        let err: Error = e.into();
        if !err.is_conflict() {
            warn!("unable to update status of {}: {}", name, err);
        }
    }
}

/// Re-enter the workqueue immediately
pub fn requeue() -> Action {
    Action::requeue(Duration::from_secs(1))
}

/// Schedule a timer; the only legal form of sleep inside a reconcile
pub fn requeue_after(delay: Duration) -> Action {
    Action::requeue(delay)
}

/// Observed state matches desired state for this tick
pub fn done() -> Action {
    Action::await_change()
}
