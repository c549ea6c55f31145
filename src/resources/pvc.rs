//! Persistent volume claim holding one member's data directory

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    PersistentVolumeClaim, PersistentVolumeClaimSpec, VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::core::ObjectMeta;
use kube::ResourceExt;

use crate::crd::{EtcdMember, FOREGROUND_DELETION_FINALIZER};
use crate::resources::common::{owner_reference, selector_labels};

/// Storage request per member
const VOLUME_SIZE: &str = "30Gi";

pub fn generate_pvc(member: &EtcdMember) -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(member.name_any()),
            namespace: member.namespace(),
            labels: Some(selector_labels(&member.spec.cluster_name)),
            finalizers: Some(vec![FOREGROUND_DELETION_FINALIZER.to_string()]),
            owner_references: owner_reference(member).map(|r| vec![r]),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "storage".to_string(),
                    Quantity(VOLUME_SIZE.to_string()),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}
