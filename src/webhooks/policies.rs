//! Admission policies for EtcdCluster
//!
//! Pure functions over (new, old) pairs so every rule is testable without a
//! server.

use crate::crd::{ClusterPhase, EtcdCluster};

/// Result of a policy validation
#[derive(Debug)]
pub struct ValidationResult {
    pub allowed: bool,
    pub reason: Option<String>,
    pub message: Option<String>,
}

impl ValidationResult {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
            message: None,
        }
    }

    pub fn denied(reason: &str, message: &str) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.to_string()),
            message: Some(message.to_string()),
        }
    }
}

/// CREATE rule: quorum arithmetic needs an odd member count.
pub fn validate_create(cluster: &EtcdCluster) -> ValidationResult {
    if cluster.spec.size % 2 == 0 {
        return ValidationResult::denied(
            "EvenClusterSize",
            &format!(
                "size of cluster should be odd, got {}",
                cluster.spec.size
            ),
        );
    }

    ValidationResult::allowed()
}

/// UPDATE rules:
/// - no chasing versions: a cluster mid-update keeps its target version
/// - the backup source cannot be changed on a live cluster
/// - the size cannot be changed at all
pub fn validate_update(cluster: &EtcdCluster, old: &EtcdCluster) -> ValidationResult {
    if old.phase() == Some(ClusterPhase::Updating) && cluster.spec.version != old.spec.version {
        return ValidationResult::denied(
            "VersionChangeWhileUpdating",
            "unable to change cluster version on updating cluster",
        );
    }

    if cluster.spec.backup != old.spec.backup {
        return ValidationResult::denied(
            "BackupSourceImmutable",
            "unable to restore working cluster from backup, please create new one",
        );
    }

    if cluster.spec.size != old.spec.size {
        return ValidationResult::denied(
            "SizeImmutable",
            "changing cluster size currently not supported",
        );
    }

    ValidationResult::allowed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{EtcdClusterSpec, EtcdClusterStatus};

    fn cluster(size: i32, version: &str, backup: Option<&str>) -> EtcdCluster {
        EtcdCluster::new(
            "c",
            EtcdClusterSpec {
                version: version.to_string(),
                size,
                backup: backup.map(String::from),
                backup_creation_period: Default::default(),
                backup_retention_period: Default::default(),
            },
        )
    }

    #[test]
    fn test_even_size_denied_on_create() {
        let result = validate_create(&cluster(4, "3.5.6", None));
        assert!(!result.allowed);
        assert!(result.message.unwrap().contains("should be odd"));

        assert!(validate_create(&cluster(3, "3.5.6", None)).allowed);
        assert!(validate_create(&cluster(1, "3.5.6", None)).allowed);
    }

    #[test]
    fn test_version_change_denied_while_updating() {
        let mut old = cluster(3, "3.5.6", None);
        old.status = Some(EtcdClusterStatus {
            phase: Some(ClusterPhase::Updating),
            ..Default::default()
        });

        let new = cluster(3, "3.5.7", None);
        assert!(!validate_update(&new, &old).allowed);

        // Same edit is fine once the cluster settles
        old.status.as_mut().unwrap().phase = Some(ClusterPhase::Running);
        assert!(validate_update(&new, &old).allowed);
    }

    #[test]
    fn test_backup_change_denied() {
        let old = cluster(3, "3.5.6", None);
        let new = cluster(3, "3.5.6", Some("c-1700000000"));
        let result = validate_update(&new, &old);
        assert!(!result.allowed);
        assert_eq!(result.reason.as_deref(), Some("BackupSourceImmutable"));
    }

    #[test]
    fn test_size_change_denied() {
        let old = cluster(3, "3.5.6", None);
        let new = cluster(5, "3.5.6", None);
        let result = validate_update(&new, &old);
        assert!(!result.allowed);
        assert!(result.message.unwrap().contains("changing cluster size"));
    }

    #[test]
    fn test_unchanged_update_allowed() {
        let old = cluster(3, "3.5.6", None);
        let new = cluster(3, "3.5.6", None);
        assert!(validate_update(&new, &old).allowed);
    }
}
