//! Secured cluster domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::status::ClusterUpgradeStatus;

/// A secured cluster known to central.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    /// Unique identifier, also used by the sensor to identify itself.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Main image the cluster was deployed from, e.g. `registry/main:4.4.0`.
    pub main_image: String,
    /// Endpoint the upgrader should reach central at.
    pub central_endpoint: String,
    /// Per-cluster opt-out for automatic upgrades.
    pub auto_upgrade_enabled: bool,
    /// When the cluster was registered.
    pub created_at: DateTime<Utc>,
    /// Upgrade bookkeeping, absent until the first sensor connection.
    pub upgrade_status: Option<ClusterUpgradeStatus>,
}

impl Cluster {
    pub fn new(
        name: impl Into<String>,
        main_image: impl Into<String>,
        central_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            main_image: main_image.into(),
            central_endpoint: central_endpoint.into(),
            auto_upgrade_enabled: true,
            created_at: Utc::now(),
            upgrade_status: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_auto_upgrade(mut self, enabled: bool) -> Self {
        self.auto_upgrade_enabled = enabled;
        self
    }

    /// Image to launch the upgrader from, for a given target version.
    pub fn upgrader_image(&self, version: &str) -> String {
        retag_image(&self.main_image, version)
    }

    /// Status record, creating an empty one on first use.
    pub fn upgrade_status_mut(&mut self) -> &mut ClusterUpgradeStatus {
        self.upgrade_status.get_or_insert_with(ClusterUpgradeStatus::default)
    }
}

/// Swap the tag of an image reference for a version, keeping the
/// repository so the upgrader is pulled from the same registry the rest
/// of the deployment came from.
pub fn retag_image(image: &str, version: &str) -> String {
    format!("{}:{}", strip_reference(image), version)
}

/// Drop the digest and tag from an image reference, keeping the repository.
///
/// A trailing `:` segment is only a tag if it contains no `/`; otherwise
/// it is a registry port (`registry:5000/main`).
fn strip_reference(image: &str) -> &str {
    let without_digest = match image.find('@') {
        Some(idx) => &image[..idx],
        None => image,
    };
    match without_digest.rfind(':') {
        Some(idx) if !without_digest[idx + 1..].contains('/') => &without_digest[..idx],
        _ => without_digest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upgrader_image_replaces_tag() {
        let cluster = Cluster::new("prod", "registry.example/main:4.4.0", "central:443");
        assert_eq!(cluster.upgrader_image("4.5.1"), "registry.example/main:4.5.1");
    }

    #[test]
    fn test_upgrader_image_strips_digest() {
        let cluster = Cluster::new(
            "prod",
            "registry.example/main@sha256:abcdef0123",
            "central:443",
        );
        assert_eq!(cluster.upgrader_image("4.5.1"), "registry.example/main:4.5.1");
    }

    #[test]
    fn test_upgrader_image_keeps_registry_port() {
        let cluster = Cluster::new("prod", "registry.example:5000/main", "central:443");
        assert_eq!(
            cluster.upgrader_image("4.5.1"),
            "registry.example:5000/main:4.5.1"
        );

        let tagged = Cluster::new("prod", "registry.example:5000/main:4.4.0", "central:443");
        assert_eq!(
            tagged.upgrader_image("4.5.1"),
            "registry.example:5000/main:4.5.1"
        );
    }

    #[test]
    fn test_new_cluster_defaults() {
        let cluster = Cluster::new("prod", "registry/main:4.4.0", "central:443");
        assert!(cluster.auto_upgrade_enabled);
        assert!(cluster.upgrade_status.is_none());
        assert!(!cluster.id.is_empty());
    }

    #[test]
    fn test_upgrade_status_mut_creates_default() {
        let mut cluster = Cluster::new("prod", "registry/main:4.4.0", "central:443");
        assert!(cluster.upgrade_status.is_none());
        cluster.upgrade_status_mut();
        assert!(cluster.upgrade_status.is_some());
    }
}
