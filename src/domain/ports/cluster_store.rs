use crate::domain::models::{Cluster, ClusterUpgradeStatus};
use crate::domain::ports::errors::StoreError;
use async_trait::async_trait;

/// Repository port for cluster persistence operations
///
/// The upgrade controller only ever reads one cluster and writes back its
/// upgrade status, so the port stays that narrow.
#[async_trait]
pub trait ClusterStore: Send + Sync {
    /// Get a cluster by ID
    async fn get_cluster(&self, id: &str) -> Result<Option<Cluster>, StoreError>;

    /// Replace the stored upgrade status of a cluster
    async fn update_cluster_upgrade_status(
        &self,
        id: &str,
        status: &ClusterUpgradeStatus,
    ) -> Result<(), StoreError>;
}
