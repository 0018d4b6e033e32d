use thiserror::Error;

use super::models::status::Upgradability;
use super::models::upgrade_state::UpgradeState;
use super::ports::errors::StoreError;

/// Domain-level errors for upgrade operations
#[derive(Error, Debug)]
pub enum UpgradeError {
    #[error("Cluster not found: {0}")]
    ClusterNotFound(String),

    #[error("No active sensor connection for cluster {0}")]
    NoActiveConnection(String),

    #[error("An upgrade is already in progress (process {0})")]
    UpgradeInProgress(String),

    #[error("Cluster cannot be auto-upgraded: upgradability is {0:?}")]
    UpgradabilityForbids(Upgradability),

    #[error("Process id mismatch: expected {expected}, got {actual}")]
    ProcessIdMismatch { expected: String, actual: String },

    #[error("No active upgrade process")]
    NoActiveProcess,

    #[error("State {0:?} is reserved and cannot be reported externally")]
    ReservedState(UpgradeState),

    #[error("Upgrade controller for cluster {cluster_id} failed: {reason}")]
    ControllerFailed { cluster_id: String, reason: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
