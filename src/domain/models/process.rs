//! Upgrade process domain model.
//!
//! A process records one attempt to change the software running in a
//! secured cluster: either a version upgrade or a certificate rotation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::upgrade_state::UpgradeState;

/// What kind of change a process performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeProcessType {
    /// Replace the sensor bundle with a different version.
    Upgrade,
    /// Re-issue service certificates while keeping the version.
    CertRotation,
}

impl Default for UpgradeProcessType {
    fn default() -> Self {
        Self::Upgrade
    }
}

impl UpgradeProcessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upgrade => "upgrade",
            Self::CertRotation => "cert_rotation",
        }
    }
}

impl std::fmt::Display for UpgradeProcessType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One attempt at upgrading (or rotating certs in) a cluster.
///
/// At most one process per cluster is active at a time. Once the state
/// goes terminal the process is deactivated and stays in the status
/// record as history until the next attempt replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpgradeProcess {
    /// Unique identifier, exchanged with the upgrader on every check-in.
    pub id: String,
    /// Upgrade or cert rotation.
    pub process_type: UpgradeProcessType,
    /// False once the process reaches a terminal state.
    pub active: bool,
    /// When the process was created.
    pub initiated_at: DateTime<Utc>,
    /// Version the cluster should end up running.
    pub target_version: String,
    /// Image the sensor should launch the upgrader from.
    pub upgrader_image: String,
    /// Current lifecycle state.
    pub state: UpgradeState,
    /// Human-readable detail accompanying error states.
    pub status_detail: Option<String>,
}

impl UpgradeProcess {
    /// Create a new active process in the trigger-sent state.
    pub fn new(
        process_type: UpgradeProcessType,
        target_version: impl Into<String>,
        upgrader_image: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            process_type,
            active: true,
            initiated_at: Utc::now(),
            target_version: target_version.into(),
            upgrader_image: upgrader_image.into(),
            state: UpgradeState::UpgradeTriggerSent,
            status_detail: None,
        }
    }

    /// Move to a new state, deactivating on terminal states.
    ///
    /// Detail is only recorded when the caller passes one; passing `None`
    /// keeps whatever was there before.
    pub fn transition(&mut self, state: UpgradeState, detail: Option<String>) {
        self.state = state;
        if let Some(detail) = detail {
            self.status_detail = Some(detail);
        }
        if state.is_terminal() {
            self.active = false;
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Whether this attempt ended in failure.
    pub fn failed(&self) -> bool {
        self.state.is_failure()
    }
}
