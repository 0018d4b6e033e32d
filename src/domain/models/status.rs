//! Persistent upgrade status attached to a cluster record.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::process::UpgradeProcess;

/// Whether a cluster's sensor can be auto-upgraded from central.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Upgradability {
    /// No connection yet, or versions could not be interpreted.
    Unknown,
    /// Sensor already runs central's version.
    UpToDate,
    /// Sensor is older and the connection supports auto-upgrades.
    AutoUpgradePossible,
    /// Sensor runs a newer version than central.
    SensorVersionHigher,
    /// Auto-upgrade cannot work here; the operator has to intervene.
    ManualUpgradeRequired,
}

impl Default for Upgradability {
    fn default() -> Self {
        Self::Unknown
    }
}

impl Upgradability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::UpToDate => "up_to_date",
            Self::AutoUpgradePossible => "auto_upgrade_possible",
            Self::SensorVersionHigher => "sensor_version_higher",
            Self::ManualUpgradeRequired => "manual_upgrade_required",
        }
    }
}

impl fmt::Display for Upgradability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything central persists about a cluster's upgrade situation.
///
/// `most_recent_process` doubles as history: it keeps the last finished
/// attempt around until a new one replaces it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterUpgradeStatus {
    /// Latest assessment from the connected sensor's version.
    pub upgradability: Upgradability,
    /// Why the assessment came out the way it did.
    pub upgradability_reason: Option<String>,
    /// Most recent upgrade or cert-rotation attempt, if any.
    pub most_recent_process: Option<UpgradeProcess>,
}

impl ClusterUpgradeStatus {
    /// The in-flight process, if one exists.
    pub fn active_process(&self) -> Option<&UpgradeProcess> {
        self.most_recent_process.as_ref().filter(|p| p.active)
    }

    pub fn active_process_mut(&mut self) -> Option<&mut UpgradeProcess> {
        self.most_recent_process.as_mut().filter(|p| p.active)
    }
}
