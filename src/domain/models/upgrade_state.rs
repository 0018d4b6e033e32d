//! Lifecycle states of a sensor upgrade process.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where a single upgrade (or cert-rotation) process currently stands.
///
/// Terminal states never transition again; a process in a terminal state is
/// inactive and any upgrader still checking in for it is told to run the
/// cleanup workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeState {
    /// Zero value; a real process is never in this state.
    Unset,
    /// Process created, trigger handed to the sensor connection.
    UpgradeTriggerSent,
    /// The sensor reported that the upgrader pod started.
    UpgraderLaunching,
    /// The upgrader itself checked in for the first time.
    UpgraderLaunched,
    PreFlightChecksComplete,
    /// Execution finished; for upgrades, completion still awaits the
    /// sensor reconnecting on the target version.
    UpgradeOperationsDone,
    UpgradeComplete,
    UpgradeInitializationError,
    PreFlightChecksFailed,
    /// Execution failed; the upgrader is restoring the snapshot.
    UpgradeErrorRollingBack,
    UpgradeErrorRolledBack,
    UpgradeErrorRollbackFailed,
    UpgradeErrorUnknown,
    UpgradeTimedOut,
}

impl Default for UpgradeState {
    fn default() -> Self {
        Self::Unset
    }
}

impl UpgradeState {
    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::UpgradeComplete
                | Self::UpgradeInitializationError
                | Self::PreFlightChecksFailed
                | Self::UpgradeErrorRolledBack
                | Self::UpgradeErrorRollbackFailed
                | Self::UpgradeErrorUnknown
                | Self::UpgradeTimedOut
        )
    }

    /// Terminal states that represent a failed attempt (everything
    /// terminal except a completed upgrade).
    pub fn is_failure(&self) -> bool {
        self.is_terminal() && *self != Self::UpgradeComplete
    }

    /// States only the controller itself may produce. External progress
    /// writes naming one of these are rejected.
    pub fn reserved_for_controller(&self) -> bool {
        matches!(
            self,
            Self::Unset | Self::UpgradeTriggerSent | Self::UpgradeComplete | Self::UpgradeTimedOut
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unset => "unset",
            Self::UpgradeTriggerSent => "upgrade_trigger_sent",
            Self::UpgraderLaunching => "upgrader_launching",
            Self::UpgraderLaunched => "upgrader_launched",
            Self::PreFlightChecksComplete => "pre_flight_checks_complete",
            Self::UpgradeOperationsDone => "upgrade_operations_done",
            Self::UpgradeComplete => "upgrade_complete",
            Self::UpgradeInitializationError => "upgrade_initialization_error",
            Self::PreFlightChecksFailed => "pre_flight_checks_failed",
            Self::UpgradeErrorRollingBack => "upgrade_error_rolling_back",
            Self::UpgradeErrorRolledBack => "upgrade_error_rolled_back",
            Self::UpgradeErrorRollbackFailed => "upgrade_error_rollback_failed",
            Self::UpgradeErrorUnknown => "upgrade_error_unknown",
            Self::UpgradeTimedOut => "upgrade_timed_out",
        }
    }

    /// All states, in lifecycle order.
    pub fn all() -> &'static [UpgradeState] {
        &[
            Self::Unset,
            Self::UpgradeTriggerSent,
            Self::UpgraderLaunching,
            Self::UpgraderLaunched,
            Self::PreFlightChecksComplete,
            Self::UpgradeOperationsDone,
            Self::UpgradeComplete,
            Self::UpgradeInitializationError,
            Self::PreFlightChecksFailed,
            Self::UpgradeErrorRollingBack,
            Self::UpgradeErrorRolledBack,
            Self::UpgradeErrorRollbackFailed,
            Self::UpgradeErrorUnknown,
            Self::UpgradeTimedOut,
        ]
    }
}

impl fmt::Display for UpgradeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpgradeState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UpgradeState::all()
            .iter()
            .find(|state| state.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown upgrade state: {s}"))
    }
}
