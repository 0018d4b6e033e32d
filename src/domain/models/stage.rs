//! Upgrader workflow stages.
//!
//! A stage is one step the remote upgrader executes while running a
//! workflow. Stages carry no behavior on the central side; they only
//! appear in check-ins so the controller can tell how far the upgrader
//! got before it last reported.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One step within an upgrader workflow.
///
/// The set is shared across all workflows; which stages actually run, and
/// in which order, is defined by the workflow catalog in
/// [`super::workflow::Workflow::stages`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// No stage has completed yet (freshly started upgrader).
    Unset,
    /// Remove leftover objects owned by a previous, foreign upgrade attempt.
    CleanupForeignState,
    /// Snapshot the currently deployed state for a later rollback.
    Snapshot,
    /// Download the deployment bundle for the target version.
    FetchBundle,
    /// Render the bundle into concrete objects.
    InstantiateBundle,
    /// Diff rendered objects against the live state into an execution plan.
    GeneratePlan,
    /// Run preflight checks; failure aborts the workflow.
    Preflight,
    /// Preflight variant that logs failures but never aborts.
    PreflightNoFail,
    /// Apply the execution plan.
    Execute,
    /// Build the plan that restores the pre-upgrade snapshot.
    GenerateRollbackPlan,
    /// Wait until objects scheduled for deletion are actually gone.
    WaitForDeletion,
    /// Remove state owned by this upgrade attempt.
    CleanupOwned,
}

impl Default for Stage {
    fn default() -> Self {
        Self::Unset
    }
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unset => "unset",
            Self::CleanupForeignState => "cleanup_foreign_state",
            Self::Snapshot => "snapshot",
            Self::FetchBundle => "fetch_bundle",
            Self::InstantiateBundle => "instantiate_bundle",
            Self::GeneratePlan => "generate_plan",
            Self::Preflight => "preflight",
            Self::PreflightNoFail => "preflight_no_fail",
            Self::Execute => "execute",
            Self::GenerateRollbackPlan => "generate_rollback_plan",
            Self::WaitForDeletion => "wait_for_deletion",
            Self::CleanupOwned => "cleanup_owned",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unset" | "" => Ok(Self::Unset),
            "cleanup_foreign_state" => Ok(Self::CleanupForeignState),
            "snapshot" => Ok(Self::Snapshot),
            "fetch_bundle" => Ok(Self::FetchBundle),
            "instantiate_bundle" => Ok(Self::InstantiateBundle),
            "generate_plan" => Ok(Self::GeneratePlan),
            "preflight" => Ok(Self::Preflight),
            "preflight_no_fail" => Ok(Self::PreflightNoFail),
            "execute" => Ok(Self::Execute),
            "generate_rollback_plan" => Ok(Self::GenerateRollbackPlan),
            "wait_for_deletion" => Ok(Self::WaitForDeletion),
            "cleanup_owned" => Ok(Self::CleanupOwned),
            other => Err(format!("unknown upgrader stage: {other}")),
        }
    }
}
