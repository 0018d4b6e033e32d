//! Upgrader workflow catalog.
//!
//! A workflow is a named, ordered sequence of stages. The catalog is
//! immutable: the controller only ever picks *which* workflow the upgrader
//! runs next, never what a workflow consists of.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::stage::Stage;

/// A named, ordered sequence of upgrader stages.
///
/// Wire names use the kebab-case form (`roll-forward`, `roll-back`, ...)
/// reported by the upgrader in its check-ins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Workflow {
    /// Upgrade to the target version.
    RollForward,
    /// Restore the pre-upgrade snapshot after a failed execution.
    RollBack,
    /// Run everything up to (and including) preflight without applying.
    DryRun,
    /// Fetch and instantiate the bundle, nothing else.
    ValidateBundle,
    /// Tear down upgrader-owned state; the terminal workflow.
    Cleanup,
}

impl Workflow {
    /// The ordered stages this workflow executes.
    pub fn stages(&self) -> &'static [Stage] {
        match self {
            Self::RollForward => &[
                Stage::CleanupForeignState,
                Stage::Snapshot,
                Stage::FetchBundle,
                Stage::InstantiateBundle,
                Stage::GeneratePlan,
                Stage::Preflight,
                Stage::Execute,
            ],
            Self::RollBack => &[
                Stage::GenerateRollbackPlan,
                Stage::PreflightNoFail,
                Stage::Execute,
                Stage::WaitForDeletion,
            ],
            Self::DryRun => &[
                Stage::CleanupForeignState,
                Stage::FetchBundle,
                Stage::InstantiateBundle,
                Stage::GeneratePlan,
                Stage::Preflight,
            ],
            Self::ValidateBundle => &[Stage::FetchBundle, Stage::InstantiateBundle],
            Self::Cleanup => &[Stage::WaitForDeletion, Stage::CleanupOwned],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RollForward => "roll-forward",
            Self::RollBack => "roll-back",
            Self::DryRun => "dry-run",
            Self::ValidateBundle => "validate-bundle",
            Self::Cleanup => "cleanup",
        }
    }

    /// All workflows in the catalog.
    pub fn all() -> &'static [Workflow] {
        &[
            Self::RollForward,
            Self::RollBack,
            Self::DryRun,
            Self::ValidateBundle,
            Self::Cleanup,
        ]
    }
}

impl fmt::Display for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Workflow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "roll-forward" => Ok(Self::RollForward),
            "roll-back" => Ok(Self::RollBack),
            "dry-run" => Ok(Self::DryRun),
            "validate-bundle" => Ok(Self::ValidateBundle),
            "cleanup" => Ok(Self::Cleanup),
            other => Err(format!("unknown upgrader workflow: {other}")),
        }
    }
}
