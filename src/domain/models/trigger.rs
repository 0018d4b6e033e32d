//! Messages exchanged with a secured cluster during an upgrade.
//!
//! The trigger travels central -> sensor and tells it which upgrader to
//! launch. Check-ins travel the other way: the sensor relays pod
//! observations, the upgrader reports its own progress.

use serde::{Deserialize, Serialize};

use super::process::UpgradeProcess;
use super::stage::Stage;
use super::workflow::Workflow;

pub const UPGRADER_COMMAND: &str = "sensor-upgrader";

pub const CLUSTER_ID_ENV_VAR: &str = "ARGUS_CLUSTER_ID";
pub const CENTRAL_ENDPOINT_ENV_VAR: &str = "ARGUS_CENTRAL_ENDPOINT";
pub const PROCESS_ID_ENV_VAR: &str = "ARGUS_UPGRADE_PROCESS_ID";

/// Environment variable passed to the upgrader pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

/// Instruction for the sensor to start (or stop) an upgrader.
///
/// An empty trigger means "no upgrade is running, tear down any upgrader
/// you still have". A trigger without an image identifies a process the
/// sensor should track but not (re)launch an upgrader for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeTrigger {
    pub process_id: String,
    pub image: String,
    pub command: String,
    pub env_vars: Vec<EnvVar>,
}

impl UpgradeTrigger {
    /// Build the trigger for an active process.
    ///
    /// `include_image` is false when the upgrader is already past launch
    /// and a reconnecting sensor must not start another one.
    pub fn for_process(
        process: &UpgradeProcess,
        cluster_id: &str,
        central_endpoint: &str,
        include_image: bool,
    ) -> Self {
        Self {
            process_id: process.id.clone(),
            image: if include_image {
                process.upgrader_image.clone()
            } else {
                String::new()
            },
            command: UPGRADER_COMMAND.to_string(),
            env_vars: vec![
                EnvVar {
                    name: CLUSTER_ID_ENV_VAR.to_string(),
                    value: cluster_id.to_string(),
                },
                EnvVar {
                    name: CENTRAL_ENDPOINT_ENV_VAR.to_string(),
                    value: central_endpoint.to_string(),
                },
                EnvVar {
                    name: PROCESS_ID_ENV_VAR.to_string(),
                    value: process.id.clone(),
                },
            ],
        }
    }

    /// The "nothing active" trigger.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.process_id.is_empty()
    }
}

/// Progress report from the upgrader pod.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpgraderCheckIn {
    pub cluster_id: String,
    pub process_id: String,
    /// Workflow the upgrader believes it is executing. Empty on the very
    /// first check-in; may name a workflow central does not know.
    pub current_workflow: String,
    /// Last stage the upgrader attempted, `Stage::Unset` if none yet.
    #[serde(default)]
    pub last_executed_stage: Stage,
    /// Error from that stage; empty means it succeeded.
    pub last_executed_stage_error: String,
}

impl UpgraderCheckIn {
    /// The stage error, with the empty string normalized away.
    pub fn stage_error(&self) -> Option<&str> {
        if self.last_executed_stage_error.is_empty() {
            None
        } else {
            Some(&self.last_executed_stage_error)
        }
    }

    /// The reported workflow, if it parses to one central knows.
    /// Returns `Ok(None)` for an empty report.
    pub fn workflow(&self) -> Result<Option<Workflow>, String> {
        if self.current_workflow.is_empty() {
            return Ok(None);
        }
        self.current_workflow.parse::<Workflow>().map(Some)
    }
}

/// Central's answer to an upgrader check-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgraderCheckInResponse {
    pub workflow_to_execute: Workflow,
}

/// Pod-level observation relayed by the sensor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorCheckIn {
    pub process_id: String,
    /// True once the sensor has seen the upgrader pod running.
    pub upgrader_pod_started: bool,
}
