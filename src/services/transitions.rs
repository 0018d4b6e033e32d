//! Check-in transition rules.
//!
//! Every upgrader check-in is resolved against an ordered rule table. The
//! first rule whose constraints all hold decides the process's next state,
//! the workflow sent back, and whether the reported stage error is
//! recorded. Unconstrained fields match anything.
//!
//! A check-in that matches no rule is a programming error; the controller
//! latches a fatal error and falls back to keeping the state and
//! responding with cleanup.

use std::sync::LazyLock;

use crate::domain::models::{Stage, UpgradeProcessType, UpgradeState, Workflow};

/// Facts extracted from one upgrader check-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckInFacts {
    pub process_type: UpgradeProcessType,
    pub state: UpgradeState,
    /// Workflow the upgrader says it is executing; `None` right after it
    /// starts or restarts.
    pub workflow: Option<Workflow>,
    pub stage: Stage,
    pub errored: bool,
}

/// What a matched rule tells the controller to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    /// New state for the process; `None` keeps the current one.
    pub next_state: Option<UpgradeState>,
    /// Workflow the upgrader is told to execute next.
    pub respond: Workflow,
    /// Whether the reported stage error becomes the status detail.
    pub update_detail: bool,
}

struct Rule {
    states: Option<&'static [UpgradeState]>,
    workflow: Option<Option<Workflow>>,
    stages: Option<&'static [Stage]>,
    errored: Option<bool>,
    process_type: Option<UpgradeProcessType>,
    outcome: Outcome,
}

impl Rule {
    fn responding(workflow: Workflow) -> Self {
        Self {
            states: None,
            workflow: None,
            stages: None,
            errored: None,
            process_type: None,
            outcome: Outcome {
                next_state: None,
                respond: workflow,
                update_detail: false,
            },
        }
    }

    fn with_states(mut self, states: &'static [UpgradeState]) -> Self {
        self.states = Some(states);
        self
    }

    fn with_workflow(mut self, workflow: Workflow) -> Self {
        self.workflow = Some(Some(workflow));
        self
    }

    fn without_workflow(mut self) -> Self {
        self.workflow = Some(None);
        self
    }

    fn with_stages(mut self, stages: &'static [Stage]) -> Self {
        self.stages = Some(stages);
        self
    }

    fn with_error(mut self, errored: bool) -> Self {
        self.errored = Some(errored);
        self
    }

    fn with_type(mut self, process_type: UpgradeProcessType) -> Self {
        self.process_type = Some(process_type);
        self
    }

    fn to_state(mut self, state: UpgradeState) -> Self {
        self.outcome.next_state = Some(state);
        self
    }

    fn recording_detail(mut self) -> Self {
        self.outcome.update_detail = true;
        self
    }

    fn matches(&self, facts: &CheckInFacts) -> bool {
        if let Some(states) = self.states {
            if !states.contains(&facts.state) {
                return false;
            }
        }
        if let Some(workflow) = self.workflow {
            if workflow != facts.workflow {
                return false;
            }
        }
        if let Some(stages) = self.stages {
            if !stages.contains(&facts.stage) {
                return false;
            }
        }
        if let Some(errored) = self.errored {
            if errored != facts.errored {
                return false;
            }
        }
        if let Some(process_type) = self.process_type {
            if process_type != facts.process_type {
                return false;
            }
        }
        true
    }
}

const TERMINAL_STATES: &[UpgradeState] = &[
    UpgradeState::UpgradeComplete,
    UpgradeState::UpgradeInitializationError,
    UpgradeState::PreFlightChecksFailed,
    UpgradeState::UpgradeErrorRolledBack,
    UpgradeState::UpgradeErrorRollbackFailed,
    UpgradeState::UpgradeErrorUnknown,
    UpgradeState::UpgradeTimedOut,
];

/// States before the upgrader has made progress central cares about.
const EARLY_LIFECYCLE: &[UpgradeState] = &[
    UpgradeState::UpgradeTriggerSent,
    UpgradeState::UpgraderLaunching,
    UpgradeState::UpgraderLaunched,
    UpgradeState::PreFlightChecksComplete,
    UpgradeState::UpgradeOperationsDone,
];

const ROLLING_BACK: &[UpgradeState] = &[UpgradeState::UpgradeErrorRollingBack];

const BEFORE_PREFLIGHT: &[Stage] = &[
    Stage::Unset,
    Stage::CleanupForeignState,
    Stage::Snapshot,
    Stage::FetchBundle,
    Stage::InstantiateBundle,
    Stage::GeneratePlan,
];

const PREFLIGHT_ONLY: &[Stage] = &[Stage::Preflight];

const EXECUTE_ONLY: &[Stage] = &[Stage::Execute];

const BEFORE_ROLLBACK_EXECUTE: &[Stage] = &[
    Stage::Unset,
    Stage::GenerateRollbackPlan,
    Stage::PreflightNoFail,
];

const ROLLBACK_EXECUTED: &[Stage] = &[Stage::Execute, Stage::WaitForDeletion];

static TABLE: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    use UpgradeProcessType::{CertRotation, Upgrade};
    use UpgradeState::*;
    use Workflow::{Cleanup, RollBack, RollForward};

    vec![
        // Finished processes only ever get cleanup, whatever the upgrader
        // reports.
        Rule::responding(Cleanup).with_states(TERMINAL_STATES),
        // A freshly (re)started upgrader has no workflow yet. Roll-forward
        // is re-entrant up to execution, so send it forward again.
        Rule::responding(RollForward)
            .without_workflow()
            .with_states(EARLY_LIFECYCLE)
            .to_state(UpgraderLaunched),
        // Unless a rollback was underway; that must resume, not restart
        // the upgrade.
        Rule::responding(RollBack)
            .without_workflow()
            .with_states(ROLLING_BACK),
        // Rolling forward, before preflight.
        Rule::responding(RollForward)
            .with_workflow(RollForward)
            .with_stages(BEFORE_PREFLIGHT)
            .with_error(false)
            .to_state(UpgraderLaunched),
        Rule::responding(Cleanup)
            .with_workflow(RollForward)
            .with_stages(BEFORE_PREFLIGHT)
            .with_error(true)
            .to_state(UpgradeInitializationError)
            .recording_detail(),
        // Preflight.
        Rule::responding(RollForward)
            .with_workflow(RollForward)
            .with_stages(PREFLIGHT_ONLY)
            .with_error(false)
            .to_state(PreFlightChecksComplete),
        Rule::responding(Cleanup)
            .with_workflow(RollForward)
            .with_stages(PREFLIGHT_ONLY)
            .with_error(true)
            .to_state(PreFlightChecksFailed)
            .recording_detail(),
        // Execution. An upgrade is only complete once the sensor comes
        // back on the target version, so keep the upgrader polling.
        Rule::responding(RollForward)
            .with_workflow(RollForward)
            .with_stages(EXECUTE_ONLY)
            .with_error(false)
            .with_type(Upgrade)
            .to_state(UpgradeOperationsDone),
        // Cert rotations change no versions; done is done.
        Rule::responding(Cleanup)
            .with_workflow(RollForward)
            .with_stages(EXECUTE_ONLY)
            .with_error(false)
            .with_type(CertRotation)
            .to_state(UpgradeComplete),
        Rule::responding(RollBack)
            .with_workflow(RollForward)
            .with_stages(EXECUTE_ONLY)
            .with_error(true)
            .to_state(UpgradeErrorRollingBack)
            .recording_detail(),
        // Rolling back, before its execution.
        Rule::responding(RollBack)
            .with_workflow(RollBack)
            .with_stages(BEFORE_ROLLBACK_EXECUTE)
            .with_error(false),
        // Rollback executed. For an upgrade the rolled-back state is only
        // declared once the sensor reconnects on the old version.
        Rule::responding(Cleanup)
            .with_workflow(RollBack)
            .with_stages(ROLLBACK_EXECUTED)
            .with_error(false)
            .with_type(Upgrade),
        Rule::responding(Cleanup)
            .with_workflow(RollBack)
            .with_stages(ROLLBACK_EXECUTED)
            .with_error(false)
            .with_type(CertRotation)
            .to_state(UpgradeErrorRolledBack),
        Rule::responding(Cleanup)
            .with_workflow(RollBack)
            .with_error(true)
            .to_state(UpgradeErrorRollbackFailed)
            .recording_detail(),
        // Cleaning up after a rollback; only the sensor's reconnection can
        // move this forward.
        Rule::responding(Cleanup)
            .with_workflow(Cleanup)
            .with_states(ROLLING_BACK),
    ]
});

/// Resolve a check-in against the rule table. `None` means no rule
/// matched, which the caller treats as a fatal controller error.
pub fn resolve(facts: &CheckInFacts) -> Option<Outcome> {
    TABLE.iter().find(|rule| rule.matches(facts)).map(|rule| rule.outcome)
}
