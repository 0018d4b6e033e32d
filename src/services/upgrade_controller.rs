//! Per-cluster upgrade controller.
//!
//! One controller exists per secured cluster and is the sole writer of
//! that cluster's upgrade state. Every externally invoked operation
//! (connection registration, triggering, check-ins, progress writes,
//! timer callbacks) runs inside the controller's single critical section.
//!
//! Mutations follow a persist-before-commit discipline: the status is
//! cloned, mutated, written to the cluster store, and only then installed
//! in memory. Trigger delivery to the sensor happens after the lock is
//! released and is best-effort; a lost trigger is re-sent on the next
//! reconnect.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{watch, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use crate::domain::error::UpgradeError;
use crate::domain::models::{
    retag_image, ClusterUpgradeStatus, Config, SensorCheckIn, Upgradability, UpgradeProcess,
    UpgradeProcessType, UpgradeState, UpgradeTrigger, UpgraderCheckIn, UpgraderCheckInResponse,
    Workflow,
};
use crate::domain::ports::{ClusterStore, SensorConnection};
use crate::services::timeouts::{ProcessTimer, UpgradeTimeouts};
use crate::services::transitions::{self, CheckInFacts};
use crate::services::version;

/// Instance-wide knobs a controller is constructed with.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Version sensors are upgraded towards.
    pub central_version: String,
    /// Instance-wide switch for automatic upgrades.
    pub auto_upgrade_enabled: bool,
    pub timeouts: UpgradeTimeouts,
}

impl ControllerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            central_version: config.central.version.clone(),
            auto_upgrade_enabled: config.central.auto_upgrade_enabled,
            timeouts: UpgradeTimeouts::from(&config.upgrade),
        }
    }
}

/// Everything mutable about a controller, guarded by one mutex.
struct ControllerState {
    /// Mirror of the persisted status; never ahead of the store.
    status: ClusterUpgradeStatus,
    /// Live link to the sensor, if any.
    connection: Option<Arc<dyn SensorConnection>>,
    /// Bumped on every registration so a close notification for an old
    /// connection cannot clear a newer one.
    connection_epoch: u64,
    /// Supervision task for the active process.
    timer: Option<ProcessTimer>,
    /// When the active process entered its current state.
    state_entered_at: chrono::DateTime<chrono::Utc>,
    /// Whether the stuck warning already fired for the current state.
    stuck_warned: bool,
    /// When the active process entered the rolling-back state.
    rollback_started_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Orchestrates sensor upgrades for a single cluster.
pub struct UpgradeController {
    cluster_id: String,
    cluster_name: String,
    main_image: String,
    central_endpoint: String,
    cluster_auto_upgrade: bool,
    central_version: String,
    global_auto_upgrade: bool,
    timeouts: UpgradeTimeouts,
    store: Arc<dyn ClusterStore>,
    state: Mutex<ControllerState>,
    /// Latched on an internal invariant violation. A failed controller
    /// refuses mutating operations until it is rebuilt.
    fatal: watch::Sender<Option<String>>,
}

impl std::fmt::Debug for UpgradeController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpgradeController")
            .field("cluster_id", &self.cluster_id)
            .field("cluster_name", &self.cluster_name)
            .field("main_image", &self.main_image)
            .field("central_endpoint", &self.central_endpoint)
            .field("cluster_auto_upgrade", &self.cluster_auto_upgrade)
            .field("central_version", &self.central_version)
            .field("global_auto_upgrade", &self.global_auto_upgrade)
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}

impl UpgradeController {
    /// Build a controller from the persisted cluster record.
    ///
    /// Fails fast on an unknown cluster id. A non-terminal process found
    /// in storage has its timeout supervision re-armed relative to its
    /// original initiation time, so a restart does not reset the clock.
    pub async fn load(
        cluster_id: &str,
        store: Arc<dyn ClusterStore>,
        settings: ControllerSettings,
    ) -> Result<Arc<Self>, UpgradeError> {
        let cluster = store
            .get_cluster(cluster_id)
            .await?
            .ok_or_else(|| UpgradeError::ClusterNotFound(cluster_id.to_string()))?;

        let mut status = cluster.upgrade_status.unwrap_or_default();
        if let Some(process) = status.most_recent_process.as_mut() {
            if process.active && process.state.is_terminal() {
                warn!(
                    "Cluster {}: process {} is terminal ({}) but was stored active; deactivating",
                    cluster_id, process.id, process.state
                );
                process.active = false;
            }
        }

        let now = Utc::now();
        let (fatal, _) = watch::channel(None);
        let controller = Arc::new(Self {
            cluster_id: cluster.id,
            cluster_name: cluster.name,
            main_image: cluster.main_image,
            central_endpoint: cluster.central_endpoint,
            cluster_auto_upgrade: cluster.auto_upgrade_enabled,
            central_version: settings.central_version,
            global_auto_upgrade: settings.auto_upgrade_enabled,
            timeouts: settings.timeouts,
            store,
            state: Mutex::new(ControllerState {
                status,
                connection: None,
                connection_epoch: 0,
                timer: None,
                state_entered_at: now,
                stuck_warned: false,
                rollback_started_at: None,
            }),
            fatal,
        });

        let mut state = controller.state.lock().await;
        let survivor = state
            .status
            .active_process()
            .map(|p| (p.id.clone(), p.initiated_at, p.state));
        if let Some((process_id, initiated_at, process_state)) = survivor {
            let remaining = controller.timeouts.remaining_absolute(initiated_at, now);
            info!(
                "Cluster {}: resuming supervision of process {} in state {} ({:?} remaining)",
                controller.cluster_id, process_id, process_state, remaining
            );
            state.timer = Some(controller.spawn_supervisor(process_id, remaining));
            if process_state == UpgradeState::UpgradeErrorRollingBack {
                // The original rollback start did not survive the restart;
                // the confirmation window reopens from now.
                state.rollback_started_at = Some(now);
            }
        }
        drop(state);

        Ok(controller)
    }

    pub fn cluster_id(&self) -> &str {
        &self.cluster_id
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    /// The latched fatal error, if the controller has failed.
    pub fn fatal_error(&self) -> Option<String> {
        self.fatal.borrow().clone()
    }

    /// Watch channel that resolves to the fatal error when one latches.
    pub fn fatal_signal(&self) -> watch::Receiver<Option<String>> {
        self.fatal.subscribe()
    }

    /// Current persisted upgrade status.
    pub async fn upgrade_status(&self) -> ClusterUpgradeStatus {
        self.state.lock().await.status.clone()
    }

    pub async fn has_active_connection(&self) -> bool {
        self.state.lock().await.connection.is_some()
    }

    /// Take note of a newly established sensor connection.
    ///
    /// Classifies the sensor's upgradability, reconciles an in-flight
    /// process against the reported version, persists the result, starts
    /// an automatic upgrade if configured, and re-sends the trigger for
    /// whatever process is active (or an empty trigger if none is).
    pub async fn register_connection(
        self: &Arc<Self>,
        connection: Arc<dyn SensorConnection>,
    ) -> Result<(), UpgradeError> {
        self.ensure_operational()?;

        let sensor_version = connection.sensor_version();
        let support = connection.check_auto_upgrade_support();
        let (upgradability, reason) =
            version::classify(&self.central_version, &sensor_version, support);
        info!(
            "Cluster {}: sensor connected (version {:?}, upgradability {})",
            self.cluster_id,
            sensor_version,
            upgradability.as_str()
        );

        let mut state = self.state.lock().await;

        let mut status = state.status.clone();
        status.upgradability = upgradability;
        status.upgradability_reason = Some(reason);

        // Only the sensor can attest to its own running version, so the
        // operations-done and rolling-back states resolve here and
        // nowhere else.
        let rollback_started = state.rollback_started_at;
        if let Some(process) = status.active_process_mut() {
            match process.state {
                UpgradeState::UpgradeOperationsDone
                    if process.process_type == UpgradeProcessType::Upgrade
                        && upgradability == Upgradability::UpToDate =>
                {
                    info!(
                        "Cluster {}: sensor came back on the target version; process {} complete",
                        self.cluster_id, process.id
                    );
                    process.transition(UpgradeState::UpgradeComplete, None);
                }
                UpgradeState::UpgradeErrorRollingBack
                    if !sensor_version.is_empty() && sensor_version != process.target_version =>
                {
                    let started = rollback_started.unwrap_or(process.initiated_at);
                    if self.timeouts.within_rollback_window(started, Utc::now()) {
                        info!(
                            "Cluster {}: sensor came back on the pre-upgrade version; rollback of process {} confirmed",
                            self.cluster_id, process.id
                        );
                        process.transition(UpgradeState::UpgradeErrorRolledBack, None);
                    } else {
                        warn!(
                            "Cluster {}: sensor came back on the pre-upgrade version, but outside the rollback confirmation window; leaving process {} unconfirmed",
                            self.cluster_id, process.id
                        );
                    }
                }
                _ => {}
            }
        }

        let mut started_process = false;
        if status.active_process().is_none()
            && self.global_auto_upgrade
            && self.cluster_auto_upgrade
            && upgradability == Upgradability::AutoUpgradePossible
            && !failed_attempt_at(&status, &self.central_version)
        {
            let process = UpgradeProcess::new(
                UpgradeProcessType::Upgrade,
                self.central_version.clone(),
                retag_image(&self.main_image, &self.central_version),
            );
            info!(
                "Cluster {}: auto-upgrading sensor to {} (process {})",
                self.cluster_id, self.central_version, process.id
            );
            status.most_recent_process = Some(process);
            started_process = true;
        }

        if status != state.status {
            let entered_new_state = active_summary(&status) != active_summary(&state.status);
            self.persist(&status).await?;
            self.commit(&mut state, status, entered_new_state);
            if started_process {
                let armed = state.status.active_process().map(|p| p.id.clone());
                if let Some(process_id) = armed {
                    state.timer = Some(self.spawn_supervisor(process_id, self.timeouts.absolute));
                }
            }
        }

        let trigger = match state.status.active_process() {
            None => UpgradeTrigger::empty(),
            Some(process) => UpgradeTrigger::for_process(
                process,
                &self.cluster_id,
                &self.central_endpoint,
                // Past the initial state an upgrader already runs; a
                // reconnecting sensor must not launch another one.
                process.state == UpgradeState::UpgradeTriggerSent,
            ),
        };

        state.connection = Some(connection.clone());
        state.connection_epoch += 1;
        let epoch = state.connection_epoch;
        drop(state);

        self.watch_connection_close(connection.clone(), epoch);

        if let Err(err) = connection.inject_trigger(trigger).await {
            warn!(
                "Cluster {}: failed to deliver upgrade trigger: {}; will retry on next reconnect",
                self.cluster_id, err
            );
        }
        Ok(())
    }

    /// Start an upgrade to central's version.
    ///
    /// Returns the id of the created process.
    pub async fn trigger_upgrade(self: &Arc<Self>) -> Result<String, UpgradeError> {
        self.ensure_operational()?;
        let state = self.state.lock().await;
        let connection = self.triggerable(&state)?;

        match state.status.upgradability {
            Upgradability::AutoUpgradePossible | Upgradability::SensorVersionHigher => {}
            forbidden => return Err(UpgradeError::UpgradabilityForbids(forbidden)),
        }

        let process = UpgradeProcess::new(
            UpgradeProcessType::Upgrade,
            self.central_version.clone(),
            retag_image(&self.main_image, &self.central_version),
        );
        info!(
            "Cluster {}: upgrade to {} triggered (process {})",
            self.cluster_id, self.central_version, process.id
        );
        self.start_process(state, connection, process).await
    }

    /// Start a certificate rotation at the sensor's current version.
    pub async fn trigger_cert_rotation(self: &Arc<Self>) -> Result<String, UpgradeError> {
        self.ensure_operational()?;
        let state = self.state.lock().await;
        let connection = self.triggerable(&state)?;

        match state.status.upgradability {
            Upgradability::AutoUpgradePossible
            | Upgradability::SensorVersionHigher
            | Upgradability::UpToDate => {}
            forbidden => return Err(UpgradeError::UpgradabilityForbids(forbidden)),
        }

        let target = connection.sensor_version();
        let process = UpgradeProcess::new(
            UpgradeProcessType::CertRotation,
            target.clone(),
            retag_image(&self.main_image, &target),
        );
        info!(
            "Cluster {}: certificate rotation triggered (process {})",
            self.cluster_id, process.id
        );
        self.start_process(state, connection, process).await
    }

    /// Answer a progress report from the upgrader itself.
    ///
    /// Reports for unknown or finished processes get a cleanup response
    /// so stray upgraders wind themselves down. Everything else goes
    /// through the transition rule table.
    pub async fn process_check_in_from_upgrader(
        &self,
        check_in: &UpgraderCheckIn,
    ) -> Result<UpgraderCheckInResponse, UpgradeError> {
        if self.fatal_error().is_some() {
            debug!(
                "Cluster {}: check-in on a failed controller; responding cleanup",
                self.cluster_id
            );
            return Ok(cleanup_response());
        }

        let mut state = self.state.lock().await;

        let (process_id, process_type, current_state) = match state.status.active_process() {
            Some(process) => (process.id.clone(), process.process_type, process.state),
            None => {
                debug!(
                    "Cluster {}: check-in from upgrader {} with no active process; responding cleanup",
                    self.cluster_id, check_in.process_id
                );
                return Ok(cleanup_response());
            }
        };
        if process_id != check_in.process_id {
            debug!(
                "Cluster {}: check-in from stale upgrader {} (current {}); responding cleanup",
                self.cluster_id, check_in.process_id, process_id
            );
            return Ok(cleanup_response());
        }

        let workflow = match check_in.workflow() {
            Ok(workflow) => workflow,
            Err(_) => {
                warn!(
                    "Cluster {}: upgrader reported unknown workflow {:?}; responding cleanup",
                    self.cluster_id, check_in.current_workflow
                );
                return Ok(cleanup_response());
            }
        };

        let facts = CheckInFacts {
            process_type,
            state: current_state,
            workflow,
            stage: check_in.last_executed_stage,
            errored: check_in.stage_error().is_some(),
        };
        let Some(outcome) = transitions::resolve(&facts) else {
            self.trip_fatal(format!("no transition rule matched check-in {facts:?}"));
            return Ok(cleanup_response());
        };

        let detail = if outcome.update_detail {
            check_in.stage_error().map(str::to_string)
        } else {
            None
        };

        let mut status = state.status.clone();
        let mut next_state = current_state;
        if let Some(process) = status.active_process_mut() {
            next_state = outcome.next_state.unwrap_or(process.state);
            process.transition(next_state, detail);
        }

        if status != state.status {
            debug!(
                "Cluster {}: process {} moves {} -> {} (responding {})",
                self.cluster_id, process_id, current_state, next_state, outcome.respond
            );
            self.persist(&status).await?;
            self.commit(&mut state, status, next_state != current_state);
        }

        Ok(UpgraderCheckInResponse {
            workflow_to_execute: outcome.respond,
        })
    }

    /// Absorb a pod observation relayed by the sensor.
    ///
    /// Its only purpose is confirming the upgrader launched; anything
    /// else is ignored.
    pub async fn process_check_in_from_sensor(
        &self,
        check_in: &SensorCheckIn,
    ) -> Result<(), UpgradeError> {
        self.ensure_operational()?;
        let mut state = self.state.lock().await;

        let relevant = state.status.active_process().is_some_and(|process| {
            process.id == check_in.process_id
                && process.state == UpgradeState::UpgradeTriggerSent
                && check_in.upgrader_pod_started
        });
        if !relevant {
            debug!(
                "Cluster {}: ignoring sensor check-in for process {}",
                self.cluster_id, check_in.process_id
            );
            return Ok(());
        }

        let mut status = state.status.clone();
        if let Some(process) = status.active_process_mut() {
            process.transition(UpgradeState::UpgraderLaunching, None);
        }
        self.persist(&status).await?;
        self.commit(&mut state, status, true);
        Ok(())
    }

    /// External state write, e.g. from a management API.
    ///
    /// States the controller derives itself cannot be set through here.
    pub async fn record_upgrade_progress(
        &self,
        process_id: &str,
        new_state: UpgradeState,
        detail: Option<String>,
    ) -> Result<(), UpgradeError> {
        self.ensure_operational()?;
        if new_state.reserved_for_controller() {
            return Err(UpgradeError::ReservedState(new_state));
        }

        let mut state = self.state.lock().await;
        let (current_id, current_state) = match state.status.active_process() {
            Some(process) => (process.id.clone(), process.state),
            None => return Err(UpgradeError::NoActiveProcess),
        };
        if current_id != process_id {
            return Err(UpgradeError::ProcessIdMismatch {
                expected: current_id,
                actual: process_id.to_string(),
            });
        }

        let mut status = state.status.clone();
        if let Some(process) = status.active_process_mut() {
            process.transition(new_state, detail);
        }
        if status != state.status {
            self.persist(&status).await?;
            self.commit(&mut state, status, new_state != current_state);
        }
        Ok(())
    }

    /// Both triggers share the same preconditions: a live connection and
    /// no process already running.
    fn triggerable(
        &self,
        state: &ControllerState,
    ) -> Result<Arc<dyn SensorConnection>, UpgradeError> {
        let connection = state
            .connection
            .clone()
            .ok_or_else(|| UpgradeError::NoActiveConnection(self.cluster_id.clone()))?;
        if let Some(process) = state.status.active_process() {
            return Err(UpgradeError::UpgradeInProgress(process.id.clone()));
        }
        Ok(connection)
    }

    /// Persist and activate a freshly built process, then hand its
    /// trigger to the sensor outside the lock.
    async fn start_process(
        self: &Arc<Self>,
        mut state: MutexGuard<'_, ControllerState>,
        connection: Arc<dyn SensorConnection>,
        process: UpgradeProcess,
    ) -> Result<String, UpgradeError> {
        let process_id = process.id.clone();
        let trigger =
            UpgradeTrigger::for_process(&process, &self.cluster_id, &self.central_endpoint, true);

        let mut status = state.status.clone();
        status.most_recent_process = Some(process);
        self.persist(&status).await?;
        self.commit(&mut state, status, true);
        state.timer = Some(self.spawn_supervisor(process_id.clone(), self.timeouts.absolute));
        drop(state);

        if let Err(err) = connection.inject_trigger(trigger).await {
            warn!(
                "Cluster {}: failed to deliver upgrade trigger: {}; will retry on next reconnect",
                self.cluster_id, err
            );
        }
        Ok(process_id)
    }

    async fn persist(&self, status: &ClusterUpgradeStatus) -> Result<(), UpgradeError> {
        self.store
            .update_cluster_upgrade_status(&self.cluster_id, status)
            .await
            .map_err(UpgradeError::from)
    }

    /// Install a persisted status into memory, refreshing the clocks that
    /// hang off the current state. Must only be called after `persist`
    /// succeeded for the same status.
    fn commit(
        &self,
        state: &mut ControllerState,
        status: ClusterUpgradeStatus,
        entered_new_state: bool,
    ) {
        if entered_new_state {
            let now = Utc::now();
            state.state_entered_at = now;
            state.stuck_warned = false;
            state.rollback_started_at = match status.active_process() {
                Some(process) if process.state == UpgradeState::UpgradeErrorRollingBack => {
                    Some(now)
                }
                _ => None,
            };
        }
        if status.active_process().is_none() {
            // No live process, no timer allowed to fire for one.
            state.timer = None;
        }
        state.status = status;
    }

    fn ensure_operational(&self) -> Result<(), UpgradeError> {
        match self.fatal_error() {
            Some(reason) => Err(UpgradeError::ControllerFailed {
                cluster_id: self.cluster_id.clone(),
                reason,
            }),
            None => Ok(()),
        }
    }

    fn trip_fatal(&self, reason: String) {
        error!(
            "Cluster {}: upgrade controller failed: {}",
            self.cluster_id, reason
        );
        self.fatal.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        });
    }

    /// Background task enforcing the absolute timeout and the stuck-state
    /// warning for one process. Holds only a weak reference so dropping
    /// the controller stops supervision.
    fn spawn_supervisor(self: &Arc<Self>, process_id: String, deadline_in: Duration) -> ProcessTimer {
        let weak = Arc::downgrade(self);
        let check_interval = self.timeouts.stuck_check_interval;
        let task_process_id = process_id.clone();
        let handle = tokio::spawn(async move {
            let deadline = tokio::time::Instant::now() + deadline_in;
            let mut ticker = tokio::time::interval(check_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => {
                        if let Some(controller) = weak.upgrade() {
                            controller.handle_timeout(&task_process_id).await;
                        }
                        return;
                    }
                    _ = ticker.tick() => {
                        let Some(controller) = weak.upgrade() else { return };
                        controller.check_stuck(&task_process_id).await;
                    }
                }
            }
        });
        ProcessTimer::new(process_id, handle)
    }

    /// Absolute timeout fired. Force the process into the timed-out state
    /// unless a newer process has replaced it in the meantime.
    async fn handle_timeout(&self, process_id: &str) {
        let mut state = self.state.lock().await;
        let current = state
            .status
            .active_process()
            .is_some_and(|process| process.id == process_id);
        if !current {
            return;
        }

        warn!(
            "Cluster {}: process {} did not finish within {:?}; marking it timed out",
            self.cluster_id, process_id, self.timeouts.absolute
        );
        let mut status = state.status.clone();
        if let Some(process) = status.active_process_mut() {
            process.transition(
                UpgradeState::UpgradeTimedOut,
                Some(format!(
                    "upgrade did not complete within {:?}",
                    self.timeouts.absolute
                )),
            );
        }
        match self.persist(&status).await {
            Ok(()) => self.commit(&mut state, status, true),
            // The next check-in or reconnect retries the write.
            Err(err) => error!(
                "Cluster {}: failed to persist upgrade timeout: {}",
                self.cluster_id, err
            ),
        }
    }

    /// Periodic stuck check. Logs once per state occupancy; does not force
    /// any transition, since slow is not the same as dead.
    async fn check_stuck(&self, process_id: &str) {
        let mut state = self.state.lock().await;
        if state.stuck_warned {
            return;
        }
        let (current_id, current_state) = match state.status.active_process() {
            Some(process) => (process.id.clone(), process.state),
            None => return,
        };
        if current_id != process_id {
            return;
        }

        let in_state = Utc::now().signed_duration_since(state.state_entered_at);
        let threshold =
            chrono::Duration::from_std(self.timeouts.stuck_state).unwrap_or(chrono::Duration::MAX);
        if in_state > threshold {
            warn!(
                "Cluster {}: process {} has been in state {} for {}s; it may be stuck",
                self.cluster_id,
                current_id,
                current_state,
                in_state.num_seconds()
            );
            state.stuck_warned = true;
        }
    }

    /// Clear the connection handle once the transport reports closure,
    /// unless a newer connection has been registered since.
    fn watch_connection_close(self: &Arc<Self>, connection: Arc<dyn SensorConnection>, epoch: u64) {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            connection.closed().await;
            let Some(controller) = weak.upgrade() else {
                return;
            };
            let mut state = controller.state.lock().await;
            if state.connection_epoch == epoch {
                debug!("Cluster {}: sensor connection closed", controller.cluster_id);
                state.connection = None;
            }
        });
    }
}

fn cleanup_response() -> UpgraderCheckInResponse {
    UpgraderCheckInResponse {
        workflow_to_execute: Workflow::Cleanup,
    }
}

fn active_summary(status: &ClusterUpgradeStatus) -> Option<(String, UpgradeState)> {
    status
        .active_process()
        .map(|process| (process.id.clone(), process.state))
}

/// Whether history records a failed upgrade attempt at this target, which
/// suppresses re-triggering the same upgrade automatically.
fn failed_attempt_at(status: &ClusterUpgradeStatus, target: &str) -> bool {
    status.most_recent_process.as_ref().is_some_and(|process| {
        !process.active
            && process.process_type == UpgradeProcessType::Upgrade
            && process.failed()
            && process.target_version == target
    })
}
