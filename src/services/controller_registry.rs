//! Registry of per-cluster upgrade controllers.
//!
//! Controllers are created lazily on first use and cached. The registry
//! is the routing layer: callers address clusters by id, upgrader
//! check-ins carry their own cluster id.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::domain::error::UpgradeError;
use crate::domain::models::{
    ClusterUpgradeStatus, SensorCheckIn, UpgradeState, UpgraderCheckIn, UpgraderCheckInResponse,
};
use crate::domain::ports::{ClusterStore, SensorConnection};
use crate::services::upgrade_controller::{ControllerSettings, UpgradeController};

pub struct ControllerRegistry {
    store: Arc<dyn ClusterStore>,
    settings: ControllerSettings,
    controllers: Mutex<HashMap<String, Arc<UpgradeController>>>,
}

impl ControllerRegistry {
    pub fn new(store: Arc<dyn ClusterStore>, settings: ControllerSettings) -> Self {
        Self {
            store,
            settings,
            controllers: Mutex::new(HashMap::new()),
        }
    }

    /// Look up the controller for a cluster, loading it on first use.
    ///
    /// Storage is never read while holding the map lock. Two racing
    /// callers may both load; the loser's copy is dropped and the first
    /// insert wins.
    pub async fn controller(
        &self,
        cluster_id: &str,
    ) -> Result<Arc<UpgradeController>, UpgradeError> {
        {
            let controllers = self.controllers.lock().await;
            if let Some(controller) = controllers.get(cluster_id) {
                return Ok(controller.clone());
            }
        }

        let loaded =
            UpgradeController::load(cluster_id, self.store.clone(), self.settings.clone()).await?;
        let mut controllers = self.controllers.lock().await;
        Ok(controllers
            .entry(cluster_id.to_string())
            .or_insert(loaded)
            .clone())
    }

    pub async fn register_connection(
        &self,
        cluster_id: &str,
        connection: Arc<dyn SensorConnection>,
    ) -> Result<(), UpgradeError> {
        self.controller(cluster_id)
            .await?
            .register_connection(connection)
            .await
    }

    pub async fn trigger_upgrade(&self, cluster_id: &str) -> Result<String, UpgradeError> {
        self.controller(cluster_id).await?.trigger_upgrade().await
    }

    pub async fn trigger_cert_rotation(&self, cluster_id: &str) -> Result<String, UpgradeError> {
        self.controller(cluster_id)
            .await?
            .trigger_cert_rotation()
            .await
    }

    pub async fn process_check_in_from_upgrader(
        &self,
        check_in: &UpgraderCheckIn,
    ) -> Result<UpgraderCheckInResponse, UpgradeError> {
        self.controller(&check_in.cluster_id)
            .await?
            .process_check_in_from_upgrader(check_in)
            .await
    }

    pub async fn process_check_in_from_sensor(
        &self,
        cluster_id: &str,
        check_in: &SensorCheckIn,
    ) -> Result<(), UpgradeError> {
        self.controller(cluster_id)
            .await?
            .process_check_in_from_sensor(check_in)
            .await
    }

    pub async fn record_upgrade_progress(
        &self,
        cluster_id: &str,
        process_id: &str,
        state: UpgradeState,
        detail: Option<String>,
    ) -> Result<(), UpgradeError> {
        self.controller(cluster_id)
            .await?
            .record_upgrade_progress(process_id, state, detail)
            .await
    }

    pub async fn upgrade_status(
        &self,
        cluster_id: &str,
    ) -> Result<ClusterUpgradeStatus, UpgradeError> {
        Ok(self.controller(cluster_id).await?.upgrade_status().await)
    }

    /// Forget a cluster's controller, e.g. after the cluster is removed
    /// or to rebuild one that latched a fatal error. Dropping the
    /// controller aborts its supervision tasks.
    pub async fn remove(&self, cluster_id: &str) -> bool {
        self.controllers.lock().await.remove(cluster_id).is_some()
    }

    /// Drop all controllers and their supervision tasks.
    pub async fn shutdown(&self) {
        let mut controllers = self.controllers.lock().await;
        if !controllers.is_empty() {
            info!("Shutting down {} upgrade controller(s)", controllers.len());
        }
        controllers.clear();
    }
}
