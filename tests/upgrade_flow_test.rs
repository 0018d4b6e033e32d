//! End-to-end upgrade flows through the controller registry, backed by
//! the real SQLite cluster store.

mod common;

use std::sync::Arc;

use argus::services::ControllerRegistry;
use argus::{
    ControllerSettings, SensorCheckIn, Stage, Upgradability, UpgradeError, UpgradeState,
    UpgradeTimeouts, UpgraderCheckIn, Workflow,
};

use common::{sample_cluster, setup_test_store, FakeSensorConnection};

const CLUSTER_ID: &str = "cluster-e2e";
const CENTRAL_VERSION: &str = "4.5.1";
const OLD_VERSION: &str = "4.4.0";

fn settings() -> ControllerSettings {
    ControllerSettings {
        central_version: CENTRAL_VERSION.to_string(),
        auto_upgrade_enabled: false,
        timeouts: UpgradeTimeouts::default(),
    }
}

fn upgrader_check_in(process_id: &str, workflow: &str, stage: Stage, error: &str) -> UpgraderCheckIn {
    UpgraderCheckIn {
        cluster_id: CLUSTER_ID.to_string(),
        process_id: process_id.to_string(),
        current_workflow: workflow.to_string(),
        last_executed_stage: stage,
        last_executed_stage_error: error.to_string(),
    }
}

#[tokio::test]
async fn test_manual_upgrade_end_to_end() {
    let (store, db, _dir) = setup_test_store().await;
    store
        .insert_cluster(&sample_cluster(CLUSTER_ID, "production", OLD_VERSION))
        .await
        .expect("failed to insert cluster");

    let registry = ControllerRegistry::new(Arc::new(store), settings());

    // No sensor connected yet.
    let err = registry.trigger_upgrade(CLUSTER_ID).await.unwrap_err();
    assert!(matches!(err, UpgradeError::NoActiveConnection(_)));

    let connection = Arc::new(FakeSensorConnection::new(OLD_VERSION));
    registry
        .register_connection(CLUSTER_ID, connection.clone())
        .await
        .expect("registration failed");

    let status = registry.upgrade_status(CLUSTER_ID).await.unwrap();
    assert_eq!(status.upgradability, Upgradability::AutoUpgradePossible);

    let process_id = registry.trigger_upgrade(CLUSTER_ID).await.unwrap();
    let trigger = connection.last_trigger().expect("no trigger injected");
    assert_eq!(trigger.process_id, process_id);
    assert_eq!(trigger.image, format!("registry.example/main:{CENTRAL_VERSION}"));

    registry
        .process_check_in_from_sensor(
            CLUSTER_ID,
            &SensorCheckIn {
                process_id: process_id.clone(),
                upgrader_pod_started: true,
            },
        )
        .await
        .unwrap();

    // Fresh upgrader asks what to do, then reports its way through the
    // roll-forward workflow.
    let response = registry
        .process_check_in_from_upgrader(&upgrader_check_in(&process_id, "", Stage::Unset, ""))
        .await
        .unwrap();
    assert_eq!(response.workflow_to_execute, Workflow::RollForward);

    for stage in [Stage::Snapshot, Stage::Preflight, Stage::Execute] {
        let response = registry
            .process_check_in_from_upgrader(&upgrader_check_in(
                &process_id,
                "roll-forward",
                stage,
                "",
            ))
            .await
            .unwrap();
        assert_eq!(response.workflow_to_execute, Workflow::RollForward);
    }

    let status = registry.upgrade_status(CLUSTER_ID).await.unwrap();
    assert_eq!(
        status.active_process().unwrap().state,
        UpgradeState::UpgradeOperationsDone
    );

    // The upgraded sensor reconnects and the process completes.
    let upgraded = Arc::new(FakeSensorConnection::new(CENTRAL_VERSION));
    registry
        .register_connection(CLUSTER_ID, upgraded)
        .await
        .unwrap();

    let status = registry.upgrade_status(CLUSTER_ID).await.unwrap();
    assert!(status.active_process().is_none());
    assert_eq!(status.upgradability, Upgradability::UpToDate);
    let process = status.most_recent_process.unwrap();
    assert_eq!(process.state, UpgradeState::UpgradeComplete);

    registry.shutdown().await;
    db.close().await;
}

#[tokio::test]
async fn test_state_survives_registry_restart() {
    let (store, db, _dir) = setup_test_store().await;
    store
        .insert_cluster(&sample_cluster(CLUSTER_ID, "staging", OLD_VERSION))
        .await
        .expect("failed to insert cluster");
    let store = Arc::new(store);

    let process_id = {
        let registry = ControllerRegistry::new(store.clone(), settings());
        let connection = Arc::new(FakeSensorConnection::new(OLD_VERSION));
        registry
            .register_connection(CLUSTER_ID, connection)
            .await
            .unwrap();
        let process_id = registry.trigger_upgrade(CLUSTER_ID).await.unwrap();
        registry
            .process_check_in_from_upgrader(&upgrader_check_in(&process_id, "", Stage::Unset, ""))
            .await
            .unwrap();
        registry.shutdown().await;
        process_id
    };

    // A new registry over the same store picks the process up where it
    // left off.
    let registry = ControllerRegistry::new(store, settings());
    let status = registry.upgrade_status(CLUSTER_ID).await.unwrap();
    let process = status.active_process().expect("process lost on restart");
    assert_eq!(process.id, process_id);
    assert_eq!(process.state, UpgradeState::UpgraderLaunched);

    // A reconnecting sensor still on the old version is told about the
    // in-flight process; past launch the trigger carries no image.
    let connection = Arc::new(FakeSensorConnection::new(OLD_VERSION));
    registry
        .register_connection(CLUSTER_ID, connection.clone())
        .await
        .unwrap();
    let trigger = connection.last_trigger().expect("trigger not re-sent");
    assert_eq!(trigger.process_id, process_id);

    // The upgrader finishes and the cluster converges.
    registry
        .process_check_in_from_upgrader(&upgrader_check_in(
            &process_id,
            "roll-forward",
            Stage::Execute,
            "",
        ))
        .await
        .unwrap();
    let upgraded = Arc::new(FakeSensorConnection::new(CENTRAL_VERSION));
    registry
        .register_connection(CLUSTER_ID, upgraded)
        .await
        .unwrap();

    let status = registry.upgrade_status(CLUSTER_ID).await.unwrap();
    assert_eq!(
        status.most_recent_process.unwrap().state,
        UpgradeState::UpgradeComplete
    );

    registry.shutdown().await;
    db.close().await;
}

#[tokio::test]
async fn test_failed_upgrade_rolls_back_and_is_confirmed() {
    let (store, db, _dir) = setup_test_store().await;
    store
        .insert_cluster(&sample_cluster(CLUSTER_ID, "production", OLD_VERSION))
        .await
        .expect("failed to insert cluster");

    let registry = ControllerRegistry::new(Arc::new(store), settings());
    let connection = Arc::new(FakeSensorConnection::new(OLD_VERSION));
    registry
        .register_connection(CLUSTER_ID, connection)
        .await
        .unwrap();

    let process_id = registry.trigger_upgrade(CLUSTER_ID).await.unwrap();
    registry
        .process_check_in_from_upgrader(&upgrader_check_in(&process_id, "", Stage::Unset, ""))
        .await
        .unwrap();

    // Execution fails mid-workflow; the upgrader is redirected to roll
    // back and reports the rollback executing.
    let response = registry
        .process_check_in_from_upgrader(&upgrader_check_in(
            &process_id,
            "roll-forward",
            Stage::Execute,
            "persistent volume claim is stuck",
        ))
        .await
        .unwrap();
    assert_eq!(response.workflow_to_execute, Workflow::RollBack);

    // Rollback executed; the upgrader is told to clean up, but the
    // process stays open until the sensor proves the rollback worked.
    let response = registry
        .process_check_in_from_upgrader(&upgrader_check_in(
            &process_id,
            "roll-back",
            Stage::Execute,
            "",
        ))
        .await
        .unwrap();
    assert_eq!(response.workflow_to_execute, Workflow::Cleanup);

    let status = registry.upgrade_status(CLUSTER_ID).await.unwrap();
    let process = status.active_process().unwrap();
    assert_eq!(process.state, UpgradeState::UpgradeErrorRollingBack);
    assert_eq!(
        process.status_detail.as_deref(),
        Some("persistent volume claim is stuck")
    );

    // The sensor comes back on its pre-upgrade version, confirming the
    // rollback worked.
    let rolled_back = Arc::new(FakeSensorConnection::new(OLD_VERSION));
    registry
        .register_connection(CLUSTER_ID, rolled_back)
        .await
        .unwrap();

    let status = registry.upgrade_status(CLUSTER_ID).await.unwrap();
    assert!(status.active_process().is_none());
    let process = status.most_recent_process.unwrap();
    assert_eq!(process.state, UpgradeState::UpgradeErrorRolledBack);
    assert_eq!(
        process.status_detail.as_deref(),
        Some("persistent volume claim is stuck")
    );

    registry.shutdown().await;
    db.close().await;
}
