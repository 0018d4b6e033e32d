//! SQLite cluster store integration tests.

mod common;

use std::sync::Arc;

use argus::domain::ports::ClusterStore;
use argus::{
    ClusterUpgradeStatus, DatabaseConnection, SqliteClusterStore, Upgradability, UpgradeProcess,
    UpgradeProcessType, UpgradeState,
};

use common::{sample_cluster, setup_test_store};

fn status_with_process(state: UpgradeState) -> ClusterUpgradeStatus {
    let mut process = UpgradeProcess::new(
        UpgradeProcessType::Upgrade,
        "4.5.1",
        "registry.example/main:4.5.1",
    );
    process.transition(state, Some("driven by test".to_string()));
    ClusterUpgradeStatus {
        upgradability: Upgradability::AutoUpgradePossible,
        upgradability_reason: Some("sensor is older than central".to_string()),
        most_recent_process: Some(process),
    }
}

#[tokio::test]
async fn test_status_survives_database_reopen() {
    let (store, db, dir) = setup_test_store().await;
    let cluster = sample_cluster("cluster-a", "alpha", "4.4.0");
    store.insert_cluster(&cluster).await.unwrap();

    let status = status_with_process(UpgradeState::UpgraderLaunched);
    store
        .update_cluster_upgrade_status("cluster-a", &status)
        .await
        .unwrap();
    db.close().await;

    // Reopen the same file through a fresh pool.
    let url = format!("sqlite:{}/argus.db", dir.path().display());
    let db = DatabaseConnection::new(&url, 2).await.unwrap();
    let store = SqliteClusterStore::new(db.pool().clone());

    let loaded = store
        .get_cluster("cluster-a")
        .await
        .unwrap()
        .expect("cluster gone after reopen");
    assert_eq!(loaded.name, "alpha");
    assert_eq!(loaded.upgrade_status, Some(status));

    db.close().await;
}

#[tokio::test]
async fn test_store_as_trait_object() {
    let (store, db, _dir) = setup_test_store().await;
    store
        .insert_cluster(&sample_cluster("cluster-b", "beta", "4.4.0"))
        .await
        .unwrap();

    let store: Arc<dyn ClusterStore> = Arc::new(store);
    let loaded = store.get_cluster("cluster-b").await.unwrap().unwrap();
    assert!(loaded.upgrade_status.is_none());

    store
        .update_cluster_upgrade_status("cluster-b", &status_with_process(UpgradeState::UpgradeComplete))
        .await
        .unwrap();
    let loaded = store.get_cluster("cluster-b").await.unwrap().unwrap();
    let process = loaded.upgrade_status.unwrap().most_recent_process.unwrap();
    assert_eq!(process.state, UpgradeState::UpgradeComplete);
    assert!(!process.active);

    db.close().await;
}

#[tokio::test]
async fn test_concurrent_updates_to_distinct_clusters() {
    let (store, db, _dir) = setup_test_store().await;
    for (id, name) in [("cluster-1", "one"), ("cluster-2", "two"), ("cluster-3", "three")] {
        store
            .insert_cluster(&sample_cluster(id, name, "4.4.0"))
            .await
            .unwrap();
    }
    let store = Arc::new(store);

    let mut handles = Vec::new();
    for id in ["cluster-1", "cluster-2", "cluster-3"] {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let status = status_with_process(UpgradeState::UpgradeOperationsDone);
            store.update_cluster_upgrade_status(id, &status).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    for id in ["cluster-1", "cluster-2", "cluster-3"] {
        let loaded = store.get_cluster(id).await.unwrap().unwrap();
        assert_eq!(
            loaded.upgrade_status.unwrap().most_recent_process.unwrap().state,
            UpgradeState::UpgradeOperationsDone
        );
    }

    db.close().await;
}
