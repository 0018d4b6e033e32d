//! Common test utilities for integration tests
//!
//! Provides shared fixtures, helpers, and test utilities used across
//! multiple integration test files.

use std::sync::Mutex;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::Notify;

use argus::domain::ports::{AutoUpgradeUnsupported, ConnectionError, SensorConnection};
use argus::{Cluster, DatabaseConnection, SqliteClusterStore, UpgradeTrigger};

/// Open a cluster store backed by a SQLite file in a fresh temp directory.
///
/// The returned `TempDir` must be kept alive for the duration of the test;
/// dropping it deletes the database file out from under the pool.
pub async fn setup_test_store() -> (SqliteClusterStore, DatabaseConnection, TempDir) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let url = format!("sqlite:{}/argus.db", dir.path().display());
    let db = DatabaseConnection::new(&url, 5)
        .await
        .expect("failed to open test database");
    let store = SqliteClusterStore::new(db.pool().clone());
    store.init_schema().await.expect("failed to create schema");
    (store, db, dir)
}

/// Build a cluster whose main image carries the given version tag.
#[allow(dead_code)]
pub fn sample_cluster(id: &str, name: &str, version: &str) -> Cluster {
    Cluster::new(
        name,
        format!("registry.example/main:{version}"),
        "central.example:443",
    )
    .with_id(id)
}

/// Scripted stand-in for a live sensor connection.
///
/// Records every injected trigger and lets tests simulate the stream
/// closing from the sensor side.
#[allow(dead_code)]
pub struct FakeSensorConnection {
    version: String,
    support: Result<(), AutoUpgradeUnsupported>,
    triggers: Mutex<Vec<UpgradeTrigger>>,
    closed: Notify,
}

#[allow(dead_code)]
impl FakeSensorConnection {
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
            support: Ok(()),
            triggers: Mutex::new(Vec::new()),
            closed: Notify::new(),
        }
    }

    pub fn unsupported(version: &str, reason: AutoUpgradeUnsupported) -> Self {
        Self {
            support: Err(reason),
            ..Self::new(version)
        }
    }

    pub fn last_trigger(&self) -> Option<UpgradeTrigger> {
        self.triggers.lock().unwrap().last().cloned()
    }

    pub fn trigger_count(&self) -> usize {
        self.triggers.lock().unwrap().len()
    }

    pub fn close(&self) {
        self.closed.notify_waiters();
    }
}

#[async_trait]
impl SensorConnection for FakeSensorConnection {
    fn sensor_version(&self) -> String {
        self.version.clone()
    }

    fn check_auto_upgrade_support(&self) -> Result<(), AutoUpgradeUnsupported> {
        self.support
    }

    async fn inject_trigger(&self, trigger: UpgradeTrigger) -> Result<(), ConnectionError> {
        self.triggers.lock().unwrap().push(trigger);
        Ok(())
    }

    async fn closed(&self) {
        self.closed.notified().await;
    }
}
