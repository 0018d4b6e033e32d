//! Argus - Sensor Auto-Upgrade Control Plane
//!
//! Argus tracks the sensor deployments of secured clusters and drives their
//! upgrades: it classifies each connecting sensor against the central version,
//! launches upgrader processes, follows their check-ins through a workflow
//! state machine, and persists every state change before acting on it.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Upgrade processes, workflows, and storage ports
//! - **Service Layer** (`services`): Per-cluster upgrade controllers and the registry
//! - **Infrastructure Layer** (`infrastructure`): SQLite persistence, config, logging
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use argus::{ControllerRegistry, ControllerSettings};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Build a registry over a cluster store and route sensor
//!     // connections and upgrader check-ins through it.
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::models::{
    retag_image, Cluster, ClusterUpgradeStatus, Config, DatabaseConfig, EnvVar, LoggingConfig,
    SensorCheckIn, Stage, Upgradability, UpgradeConfig, UpgradeProcess, UpgradeProcessType,
    UpgradeState, UpgradeTrigger, UpgraderCheckIn, UpgraderCheckInResponse, Workflow,
};
pub use domain::ports::{
    AutoUpgradeUnsupported, ClusterStore, ConnectionError, SensorConnection, StoreError,
};
pub use domain::UpgradeError;
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use infrastructure::database::{DatabaseConnection, SqliteClusterStore};
pub use services::{ControllerRegistry, ControllerSettings, UpgradeController, UpgradeTimeouts};
