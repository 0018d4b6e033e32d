//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines the trait interfaces that infrastructure adapters
//! must implement:
//! - ClusterStore: persistence for clusters and their upgrade status
//! - SensorConnection: an established link to a cluster's sensor
//!
//! These traits define the contracts that allow the domain to be independent
//! of specific infrastructure implementations.

pub mod cluster_store;
pub mod errors;
pub mod sensor_connection;

pub use cluster_store::ClusterStore;
pub use errors::{AutoUpgradeUnsupported, ConnectionError, StoreError};
pub use sensor_connection::SensorConnection;
