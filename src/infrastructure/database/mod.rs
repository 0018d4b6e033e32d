//! SQLite persistence for cluster records
//!
//! Implements the `ClusterStore` port with sqlx. Connections run in WAL
//! mode; the upgrade status column stores serialized JSON.

pub mod cluster_store;
pub mod connection;
pub mod utils;

pub use cluster_store::SqliteClusterStore;
pub use connection::DatabaseConnection;
