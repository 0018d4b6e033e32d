use thiserror::Error;

/// Cluster store operation errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Query failed: {0}")]
    QueryFailed(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Connection pool error: {0}")]
    ConnectionPoolError(String),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid stored data: {0}")]
    InvalidData(String),
}

/// Errors delivering messages over a sensor connection
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Connection to sensor is closed")]
    Closed,

    #[error("Failed to send to sensor: {0}")]
    SendFailed(String),
}

/// Why a connected sensor cannot be auto-upgraded from central
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AutoUpgradeUnsupported {
    #[error("cluster is Helm-managed; upgrades are applied through the Helm chart")]
    HelmManaged,

    #[error("cluster is operator-managed; upgrades are applied by the operator")]
    OperatorManaged,

    #[error("sensor does not advertise upgrade support")]
    MissingCapability,
}
