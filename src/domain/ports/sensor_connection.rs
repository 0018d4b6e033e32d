use crate::domain::models::UpgradeTrigger;
use crate::domain::ports::errors::{AutoUpgradeUnsupported, ConnectionError};
use async_trait::async_trait;

/// Port for an established connection to a cluster's sensor
///
/// Implementations wrap whatever transport central speaks to sensors over.
/// A connection is immutable from the controller's point of view: once the
/// transport drops, a new connection object is registered.
#[async_trait]
pub trait SensorConnection: Send + Sync {
    /// Version the sensor reported during its handshake. Empty if the
    /// sensor predates version reporting.
    fn sensor_version(&self) -> String;

    /// Whether this connection can carry an auto-upgrade at all.
    fn check_auto_upgrade_support(&self) -> Result<(), AutoUpgradeUnsupported>;

    /// Deliver an upgrade trigger to the sensor.
    async fn inject_trigger(&self, trigger: UpgradeTrigger) -> Result<(), ConnectionError>;

    /// Resolves once the connection has gone away.
    async fn closed(&self);
}
