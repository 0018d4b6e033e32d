pub mod cluster;
pub mod config;
pub mod process;
pub mod stage;
pub mod status;
pub mod trigger;
pub mod upgrade_state;
pub mod workflow;

pub use cluster::{retag_image, Cluster};
pub use config::{CentralConfig, Config, DatabaseConfig, LoggingConfig, UpgradeConfig};
pub use process::{UpgradeProcess, UpgradeProcessType};
pub use stage::Stage;
pub use status::{ClusterUpgradeStatus, Upgradability};
pub use trigger::{
    EnvVar, SensorCheckIn, UpgradeTrigger, UpgraderCheckIn, UpgraderCheckInResponse,
};
pub use upgrade_state::UpgradeState;
pub use workflow::Workflow;
