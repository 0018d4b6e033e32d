pub mod controller_registry;
pub mod timeouts;
pub mod transitions;
pub mod upgrade_controller;
pub mod version;

pub use controller_registry::ControllerRegistry;
pub use timeouts::{ProcessTimer, UpgradeTimeouts};
pub use upgrade_controller::{ControllerSettings, UpgradeController};
