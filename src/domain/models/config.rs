use serde::{Deserialize, Serialize};

/// Main configuration structure for Argus central
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Central identity and reachability
    #[serde(default)]
    pub central: CentralConfig,

    /// Upgrade orchestration tuning
    #[serde(default)]
    pub upgrade: UpgradeConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            central: CentralConfig::default(),
            upgrade: UpgradeConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Central identity configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CentralConfig {
    /// Version sensors are upgraded towards
    #[serde(default = "default_central_version")]
    pub version: String,

    /// Endpoint upgraders use to reach central
    #[serde(default = "default_central_endpoint")]
    pub endpoint: String,

    /// Instance-wide switch for automatic upgrades
    #[serde(default = "default_auto_upgrade_enabled")]
    pub auto_upgrade_enabled: bool,
}

fn default_central_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_central_endpoint() -> String {
    "central.argus.svc:443".to_string()
}

const fn default_auto_upgrade_enabled() -> bool {
    true
}

impl Default for CentralConfig {
    fn default() -> Self {
        Self {
            version: default_central_version(),
            endpoint: default_central_endpoint(),
            auto_upgrade_enabled: default_auto_upgrade_enabled(),
        }
    }
}

/// Upgrade orchestration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct UpgradeConfig {
    /// Hard cap on how long one upgrade process may run, in seconds
    #[serde(default = "default_absolute_timeout_secs")]
    pub absolute_timeout_secs: u64,

    /// How long a process may sit in one state before it counts as stuck
    #[serde(default = "default_stuck_state_timeout_secs")]
    pub stuck_state_timeout_secs: u64,

    /// How often the stuck-state check runs, in seconds
    #[serde(default = "default_stuck_check_interval_secs")]
    pub stuck_check_interval_secs: u64,

    /// Window after a rollback begins in which a reconnecting sensor on
    /// the old version confirms the rollback, in seconds
    #[serde(default = "default_rollback_window_secs")]
    pub rollback_window_secs: u64,
}

const fn default_absolute_timeout_secs() -> u64 {
    1800
}

const fn default_stuck_state_timeout_secs() -> u64 {
    600
}

const fn default_stuck_check_interval_secs() -> u64 {
    30
}

const fn default_rollback_window_secs() -> u64 {
    600
}

impl Default for UpgradeConfig {
    fn default() -> Self {
        Self {
            absolute_timeout_secs: default_absolute_timeout_secs(),
            stuck_state_timeout_secs: default_stuck_state_timeout_secs(),
            stuck_check_interval_secs: default_stuck_check_interval_secs(),
            rollback_window_secs: default_rollback_window_secs(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".argus/argus.db".to_string()
}

const fn default_max_connections() -> u32 {
    10
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stderr only when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            directory: None,
        }
    }
}
