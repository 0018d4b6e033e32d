use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid central version: {0}. Must be a semantic version")]
    InvalidCentralVersion(String),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid {name}: must be at least 1 second")]
    ZeroTimeout { name: &'static str },

    #[error("Invalid timeouts: stuck_state_timeout_secs ({0}) must be less than absolute_timeout_secs ({1})")]
    StuckExceedsAbsolute(u64, u64),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .argus/config.yaml (project config, created by init)
    /// 3. .argus/local.yaml (project local overrides, optional)
    /// 4. Environment variables (ARGUS_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".argus/config.yaml"))
            .merge(Yaml::file(".argus/local.yaml"))
            .merge(Env::prefixed("ARGUS_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if semver::Version::parse(config.central.version.trim_start_matches('v')).is_err() {
            return Err(ConfigError::InvalidCentralVersion(
                config.central.version.clone(),
            ));
        }

        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }

        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        for (name, value) in [
            ("absolute_timeout_secs", config.upgrade.absolute_timeout_secs),
            (
                "stuck_state_timeout_secs",
                config.upgrade.stuck_state_timeout_secs,
            ),
            (
                "stuck_check_interval_secs",
                config.upgrade.stuck_check_interval_secs,
            ),
            ("rollback_window_secs", config.upgrade.rollback_window_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroTimeout { name });
            }
        }

        if config.upgrade.stuck_state_timeout_secs >= config.upgrade.absolute_timeout_secs {
            return Err(ConfigError::StuckExceedsAbsolute(
                config.upgrade.stuck_state_timeout_secs,
                config.upgrade.absolute_timeout_secs,
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.central.endpoint, "central.argus.svc:443");
        assert!(config.central.auto_upgrade_enabled);
        assert_eq!(config.database.path, ".argus/argus.db");
        assert_eq!(config.upgrade.absolute_timeout_secs, 1800);
        assert_eq!(config.logging.level, "info");
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
central:
  version: 4.5.1
  endpoint: central.example.com:443
  auto_upgrade_enabled: false
upgrade:
  absolute_timeout_secs: 3600
  rollback_window_secs: 300
database:
  path: /custom/path.db
  max_connections: 5
logging:
  level: debug
  format: pretty
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.central.version, "4.5.1");
        assert_eq!(config.central.endpoint, "central.example.com:443");
        assert!(!config.central.auto_upgrade_enabled);
        assert_eq!(config.upgrade.absolute_timeout_secs, 3600);
        assert_eq!(config.upgrade.rollback_window_secs, 300);
        // Unset sections fall back to their defaults.
        assert_eq!(config.upgrade.stuck_state_timeout_secs, 600);
        assert_eq!(config.database.path, "/custom/path.db");
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.logging.level, "debug");

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_invalid_central_version() {
        let mut config = Config::default();
        config.central.version = "not-a-version".to_string();

        let result = ConfigLoader::validate(&config);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidCentralVersion(_)
        ));
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();

        let result = ConfigLoader::validate(&config);
        match result.unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "invalid"),
            other => panic!("Expected InvalidLogLevel error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();

        let result = ConfigLoader::validate(&config);
        match result.unwrap_err() {
            ConfigError::InvalidLogFormat(format) => assert_eq!(format, "xml"),
            other => panic!("Expected InvalidLogFormat error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_empty_database_path() {
        let mut config = Config::default();
        config.database.path = String::new();

        let result = ConfigLoader::validate(&config);
        assert!(matches!(result.unwrap_err(), ConfigError::EmptyDatabasePath));
    }

    #[test]
    fn test_validate_zero_max_connections() {
        let mut config = Config::default();
        config.database.max_connections = 0;

        let result = ConfigLoader::validate(&config);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidMaxConnections(0)
        ));
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = Config::default();
        config.upgrade.absolute_timeout_secs = 0;

        let result = ConfigLoader::validate(&config);
        assert!(matches!(result.unwrap_err(), ConfigError::ZeroTimeout { .. }));
    }

    #[test]
    fn test_validate_stuck_timeout_exceeding_absolute() {
        let mut config = Config::default();
        config.upgrade.absolute_timeout_secs = 60;
        config.upgrade.stuck_state_timeout_secs = 600;

        let result = ConfigLoader::validate(&config);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::StuckExceedsAbsolute(600, 60)
        ));
    }

    #[test]
    fn test_env_override() {
        temp_env::with_vars(
            [
                ("ARGUS_CENTRAL__VERSION", Some("9.9.9")),
                ("ARGUS_LOGGING__LEVEL", Some("debug")),
            ],
            || {
                let config = ConfigLoader::load().expect("load should succeed");
                assert_eq!(config.central.version, "9.9.9");
                assert_eq!(config.logging.level, "debug");
            },
        );
    }

    #[test]
    fn test_hierarchical_merging() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut base_file = NamedTempFile::new().unwrap();
        writeln!(
            base_file,
            "central:\n  version: 4.5.0\nlogging:\n  level: info\n  format: json"
        )
        .unwrap();
        base_file.flush().unwrap();

        let mut override_file = NamedTempFile::new().unwrap();
        writeln!(override_file, "central:\n  version: 4.5.1\nlogging:\n  level: debug").unwrap();
        override_file.flush().unwrap();

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(base_file.path()))
            .merge(Yaml::file(override_file.path()))
            .extract()
            .unwrap();

        assert_eq!(config.central.version, "4.5.1", "Override should win");
        assert_eq!(
            config.logging.level, "debug",
            "Override should win for nested fields"
        );
        assert_eq!(
            config.logging.format, "json",
            "Base value should persist when not overridden"
        );
    }
}
