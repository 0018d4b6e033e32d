//! Sensor version assessment.
//!
//! Compares the version a sensor reported at handshake against central's
//! own, folding in whether the connection supports auto-upgrades at all.

use semver::Version;

use crate::domain::models::Upgradability;
use crate::domain::ports::AutoUpgradeUnsupported;

/// Decide how upgradable a freshly connected sensor is.
///
/// Returns the assessment plus a human-readable reason that is persisted
/// alongside it.
pub fn classify(
    central_version: &str,
    sensor_version: &str,
    support: Result<(), AutoUpgradeUnsupported>,
) -> (Upgradability, String) {
    if sensor_version.is_empty() {
        return (
            Upgradability::ManualUpgradeRequired,
            "sensor is too old to report its version".to_string(),
        );
    }

    let sensor = match parse_version(sensor_version) {
        Some(v) => v,
        None => {
            return (
                Upgradability::ManualUpgradeRequired,
                format!("sensor version {sensor_version:?} could not be interpreted"),
            );
        }
    };

    let central = match parse_version(central_version) {
        Some(v) => v,
        None => {
            return (
                Upgradability::Unknown,
                format!("central version {central_version:?} could not be interpreted"),
            );
        }
    };

    if sensor == central {
        return (
            Upgradability::UpToDate,
            format!("sensor is running central's version ({central})"),
        );
    }
    if sensor > central {
        return (
            Upgradability::SensorVersionHigher,
            format!("sensor is running {sensor}, which is newer than central's {central}"),
        );
    }

    match support {
        Ok(()) => (
            Upgradability::AutoUpgradePossible,
            format!("sensor can be upgraded automatically from {sensor} to {central}"),
        ),
        Err(reason) => (Upgradability::ManualUpgradeRequired, reason.to_string()),
    }
}

fn parse_version(raw: &str) -> Option<Version> {
    Version::parse(raw.trim().trim_start_matches('v')).ok()
}
