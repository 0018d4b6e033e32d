//! Timeout policy and timer handles for upgrade supervision.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use crate::domain::models::UpgradeConfig;

/// The clocks an upgrade process runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpgradeTimeouts {
    /// Hard cap from process start to forced timeout.
    pub absolute: Duration,
    /// How long one state may persist before the process counts as stuck.
    pub stuck_state: Duration,
    /// How often the stuck check runs.
    pub stuck_check_interval: Duration,
    /// Window in which a reconnecting sensor on the old version confirms
    /// a rollback.
    pub rollback_window: Duration,
}

impl Default for UpgradeTimeouts {
    fn default() -> Self {
        Self::from(&UpgradeConfig::default())
    }
}

impl From<&UpgradeConfig> for UpgradeTimeouts {
    fn from(config: &UpgradeConfig) -> Self {
        Self {
            absolute: Duration::from_secs(config.absolute_timeout_secs),
            stuck_state: Duration::from_secs(config.stuck_state_timeout_secs),
            stuck_check_interval: Duration::from_secs(config.stuck_check_interval_secs),
            rollback_window: Duration::from_secs(config.rollback_window_secs),
        }
    }
}

impl UpgradeTimeouts {
    /// Time left on the absolute clock for a process started at
    /// `initiated_at`. Zero once the deadline has passed, so a controller
    /// reloading old state times the process out immediately.
    pub fn remaining_absolute(&self, initiated_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
        let absolute = chrono::Duration::from_std(self.absolute).unwrap_or(chrono::TimeDelta::MAX);
        (initiated_at + absolute - now).to_std().unwrap_or(Duration::ZERO)
    }

    /// Whether `now` still falls inside the rollback confirmation window
    /// for a rollback that began at `started_at`.
    pub fn within_rollback_window(&self, started_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let window =
            chrono::Duration::from_std(self.rollback_window).unwrap_or(chrono::TimeDelta::MAX);
        now.signed_duration_since(started_at) <= window
    }
}

/// Handle on the supervision task watching one process.
///
/// Dropping the timer aborts the task, so replacing or clearing it in
/// controller state is enough to cancel supervision.
pub struct ProcessTimer {
    process_id: String,
    handle: JoinHandle<()>,
}

impl ProcessTimer {
    pub fn new(process_id: impl Into<String>, handle: JoinHandle<()>) -> Self {
        Self {
            process_id: process_id.into(),
            handle,
        }
    }

    pub fn process_id(&self) -> &str {
        &self.process_id
    }

    pub fn cancel(self) {
        self.handle.abort();
    }
}

impl Drop for ProcessTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl std::fmt::Debug for ProcessTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessTimer")
            .field("process_id", &self.process_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeouts_from_config() {
        let config = UpgradeConfig {
            absolute_timeout_secs: 60,
            stuck_state_timeout_secs: 20,
            stuck_check_interval_secs: 5,
            rollback_window_secs: 30,
        };
        let timeouts = UpgradeTimeouts::from(&config);
        assert_eq!(timeouts.absolute, Duration::from_secs(60));
        assert_eq!(timeouts.stuck_state, Duration::from_secs(20));
        assert_eq!(timeouts.stuck_check_interval, Duration::from_secs(5));
        assert_eq!(timeouts.rollback_window, Duration::from_secs(30));
    }

    #[test]
    fn test_remaining_absolute() {
        let timeouts = UpgradeTimeouts {
            absolute: Duration::from_secs(100),
            ..UpgradeTimeouts::default()
        };
        let now = Utc::now();

        let fresh = timeouts.remaining_absolute(now, now);
        assert_eq!(fresh, Duration::from_secs(100));

        let halfway = timeouts.remaining_absolute(now - chrono::Duration::seconds(40), now);
        assert_eq!(halfway, Duration::from_secs(60));

        let expired = timeouts.remaining_absolute(now - chrono::Duration::seconds(500), now);
        assert_eq!(expired, Duration::ZERO);
    }

    #[test]
    fn test_rollback_window() {
        let timeouts = UpgradeTimeouts {
            rollback_window: Duration::from_secs(60),
            ..UpgradeTimeouts::default()
        };
        let now = Utc::now();

        assert!(timeouts.within_rollback_window(now - chrono::Duration::seconds(30), now));
        assert!(!timeouts.within_rollback_window(now - chrono::Duration::seconds(90), now));
    }

    #[tokio::test]
    async fn test_timer_abort_on_drop() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let _keep_alive = tx;
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        let timer = ProcessTimer::new("p1", handle);
        assert_eq!(timer.process_id(), "p1");
        drop(timer);

        // Aborting the task drops its end of the channel.
        assert!(rx.await.is_err());
    }
}
