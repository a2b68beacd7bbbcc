//! Guard timing configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GuardError, Result};

/// Default idle time before the warning (8 minutes)
const DEFAULT_WARN_OFFSET: Duration = Duration::from_secs(8 * 60);

/// Default idle time before the purge (10 minutes)
const DEFAULT_PURGE_OFFSET: Duration = Duration::from_secs(10 * 60);

/// Countdown cadence
const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Idle offsets, measured from the last re-arming activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Idle time until the session is warned
    #[serde(rename = "warn_after_ms", with = "millis")]
    pub warn_offset: Duration,
    /// Idle time until the session is purged
    #[serde(rename = "purge_after_ms", with = "millis")]
    pub purge_offset: Duration,
    /// Countdown tick interval
    #[serde(rename = "tick_ms", with = "millis", default = "default_tick")]
    pub tick: Duration,
}

fn default_tick() -> Duration {
    DEFAULT_TICK
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            warn_offset: DEFAULT_WARN_OFFSET,
            purge_offset: DEFAULT_PURGE_OFFSET,
            tick: DEFAULT_TICK,
        }
    }
}

impl GuardConfig {
    pub fn new(warn_offset: Duration, purge_offset: Duration) -> Self {
        Self {
            warn_offset,
            purge_offset,
            tick: DEFAULT_TICK,
        }
    }

    /// Shared or kiosk machines
    pub fn strict() -> Self {
        Self::new(Duration::from_secs(2 * 60), Duration::from_secs(3 * 60))
    }

    /// Single-user workstations
    pub fn relaxed() -> Self {
        Self::new(Duration::from_secs(25 * 60), Duration::from_secs(30 * 60))
    }

    /// Length of the warning countdown
    pub fn warning_window(&self) -> Duration {
        self.purge_offset.saturating_sub(self.warn_offset)
    }

    pub fn validate(&self) -> Result<()> {
        if self.warn_offset.is_zero() {
            return Err(GuardError::InvalidConfig(
                "warning offset must be greater than zero".to_string(),
            ));
        }
        if self.tick.is_zero() {
            return Err(GuardError::InvalidConfig(
                "tick interval must be greater than zero".to_string(),
            ));
        }
        if self.purge_offset <= self.warn_offset {
            return Err(GuardError::InvalidConfig(format!(
                "purge offset ({:?}) must be later than warning offset ({:?})",
                self.purge_offset, self.warn_offset
            )));
        }
        if self.tick > self.warning_window() {
            return Err(GuardError::InvalidConfig(format!(
                "tick interval ({:?}) is longer than the warning window ({:?})",
                self.tick,
                self.warning_window()
            )));
        }
        Ok(())
    }
}

/// Durations stored as whole milliseconds
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
