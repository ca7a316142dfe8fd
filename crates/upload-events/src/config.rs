//! Tracker and bus configuration.
//!
//! Both structs deserialize from TOML with every field optional:
//!
//! ```toml
//! [tracker]
//! release_policy = "fail-fast"
//!
//! [bus]
//! tap_capacity = 256
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_TAP_CAPACITY: usize = 1024;

fn default_tap_capacity() -> usize {
    DEFAULT_TAP_CAPACITY
}

/// What `release_all` does when the bus refuses to unsubscribe a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReleasePolicy {
    /// Attempt every registration, forget all of them, report the first failure.
    #[default]
    BestEffort,
    /// Stop at the first failure; it and everything after it stay tracked.
    FailFast,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub release_policy: ReleasePolicy,
}

impl TrackerConfig {
    pub fn with_release_policy(mut self, policy: ReleasePolicy) -> Self {
        self.release_policy = policy;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Capacity of the broadcast channel behind [`LocalBus::watch`](crate::LocalBus::watch).
    #[serde(default = "default_tap_capacity")]
    pub tap_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            tap_capacity: default_tap_capacity(),
        }
    }
}

impl BusConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tap_capacity == 0 {
            return Err(ConfigError::Invalid(
                "bus.tap_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadEventsConfig {
    pub tracker: TrackerConfig,
    pub bus: BusConfig,
}

impl UploadEventsConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.bus.validate()?;
        Ok(config)
    }
}
