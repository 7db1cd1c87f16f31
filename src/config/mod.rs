//! # Response Manager Configuration
//!
//! Tunables for subscription buffering, record retention, default wait bounds
//! and the lifecycle event channel.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use command_response_manager::config::ConfigLoader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Defaults, then config/command_response.{yaml,toml}, then CRM_* variables
//! let config = ConfigLoader::load()?;
//!
//! let retention = config.retention_window();
//! let buffer = config.subscription_buffer_capacity;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants::defaults;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigLoader;

/// Root configuration for a `CommandResponseManager`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CommandResponseConfig {
    /// Per-subscription queue bound for non-terminal updates
    pub subscription_buffer_capacity: usize,

    /// How long an evictable terminal record stays queryable
    pub retention_window_ms: u64,

    /// Timeout used by `query_final_default`
    pub default_query_final_timeout_ms: u64,

    /// Capacity of the lifecycle event broadcast channel
    pub event_channel_capacity: usize,

    /// Upper bound on children declared by one aggregation parent
    pub max_children: usize,
}

impl Default for CommandResponseConfig {
    fn default() -> Self {
        Self {
            subscription_buffer_capacity: defaults::SUBSCRIPTION_BUFFER_CAPACITY,
            retention_window_ms: defaults::RETENTION_WINDOW_MS,
            default_query_final_timeout_ms: defaults::QUERY_FINAL_TIMEOUT_MS,
            event_channel_capacity: defaults::EVENT_CHANNEL_CAPACITY,
            max_children: defaults::MAX_CHILDREN,
        }
    }
}

impl CommandResponseConfig {
    pub fn retention_window(&self) -> Duration {
        Duration::from_millis(self.retention_window_ms)
    }

    pub fn default_query_final_timeout(&self) -> Duration {
        Duration::from_millis(self.default_query_final_timeout_ms)
    }

    /// Reject values that would make the manager unusable
    pub fn validate(&self) -> ConfigResult<()> {
        if self.subscription_buffer_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "subscription_buffer_capacity",
                self.subscription_buffer_capacity,
                "must be at least 1",
            ));
        }
        if self.event_channel_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "event_channel_capacity",
                self.event_channel_capacity,
                "must be at least 1",
            ));
        }
        if self.max_children == 0 {
            return Err(ConfigurationError::invalid_value(
                "max_children",
                self.max_children,
                "must be at least 1",
            ));
        }
        if self.default_query_final_timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "default_query_final_timeout_ms",
                self.default_query_final_timeout_ms,
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}
