//! System-wide constants for the response manager

/// Default tunables used when no configuration source sets them
pub mod defaults {
    pub const SUBSCRIPTION_BUFFER_CAPACITY: usize = 16;
    pub const RETENTION_WINDOW_MS: u64 = 60_000;
    pub const QUERY_FINAL_TIMEOUT_MS: u64 = 10_000;
    pub const EVENT_CHANNEL_CAPACITY: usize = 1_000;
    pub const MAX_CHILDREN: usize = 1_024;
}

/// Environment and file-location conventions
pub mod system {
    pub const ENV_PREFIX: &str = "CRM";
    pub const DEFAULT_CONFIG_DIR: &str = "config";
    pub const DEFAULT_CONFIG_STEM: &str = "command_response";
}

/// Lifecycle event names published on every stored transition
pub mod events {
    pub const COMMAND_TRACKED: &str = "command.tracked";
    pub const COMMAND_TRANSITIONED: &str = "command.transitioned";
    pub const COMMAND_EVICTED: &str = "command.evicted";
}
