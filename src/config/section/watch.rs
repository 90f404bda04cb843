//! `[watch]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [watch]
//! mode = "notify"             # "notify" (OS push events) or "poll"
//! poll_interval_ms = 250      # Stat interval in poll mode
//! verbose = false             # Log every subscription and change
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::watch::{DEFAULT_POLL_INTERVAL, WatchMode};

/// File watching settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WatchSectionConfig {
    /// Engine used for every followed file.
    pub mode: WatchMode,

    /// Milliseconds between `stat` calls in poll mode.
    pub poll_interval_ms: u64,

    pub verbose: bool,
}

impl WatchSectionConfig {
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for WatchSectionConfig {
    fn default() -> Self {
        Self {
            mode: WatchMode::Notify,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            verbose: false,
        }
    }
}
