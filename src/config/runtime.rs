//! Runtime housekeeping configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Settings for the periodic sweep that evicts finished conversations.
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    /// How often the sweeper runs, in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// How long a terminal conversation is kept before eviction, in seconds
    #[serde(default = "default_terminal_max_age")]
    pub terminal_max_age_secs: u64,
}

impl RuntimeConfig {
    /// Get the sweep interval as a Duration
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Get the terminal max age as a Duration
    pub fn terminal_max_age(&self) -> Duration {
        Duration::from_secs(self.terminal_max_age_secs)
    }

    /// Validate runtime configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.sweep_interval_secs == 0 {
            return Err(ValidationError::InvalidSweepInterval);
        }
        Ok(())
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval(),
            terminal_max_age_secs: default_terminal_max_age(),
        }
    }
}

fn default_sweep_interval() -> u64 {
    300
}

fn default_terminal_max_age() -> u64 {
    3600
}
