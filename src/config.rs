//! Configuration loading and management

use std::time::Duration;

use anyhow::{Context, Result};

/// Default time the widget spends in [`Resetting`](crate::state::WidgetMode::Resetting)
/// before settling back to `Dormant`, matching the reference fade-out.
pub const DEFAULT_RESET_DELAY: Duration = Duration::from_millis(800);

/// Widget core configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Delay between entering `Resetting` and settling in `Dormant`
    pub reset_delay: Duration,

    /// Capacity of the input channel feeding the state machine
    pub input_capacity: usize,

    /// Capacity of the outbound event broadcast channel
    pub event_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reset_delay: DEFAULT_RESET_DELAY,
            input_capacity: 32,
            event_capacity: 64,
        }
    }
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("COMPANION_RESET_DELAY_MS") {
            let ms: u64 = value
                .parse()
                .context("COMPANION_RESET_DELAY_MS must be an integer")?;
            config.reset_delay = Duration::from_millis(ms);
        }

        Ok(config)
    }

    /// Override the reset delay
    pub fn with_reset_delay(mut self, delay: Duration) -> Self {
        self.reset_delay = delay;
        self
    }
}
