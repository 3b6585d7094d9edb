//! Application configuration.

use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Application name, used in log output.
    pub name: String,
    /// Default `tracing` filter when `RUST_LOG` is not set.
    pub log_filter: String,
    /// Install a `tracing-subscriber` formatter when [`Application::run`] begins.
    ///
    /// [`Application::run`]: crate::Application::run
    pub init_logging: bool,
    /// Target ticks per second (None for unlimited).
    pub target_tick_rate: Option<u32>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "RD Application".to_string(),
            log_filter: "info".to_string(),
            init_logging: true,
            target_tick_rate: None,
        }
    }
}

impl AppConfig {
    /// Create a new config with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the default log filter.
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Enable or disable logging initialization in `run`.
    pub fn with_logging(mut self, init_logging: bool) -> Self {
        self.init_logging = init_logging;
        self
    }

    /// Set the target tick rate.
    pub fn with_target_tick_rate(mut self, ticks_per_second: u32) -> Self {
        self.target_tick_rate = Some(ticks_per_second);
        self
    }

    /// Minimum duration of one tick, if the loop is paced.
    pub fn tick_interval(&self) -> Option<Duration> {
        match self.target_tick_rate {
            Some(rate) if rate > 0 => Some(Duration::from_secs_f64(1.0 / f64::from(rate))),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = AppConfig::default();
        assert_eq!(config.log_filter, "info");
        assert!(config.init_logging);
        assert_eq!(config.tick_interval(), None);
    }

    #[test]
    fn builder_chain() {
        let config = AppConfig::new("viewer")
            .with_log_filter("debug,rd_driver=trace")
            .with_logging(false)
            .with_target_tick_rate(50);
        assert_eq!(config.name, "viewer");
        assert_eq!(config.log_filter, "debug,rd_driver=trace");
        assert!(!config.init_logging);
        assert_eq!(config.tick_interval(), Some(Duration::from_millis(20)));
    }

    #[test]
    fn zero_rate_is_unpaced() {
        let config = AppConfig::default().with_target_tick_rate(0);
        assert_eq!(config.tick_interval(), None);
    }
}
