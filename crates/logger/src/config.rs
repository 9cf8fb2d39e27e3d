//! Logger configuration

use crate::{DispatcherConfig, Error, Level, Result, Sampler};
use serde::{Deserialize, Serialize};

/// Settings for a [`Logger`](crate::Logger) instance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Entries below this level are discarded before sampling
    pub min_level: Level,
    /// Fraction of messages kept, `1.0` keeps everything
    pub sample_rate: f64,
    /// Seed for the deterministic sampler
    pub sample_seed: i64,
    /// Count accepted entries in the metrics collector
    pub enable_metrics: bool,
    /// Deliver through a background dispatcher instead of writing inline
    pub async_mode: Option<DispatcherConfig>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: Level::Trace,
            sample_rate: 1.0,
            sample_seed: 0,
            enable_metrics: false,
            async_mode: None,
        }
    }
}

impl LoggerConfig {
    /// Set the minimum level
    #[must_use]
    pub const fn with_min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }

    /// Set the sampling rate and seed
    #[must_use]
    pub const fn with_sampling(mut self, rate: f64, seed: i64) -> Self {
        self.sample_rate = rate;
        self.sample_seed = seed;
        self
    }

    /// Enable or disable metrics
    #[must_use]
    pub const fn with_metrics(mut self, enabled: bool) -> Self {
        self.enable_metrics = enabled;
        self
    }

    /// Enable asynchronous delivery
    #[must_use]
    pub const fn with_async(mut self, dispatcher: DispatcherConfig) -> Self {
        self.async_mode = Some(dispatcher);
        self
    }

    /// Deliver synchronously
    #[must_use]
    pub const fn without_async(mut self) -> Self {
        self.async_mode = None;
        self
    }

    /// The sampler described by this configuration
    #[must_use]
    pub const fn sampler(&self) -> Sampler {
        Sampler::new(self.sample_rate, self.sample_seed)
    }

    /// Reject structurally invalid settings
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for a NaN sampling rate or an invalid
    /// dispatcher configuration.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate.is_nan() {
            return Err(Error::Configuration(
                "sample_rate must be a number".to_string(),
            ));
        }
        if let Some(dispatcher) = &self.async_mode {
            dispatcher.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_defaults_keep_everything_inline() {
        let config = LoggerConfig::default();
        assert_eq!(config.min_level, Level::Trace);
        assert!(!config.sampler().is_active());
        assert!(config.async_mode.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: LoggerConfig = serde_json::from_str(
            r#"{"min_level":"warn","async_mode":{"buffer_capacity":8,"flush_interval":{"secs":0,"nanos":5000000},"backpressure":"drop"}}"#,
        )
        .unwrap();

        assert_eq!(config.min_level, Level::Warn);
        assert!((config.sample_rate - 1.0).abs() < f64::EPSILON);
        let dispatcher = config.async_mode.unwrap();
        assert_eq!(dispatcher.buffer_capacity, 8);
        assert_eq!(dispatcher.flush_interval, Duration::from_millis(5));
        assert_eq!(
            dispatcher.backpressure,
            crate::BackpressurePolicy::Drop
        );
    }

    #[test]
    fn test_validation() {
        assert!(LoggerConfig::default().with_sampling(f64::NAN, 1).validate().is_err());
        assert!(
            LoggerConfig::default()
                .with_async(DispatcherConfig::default().with_buffer_capacity(0))
                .validate()
                .is_err()
        );
    }
}
