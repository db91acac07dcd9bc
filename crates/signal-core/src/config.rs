//! Configuration loading and typed config structures for the signal engine.
//!
//! The canonical configuration lives in `signal-config.yaml` next to the
//! engine binary. Every field has a default, so a missing file or a partial
//! file both yield a usable configuration.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use uuid::Uuid;

use crate::operator::MIN_TICK_INTERVAL_MS;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but violates a timing constraint.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level engine configuration.
///
/// Mirrors the structure of `signal-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SignalConfig {
    /// Identity of the intersection this engine drives.
    #[serde(default)]
    pub intersection: IntersectionConfig,

    /// Allocation constants.
    #[serde(default)]
    pub timing: TimingConfig,

    /// Run loop cadence and staleness settings.
    #[serde(default)]
    pub controller: ControllerConfig,

    /// Network endpoints.
    #[serde(default)]
    pub infrastructure: InfrastructureConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SignalConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values for infrastructure:
    /// - `NATS_URL` overrides `infrastructure.nats_url`
    /// - `OBSERVER_PORT` overrides `infrastructure.observer_port`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if the timing section is inconsistent.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if the timing section is inconsistent.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.infrastructure.apply_env_overrides();
        config.timing.validate()?;
        config.controller.validate()?;
        Ok(config)
    }

    /// The staleness window in effect: the configured value, or one full
    /// cycle budget when unset.
    pub fn staleness_window(&self) -> Duration {
        self.controller
            .staleness_window_ms
            .map_or_else(|| self.timing.cycle_duration(), Duration::from_millis)
    }
}

/// Intersection identity.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IntersectionConfig {
    /// Fixed intersection id. A fresh UUID v7 is minted at startup when
    /// absent.
    #[serde(default)]
    pub id: Option<Uuid>,

    /// Human-readable name shown on the status page.
    #[serde(default = "default_intersection_name")]
    pub name: String,
}

impl Default for IntersectionConfig {
    fn default() -> Self {
        Self {
            id: None,
            name: default_intersection_name(),
        }
    }
}

/// Allocation constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TimingConfig {
    /// Target total green seconds per cycle, split proportionally.
    #[serde(default = "default_cycle_budget_seconds")]
    pub cycle_budget_seconds: u32,

    /// Floor applied to every lane's green time.
    #[serde(default = "default_min_green_seconds")]
    pub min_green_seconds: u32,

    /// Floor applied to lanes with an emergency vehicle present.
    #[serde(default = "default_emergency_min_seconds")]
    pub emergency_min_seconds: u32,
}

impl TimingConfig {
    /// Check the constants are usable by the allocator.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the budget or minimum is zero, or
    /// the emergency minimum is below the normal minimum.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cycle_budget_seconds == 0 {
            return Err(ConfigError::Invalid {
                reason: "timing.cycle_budget_seconds must be at least 1".to_owned(),
            });
        }
        if self.min_green_seconds == 0 {
            return Err(ConfigError::Invalid {
                reason: "timing.min_green_seconds must be at least 1".to_owned(),
            });
        }
        if self.emergency_min_seconds < self.min_green_seconds {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "timing.emergency_min_seconds ({}) must not be below min_green_seconds ({})",
                    self.emergency_min_seconds, self.min_green_seconds
                ),
            });
        }
        Ok(())
    }

    /// Duration of one full cycle budget.
    pub fn cycle_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.cycle_budget_seconds))
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            cycle_budget_seconds: default_cycle_budget_seconds(),
            min_green_seconds: default_min_green_seconds(),
            emergency_min_seconds: default_emergency_min_seconds(),
        }
    }
}

/// Run loop configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ControllerConfig {
    /// Real-time milliseconds between recomputes.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Age after which last-known observations are flagged stale. Defaults
    /// to one cycle budget.
    #[serde(default)]
    pub staleness_window_ms: Option<u64>,

    /// Stop after this many cycles (0 = run until cancelled).
    #[serde(default)]
    pub max_cycles: u64,
}

impl ControllerConfig {
    /// Check the cadence is one the operator API would also accept.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `tick_interval_ms` is below
    /// [`MIN_TICK_INTERVAL_MS`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms < MIN_TICK_INTERVAL_MS {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "controller.tick_interval_ms ({}) must be at least {MIN_TICK_INTERVAL_MS}",
                    self.tick_interval_ms
                ),
            });
        }
        Ok(())
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            staleness_window_ms: None,
            max_cycles: 0,
        }
    }
}

/// Network endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InfrastructureConfig {
    /// Whether the NATS bridge is started.
    #[serde(default)]
    pub nats_enabled: bool,

    /// NATS messaging URL.
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// Subject prefix for observation and schedule messages.
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,

    /// Observer HTTP port.
    #[serde(default = "default_observer_port")]
    pub observer_port: u16,
}

impl InfrastructureConfig {
    /// Override infrastructure settings with environment variables when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("NATS_URL") {
            self.nats_url = val;
        }
        if let Some(port) = std::env::var("OBSERVER_PORT")
            .ok()
            .and_then(|val| val.parse::<u16>().ok())
        {
            self.observer_port = port;
        }
    }
}

impl Default for InfrastructureConfig {
    fn default() -> Self {
        Self {
            nats_enabled: false,
            nats_url: default_nats_url(),
            subject_prefix: default_subject_prefix(),
            observer_port: default_observer_port(),
        }
    }
}

/// Output format for the log subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable single-line output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Pretty,
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_intersection_name() -> String {
    "Main & First".to_owned()
}

const fn default_cycle_budget_seconds() -> u32 {
    60
}

const fn default_min_green_seconds() -> u32 {
    10
}

const fn default_emergency_min_seconds() -> u32 {
    30
}

const fn default_tick_interval_ms() -> u64 {
    5000
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_owned()
}

fn default_subject_prefix() -> String {
    "signal".to_owned()
}

const fn default_observer_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SignalConfig::default();
        assert_eq!(config.timing.cycle_budget_seconds, 60);
        assert_eq!(config.timing.min_green_seconds, 10);
        assert_eq!(config.timing.emergency_min_seconds, 30);
        assert!(config.timing.validate().is_ok());
        assert_eq!(config.controller.tick_interval_ms, 5000);
        assert!(!config.infrastructure.nats_enabled);
        assert_eq!(config.intersection.name, "Main & First");
    }

    #[test]
    fn staleness_window_defaults_to_one_cycle() {
        let config = SignalConfig::default();
        assert_eq!(config.staleness_window(), Duration::from_secs(60));
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
intersection:
  id: "018f3a4e-1c2b-7d3e-9f00-0123456789ab"
  name: "Harbor & 5th"

timing:
  cycle_budget_seconds: 90
  min_green_seconds: 12
  emergency_min_seconds: 40

controller:
  tick_interval_ms: 2500
  staleness_window_ms: 30000
  max_cycles: 10

infrastructure:
  nats_enabled: true
  subject_prefix: "city.signals"

logging:
  level: "debug"
  format: json
"#;
        let config = SignalConfig::parse(yaml).unwrap();
        assert_eq!(config.intersection.name, "Harbor & 5th");
        assert!(config.intersection.id.is_some());
        assert_eq!(config.timing.cycle_budget_seconds, 90);
        assert_eq!(config.timing.min_green_seconds, 12);
        assert_eq!(config.timing.emergency_min_seconds, 40);
        assert_eq!(config.controller.tick_interval_ms, 2500);
        assert_eq!(config.controller.max_cycles, 10);
        assert_eq!(config.staleness_window(), Duration::from_secs(30));
        assert!(config.infrastructure.nats_enabled);
        assert_eq!(config.infrastructure.subject_prefix, "city.signals");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn parse_minimal_yaml() {
        let yaml = r"
timing:
  min_green_seconds: 8
";
        let config = SignalConfig::parse(yaml).unwrap();
        assert_eq!(config.timing.min_green_seconds, 8);
        assert_eq!(config.timing.cycle_budget_seconds, 60);
        assert_eq!(config.timing.emergency_min_seconds, 30);
        assert_eq!(config.intersection.id, None);
    }

    #[test]
    fn parse_empty_yaml() {
        let config = SignalConfig::parse("{}").unwrap();
        assert_eq!(config.timing, TimingConfig::default());
    }

    #[test]
    fn rejects_emergency_minimum_below_normal_minimum() {
        let yaml = r"
timing:
  min_green_seconds: 20
  emergency_min_seconds: 15
";
        let err = SignalConfig::parse(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn rejects_sub_minimum_tick_interval() {
        let yaml = r"
controller:
  tick_interval_ms: 0
";
        assert!(matches!(
            SignalConfig::parse(yaml),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(SignalConfig::parse("controller:\n  tick_interval_ms: 100\n").is_ok());
    }

    #[test]
    fn rejects_zero_budget() {
        let timing = TimingConfig {
            cycle_budget_seconds: 0,
            ..TimingConfig::default()
        };
        assert!(timing.validate().is_err());
    }

    #[test]
    fn rejects_unknown_log_format() {
        let yaml = r"
logging:
  format: xml
";
        assert!(matches!(
            SignalConfig::parse(yaml),
            Err(ConfigError::Yaml { .. })
        ));
    }
}
