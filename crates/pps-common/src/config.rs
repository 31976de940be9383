//! Configuration structures for the syntonization runtime.
//!
//! Supports TOML deserialization with defaults matching the reference
//! bench (600 MHz cycle clock, 10 MHz secondary oscillator) and explicit
//! values for other boards.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisciplineConfig {
    /// Nominal rate of the secondary (reference) oscillator in Hz.
    pub nominal_secondary_hz: f64,

    /// Reference edges to observe before computing the calibration ratio.
    /// The first edge arms the frequency sampler and produces no diagnostic.
    pub warmup_edge_count: u32,

    /// Cycle-clock rate divided by 1e6 (cycles per microsecond).
    pub cycles_per_microsecond: f64,

    /// Fixed correction subtracted from every recomputed period, in
    /// microseconds. Compensates the timer-reprogram latency bias and is
    /// board-specific; 0 when unmeasured.
    pub empirical_bias_micros: f64,

    /// Nominal generator period in microseconds (one reference period).
    pub nominal_interval_micros: f64,

    /// Maximum deviation of a computed period from nominal, in PPM.
    /// Out-of-band periods are rejected and the previous period held.
    pub interval_guard_ppm: f64,

    /// Plausibility band for raw gated pulse counts, in PPM of nominal.
    pub sample_guard_ppm: f64,

    /// Hardware backend selection.
    pub backend: BackendKind,

    /// Telemetry and diagnostics configuration.
    pub telemetry: TelemetryConfig,

    /// Simulated bench parameters (used when `backend = "simulated"`).
    pub simulation: SimulationConfig,
}

impl Default for DisciplineConfig {
    fn default() -> Self {
        Self {
            nominal_secondary_hz: 10_000_000.0,
            warmup_edge_count: 10,
            cycles_per_microsecond: 600.0,
            empirical_bias_micros: 0.0,
            nominal_interval_micros: 1_000_000.0,
            interval_guard_ppm: 1_000.0,
            sample_guard_ppm: 10_000.0,
            backend: BackendKind::Simulated,
            telemetry: TelemetryConfig::default(),
            simulation: SimulationConfig::default(),
        }
    }
}

impl DisciplineConfig {
    /// Nominal pulse count of one gated one-second sample.
    #[must_use]
    pub fn nominal_sample_count(&self) -> u64 {
        self.nominal_secondary_hz.round() as u64
    }

    /// Check the configuration for values the core cannot operate on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nominal_secondary_hz <= 0.0 {
            return Err(ConfigError::Invalid(
                "nominal_secondary_hz must be positive".into(),
            ));
        }
        if self.cycles_per_microsecond <= 0.0 {
            return Err(ConfigError::Invalid(
                "cycles_per_microsecond must be positive".into(),
            ));
        }
        if self.nominal_interval_micros <= 0.0 {
            return Err(ConfigError::Invalid(
                "nominal_interval_micros must be positive".into(),
            ));
        }
        if self.warmup_edge_count == 0 {
            return Err(ConfigError::Invalid(
                "warmup_edge_count must be at least 1".into(),
            ));
        }
        if self.interval_guard_ppm <= 0.0 || self.sample_guard_ppm <= 0.0 {
            return Err(ConfigError::Invalid("guard bands must be positive".into()));
        }
        Ok(())
    }
}

/// Hardware backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Deterministic simulated bench for testing.
    #[default]
    Simulated,
    /// Board-specific backend supplied by an out-of-tree crate.
    External,
}

/// Telemetry and diagnostics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Emit one CSV line per generator firing on stdout.
    pub csv: bool,

    /// Interval between drift statistics summary log lines.
    #[serde(with = "humantime_serde")]
    pub stats_interval: Duration,

    /// Offsets beyond this magnitude (microseconds) count as drift alerts.
    pub drift_alert_micros: f64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            csv: true,
            stats_interval: Duration::from_secs(60),
            drift_alert_micros: 100.0,
        }
    }
}

/// Simulated bench parameters.
///
/// Models the two imperfections the discipline must absorb: a secondary
/// oscillator off its nominal rate, and a CPU clock off its nominal rate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Secondary-oscillator frequency error in PPM of nominal.
    pub secondary_drift_ppm: f64,

    /// CPU cycle-clock frequency error in PPM of nominal.
    pub cpu_clock_error_ppm: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            secondary_drift_ppm: 0.0,
            cpu_clock_error_ppm: 0.0,
        }
    }
}

impl DisciplineConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    /// Serialize configuration to TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Semantically invalid configuration value.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Serde helper module for `Duration` using humantime format.
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DisciplineConfig::default();
        assert_eq!(config.nominal_secondary_hz, 10_000_000.0);
        assert_eq!(config.warmup_edge_count, 10);
        assert_eq!(config.cycles_per_microsecond, 600.0);
        assert_eq!(config.empirical_bias_micros, 0.0);
        assert_eq!(config.backend, BackendKind::Simulated);
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            nominal_secondary_hz = 12800000.0
            warmup_edge_count = 5
            cycles_per_microsecond = 480.0
            empirical_bias_micros = 0.005

            [telemetry]
            csv = false
            stats_interval = "30s"

            [simulation]
            secondary_drift_ppm = -2.5
        "#;

        let config = DisciplineConfig::from_toml(toml).unwrap();
        assert_eq!(config.nominal_secondary_hz, 12_800_000.0);
        assert_eq!(config.warmup_edge_count, 5);
        assert_eq!(config.cycles_per_microsecond, 480.0);
        assert_eq!(config.empirical_bias_micros, 0.005);
        assert!(!config.telemetry.csv);
        assert_eq!(config.telemetry.stats_interval, Duration::from_secs(30));
        assert_eq!(config.simulation.secondary_drift_ppm, -2.5);
        // Unspecified sections keep defaults
        assert_eq!(config.interval_guard_ppm, 1_000.0);
    }

    #[test]
    fn test_roundtrip_toml() {
        let config = DisciplineConfig::default();
        let toml = config.to_toml().unwrap();
        let parsed = DisciplineConfig::from_toml(&toml).unwrap();
        assert_eq!(parsed.nominal_secondary_hz, config.nominal_secondary_hz);
        assert_eq!(parsed.telemetry.stats_interval, config.telemetry.stats_interval);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = DisciplineConfig::default();
        config.cycles_per_microsecond = 0.0;
        assert!(config.validate().is_err());

        let mut config = DisciplineConfig::default();
        config.warmup_edge_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_nominal_sample_count() {
        let config = DisciplineConfig::default();
        assert_eq!(config.nominal_sample_count(), 10_000_000);
    }
}
