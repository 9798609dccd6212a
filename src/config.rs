//! Bench configuration using Figment
//!
//! Configuration is layered from:
//! 1. built-in defaults (the bench as it is normally wired),
//! 2. an optional TOML file,
//! 3. environment variables prefixed with `ELOAD_`, using `__` between sections.
//!
//! # Environment Variable Overrides
//!
//! ```text
//! ELOAD_TELEMETRY__PORT=/dev/ttyUSB0
//! ELOAD_LOAD__RESOURCE="TCPIP0::192.168.178.112::5555::SOCKET"
//! ELOAD_STORAGE__OUTPUT_DIR=/tmp/reports
//! ```
//!
//! Settling delays, the retry attempt count and the load ramp bounds are absent
//! here: they are bench contracts, not tunables (see [`crate::timing`] and
//! [`crate::sweep::ramp`]).

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A layer could not be read or extracted.
    #[error("Configuration load error: {0}")]
    LoadError(#[from] figment::Error),
    /// A value is out of range.
    #[error("Configuration validation error: {0}")]
    ValidationError(String),
}

/// Top-level bench configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Serial telemetry sensor
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    /// Electronic load
    #[serde(default = "default_load")]
    pub load: InstrumentConfig,
    /// Programmable power supply
    #[serde(default = "default_supply")]
    pub supply: InstrumentConfig,
    /// Sweep plan location
    #[serde(default)]
    pub sweep: SweepConfig,
    /// Report output
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Serial telemetry sensor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Serial port (e.g., "COM3", "/dev/ttyUSB0")
    pub port: String,
    /// Baud rate
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Time allowed for one complete line, in milliseconds
    #[serde(default = "default_telemetry_timeout")]
    pub timeout_ms: u64,
}

/// SCPI instrument configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentConfig {
    /// VISA resource string or alias, or a raw socket resource
    /// ("TCPIP0::192.168.1.100::5555::SOCKET" / "192.168.1.100:5555")
    pub resource: String,
    /// Query timeout in milliseconds
    #[serde(default = "default_instrument_timeout")]
    pub timeout_ms: u64,
}

/// Sweep configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// CSV file with `input_voltage` and `samples` columns
    pub plan_path: PathBuf,
}

/// Report storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Output directory for reports (created if absent)
    pub output_dir: PathBuf,
    /// File name prefix, followed by the run timestamp
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_telemetry_timeout() -> u64 {
    2000
}

fn default_instrument_timeout() -> u64 {
    5000
}

fn default_file_prefix() -> String {
    "Test".to_string()
}

fn default_load() -> InstrumentConfig {
    InstrumentConfig {
        resource: "RIGOL_DC_ELoad".to_string(),
        timeout_ms: default_instrument_timeout(),
    }
}

fn default_supply() -> InstrumentConfig {
    InstrumentConfig {
        resource: "LRPS".to_string(),
        timeout_ms: default_instrument_timeout(),
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            port: "COM3".to_string(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_telemetry_timeout(),
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            plan_path: PathBuf::from("Sample_Rates.csv"),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("ELOAD_Reports"),
            file_prefix: default_file_prefix(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            telemetry: TelemetryConfig::default(),
            load: default_load(),
            supply: default_supply(),
            sweep: SweepConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Settings {
    /// Load configuration from defaults, an optional TOML file and the environment.
    ///
    /// # Errors
    /// Returns error if the file cannot be parsed or validation fails
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));
        if let Some(path) = path {
            // Toml::file silently skips a missing file
            if !path.is_file() {
                return Err(ConfigError::ValidationError(format!(
                    "config file {} not found",
                    path.display()
                )));
            }
            figment = figment.merge(Toml::file(path));
        }
        let settings: Settings = figment
            .merge(Env::prefixed("ELOAD_").split("__"))
            .extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load configuration from a TOML string (no environment overrides).
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let settings: Settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::string(content))
            .extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Semantic checks that parsing alone cannot catch.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.telemetry.port.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "telemetry.port must not be empty".to_string(),
            ));
        }
        if self.telemetry.baud_rate == 0 {
            return Err(ConfigError::ValidationError(
                "telemetry.baud_rate must be greater than 0".to_string(),
            ));
        }
        if self.telemetry.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "telemetry.timeout_ms must be greater than 0".to_string(),
            ));
        }
        for (section, instrument) in [("load", &self.load), ("supply", &self.supply)] {
            if instrument.resource.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "{}.resource must not be empty",
                    section
                )));
            }
            if instrument.timeout_ms == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "{}.timeout_ms must be greater than 0",
                    section
                )));
            }
        }
        if self.sweep.plan_path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "sweep.plan_path must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
