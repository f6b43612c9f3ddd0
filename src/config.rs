//! Configuration loading using Figment.
//!
//! Configuration is layered:
//! 1. built-in defaults (every field has one, so an empty file is valid),
//! 2. a TOML file (default `config/pull_machine.toml`),
//! 3. environment variables prefixed with `PULL_MACHINE_`, nested keys split on `__`.
//!
//! # Example
//! ```no_run
//! use pull_machine::config::PullMachineConfig;
//!
//! let config = PullMachineConfig::load()?;
//! println!("Sampling every {} ms", config.sampler.period_ms);
//! # Ok::<(), pull_machine::error::PullMachineError>(())
//! ```
//!
//! Override from the shell: `PULL_MACHINE_SERIAL__PORT=/dev/ttyACM0`.

use crate::error::{AppResult, PullMachineError};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/pull_machine.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "PULL_MACHINE_";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PullMachineConfig {
    /// Application settings
    pub application: ApplicationConfig,
    /// Serial link to the sensor
    pub serial: SerialConfig,
    /// Sampling cadence and buffer sizes
    pub sampler: SamplerConfig,
    /// Hardware calibration constants
    pub calibration: CalibrationConfig,
    /// Recording output
    pub storage: StorageConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "Pull Machine".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Serial link configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Device path or name (e.g. "COM6", "/dev/ttyACM0"). When unset, the port
    /// is discovered using `port_hint`.
    pub port: Option<String>,
    /// Baud rate
    pub baud_rate: u32,
    /// Read timeout; bounds how long a stop request can go unnoticed
    pub read_timeout_ms: u64,
    /// Pause after a failed read before retrying
    pub retry_backoff_ms: u64,
    /// Search for a port when none is configured
    pub auto_detect: bool,
    /// Text matched against port descriptions during discovery
    pub port_hint: String,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 115_200,
            read_timeout_ms: 100,
            retry_backoff_ms: 10,
            auto_detect: true,
            port_hint: "Arduino".to_string(),
        }
    }
}

impl SerialConfig {
    /// Read timeout as a `Duration`.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Retry backoff as a `Duration`.
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Sampler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Tick period in milliseconds
    pub period_ms: u64,
    /// Capacity of the angle/time/length smoothing windows
    pub smoothing_window: usize,
    /// Seconds of history kept for the power chart
    pub history_window_secs: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            period_ms: 50,
            smoothing_window: 5,
            history_window_secs: 30.0,
        }
    }
}

impl SamplerConfig {
    /// Tick period as a `Duration`.
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

/// Hardware calibration. These are measured values for one machine and are
/// not derived from anything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Added to every raw angle, in degrees
    pub angle_offset_deg: f64,
    /// Effective piston area in mm²
    pub piston_area_mm2: f64,
    /// First fixed link length in metres
    pub link_b_m: f64,
    /// Second fixed link length in metres
    pub link_c_m: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            angle_offset_deg: 49.78,
            piston_area_mm2: 1055.0,
            link_b_m: 0.522,
            link_c_m: 0.6,
        }
    }
}

/// Recording output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory recordings are written to
    pub output_dir: PathBuf,
    /// File name prefix, followed by `_<YYYYMMDD_HHMMSS>.csv`
    pub file_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            file_prefix: "pullmachine_record".to_string(),
        }
    }
}

impl PullMachineConfig {
    /// Load configuration from `config/pull_machine.toml` and environment variables.
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path. A missing file falls back
    /// to defaults plus environment.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string (defaults fill the gaps).
    pub fn from_toml_str(toml: &str) -> AppResult<Self> {
        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::string(toml))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(PullMachineError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.serial.baud_rate == 0 {
            return Err(PullMachineError::Configuration(
                "serial.baud_rate must be positive".to_string(),
            ));
        }

        if self.serial.read_timeout_ms == 0 {
            return Err(PullMachineError::Configuration(
                "serial.read_timeout_ms must be positive".to_string(),
            ));
        }

        if self.sampler.period_ms == 0 {
            return Err(PullMachineError::Configuration(
                "sampler.period_ms must be positive".to_string(),
            ));
        }

        if self.sampler.smoothing_window < 2 {
            return Err(PullMachineError::Configuration(format!(
                "sampler.smoothing_window must be at least 2, got {}",
                self.sampler.smoothing_window
            )));
        }

        if !(self.sampler.history_window_secs.is_finite() && self.sampler.history_window_secs > 0.0)
        {
            return Err(PullMachineError::Configuration(format!(
                "sampler.history_window_secs must be positive, got {}",
                self.sampler.history_window_secs
            )));
        }

        let cal = &self.calibration;
        if !cal.angle_offset_deg.is_finite() {
            return Err(PullMachineError::Configuration(
                "calibration.angle_offset_deg must be finite".to_string(),
            ));
        }
        for (name, value) in [
            ("piston_area_mm2", cal.piston_area_mm2),
            ("link_b_m", cal.link_b_m),
            ("link_c_m", cal.link_c_m),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(PullMachineError::Configuration(format!(
                    "calibration.{name} must be positive, got {value}"
                )));
            }
        }

        if self.storage.file_prefix.is_empty() {
            return Err(PullMachineError::Configuration(
                "storage.file_prefix must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
