//! Configuration management for Helios
//!
//! This module handles loading, validation, and management of the application
//! configuration from YAML files.

use crate::error::{HeliosError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

mod defaults;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Host state store connection
    pub store: StoreConfig,

    /// Vehicle adapter identity
    pub vehicle: VehicleConfig,

    /// Datapoint keys that are not owned by the vehicle adapter
    pub keys: KeysConfig,

    /// Control loop limits, thresholds and timers
    pub controls: ControlsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Web server binding configuration
    pub web: WebConfig,

    /// Sensor snapshot interval in seconds
    pub poll_interval_seconds: u64,

    /// Value seeded into the PV-only mode flag when it does not exist yet
    pub auto_mode_default: bool,
}

/// Which state store backend to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// In-process store, useful for dry runs
    Memory,
    /// ioBroker simple-api REST adapter
    SimpleApi,
}

/// State store connection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub kind: StoreKind,

    /// Base URL of the simple-api adapter, e.g. `http://192.168.1.10:8087`
    pub base_url: String,

    /// How often a watched datapoint is polled for changes
    pub watch_interval_ms: u64,

    /// Per-request timeout
    pub request_timeout_ms: u64,

    /// Attempts per request before giving up
    pub max_retries: u32,

    /// Initial back-off between attempts (doubles each retry)
    pub retry_delay_ms: u64,
}

/// Vehicle adapter identity used to build datapoint keys
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleConfig {
    /// Adapter instance, e.g. `tesla-motors.0`
    pub adapter_instance: String,

    /// Vehicle identification number as used by the adapter
    pub vin: String,
}

/// Keys of sensors owned by other adapters plus the local namespace
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    /// Power flowing into the grid in W (non-negative)
    pub pv_export_power: String,

    /// Power taken from the grid in W (non-negative)
    pub grid_import_power: String,

    /// SoC of the home reserve battery (0-100)
    pub reserve_battery_soc: String,

    /// Namespace for datapoints this controller owns
    pub local_prefix: String,
}

/// Control loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    /// Whether a home reserve battery must be charged before the car
    pub reserve_battery_present: bool,

    /// Minimum reserve battery SoC (inclusive) for PV autocharge
    pub reserve_battery_soc_threshold: f64,

    /// Export power above which the current is stepped up
    pub increase_threshold_w: f64,

    /// Import power above which the current is stepped down
    pub decrease_threshold_w: f64,

    pub min_amps: i32,
    pub max_amps: i32,

    /// Amps added per increase step
    pub increase_step: i32,

    /// Amps removed per decrease step
    pub decrease_step: i32,

    /// Current requested whenever PV-only mode is off
    pub max_manual_amps: i32,

    /// Debounce before a stop command is actually sent
    pub stop_delay_seconds: u64,

    /// Wait before re-sending a start or stop the vehicle has not confirmed
    pub command_retry_seconds: u64,

    /// Actual current at or above which a start counts as confirmed
    pub start_confirm_amps: f64,

    /// Actual current at or below which a stop counts as confirmed
    pub stop_confirm_epsilon: f64,

    /// Allowed gap between pushed setpoint and actual current
    pub current_tolerance: f64,

    /// Consecutive ticks outside tolerance before warning
    pub convergence_warn_ticks: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Optional console-specific level
    pub console_level: Option<String>,

    /// Optional file-specific level
    pub file_level: Option<String>,

    /// Path to log file
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub enabled: bool,

    /// Bind address
    pub host: String,

    /// TCP port
    pub port: u16,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from an explicit path or the default locations
    pub fn load(override_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = override_path {
            if !path.exists() {
                return Err(HeliosError::config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            return Self::from_file(path);
        }

        let default_paths = [
            "helios_config.yaml",
            "/data/helios_config.yaml",
            "/etc/helios/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        Ok(Self::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let c = &self.controls;

        if c.min_amps < 0 {
            return Err(HeliosError::validation(
                "controls.min_amps",
                "Must not be negative",
            ));
        }

        if c.min_amps > c.max_amps {
            return Err(HeliosError::validation(
                "controls.min_amps",
                "Must not exceed controls.max_amps",
            ));
        }

        if c.max_manual_amps < c.min_amps || c.max_manual_amps > c.max_amps {
            return Err(HeliosError::validation(
                "controls.max_manual_amps",
                "Must lie within [min_amps, max_amps]",
            ));
        }

        if c.increase_step < 0 || c.decrease_step < 0 {
            return Err(HeliosError::validation(
                "controls.increase_step",
                "Step sizes must not be negative",
            ));
        }

        if !(0.0..=100.0).contains(&c.reserve_battery_soc_threshold) {
            return Err(HeliosError::validation(
                "controls.reserve_battery_soc_threshold",
                "Must be between 0 and 100",
            ));
        }

        if c.increase_threshold_w < 0.0 || c.decrease_threshold_w < 0.0 {
            return Err(HeliosError::validation(
                "controls.increase_threshold_w",
                "Power thresholds must not be negative",
            ));
        }

        if self.poll_interval_seconds == 0 {
            return Err(HeliosError::validation(
                "poll_interval_seconds",
                "Must be greater than 0",
            ));
        }

        if self.vehicle.adapter_instance.is_empty() {
            return Err(HeliosError::validation(
                "vehicle.adapter_instance",
                "Adapter instance cannot be empty",
            ));
        }

        if self.keys.pv_export_power.is_empty() || self.keys.grid_import_power.is_empty() {
            return Err(HeliosError::validation(
                "keys.pv_export_power",
                "Export and import keys are required",
            ));
        }

        if c.reserve_battery_present && self.keys.reserve_battery_soc.is_empty() {
            return Err(HeliosError::validation(
                "keys.reserve_battery_soc",
                "Required when controls.reserve_battery_present is set",
            ));
        }

        if self.store.kind == StoreKind::SimpleApi {
            if self.store.base_url.is_empty() {
                return Err(HeliosError::validation(
                    "store.base_url",
                    "Base URL cannot be empty for the simple_api store",
                ));
            }
            if self.store.watch_interval_ms == 0 {
                return Err(HeliosError::validation(
                    "store.watch_interval_ms",
                    "Must be greater than 0",
                ));
            }
        }

        Ok(())
    }
}
