//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{DashLinkError, Result};
use crate::protocol::constants::{DEFAULT_ATT_MTU, MAX_ATT_MTU, MAX_BATCH_VARS};
use crate::protocol::VariableHash;
use crate::session::SessionLimits;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub ble: BleConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub gauges: GaugeConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Bridge discovery and link parameters
#[derive(Debug, Deserialize, Clone)]
pub struct BleConfig {
    /// Exact advertised name of the bridge
    #[serde(default = "default_device_name")]
    pub device_name: String,

    /// Fallback: any advertised name containing this substring
    #[serde(default = "default_name_filter")]
    pub name_filter: String,

    #[serde(default = "default_scan_timeout_ms")]
    pub scan_timeout_ms: u64,

    #[serde(default = "default_requested_mtu")]
    pub requested_mtu: u16,

    #[serde(default = "default_mtu")]
    pub default_mtu: u16,

    /// Treat `requested_mtu` as negotiated once connected. The BLE stack
    /// does not report the real value, so frames stay sized for
    /// `default_mtu` unless this is set.
    #[serde(default)]
    pub assume_mtu: bool,

    /// Pause between connecting and discovering services
    #[serde(default = "default_discovery_delay_ms")]
    pub discovery_delay_ms: u64,
}

/// Gauge polling
#[derive(Debug, Deserialize, Clone)]
pub struct PollingConfig {
    #[serde(default = "default_data_rate_hz")]
    pub data_rate_hz: u32,

    /// Most hashes per request frame (firmware batch limit)
    #[serde(default = "default_max_batch_vars")]
    pub max_batch_vars: usize,
}

/// Variables shown on the dashboard, in display order
#[derive(Debug, Deserialize, Clone)]
pub struct GaugeConfig {
    #[serde(default = "default_gauge_hashes")]
    pub hashes: Vec<VariableHash>,
}

/// Telemetry recording configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,
}

/// Which link carries the protocol
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// In-process firmware emulation
    #[default]
    Bench,
    /// Real radio (requires the `ble` feature)
    Ble,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TransportConfig {
    #[serde(default)]
    pub kind: TransportKind,
}

/// Diagnostic log output
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Directory for daily rolling log files; stdout only when unset
    #[serde(default)]
    pub file_dir: Option<String>,
}

// Default value functions
fn default_device_name() -> String { "ESP32 Dashboard".to_string() }
fn default_name_filter() -> String { "ESP32".to_string() }
fn default_scan_timeout_ms() -> u64 { 10000 }
fn default_requested_mtu() -> u16 { MAX_ATT_MTU }
fn default_mtu() -> u16 { DEFAULT_ATT_MTU }
fn default_discovery_delay_ms() -> u64 { 100 }

fn default_data_rate_hz() -> u32 { 10 }
fn default_max_batch_vars() -> usize { MAX_BATCH_VARS }

fn default_gauge_hashes() -> Vec<VariableHash> {
    vec![
        -1412584499, // AFR
        1986862668,  // Baro
        -1803182614, // Ignition
        -1106583792, // Boost
        123456789,   // Coolant
        987654321,   // Oil pressure
    ]
}

fn default_telemetry_enabled() -> bool { true }
fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }

impl Default for BleConfig {
    fn default() -> Self {
        Self {
            device_name: default_device_name(),
            name_filter: default_name_filter(),
            scan_timeout_ms: default_scan_timeout_ms(),
            requested_mtu: default_requested_mtu(),
            default_mtu: default_mtu(),
            assume_mtu: false,
            discovery_delay_ms: default_discovery_delay_ms(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            data_rate_hz: default_data_rate_hz(),
            max_batch_vars: default_max_batch_vars(),
        }
    }
}

impl Default for GaugeConfig {
    fn default() -> Self {
        Self { hashes: default_gauge_hashes() }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            log_dir: default_log_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
        }
    }
}

impl PollingConfig {
    /// Time between poll ticks, `1000 / data_rate_hz` milliseconds
    pub fn interval(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.data_rate_hz.max(1)))
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use dashlink::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Frame size limits for the session
    pub fn session_limits(&self) -> SessionLimits {
        SessionLimits {
            default_mtu: self.ble.default_mtu,
            max_batch_vars: self.polling.max_batch_vars,
        }
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.ble.device_name.is_empty() && self.ble.name_filter.is_empty() {
            return Err(invalid("device_name and name_filter cannot both be empty"));
        }

        if self.ble.scan_timeout_ms == 0 || self.ble.scan_timeout_ms > 60000 {
            return Err(invalid("scan_timeout_ms must be between 1 and 60000"));
        }

        // ATT MTU bounds (Bluetooth Core Vol 3 Part F)
        for (name, value) in [
            ("requested_mtu", self.ble.requested_mtu),
            ("default_mtu", self.ble.default_mtu),
        ] {
            if !(DEFAULT_ATT_MTU..=MAX_ATT_MTU).contains(&value) {
                return Err(invalid(format!(
                    "{} must be between {} and {}",
                    name, DEFAULT_ATT_MTU, MAX_ATT_MTU
                )));
            }
        }

        if self.ble.default_mtu > self.ble.requested_mtu {
            return Err(invalid("default_mtu must not exceed requested_mtu"));
        }

        if self.ble.discovery_delay_ms > 5000 {
            return Err(invalid("discovery_delay_ms must be at most 5000"));
        }

        if self.polling.data_rate_hz == 0 || self.polling.data_rate_hz > 100 {
            return Err(invalid("data_rate_hz must be between 1 and 100"));
        }

        if self.polling.max_batch_vars == 0 || self.polling.max_batch_vars > 128 {
            return Err(invalid("max_batch_vars must be between 1 and 128"));
        }

        if self.telemetry.enabled && self.telemetry.log_dir.is_empty() {
            return Err(invalid("telemetry log_dir cannot be empty when enabled"));
        }

        if self.telemetry.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file must be greater than 0"));
        }

        if self.telemetry.max_files_to_keep == 0 {
            return Err(invalid("max_files_to_keep must be greater than 0"));
        }

        if let Some(dir) = &self.logging.file_dir {
            if dir.is_empty() {
                return Err(invalid("logging file_dir cannot be empty when set"));
            }
        }

        Ok(())
    }
}

fn invalid(msg: impl std::fmt::Display) -> DashLinkError {
    DashLinkError::Config(toml::de::Error::custom(msg))
}
