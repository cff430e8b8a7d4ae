//! Unified configuration via a single `config.toml`.
//!
//! Every section deserializes with `#[serde(default)]`, so a partial
//! file only overrides what it names.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Telemetry receive side (UDP).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Host to bind the telemetry socket on
    pub host: String,
    /// UDP port the flight data arrives on
    pub port: u16,
    /// Socket read timeout in seconds; bounds shutdown latency
    pub socket_timeout_secs: f64,
    /// Minimum period between packets forwarded to the UI sink
    pub ui_refresh_secs: f64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 5124,
            socket_timeout_secs: 3.0,
            ui_refresh_secs: 0.3,
        }
    }
}

/// Serial device side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Baud rate applied when opening a device
    pub baud_rate: u32,
    /// Read timeout per line read (ms); bounds shutdown latency
    pub read_timeout_ms: u64,
    /// Idle poll interval while no device is open (ms)
    pub poll_interval_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            read_timeout_ms: 1000,
            poll_interval_ms: 100,
        }
    }
}

/// Dispatch queue sizing and drain cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Bounded queue depth; full queues drop new entries
    pub queue_depth: usize,
    /// Drain poll timeout (ms) for dedicated dispatch threads
    pub poll_timeout_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_depth: 64,
            poll_timeout_ms: 200,
        }
    }
}

/// Traffic generator destination and cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Destination host for simulated datagrams
    pub dest_host: String,
    /// Destination UDP port
    pub port: u16,
    /// Seconds between samples (0.01 = 100 Hz)
    pub sample_period_secs: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            dest_host: "localhost".into(),
            port: 5124,
            sample_period_secs: 0.01,
        }
    }
}

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub telemetry: TelemetryConfig,
    pub serial: SerialConfig,
    pub dispatch: DispatchConfig,
    pub simulator: SimulatorConfig,
}

impl AppConfig {
    /// Loads configuration from a TOML file, falling back to defaults
    /// when the file is missing, malformed, or carries values that
    /// fail [`AppConfig::validate`]. Callers always get a usable
    /// configuration back.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str::<AppConfig>(&content) {
                    Ok(config) => {
                        let errors = config.validate();
                        if errors.is_empty() {
                            info!("configuration loaded from {}", path.display());
                            return config;
                        }
                        for problem in &errors {
                            warn!("config: {problem}");
                        }
                        warn!("invalid values in {}, falling back", path.display());
                    }
                    Err(e) => {
                        warn!("failed to parse {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    warn!("failed to read {}: {}", path.display(), e);
                }
            }
        }

        info!("using default configuration");
        AppConfig::default()
    }

    /// Saves the configuration as pretty TOML.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content = toml::to_string_pretty(self).map_err(|e| e.to_string())?;
        std::fs::write(path, content).map_err(|e| e.to_string())?;
        info!("configuration saved to {}", path.display());
        Ok(())
    }

    /// Default `config.toml` location, next to the executable.
    pub fn default_path() -> PathBuf {
        let exe_dir = std::env::current_exe()
            .map(|p| p.parent().unwrap_or(Path::new(".")).to_path_buf())
            .unwrap_or_else(|_| PathBuf::from("."));
        exe_dir.join("config.toml")
    }

    /// Validates the configuration, returning a list of problems.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.telemetry.port == 0 {
            errors.push("telemetry port must not be 0".into());
        }
        if !(0.1..=60.0).contains(&self.telemetry.socket_timeout_secs) {
            errors.push(format!(
                "telemetry socket timeout out of range: {} (0.1–60.0 s)",
                self.telemetry.socket_timeout_secs
            ));
        }
        // The range check also rejects NaN, which would otherwise
        // panic in Duration::from_secs_f64.
        if !(0.0..=60.0).contains(&self.telemetry.ui_refresh_secs) {
            errors.push(format!(
                "ui refresh period out of range: {} (0.0–60.0 s)",
                self.telemetry.ui_refresh_secs
            ));
        }
        if self.serial.baud_rate == 0 {
            errors.push("serial baud rate must not be 0".into());
        }
        if self.serial.read_timeout_ms == 0 {
            errors.push("serial read timeout must not be 0 (it bounds shutdown latency)".into());
        }
        if self.dispatch.queue_depth == 0 {
            errors.push("dispatch queue depth must not be 0".into());
        }
        if !(0.001..=10.0).contains(&self.simulator.sample_period_secs) {
            errors.push(format!(
                "simulator sample period out of range: {} (0.001–10.0 s)",
                self.simulator.sample_period_secs
            ));
        }

        errors
    }
}
