//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::Deserialize;
use serde::de::Error;
use std::fs;
use std::path::Path;

use crate::error::{LinkError, Result};
use crate::openlrs::bind_data::SessionParameters;
use crate::openlrs::protocol::{DEFAULT_DATARATE, DEFAULT_FLAGS};
use crate::rfm22::GpioDirection;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub radio: RadioConfig,
    pub bind: BindConfig,
    pub link: LinkConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub simulator: SimulatorConfig,
}

/// Transceiver wiring
#[derive(Debug, Deserialize, Clone)]
pub struct RadioConfig {
    #[serde(default)]
    pub gpio_direction: GpioDirection,
}

/// Binding behavior at startup
#[derive(Debug, Deserialize, Clone)]
pub struct BindConfig {
    /// Bind even when valid parameters are stored
    #[serde(default)]
    pub force: bool,

    /// Bind wait in milliseconds, 0 waits forever (Ctrl+C cannot interrupt it)
    #[serde(default = "default_bind_timeout_ms")]
    pub timeout_ms: u32,
}

/// Polling task configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u32,

    #[serde(default = "default_status_log_interval_ms")]
    pub status_log_interval_ms: u32,
}

/// Bind data persistence
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_bind_file")]
    pub bind_file: String,
}

/// Log output
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Directory for daily log files; empty logs to the console only
    #[serde(default)]
    pub dir: String,

    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Simulated transmitter used when no hardware is attached
#[derive(Debug, Deserialize, Clone)]
pub struct SimulatorConfig {
    #[serde(default = "default_sim_rssi")]
    pub rssi: u8,

    #[serde(default = "default_sim_flags")]
    pub flags: u8,

    #[serde(default = "default_sim_modem_params")]
    pub modem_params: u8,
}

// Default value functions
fn default_bind_timeout_ms() -> u32 { 10000 }

fn default_poll_interval_ms() -> u32 { 1 }
fn default_status_log_interval_ms() -> u32 { 5000 }

fn default_bind_file() -> String { "./openlrs-bind.json".to_string() }

fn default_log_level() -> String { "info".to_string() }

fn default_sim_rssi() -> u8 { 120 }
fn default_sim_flags() -> u8 { DEFAULT_FLAGS }
fn default_sim_modem_params() -> u8 { DEFAULT_DATARATE }

fn invalid(message: impl std::fmt::Display) -> LinkError {
    LinkError::Config(toml::de::Error::custom(message))
}

impl SimulatorConfig {
    /// Session the simulated transmitter binds with
    pub fn session(&self) -> SessionParameters {
        SessionParameters {
            flags: self.flags,
            modem_params: self.modem_params,
            ..SessionParameters::default()
        }
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
    /// use openlrs_rx::config::Config;
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

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        if self.link.poll_interval_ms == 0 || self.link.poll_interval_ms > 100 {
            return Err(invalid("poll_interval_ms must be between 1 and 100"));
        }

        if self.link.status_log_interval_ms == 0 || self.link.status_log_interval_ms > 60000 {
            return Err(invalid("status_log_interval_ms must be between 1 and 60000"));
        }

        if self.storage.bind_file.is_empty() {
            return Err(invalid("bind_file cannot be empty"));
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(invalid("log level must be one of: trace, debug, info, warn, error"));
        }

        // The simulated transmitter must offer a session the receiver accepts
        if let Err(e) = self.simulator.session().validate() {
            return Err(invalid(format!("simulator: {}", e)));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_valid_config() -> Config {
        Config {
            radio: RadioConfig {
                gpio_direction: GpioDirection::default(),
            },
            bind: BindConfig {
                force: false,
                timeout_ms: default_bind_timeout_ms(),
            },
            link: LinkConfig {
                poll_interval_ms: default_poll_interval_ms(),
                status_log_interval_ms: default_status_log_interval_ms(),
            },
            storage: StorageConfig {
                bind_file: default_bind_file(),
            },
            logging: LoggingConfig {
                dir: String::new(),
                level: default_log_level(),
            },
            simulator: SimulatorConfig {
                rssi: default_sim_rssi(),
                flags: default_sim_flags(),
                modem_params: default_sim_modem_params(),
            },
        }
    }

    fn load_str(content: &str) -> Result<Config> {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file.flush().unwrap();
        Config::load(temp_file.path())
    }

    #[test]
    fn test_default_config() {
        assert!(create_valid_config().validate().is_ok());
    }

    #[test]
    fn test_load_config_from_file() {
        let toml_content = r#"
[radio]
gpio_direction = "gpio0_rx_gpio1_tx"

[bind]
force = true
timeout_ms = 0

[link]

[storage]
bind_file = "/tmp/bind.json"

[logging]

[simulator]
flags = 0x85
"#;

        let config = load_str(toml_content).unwrap();
        assert_eq!(config.radio.gpio_direction, GpioDirection::Gpio0RxGpio1Tx);
        assert!(config.bind.force);
        assert_eq!(config.bind.timeout_ms, 0);
        assert_eq!(config.link.poll_interval_ms, 1);
        assert_eq!(config.storage.bind_file, "/tmp/bind.json");
        assert!(config.logging.dir.is_empty());
        assert_eq!(config.simulator.session().flags, 0x85);
    }

    #[test]
    fn test_missing_section() {
        let result = load_str("[radio]\n[bind]\n[link]\n");
        assert!(matches!(result, Err(LinkError::Config(_))));
    }

    #[test]
    fn test_unknown_gpio_direction() {
        let toml_content = r#"
[radio]
gpio_direction = "sideways"
[bind]
[link]
[storage]
[logging]
[simulator]
"#;
        assert!(load_str(toml_content).is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Config::load("/nonexistent/openlrs.toml"),
            Err(LinkError::Io(_))
        ));
    }

    #[test]
    fn test_poll_interval_zero() {
        let mut config = create_valid_config();
        config.link.poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_poll_interval_too_high() {
        let mut config = create_valid_config();
        config.link.poll_interval_ms = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_status_log_interval_bounds() {
        let mut config = create_valid_config();
        config.link.status_log_interval_ms = 0;
        assert!(config.validate().is_err());

        config.link.status_log_interval_ms = 60001;
        assert!(config.validate().is_err());

        config.link.status_log_interval_ms = 60000;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_bind_file() {
        let mut config = create_valid_config();
        config.storage.bind_file = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = create_valid_config();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_simulator_reserved_channel_config() {
        let mut config = create_valid_config();
        config.simulator.flags = 0x07;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_simulator_modem_out_of_range() {
        let mut config = create_valid_config();
        config.simulator.modem_params = 5;
        assert!(config.validate().is_err());
    }
}
