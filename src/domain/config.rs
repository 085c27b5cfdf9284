use crate::domain::error::{BridgeError, BridgeResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// tcp2serial configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Global configuration
    #[serde(default)]
    pub global: GlobalConfig,
    /// TCP listener configuration
    #[serde(default)]
    pub listen: ListenConfig,
    /// Serial device configuration
    #[serde(default)]
    pub serial: SerialSettings,
}

/// Global configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Default log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// TCP side of the bridge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenConfig {
    /// Address the listener binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// TCP port number
    #[serde(default = "default_port")]
    pub port: u16,
    /// Idle read timeout in milliseconds, 0 waits forever
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,
    /// Size of the read buffer handed between reader and supervisor
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

/// Serial side of the bridge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialSettings {
    /// Device path or name (COM1, /dev/ttyUSB0, ...)
    #[serde(default = "default_device")]
    pub device: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    #[serde(default)]
    pub parity: ParityConfig,
    #[serde(default)]
    pub flow_control: FlowControlConfig,
    /// Device write timeout in milliseconds
    #[serde(default = "default_write_timeout")]
    pub write_timeout_ms: u64,
}

/// Parity configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParityConfig {
    #[default]
    None,
    Odd,
    Even,
}

/// Flow control configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowControlConfig {
    #[default]
    None,
    Hardware,
    Software,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9100
}

fn default_read_timeout() -> u64 {
    60_000
}

fn default_buffer_size() -> usize {
    1024
}

#[cfg(windows)]
fn default_device() -> String {
    "COM1".to_string()
}

#[cfg(not(windows))]
fn default_device() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_baud_rate() -> u32 {
    115_200
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    1
}

fn default_write_timeout() -> u64 {
    1000
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            read_timeout_ms: default_read_timeout(),
            buffer_size: default_buffer_size(),
        }
    }
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            device: default_device(),
            baud_rate: default_baud_rate(),
            data_bits: default_data_bits(),
            stop_bits: default_stop_bits(),
            parity: ParityConfig::default(),
            flow_control: FlowControlConfig::default(),
            write_timeout_ms: default_write_timeout(),
        }
    }
}

impl ListenConfig {
    /// `host:port` string handed to the listener
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        match self.read_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

impl SerialSettings {
    pub fn new(device: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            device: device.into(),
            baud_rate,
            ..Self::default()
        }
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

impl BridgeConfig {
    /// Reject settings the bridge can not run with.
    ///
    /// Port 0 is accepted here so tests can bind an ephemeral port; the CLI
    /// checks the 1-65535 range on its own.
    pub fn validate(&self) -> BridgeResult<()> {
        if self.listen.bind_address.trim().is_empty() {
            return Err(BridgeError::config("Bind address must not be empty"));
        }
        if self.listen.buffer_size == 0 {
            return Err(BridgeError::config("Buffer size must be greater than zero"));
        }
        if self.serial.device.trim().is_empty() {
            return Err(BridgeError::config("Serial device name must not be empty"));
        }
        if self.serial.baud_rate == 0 {
            return Err(BridgeError::config("Baud rate must be a positive integer"));
        }
        if !(5..=8).contains(&self.serial.data_bits) {
            return Err(BridgeError::config(format!(
                "Invalid data bits: {}",
                self.serial.data_bits
            )));
        }
        if !(1..=2).contains(&self.serial.stop_bits) {
            return Err(BridgeError::config(format!(
                "Invalid stop bits: {}",
                self.serial.stop_bits
            )));
        }
        if self.serial.write_timeout_ms == 0 {
            return Err(BridgeError::config(
                "Serial write timeout must be at least 1 ms",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_serialization() {
        let config = BridgeConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: BridgeConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(deserialized.listen.port, 9100);
        assert_eq!(deserialized.serial.baud_rate, 115_200);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: BridgeConfig = toml::from_str(
            r#"
            [serial]
            device = "/dev/ttyS3"
            parity = "even"
            "#,
        )
        .unwrap();

        assert_eq!(config.serial.device, "/dev/ttyS3");
        assert_eq!(config.serial.parity, ParityConfig::Even);
        assert_eq!(config.serial.baud_rate, 115_200);
        assert_eq!(config.listen.port, 9100);
        assert_eq!(config.listen.buffer_size, 1024);
        assert_eq!(config.global.log_level, "info");
    }

    #[test]
    fn test_read_timeout_zero_disables() {
        let mut listen = ListenConfig::default();
        assert_eq!(listen.read_timeout(), Some(Duration::from_secs(60)));

        listen.read_timeout_ms = 0;
        assert_eq!(listen.read_timeout(), None);
    }

    #[test]
    fn test_validate() {
        assert!(BridgeConfig::default().validate().is_ok());

        let mut config = BridgeConfig::default();
        config.serial.baud_rate = 0;
        assert!(config.validate().is_err());

        let mut config = BridgeConfig::default();
        config.serial.data_bits = 9;
        assert!(config.validate().is_err());

        let mut config = BridgeConfig::default();
        config.serial.stop_bits = 3;
        assert!(config.validate().is_err());

        let mut config = BridgeConfig::default();
        config.serial.device = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = BridgeConfig::default();
        config.listen.buffer_size = 0;
        assert!(config.validate().is_err());

        let mut config = BridgeConfig::default();
        config.serial.write_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_socket_addr() {
        let listen = ListenConfig {
            bind_address: "127.0.0.1".to_string(),
            port: 4000,
            ..ListenConfig::default()
        };
        assert_eq!(listen.socket_addr(), "127.0.0.1:4000");
    }
}
