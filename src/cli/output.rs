use crate::cli::args::OutputFormat;
use crate::core::bridge::BridgeStatus;
use crate::domain::config::BridgeConfig;
use crate::infrastructure::serial::PortSummary;
use std::io;
use tabled::{Table, Tabled};

/// Output writer trait for different formats
pub trait OutputWriter {
    fn write_ports(&self, ports: &[PortSummary]) -> Result<(), OutputError>;
    fn write_config(&self, config: &BridgeConfig) -> Result<(), OutputError>;
    fn write_status(&self, status: &BridgeStatus) -> Result<(), OutputError>;
    fn write_message(&self, message: &str) -> Result<(), OutputError>;
}

/// Output formatting errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

impl From<OutputError> for crate::domain::error::BridgeError {
    fn from(err: OutputError) -> Self {
        Self::Output(err.to_string())
    }
}

/// Console output writer
pub struct ConsoleWriter {
    format: OutputFormat,
}

impl ConsoleWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn render_ports(&self, ports: &[PortSummary]) -> Result<String, OutputError> {
        Ok(match self.format {
            OutputFormat::Text => {
                if ports.is_empty() {
                    return Ok("No serial ports found".to_string());
                }
                ports
                    .iter()
                    .map(|port| {
                        if port.description.is_empty() {
                            format!("{} ({})", port.name, port.kind)
                        } else {
                            format!("{} ({}) {}", port.name, port.kind, port.description)
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            }
            OutputFormat::Json => serde_json::to_string_pretty(ports)?,
            OutputFormat::Table => {
                let rows: Vec<PortTableRow> = ports.iter().map(PortTableRow::from).collect();
                Table::new(rows).to_string()
            }
        })
    }

    pub fn render_config(&self, config: &BridgeConfig) -> Result<String, OutputError> {
        Ok(match self.format {
            OutputFormat::Text => {
                let read_timeout = match config.listen.read_timeout_ms {
                    0 => "none".to_string(),
                    ms => format!("{}ms", ms),
                };
                [
                    "tcp2serial Configuration:".to_string(),
                    format!("  Log level: {}", config.global.log_level),
                    format!("  Listen: {}", config.listen.socket_addr()),
                    format!("  Read timeout: {}", read_timeout),
                    format!("  Buffer size: {} bytes", config.listen.buffer_size),
                    format!("  Serial device: {}", config.serial.device),
                    format!(
                        "  Line: {} baud, {} data bits, {} stop bits, parity {:?}, flow control {:?}",
                        config.serial.baud_rate,
                        config.serial.data_bits,
                        config.serial.stop_bits,
                        config.serial.parity,
                        config.serial.flow_control
                    ),
                    format!("  Write timeout: {}ms", config.serial.write_timeout_ms),
                ]
                .join("\n")
            }
            OutputFormat::Json => serde_json::to_string_pretty(config)?,
            OutputFormat::Table => {
                let rows = vec![
                    SettingRow::new("log_level", &config.global.log_level),
                    SettingRow::new("listen", config.listen.socket_addr()),
                    SettingRow::new("read_timeout_ms", config.listen.read_timeout_ms),
                    SettingRow::new("buffer_size", config.listen.buffer_size),
                    SettingRow::new("device", &config.serial.device),
                    SettingRow::new("baud_rate", config.serial.baud_rate),
                    SettingRow::new("data_bits", config.serial.data_bits),
                    SettingRow::new("stop_bits", config.serial.stop_bits),
                    SettingRow::new("parity", format!("{:?}", config.serial.parity)),
                    SettingRow::new("flow_control", format!("{:?}", config.serial.flow_control)),
                    SettingRow::new("write_timeout_ms", config.serial.write_timeout_ms),
                ];
                Table::new(rows).to_string()
            }
        })
    }

    pub fn render_status(&self, status: &BridgeStatus) -> Result<String, OutputError> {
        Ok(match self.format {
            OutputFormat::Text => [
                format!("State: {}", status.link),
                format!("Connections accepted: {}", status.connections_accepted),
                format!("Connections rejected: {}", status.connections_rejected),
                format!("Accept errors: {}", status.accept_errors),
                format!("Connections closed: {}", status.teardowns),
                format!("Bytes forwarded: {}", status.bytes_forwarded),
            ]
            .join("\n"),
            OutputFormat::Json => serde_json::to_string_pretty(status)?,
            OutputFormat::Table => {
                let rows = vec![
                    SettingRow::new("state", status.link),
                    SettingRow::new("connections_accepted", status.connections_accepted),
                    SettingRow::new("connections_rejected", status.connections_rejected),
                    SettingRow::new("accept_errors", status.accept_errors),
                    SettingRow::new("teardowns", status.teardowns),
                    SettingRow::new("bytes_forwarded", status.bytes_forwarded),
                ];
                Table::new(rows).to_string()
            }
        })
    }
}

impl OutputWriter for ConsoleWriter {
    fn write_ports(&self, ports: &[PortSummary]) -> Result<(), OutputError> {
        println!("{}", self.render_ports(ports)?);
        Ok(())
    }

    fn write_config(&self, config: &BridgeConfig) -> Result<(), OutputError> {
        println!("{}", self.render_config(config)?);
        Ok(())
    }

    fn write_status(&self, status: &BridgeStatus) -> Result<(), OutputError> {
        println!("{}", self.render_status(status)?);
        Ok(())
    }

    fn write_message(&self, message: &str) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => {
                let output = serde_json::json!({ "message": message });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            _ => println!("{}", message),
        }
        Ok(())
    }
}

#[derive(Tabled)]
struct PortTableRow {
    #[tabled(rename = "Port")]
    name: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Description")]
    description: String,
}

impl From<&PortSummary> for PortTableRow {
    fn from(port: &PortSummary) -> Self {
        Self {
            name: port.name.clone(),
            kind: port.kind.clone(),
            description: port.description.clone(),
        }
    }
}

#[derive(Tabled)]
struct SettingRow {
    #[tabled(rename = "Setting")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
}

impl SettingRow {
    fn new(name: &str, value: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}
