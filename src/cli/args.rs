use crate::domain::config::{BridgeConfig, FlowControlConfig, ParityConfig};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Command line arguments for tcp2serial
#[derive(Parser, Debug)]
#[command(
    name = "tcp2serial",
    version = env!("CARGO_PKG_VERSION"),
    about = "Listens on a TCP port and dumps the received bytes on a serial port",
    long_about = "Accepts one TCP client at a time and forwards every byte it sends, unchanged, to a serial device. The serial port is opened when a client connects and closed when it leaves; errors on either side drop the client and the bridge goes back to waiting for the next one."
)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress logging
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    pub output: OutputFormat,

    #[command(flatten)]
    pub bridge: BridgeArgs,

    /// Command to execute, defaults to `run`
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the bridge
    Run,
    /// List serial ports found on this system
    Ports,
    /// Configuration management commands
    Config(ConfigArgs),
}

/// Output format options
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output
    Json,
    /// Table output
    Table,
}

/// Bridge settings; each one given here overrides the configuration file
#[derive(ClapArgs, Debug, Default, Clone)]
pub struct BridgeArgs {
    /// TCP port number to listen on (1-65535)
    #[arg(short = 'p', long, value_parser = clap::value_parser!(u16).range(1..), global = true)]
    pub port: Option<u16>,

    /// Address to listen on
    #[arg(long, global = true)]
    pub bind: Option<String>,

    /// Serial port to write received bytes to (COM1, /dev/ttyUSB0, ...)
    #[arg(short = 's', long = "serial-port-name", visible_alias = "serialPortName", global = true)]
    pub serial_port_name: Option<String>,

    /// Serial port baud rate
    #[arg(short = 'b', long, value_parser = clap::value_parser!(u32).range(1..), global = true)]
    pub baudrate: Option<u32>,

    /// Data bits
    #[arg(long, value_parser = clap::value_parser!(u8).range(5..=8), global = true)]
    pub data_bits: Option<u8>,

    /// Stop bits
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=2), global = true)]
    pub stop_bits: Option<u8>,

    /// Parity (none, even, odd)
    #[arg(long, value_enum, global = true)]
    pub parity: Option<ParityArg>,

    /// Flow control (none, software, hardware)
    #[arg(long, value_enum, global = true)]
    pub flow_control: Option<FlowControlArg>,

    /// Drop a client that sends nothing for this many milliseconds (0 = never)
    #[arg(long, value_name = "MS", global = true)]
    pub read_timeout: Option<u64>,

    /// Serial write timeout in milliseconds
    #[arg(long, value_name = "MS", value_parser = clap::value_parser!(u64).range(1..), global = true)]
    pub write_timeout: Option<u64>,

    /// Size of the TCP read buffer in bytes
    #[arg(long, value_name = "BYTES", value_parser = clap::value_parser!(u64).range(1..), global = true)]
    pub buffer_size: Option<u64>,
}

impl BridgeArgs {
    /// Overlay the flags that were given onto `config`
    pub fn apply(&self, config: &mut BridgeConfig) {
        if let Some(port) = self.port {
            config.listen.port = port;
        }
        if let Some(bind) = &self.bind {
            config.listen.bind_address = bind.clone();
        }
        if let Some(timeout) = self.read_timeout {
            config.listen.read_timeout_ms = timeout;
        }
        if let Some(size) = self.buffer_size {
            config.listen.buffer_size = usize::try_from(size).unwrap_or(usize::MAX);
        }
        if let Some(device) = &self.serial_port_name {
            config.serial.device = device.clone();
        }
        if let Some(baud) = self.baudrate {
            config.serial.baud_rate = baud;
        }
        if let Some(bits) = self.data_bits {
            config.serial.data_bits = bits;
        }
        if let Some(bits) = self.stop_bits {
            config.serial.stop_bits = bits;
        }
        if let Some(parity) = self.parity {
            config.serial.parity = parity.into();
        }
        if let Some(flow) = self.flow_control {
            config.serial.flow_control = flow.into();
        }
        if let Some(timeout) = self.write_timeout {
            config.serial.write_timeout_ms = timeout;
        }
    }
}

/// Configuration management arguments
#[derive(ClapArgs, Debug, Clone, PartialEq, Eq)]
pub struct ConfigArgs {
    /// Configuration subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Configuration management subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,
    /// Write a default configuration file
    Init {
        /// Directory to create `.tcp2serial/config.toml` in (default: current directory)
        #[arg(long)]
        path: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Parity argument
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParityArg {
    None,
    Even,
    Odd,
}

/// Flow control argument
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControlArg {
    None,
    Software,
    Hardware,
}

impl From<ParityArg> for ParityConfig {
    fn from(arg: ParityArg) -> Self {
        match arg {
            ParityArg::None => Self::None,
            ParityArg::Even => Self::Even,
            ParityArg::Odd => Self::Odd,
        }
    }
}

impl From<FlowControlArg> for FlowControlConfig {
    fn from(arg: FlowControlArg) -> Self {
        match arg {
            FlowControlArg::None => Self::None,
            FlowControlArg::Software => Self::Software,
            FlowControlArg::Hardware => Self::Hardware,
        }
    }
}
