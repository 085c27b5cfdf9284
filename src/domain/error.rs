use std::time::Duration;
use thiserror::Error;

/// tcp2serial unified error type
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Can not listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to accept the connection: {0}")]
    Accept(#[source] std::io::Error),

    #[error("Failed to open serial port {device}: {source}")]
    SerialOpen {
        device: String,
        #[source]
        source: serialport::Error,
    },

    #[error("Error writing to serial port {device}: {source}")]
    SerialWrite {
        device: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Error reading from connection: {0}")]
    Read(#[source] std::io::Error),

    #[error("Connection idle for longer than {0:?}")]
    Timeout(Duration),

    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Output error: {0}")]
    Output(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether the error ends the process. Everything after startup is recovered
    /// by returning to idle.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Bind { .. } | Self::Config { .. } | Self::Internal(_))
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;
