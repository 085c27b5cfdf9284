//! tcp2serial Library
//!
//! Bridges one TCP listener to one serial device: a single client at a time,
//! every byte it sends forwarded verbatim to the serial port, with recovery
//! to the listening state after any I/O failure.

pub mod cli;
pub mod core;
pub mod domain;
pub mod infrastructure;

pub use crate::core::bridge::{BridgeStatus, ConnectionId, LinkState, Supervisor};
pub use crate::domain::config::{BridgeConfig, SerialSettings};
pub use crate::domain::error::{BridgeError, BridgeResult};
pub use crate::infrastructure::serial::{MockSerialOpener, SerialOpener, SystemSerialOpener};
