// Serial module - Serial device access
pub mod bridge;
pub mod discovery;
pub mod mock;

pub use bridge::{SerialBridge, SerialHandle, SerialOpener, SystemSerialOpener};
pub use discovery::{list_ports, PortSummary};
pub use mock::MockSerialOpener;
