// Bridge module - Supervisor state machine and its events
pub mod event;
pub mod state;
pub mod supervisor;

pub use event::{AcceptEvent, ReadEvent};
pub use state::{BridgeStatus, ConnectionId, LinkState};
pub use supervisor::Supervisor;
