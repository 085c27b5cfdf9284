use crate::infrastructure::serial::SerialBridge;
use crate::infrastructure::tcp::ReaderHandle;
use serde::Serialize;
use std::fmt;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tracing::debug;

/// Sequence number of an accepted connection, starting at 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Supervisor state.
///
/// The serial handle and the reader exist only inside `Active`, so "at most
/// one connection, serial handle iff connection" holds by construction.
#[derive(Debug, Default)]
pub(crate) enum BridgeState {
    #[default]
    Idle,
    Active(ActiveConnection),
}

impl BridgeState {
    pub(crate) fn link_state(&self) -> LinkState {
        match self {
            BridgeState::Idle => LinkState::Idle,
            BridgeState::Active(active) => LinkState::Active {
                connection_id: active.link.id,
                peer: active.link.peer,
            },
        }
    }
}

/// The connection currently bridged, with its serial handle
#[derive(Debug)]
pub(crate) struct ActiveConnection {
    pub(crate) link: ConnectionLink,
    pub(crate) serial: SerialBridge,
}

/// TCP side of the active connection: our write half and the reader that owns
/// the read half
#[derive(Debug)]
pub(crate) struct ConnectionLink {
    pub(crate) id: ConnectionId,
    pub(crate) peer: SocketAddr,
    pub(crate) writer: OwnedWriteHalf,
    pub(crate) reader: ReaderHandle,
    pub(crate) connected_at: Instant,
}

impl ConnectionLink {
    /// Stop the reader and close the socket. Returns the read buffer if the
    /// reader still held it.
    pub(crate) async fn close(self, abort_reader: bool) -> Option<Vec<u8>> {
        let ConnectionLink {
            id,
            mut writer,
            reader,
            ..
        } = self;

        let buffer = reader.stop(abort_reader).await;

        if let Err(e) = writer.shutdown().await {
            debug!(connection_id = %id, "Shutdown of closed connection failed: {}", e);
        }
        drop(writer);

        buffer
    }
}

/// Observable part of the supervisor state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum LinkState {
    #[default]
    Idle,
    Active {
        connection_id: ConnectionId,
        peer: SocketAddr,
    },
}

impl LinkState {
    pub fn is_idle(&self) -> bool {
        matches!(self, LinkState::Idle)
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Idle => write!(f, "idle"),
            LinkState::Active {
                connection_id,
                peer,
            } => write!(f, "active {} ({})", connection_id, peer),
        }
    }
}

/// Snapshot published after every event the supervisor handles
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BridgeStatus {
    pub link: LinkState,
    /// Connections taken from the acceptor
    pub connections_accepted: u64,
    /// Connections closed right away because the serial device would not open
    pub connections_rejected: u64,
    pub accept_errors: u64,
    /// Active connections torn down, for any reason
    pub teardowns: u64,
    /// Bytes written to the serial device across all connections
    pub bytes_forwarded: u64,
}
