use crate::domain::error::BridgeError;
use std::net::SocketAddr;
use tokio::net::TcpStream;

/// Produced by the acceptor, one per accept attempt
#[derive(Debug)]
pub enum AcceptEvent {
    Connected { stream: TcpStream, peer: SocketAddr },
    Failed(BridgeError),
}

/// Produced by the connection reader, one per read
#[derive(Debug)]
pub enum ReadEvent {
    /// `buffer[..len]` holds the bytes just read. The buffer belongs to the
    /// supervisor until it is handed back as the reader's next permit.
    Data { buffer: Vec<u8>, len: usize },
    /// The peer closed its side of the connection
    Closed,
    Failed(BridgeError),
}

/// What the supervisor waits on: one event from either producer.
/// `Read(None)` means the reader went away without reporting.
#[derive(Debug)]
pub(crate) enum Event {
    Accept(AcceptEvent),
    Read(Option<ReadEvent>),
}
