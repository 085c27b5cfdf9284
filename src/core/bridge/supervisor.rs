//! The connection-lifecycle supervisor.
//!
//! One task owns the bridge state and consumes events from two producers: the
//! acceptor and the reader of the active connection. Both producers wait for an
//! explicit permit after every event, so events are handled strictly one at a
//! time and the read buffer can travel between reader and supervisor without
//! a lock.
//!
//! ```text
//! Idle   + Accept(ok)   -> open serial -> Active        | close conn, permit accept
//! Idle   + Accept(err)  -> permit accept, Idle
//! Active + Read(data)   -> write serial -> permit read  | teardown
//! Active + Read(closed | failed) -> teardown
//! teardown: close serial, close conn, permit accept, Idle
//! ```

use crate::core::bridge::event::{AcceptEvent, Event, ReadEvent};
use crate::core::bridge::state::{
    ActiveConnection, BridgeState, BridgeStatus, ConnectionId, ConnectionLink,
};
use crate::domain::config::BridgeConfig;
use crate::domain::error::{BridgeError, BridgeResult};
use crate::infrastructure::serial::{SerialBridge, SerialOpener};
use crate::infrastructure::tcp::{acceptor, reader, AcceptorHandle};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

pub struct Supervisor {
    config: BridgeConfig,
    opener: Arc<dyn SerialOpener>,
    local_addr: SocketAddr,
    acceptor: AcceptorHandle,
    state: BridgeState,
    /// The read buffer while no reader holds it
    spare_buffer: Option<Vec<u8>>,
    next_connection_id: u64,
    stats: BridgeStatus,
    status: watch::Sender<BridgeStatus>,
}

impl Supervisor {
    /// Bind the listener and start the acceptor.
    ///
    /// This is the only fallible step of the bridge's life: a listener that
    /// can not be bound ends the process.
    pub async fn bind(config: BridgeConfig, opener: Arc<dyn SerialOpener>) -> BridgeResult<Self> {
        config.validate()?;

        let addr = config.listen.socket_addr();
        let listener = acceptor::bind(&addr).await?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| BridgeError::Bind { addr, source })?;
        let acceptor = acceptor::spawn(listener);

        info!("Listening on {}", local_addr);

        Ok(Self::with_acceptor(config, opener, local_addr, acceptor))
    }

    /// Assemble a supervisor around an already running acceptor
    pub(crate) fn with_acceptor(
        config: BridgeConfig,
        opener: Arc<dyn SerialOpener>,
        local_addr: SocketAddr,
        acceptor: AcceptorHandle,
    ) -> Self {
        let (status, _) = watch::channel(BridgeStatus::default());
        let spare_buffer = Some(vec![0u8; config.listen.buffer_size]);

        Self {
            config,
            opener,
            local_addr,
            acceptor,
            state: BridgeState::Idle,
            spare_buffer,
            next_connection_id: 1,
            stats: BridgeStatus::default(),
            status,
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Follow the supervisor's state and counters
    pub fn status(&self) -> watch::Receiver<BridgeStatus> {
        self.status.subscribe()
    }

    /// Serve connections until `shutdown` resolves.
    ///
    /// Returns the final status. Steady-state I/O errors never end the loop;
    /// only the loss of the acceptor task does.
    pub async fn run<F>(mut self, shutdown: F) -> BridgeResult<BridgeStatus>
    where
        F: Future,
    {
        tokio::pin!(shutdown);

        loop {
            let event = tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                event = self.acceptor.events.recv() => match event {
                    Some(event) => Event::Accept(event),
                    None => {
                        error!("Acceptor stopped unexpectedly");
                        self.shutdown().await;
                        return Err(BridgeError::Internal("acceptor task ended".to_string()));
                    }
                },
                event = next_read(&mut self.state) => Event::Read(event),
            };

            self.handle(event).await;
        }

        Ok(self.shutdown().await)
    }

    /// Handle exactly one event and publish the resulting status
    async fn handle(&mut self, event: Event) {
        let state = std::mem::take(&mut self.state);

        self.state = match (state, event) {
            (BridgeState::Idle, Event::Accept(accept)) => self.on_accept(accept).await,
            (BridgeState::Active(active), Event::Accept(accept)) => {
                self.on_unexpected_accept(accept).await;
                BridgeState::Active(active)
            }
            (BridgeState::Active(active), Event::Read(read)) => self.on_read(active, read).await,
            (BridgeState::Idle, Event::Read(_)) => {
                warn!("Read event while idle, ignoring");
                BridgeState::Idle
            }
        };

        self.stats.link = self.state.link_state();
        self.status.send_replace(self.stats.clone());
    }

    async fn on_accept(&mut self, accept: AcceptEvent) -> BridgeState {
        let (stream, peer) = match accept {
            AcceptEvent::Connected { stream, peer } => (stream, peer),
            AcceptEvent::Failed(e) => {
                warn!("{}", e);
                self.stats.accept_errors += 1;
                self.permit_accept();
                return BridgeState::Idle;
            }
        };

        let id = ConnectionId(self.next_connection_id);
        self.next_connection_id += 1;
        self.stats.connections_accepted += 1;

        let serial = match SerialBridge::open(self.opener.as_ref(), &self.config.serial) {
            Ok(serial) => serial,
            Err(e) => {
                error!(connection_id = %id, %peer, "{}", e);
                self.stats.connections_rejected += 1;
                close_stream(id, stream).await;
                info!(connection_id = %id, %peer, "Connection rejected");
                self.permit_accept();
                return BridgeState::Idle;
            }
        };

        let buffer = self.take_buffer();
        let (read_half, writer) = stream.into_split();
        let reader = reader::spawn(read_half, buffer, self.config.listen.read_timeout());

        info!(
            connection_id = %id,
            %peer,
            device = %serial.device(),
            "Bridging connection to serial port"
        );

        BridgeState::Active(ActiveConnection {
            link: ConnectionLink {
                id,
                peer,
                writer,
                reader,
                connected_at: Instant::now(),
            },
            serial,
        })
    }

    /// The acceptor holds no permit while a connection is active, so this
    /// only happens if the hand-off is broken. The extra client is closed and
    /// the acceptor stays parked until teardown.
    async fn on_unexpected_accept(&mut self, accept: AcceptEvent) {
        match accept {
            AcceptEvent::Connected { stream, peer } => {
                warn!(%peer, "Connection arrived while another is active, closing it");
                self.stats.connections_rejected += 1;
                close_stream(ConnectionId(0), stream).await;
            }
            AcceptEvent::Failed(e) => {
                warn!("{}", e);
                self.stats.accept_errors += 1;
            }
        }
    }

    async fn on_read(&mut self, mut active: ActiveConnection, read: Option<ReadEvent>) -> BridgeState {
        let id = active.link.id;
        let peer = active.link.peer;

        let (buffer, len) = match read {
            Some(ReadEvent::Data { buffer, len }) => (buffer, len),
            Some(ReadEvent::Closed) => {
                info!(connection_id = %id, %peer, "Peer closed the connection");
                return self.teardown(active.link, Some(active.serial)).await;
            }
            Some(ReadEvent::Failed(e)) => {
                warn!(connection_id = %id, %peer, "{}", e);
                return self.teardown(active.link, Some(active.serial)).await;
            }
            None => {
                warn!(connection_id = %id, %peer, "Connection reader stopped unexpectedly");
                return self.teardown(active.link, Some(active.serial)).await;
            }
        };

        debug!(connection_id = %id, %peer, "Forwarding {} bytes", len);

        match active.serial.write(buffer, len).await {
            Ok((serial, buffer)) => {
                active.serial = serial;
                self.stats.bytes_forwarded += len as u64;

                match active.link.reader.permit(buffer) {
                    Ok(()) => BridgeState::Active(active),
                    Err(buffer) => {
                        warn!(connection_id = %id, %peer, "Connection reader is gone");
                        self.spare_buffer = Some(buffer);
                        self.teardown(active.link, Some(active.serial)).await
                    }
                }
            }
            Err(e) => {
                // The failed write already closed the serial handle
                error!(connection_id = %id, %peer, "{}", e);
                self.teardown(active.link, None).await
            }
        }
    }

    /// Close the serial handle, then the connection, then let the acceptor go
    async fn teardown(&mut self, link: ConnectionLink, serial: Option<SerialBridge>) -> BridgeState {
        let id = link.id;
        let peer = link.peer;
        let duration = link.connected_at.elapsed();
        let bytes = serial.as_ref().map(SerialBridge::bytes_written);

        if let Some(serial) = serial {
            serial.close();
        }

        info!(connection_id = %id, %peer, "Closing current connection...");
        if let Some(buffer) = link.close(false).await {
            self.spare_buffer.get_or_insert(buffer);
        }
        self.stats.teardowns += 1;

        info!(
            connection_id = %id,
            %peer,
            bytes_forwarded = ?bytes,
            duration_ms = duration.as_millis() as u64,
            "Current connection closed"
        );

        self.permit_accept();
        BridgeState::Idle
    }

    fn permit_accept(&self) {
        if !self.acceptor.permit() {
            warn!("Acceptor is gone, no further connections will be accepted");
        }
    }

    fn take_buffer(&mut self) -> Vec<u8> {
        let size = self.config.listen.buffer_size;
        match self.spare_buffer.take() {
            Some(buffer) if buffer.len() == size => buffer,
            _ => vec![0u8; size],
        }
    }

    async fn shutdown(mut self) -> BridgeStatus {
        if let BridgeState::Active(active) = std::mem::take(&mut self.state) {
            let id = active.link.id;
            active.serial.close();
            active.link.close(true).await;
            self.stats.teardowns += 1;
            info!(connection_id = %id, "Closed active connection on shutdown");
        }

        self.stats.link = self.state.link_state();
        self.status.send_replace(self.stats.clone());

        self.acceptor.stop().await;
        info!(
            connections = self.stats.connections_accepted,
            bytes_forwarded = self.stats.bytes_forwarded,
            "Bridge stopped"
        );

        self.stats
    }
}

/// Next event from the active connection's reader. Never resolves while idle.
async fn next_read(state: &mut BridgeState) -> Option<ReadEvent> {
    match state {
        BridgeState::Active(active) => active.link.reader.events.recv().await,
        BridgeState::Idle => std::future::pending().await,
    }
}

async fn close_stream(id: ConnectionId, mut stream: TcpStream) {
    if let Err(e) = stream.shutdown().await {
        debug!(connection_id = %id, "Failed to shut down connection: {}", e);
    }
}
