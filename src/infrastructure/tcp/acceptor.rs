use crate::core::bridge::event::AcceptEvent;
use crate::domain::error::{BridgeError, BridgeResult};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const BACKOFF_BASE_MS: u64 = 100;
const BACKOFF_MAX_MS: u64 = 5_000;

/// Supervisor's end of the acceptor task.
///
/// The acceptor emits one event on `events`, then waits for one permit on
/// `permits` before accepting again. Dropping `permits` stops it.
#[derive(Debug)]
pub struct AcceptorHandle {
    pub events: mpsc::Receiver<AcceptEvent>,
    pub permits: mpsc::Sender<()>,
    pub task: JoinHandle<()>,
}

impl AcceptorHandle {
    /// Let the acceptor take the next connection.
    ///
    /// Returns false if the acceptor is gone.
    pub fn permit(&self) -> bool {
        match self.permits.try_send(()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(())) => {
                warn!("Acceptor already holds a permit");
                true
            }
            Err(mpsc::error::TrySendError::Closed(())) => false,
        }
    }

    /// Revoke the permit channel and wait for the task to end
    pub async fn stop(self) {
        let AcceptorHandle {
            events,
            permits,
            task,
        } = self;
        drop(permits);
        drop(events);
        // It may be parked in accept(), which never observes the revoked permit
        task.abort();
        let _ = task.await;
        debug!("Acceptor stopped");
    }
}

/// Bind the listener. Failure here is fatal for the process.
pub async fn bind(addr: &str) -> BridgeResult<TcpListener> {
    TcpListener::bind(addr).await.map_err(|source| BridgeError::Bind {
        addr: addr.to_string(),
        source,
    })
}

/// Start accepting on `listener`
pub fn spawn(listener: TcpListener) -> AcceptorHandle {
    let (event_sender, events) = mpsc::channel(1);
    let (permits, permit_receiver) = mpsc::channel(1);

    let task = tokio::spawn(run(listener, event_sender, permit_receiver));

    AcceptorHandle {
        events,
        permits,
        task,
    }
}

async fn run(
    listener: TcpListener,
    events: mpsc::Sender<AcceptEvent>,
    mut permits: mpsc::Receiver<()>,
) {
    let mut consecutive_failures: u32 = 0;

    loop {
        if consecutive_failures > 0 {
            tokio::time::sleep(accept_backoff(consecutive_failures)).await;
        }

        debug!("Waiting for connection...");

        let event = match listener.accept().await {
            Ok((stream, peer)) => {
                consecutive_failures = 0;
                info!(%peer, "Connection accepted");
                AcceptEvent::Connected { stream, peer }
            }
            Err(e) => {
                consecutive_failures = consecutive_failures.saturating_add(1);
                AcceptEvent::Failed(BridgeError::Accept(e))
            }
        };

        if events.send(event).await.is_err() {
            break;
        }

        if permits.recv().await.is_none() {
            break;
        }
    }

    debug!("Acceptor task exiting");
}

/// Delay before the next accept after `failures` consecutive accept errors:
/// 100ms doubling per failure, capped at 5s.
pub fn accept_backoff(failures: u32) -> Duration {
    if failures == 0 {
        return Duration::ZERO;
    }
    let shift = (failures - 1).min(16);
    let delay = BACKOFF_BASE_MS.saturating_mul(1 << shift);
    Duration::from_millis(delay.min(BACKOFF_MAX_MS))
}
