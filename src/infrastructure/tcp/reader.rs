use crate::core::bridge::event::ReadEvent;
use crate::domain::error::{BridgeError, BridgeResult};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Supervisor's end of a connection reader task.
///
/// Each `ReadEvent::Data` carries the read buffer to the supervisor; sending
/// the buffer back on `permits` lets the reader read again. The task resolves
/// to the buffer if it still owned it when it stopped.
#[derive(Debug)]
pub struct ReaderHandle {
    pub events: mpsc::Receiver<ReadEvent>,
    pub permits: mpsc::Sender<Vec<u8>>,
    pub task: JoinHandle<Option<Vec<u8>>>,
}

impl ReaderHandle {
    /// Hand the buffer back so the reader reads again.
    ///
    /// Gives the buffer back as the error if the reader is gone.
    pub fn permit(&self, buffer: Vec<u8>) -> Result<(), Vec<u8>> {
        self.permits
            .try_send(buffer)
            .map_err(|e| e.into_inner())
    }

    /// Stop the reader and recover its buffer.
    ///
    /// With `abort` false the reader must be between reads (waiting for a
    /// permit or already finished); otherwise it is cancelled mid-read.
    pub async fn stop(self, abort: bool) -> Option<Vec<u8>> {
        let ReaderHandle {
            events,
            permits,
            task,
        } = self;
        drop(permits);
        drop(events);
        if abort {
            task.abort();
        }
        task.await.ok().flatten()
    }
}

/// Start a fresh reader for one connection
pub fn spawn<R>(source: R, buffer: Vec<u8>, read_timeout: Option<Duration>) -> ReaderHandle
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (event_sender, events) = mpsc::channel(1);
    let (permits, permit_receiver) = mpsc::channel(1);

    let task = tokio::spawn(run(source, buffer, read_timeout, event_sender, permit_receiver));

    ReaderHandle {
        events,
        permits,
        task,
    }
}

async fn run<R>(
    mut source: R,
    mut buffer: Vec<u8>,
    read_timeout: Option<Duration>,
    events: mpsc::Sender<ReadEvent>,
    mut permits: mpsc::Receiver<Vec<u8>>,
) -> Option<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    loop {
        let len = match read_once(&mut source, &mut buffer, read_timeout).await {
            Ok(0) => {
                let _ = events.send(ReadEvent::Closed).await;
                return Some(buffer);
            }
            Ok(len) => len,
            Err(e) => {
                let _ = events.send(ReadEvent::Failed(e)).await;
                return Some(buffer);
            }
        };

        trace!("Read {} bytes from connection", len);

        if events.send(ReadEvent::Data { buffer, len }).await.is_err() {
            return None;
        }

        match permits.recv().await {
            Some(returned) => buffer = returned,
            None => {
                debug!("Reader permits revoked");
                return None;
            }
        }
    }
}

async fn read_once<R>(
    source: &mut R,
    buffer: &mut [u8],
    read_timeout: Option<Duration>,
) -> BridgeResult<usize>
where
    R: AsyncRead + Unpin,
{
    let read = source.read(buffer);
    match read_timeout {
        Some(limit) => match tokio::time::timeout(limit, read).await {
            Ok(result) => result.map_err(BridgeError::Read),
            Err(_) => Err(BridgeError::Timeout(limit)),
        },
        None => read.await.map_err(BridgeError::Read),
    }
}
