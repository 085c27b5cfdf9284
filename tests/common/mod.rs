//! Shared harness for bridge integration tests
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tcp2serial::{BridgeConfig, BridgeResult, BridgeStatus, MockSerialOpener, Supervisor};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

pub const WAIT: Duration = Duration::from_secs(10);

pub fn test_config() -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.listen.bind_address = "127.0.0.1".to_string();
    config.listen.port = 0;
    config.listen.read_timeout_ms = 0;
    config.serial.device = "MOCK0".to_string();
    config
}

pub struct Harness {
    pub addr: SocketAddr,
    pub status: watch::Receiver<BridgeStatus>,
    pub opener: MockSerialOpener,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<BridgeResult<BridgeStatus>>,
}

impl Harness {
    pub async fn start(opener: MockSerialOpener) -> Self {
        Self::start_with(opener, test_config()).await
    }

    pub async fn start_with(opener: MockSerialOpener, config: BridgeConfig) -> Self {
        let supervisor = Supervisor::bind(config, Arc::new(opener.clone()))
            .await
            .expect("bridge should bind");
        let addr = supervisor.local_addr();
        let status = supervisor.status();

        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(supervisor.run(stopped));

        Self {
            addr,
            status,
            opener,
            stop: Some(stop),
            task,
        }
    }

    /// Wait until the published status satisfies `predicate`
    pub async fn wait_for<F>(&mut self, predicate: F) -> BridgeStatus
    where
        F: FnMut(&BridgeStatus) -> bool,
    {
        tokio::time::timeout(WAIT, self.status.wait_for(predicate))
            .await
            .expect("timed out waiting for bridge status")
            .expect("supervisor went away")
            .clone()
    }

    pub fn current(&self) -> BridgeStatus {
        self.status.borrow().clone()
    }

    pub async fn stop(mut self) -> BridgeStatus {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        tokio::time::timeout(WAIT, self.task)
            .await
            .expect("bridge did not stop")
            .expect("bridge task panicked")
            .expect("bridge returned an error")
    }
}
