//! In-memory serial device for tests.
//!
//! Every handle opened through [`MockSerialOpener`] records the bytes written
//! to it in its own session slot, so tests can check byte-exactness per
//! connection. The opener also counts live handles and can simulate an
//! unavailable device or a device that starts failing after a number of bytes.

use super::bridge::{SerialHandle, SerialOpener};
use crate::domain::config::SerialSettings;
use crate::domain::error::{BridgeError, BridgeResult};
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug)]
struct MockSerialState {
    available: bool,
    /// Per-handle byte budget before writes start failing
    fail_writes_after: Option<usize>,
    /// Bytes written, one entry per opened handle
    sessions: Vec<Vec<u8>>,
    open_handles: usize,
    max_open_handles: usize,
    open_attempts: usize,
}

impl Default for MockSerialState {
    fn default() -> Self {
        Self {
            available: true,
            fail_writes_after: None,
            sessions: Vec::new(),
            open_handles: 0,
            max_open_handles: 0,
            open_attempts: 0,
        }
    }
}

/// Serial opener backed by memory
#[derive(Debug, Clone, Default)]
pub struct MockSerialOpener {
    state: Arc<Mutex<MockSerialState>>,
}

impl MockSerialOpener {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockSerialState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make subsequent opens succeed or fail
    pub fn set_available(&self, available: bool) {
        self.lock().available = available;
    }

    /// Handles opened from now on fail any write that would take them past
    /// `bytes` written in total.
    pub fn fail_writes_after(&self, bytes: usize) {
        self.lock().fail_writes_after = Some(bytes);
    }

    pub fn clear_write_failure(&self) {
        self.lock().fail_writes_after = None;
    }

    /// Bytes written, one entry per opened handle in open order
    pub fn received(&self) -> Vec<Vec<u8>> {
        self.lock().sessions.clone()
    }

    /// Every byte written across all handles
    pub fn all_bytes(&self) -> Vec<u8> {
        self.lock().sessions.concat()
    }

    pub fn open_handles(&self) -> usize {
        self.lock().open_handles
    }

    /// Highest number of simultaneously open handles seen so far
    pub fn max_open_handles(&self) -> usize {
        self.lock().max_open_handles
    }

    pub fn open_attempts(&self) -> usize {
        self.lock().open_attempts
    }
}

impl SerialOpener for MockSerialOpener {
    fn open(&self, settings: &SerialSettings) -> BridgeResult<SerialHandle> {
        let mut state = self.lock();
        state.open_attempts += 1;

        if !state.available {
            return Err(BridgeError::SerialOpen {
                device: settings.device.clone(),
                source: serialport::Error::new(
                    serialport::ErrorKind::NoDevice,
                    "mock device unavailable",
                ),
            });
        }

        let session = state.sessions.len();
        state.sessions.push(Vec::new());
        state.open_handles += 1;
        state.max_open_handles = state.max_open_handles.max(state.open_handles);

        Ok(Box::new(MockSerialHandle {
            session,
            budget: state.fail_writes_after,
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockSerialHandle {
    session: usize,
    budget: Option<usize>,
    state: Arc<Mutex<MockSerialState>>,
}

impl Write for MockSerialHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let written = &mut state.sessions[self.session];

        if let Some(budget) = self.budget {
            if written.len() + buf.len() > budget {
                return Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "mock device write failure",
                ));
            }
        }

        written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for MockSerialHandle {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        state.open_handles = state.open_handles.saturating_sub(1);
    }
}
