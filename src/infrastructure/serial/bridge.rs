use crate::domain::config::{FlowControlConfig, ParityConfig, SerialSettings};
use crate::domain::error::{BridgeError, BridgeResult};
use std::io::Write;
use tracing::{debug, info, trace};

/// An open serial device. Dropping it closes the device.
pub type SerialHandle = Box<dyn Write + Send>;

/// Opens serial devices for the bridge.
///
/// The supervisor only ever talks to this trait, so the real `serialport`
/// backend and the in-memory [`MockSerialOpener`](super::mock::MockSerialOpener)
/// are interchangeable.
pub trait SerialOpener: Send + Sync {
    fn open(&self, settings: &SerialSettings) -> BridgeResult<SerialHandle>;
}

/// Opens real devices through the `serialport` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSerialOpener;

impl SerialOpener for SystemSerialOpener {
    fn open(&self, settings: &SerialSettings) -> BridgeResult<SerialHandle> {
        let open_error = |source: serialport::Error| BridgeError::SerialOpen {
            device: settings.device.clone(),
            source,
        };

        let mut builder = serialport::new(&settings.device, settings.baud_rate);

        builder = builder.data_bits(match settings.data_bits {
            5 => serialport::DataBits::Five,
            6 => serialport::DataBits::Six,
            7 => serialport::DataBits::Seven,
            8 => serialport::DataBits::Eight,
            other => {
                return Err(open_error(serialport::Error::new(
                    serialport::ErrorKind::InvalidInput,
                    format!("Invalid data bits: {}", other),
                )))
            }
        });

        builder = builder.stop_bits(match settings.stop_bits {
            1 => serialport::StopBits::One,
            2 => serialport::StopBits::Two,
            other => {
                return Err(open_error(serialport::Error::new(
                    serialport::ErrorKind::InvalidInput,
                    format!("Invalid stop bits: {}", other),
                )))
            }
        });

        builder = builder.parity(match settings.parity {
            ParityConfig::None => serialport::Parity::None,
            ParityConfig::Even => serialport::Parity::Even,
            ParityConfig::Odd => serialport::Parity::Odd,
        });

        builder = builder.flow_control(match settings.flow_control {
            FlowControlConfig::None => serialport::FlowControl::None,
            FlowControlConfig::Software => serialport::FlowControl::Software,
            FlowControlConfig::Hardware => serialport::FlowControl::Hardware,
        });

        builder = builder.timeout(settings.write_timeout());

        let port = builder.open().map_err(open_error)?;
        Ok(Box::new(port))
    }
}

/// The serial handle bound to the active connection
pub struct SerialBridge {
    device: String,
    handle: SerialHandle,
    bytes_written: u64,
}

impl SerialBridge {
    pub fn open(opener: &dyn SerialOpener, settings: &SerialSettings) -> BridgeResult<Self> {
        let handle = opener.open(settings)?;

        info!(
            device = %settings.device,
            baud_rate = settings.baud_rate,
            "Serial port opened"
        );

        Ok(Self {
            device: settings.device.clone(),
            handle,
            bytes_written: 0,
        })
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Write `buffer[..len]` to the device on the blocking pool.
    ///
    /// Handle and buffer move into the blocking task and come back on success.
    /// On failure the handle is dropped, which closes the device.
    pub async fn write(mut self, buffer: Vec<u8>, len: usize) -> BridgeResult<(Self, Vec<u8>)> {
        let joined = tokio::task::spawn_blocking(move || {
            let result = self.handle.write_all(&buffer[..len]);
            (self, buffer, result)
        })
        .await;

        let (mut bridge, buffer, result) = joined
            .map_err(|e| BridgeError::Internal(format!("Serial write task failed: {}", e)))?;

        match result {
            Ok(()) => {
                bridge.bytes_written += len as u64;
                trace!(
                    device = %bridge.device,
                    data = %hex::encode(&buffer[..len]),
                    "Wrote {} bytes to serial port",
                    len
                );
                Ok((bridge, buffer))
            }
            Err(source) => Err(BridgeError::SerialWrite {
                device: bridge.device.clone(),
                source,
            }),
        }
    }

    /// Close the device
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for SerialBridge {
    fn drop(&mut self) {
        debug!(
            device = %self.device,
            bytes_written = self.bytes_written,
            "Serial port closed"
        );
    }
}

impl std::fmt::Debug for SerialBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialBridge")
            .field("device", &self.device)
            .field("bytes_written", &self.bytes_written)
            .finish()
    }
}
