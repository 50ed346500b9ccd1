//! Serial port transport backed by `tokio-serial`.

use tokio_serial::{DataBits, Parity, SerialPortBuilderExt, StopBits};

use super::{BoxFuture, Transport, TransportLink};

/// Opens an async serial stream on the configured device, 8N1.
#[derive(Debug, Clone)]
pub struct SerialTransport {
    path: String,
    baud_rate: u32,
}

impl SerialTransport {
    /// Create a transport for the given device path and baud rate.
    pub fn new(path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            path: path.into(),
            baud_rate,
        }
    }

    /// The configured device path.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Transport for SerialTransport {
    fn open(&mut self) -> BoxFuture<'_, std::io::Result<Box<dyn TransportLink>>> {
        Box::pin(async move {
            let stream = tokio_serial::new(&self.path, self.baud_rate)
                .data_bits(DataBits::Eight)
                .parity(Parity::None)
                .stop_bits(StopBits::One)
                .open_native_async()
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
            Ok(Box::new(stream) as Box<dyn TransportLink>)
        })
    }
}
