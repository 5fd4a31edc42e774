//! Serial link for the local meter maintenance port

use crate::stream::{ByteStream, StreamTransport};
use async_trait::async_trait;
use g3plc_core::{G3Error, G3Result};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::SerialStream;

/// Serial link settings
#[derive(Debug, Clone)]
pub struct SerialSettings {
    pub port_name: String,
    pub baud_rate: u32,
    pub data_bits: tokio_serial::DataBits,
    pub stop_bits: tokio_serial::StopBits,
    pub parity: tokio_serial::Parity,
    pub flow_control: tokio_serial::FlowControl,
    pub timeout: Option<Duration>,
}

impl SerialSettings {
    /// 8N1 with a 30 second read timeout
    pub fn new(port_name: String, baud_rate: u32) -> Self {
        Self {
            port_name,
            baud_rate,
            data_bits: tokio_serial::DataBits::Eight,
            stop_bits: tokio_serial::StopBits::One,
            parity: tokio_serial::Parity::None,
            flow_control: tokio_serial::FlowControl::None,
            timeout: Some(Duration::from_secs(30)),
        }
    }

    pub fn with_timeout(port_name: String, baud_rate: u32, timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::new(port_name, baud_rate)
        }
    }
}

/// Byte stream over a local serial port
pub struct SerialLink {
    stream: Option<SerialStream>,
    settings: SerialSettings,
    closed: bool,
}

impl SerialLink {
    pub fn new(settings: SerialSettings) -> Self {
        Self {
            stream: None,
            settings,
            closed: true,
        }
    }

    fn stream(&mut self) -> G3Result<&mut SerialStream> {
        self.stream.as_mut().ok_or_else(|| {
            G3Error::Link(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "serial port not open",
            ))
        })
    }
}

#[async_trait]
impl StreamTransport for SerialLink {
    async fn open(&mut self) -> G3Result<()> {
        if !self.closed {
            return Err(G3Error::Link(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "link has already been opened",
            )));
        }

        let builder = tokio_serial::new(&self.settings.port_name, self.settings.baud_rate)
            .data_bits(self.settings.data_bits)
            .stop_bits(self.settings.stop_bits)
            .parity(self.settings.parity)
            .flow_control(self.settings.flow_control);

        let stream = SerialStream::open(&builder).map_err(|e| {
            G3Error::Link(std::io::Error::other(format!(
                "failed to open {}: {}",
                self.settings.port_name, e
            )))
        })?;

        self.stream = Some(stream);
        self.closed = false;
        Ok(())
    }
}

#[async_trait]
impl ByteStream for SerialLink {
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> G3Result<()> {
        self.settings.timeout = timeout;
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> G3Result<usize> {
        let timeout = self.settings.timeout;
        let stream = self.stream()?;
        let result = match timeout {
            Some(timeout) => tokio::time::timeout(timeout, stream.read(buf))
                .await
                .map_err(|_| G3Error::Timeout)?
                .map_err(G3Error::Link),
            None => stream.read(buf).await.map_err(G3Error::Link),
        };

        match result {
            Ok(0) => {
                self.closed = true;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) => {
                self.closed = true;
                Err(e)
            }
        }
    }

    async fn write(&mut self, buf: &[u8]) -> G3Result<usize> {
        let timeout = self.settings.timeout;
        let stream = self.stream()?;
        match timeout {
            Some(timeout) => tokio::time::timeout(timeout, stream.write(buf))
                .await
                .map_err(|_| G3Error::Timeout)?
                .map_err(G3Error::Link),
            None => stream.write(buf).await.map_err(G3Error::Link),
        }
    }

    async fn flush(&mut self) -> G3Result<()> {
        self.stream()?.flush().await.map_err(G3Error::Link)
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(&mut self) -> G3Result<()> {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.flush().await;
        }
        self.closed = true;
        Ok(())
    }
}
