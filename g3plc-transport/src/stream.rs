//! Byte-stream trait for serial links

use async_trait::async_trait;
use g3plc_core::{G3Error, G3Result};
use std::time::Duration;

/// Access to a physical byte stream towards a directly attached meter
#[async_trait]
pub trait ByteStream: Send + Sync {
    /// Set the read timeout. None means wait forever.
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> G3Result<()>;

    /// Read into `buf`, returning the number of bytes read or 0 on EOF
    async fn read(&mut self, buf: &mut [u8]) -> G3Result<usize>;

    /// Fill `buf` completely or fail
    async fn read_exact(&mut self, mut buf: &mut [u8]) -> G3Result<()> {
        while !buf.is_empty() {
            let n = self.read(buf).await?;
            if n == 0 {
                return Err(G3Error::Link(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "stream ended before the expected byte count",
                )));
            }
            buf = &mut buf[n..];
        }
        Ok(())
    }

    /// Write from `buf`, returning the number of bytes written
    async fn write(&mut self, buf: &[u8]) -> G3Result<usize>;

    /// Write the whole of `buf` or fail
    async fn write_all(&mut self, buf: &[u8]) -> G3Result<()> {
        let mut written = 0;
        while written < buf.len() {
            let n = self.write(&buf[written..]).await?;
            if n == 0 {
                return Err(G3Error::Link(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "stream accepted no bytes",
                )));
            }
            written += n;
        }
        Ok(())
    }

    /// Flush any buffered output
    async fn flush(&mut self) -> G3Result<()>;

    fn is_closed(&self) -> bool;

    async fn close(&mut self) -> G3Result<()>;
}

/// A byte stream that must be opened before use
#[async_trait]
pub trait StreamTransport: ByteStream {
    async fn open(&mut self) -> G3Result<()>;
}
