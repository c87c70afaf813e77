//! Stream accessor trait for the transport layer

use crate::error::{Dnp3Error, Dnp3Result};
use async_trait::async_trait;
use std::time::Duration;

/// Stream accessor interface to access a byte stream to a remote outstation
#[async_trait]
pub trait StreamAccessor: Send + Sync {
    /// Set the read timeout
    ///
    /// # Arguments
    ///
    /// * `timeout` - The timeout duration. None means infinite timeout.
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> Dnp3Result<()>;

    /// Read data from the stream
    ///
    /// # Arguments
    ///
    /// * `buf` - Buffer to read into
    ///
    /// # Returns
    ///
    /// Number of bytes read, or 0 if EOF
    async fn read(&mut self, buf: &mut [u8]) -> Dnp3Result<usize>;

    /// Read exact number of bytes from the stream
    ///
    /// # Arguments
    ///
    /// * `buf` - Buffer to read into, will be filled completely
    ///
    /// # Errors
    ///
    /// Returns a communication error if the stream ends before the buffer
    /// is filled.
    async fn read_exact(&mut self, mut buf: &mut [u8]) -> Dnp3Result<()> {
        while !buf.is_empty() {
            let n = self.read(buf).await?;
            if n == 0 {
                return Err(Dnp3Error::Communication {
                    message: "unexpected end of stream".to_string(),
                    host: self.peer_host().to_string(),
                    port: self.peer_port(),
                });
            }
            buf = &mut buf[n..];
        }
        Ok(())
    }

    /// Write data to the stream
    ///
    /// # Returns
    ///
    /// Number of bytes written
    async fn write(&mut self, buf: &[u8]) -> Dnp3Result<usize>;

    /// Write all data to the stream
    ///
    /// A zero-length write is treated as a fatal communication error: the
    /// frame must reach the wire in full or the transaction fails.
    async fn write_all(&mut self, buf: &[u8]) -> Dnp3Result<()> {
        let mut written = 0;
        while written < buf.len() {
            let n = self.write(&buf[written..]).await?;
            if n == 0 {
                return Err(Dnp3Error::Communication {
                    message: "failed to write all data".to_string(),
                    host: self.peer_host().to_string(),
                    port: self.peer_port(),
                });
            }
            written += n;
        }
        Ok(())
    }

    /// Flush any buffered data
    async fn flush(&mut self) -> Dnp3Result<()>;

    /// Check if the stream is closed
    fn is_closed(&self) -> bool;

    /// Close the stream
    async fn close(&mut self) -> Dnp3Result<()>;

    /// Host of the remote peer, for error context
    fn peer_host(&self) -> &str;

    /// Port of the remote peer, for error context
    fn peer_port(&self) -> u16;
}

/// Transport layer trait that extends StreamAccessor
#[async_trait]
pub trait TransportLayer: StreamAccessor {
    /// Open the physical layer connection
    async fn open(&mut self) -> Dnp3Result<()>;
}
