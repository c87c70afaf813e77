//! TCP transport implementation

use crate::error::{Dnp3Error, Dnp3Result};
use crate::stream::{StreamAccessor, TransportLayer};
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// TCP transport layer settings
#[derive(Debug, Clone)]
pub struct TcpSettings {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
    pub read_timeout: Option<Duration>,
}

impl TcpSettings {
    /// Create new TCP settings for the given peer
    pub fn new(host: impl Into<String>, port: u16, connect_timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout,
            read_timeout: Some(Duration::from_secs(5)),
        }
    }
}

/// TCP transport layer implementation
pub struct TcpTransport {
    stream: Option<TcpStream>,
    settings: TcpSettings,
    closed: bool,
}

impl fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpTransport")
            .field("host", &self.settings.host)
            .field("port", &self.settings.port)
            .field("closed", &self.closed)
            .finish()
    }
}

impl TcpTransport {
    /// Create a new TCP transport layer
    pub fn new(settings: TcpSettings) -> Self {
        Self {
            stream: None,
            settings,
            closed: true,
        }
    }

    fn comm_error(&self, err: std::io::Error) -> Dnp3Error {
        Dnp3Error::communication(err, self.settings.host.clone(), self.settings.port)
    }
}

#[async_trait]
impl TransportLayer for TcpTransport {
    async fn open(&mut self) -> Dnp3Result<()> {
        if !self.closed {
            return Err(Dnp3Error::Communication {
                message: "connection has already been opened".to_string(),
                host: self.settings.host.clone(),
                port: self.settings.port,
            });
        }

        let addr = (self.settings.host.as_str(), self.settings.port);
        let stream = tokio::time::timeout(self.settings.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| Dnp3Error::Timeout {
                message: format!(
                    "connection to {}:{} timed out",
                    self.settings.host, self.settings.port
                ),
                timeout_seconds: self.settings.connect_timeout.as_secs_f64(),
            })?
            .map_err(|e| self.comm_error(e))?;

        stream.set_nodelay(true).map_err(|e| self.comm_error(e))?;
        self.stream = Some(stream);
        self.closed = false;
        Ok(())
    }
}

#[async_trait]
impl StreamAccessor for TcpTransport {
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> Dnp3Result<()> {
        self.settings.read_timeout = timeout;
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> Dnp3Result<usize> {
        let host = self.settings.host.clone();
        let port = self.settings.port;
        let read_timeout = self.settings.read_timeout;
        let stream = match self.stream.as_mut() {
            Some(stream) => stream,
            None => {
                return Err(Dnp3Error::Communication {
                    message: "TCP stream not connected".to_string(),
                    host,
                    port,
                })
            }
        };

        let result = if let Some(timeout) = read_timeout {
            tokio::time::timeout(timeout, stream.read(buf))
                .await
                .map_err(|_| Dnp3Error::Timeout {
                    message: "read timed out".to_string(),
                    timeout_seconds: timeout.as_secs_f64(),
                })?
                .map_err(|e| Dnp3Error::communication(e, host, port))
        } else {
            stream
                .read(buf)
                .await
                .map_err(|e| Dnp3Error::communication(e, host, port))
        };

        match result {
            Ok(0) => {
                self.closed = true;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) => {
                if !matches!(e, Dnp3Error::Timeout { .. }) {
                    self.closed = true;
                }
                Err(e)
            }
        }
    }

    async fn write(&mut self, buf: &[u8]) -> Dnp3Result<usize> {
        let host = self.settings.host.clone();
        let port = self.settings.port;
        let stream = match self.stream.as_mut() {
            Some(stream) => stream,
            None => {
                return Err(Dnp3Error::Communication {
                    message: "TCP stream not connected".to_string(),
                    host,
                    port,
                })
            }
        };

        stream
            .write(buf)
            .await
            .map_err(|e| Dnp3Error::communication(e, host, port))
    }

    async fn flush(&mut self) -> Dnp3Result<()> {
        let host = self.settings.host.clone();
        let port = self.settings.port;
        let stream = match self.stream.as_mut() {
            Some(stream) => stream,
            None => {
                return Err(Dnp3Error::Communication {
                    message: "TCP stream not connected".to_string(),
                    host,
                    port,
                })
            }
        };

        stream
            .flush()
            .await
            .map_err(|e| Dnp3Error::communication(e, host, port))
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(&mut self) -> Dnp3Result<()> {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
        self.closed = true;
        Ok(())
    }

    fn peer_host(&self) -> &str {
        &self.settings.host
    }

    fn peer_port(&self) -> u16 {
        self.settings.port
    }
}
