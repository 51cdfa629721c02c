//! Network printer transport (TCP port 9100)
//!
//! Most thermal printers accept raw ESC/POS on port 9100 and answer status
//! requests on the same socket.

use super::Transport;
use crate::error::{PrintError, PrintResult};
use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

/// TCP transport with transparent reconnection
///
/// A failed write drops the connection and the next write dials again.
/// While the connection is down, reads return 0 so the link's inactivity
/// timer takes care of reporting the outage.
#[derive(Debug)]
pub struct TcpTransport {
    addr: SocketAddr,
    timeout: Duration,
    reader: Mutex<Option<OwnedReadHalf>>,
    writer: Mutex<Option<OwnedWriteHalf>>,
}

impl TcpTransport {
    /// Create a transport for `host:port`
    ///
    /// No connection is made until [`TcpTransport::connect`] or the first write.
    pub fn new(host: &str, port: u16) -> PrintResult<Self> {
        Self::from_addr(&format!("{}:{}", host, port))
    }

    /// Create from a socket address string (e.g., "192.168.1.100:9100")
    pub fn from_addr(addr: &str) -> PrintResult<Self> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|_| PrintError::InvalidConfig(format!("Invalid address: {}", addr)))?;

        Ok(Self {
            addr,
            timeout: Duration::from_secs(5),
            reader: Mutex::new(None),
            writer: Mutex::new(None),
        })
    }

    /// Set connection timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the printer address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Dial the printer up front instead of on first write
    pub async fn connect(&self) -> PrintResult<()> {
        let mut writer = self.writer.lock().await;
        self.dial(&mut writer).await.map_err(|e| match e.kind() {
            io::ErrorKind::TimedOut => {
                PrintError::Timeout(format!("Connection timeout: {}", self.addr))
            }
            _ => PrintError::Connection(format!("{}: {}", self.addr, e)),
        })
    }

    /// Open a new stream and install both halves; the writer lock is held by the caller
    #[instrument(skip(self, writer), fields(addr = %self.addr))]
    async fn dial(&self, writer: &mut Option<OwnedWriteHalf>) -> io::Result<()> {
        info!("Connecting to printer");

        let stream = tokio::time::timeout(self.timeout, TcpStream::connect(self.addr))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??;
        stream.set_nodelay(true)?;

        let (read_half, write_half) = stream.into_split();
        *self.reader.lock().await = Some(read_half);
        *writer = Some(write_half);

        info!("Connected");
        Ok(())
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn read_bytes(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut guard = self.reader.lock().await;
        let Some(reader) = guard.as_mut() else {
            return Ok(0);
        };

        match reader.read(buf).await {
            Ok(0) => {
                *guard = None;
                Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "printer closed the connection",
                ))
            }
            Ok(n) => Ok(n),
            Err(e) => {
                *guard = None;
                Err(e)
            }
        }
    }

    async fn write_bytes(&self, data: &[u8]) -> io::Result<usize> {
        let mut guard = self.writer.lock().await;
        if guard.is_none() {
            self.dial(&mut guard).await?;
        }
        let Some(writer) = guard.as_mut() else {
            return Err(io::ErrorKind::NotConnected.into());
        };

        match writer.write(data).await {
            Ok(n) => Ok(n),
            Err(e) => {
                warn!(addr = %self.addr, error = %e, "Write failed, dropping connection");
                *guard = None;
                Err(e)
            }
        }
    }

    async fn flush(&self) -> io::Result<()> {
        match self.writer.lock().await.as_mut() {
            Some(writer) => writer.flush().await,
            None => Err(io::ErrorKind::NotConnected.into()),
        }
    }

    async fn close(&self) -> io::Result<()> {
        self.reader.lock().await.take();
        if let Some(mut writer) = self.writer.lock().await.take() {
            writer.shutdown().await?;
        }
        Ok(())
    }
}
