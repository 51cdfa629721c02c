//! Byte transports the link runs over
//!
//! The link only needs three primitives from a medium: read, write and flush.
//! Reads are issued only by the inbound loop and writes/flushes only by the
//! outbound loop, so an adapter never sees two reads or two writes at once.
//!
//! - [`TcpTransport`] - raw TCP (port 9100), reconnects on its own
//! - [`FileTransport`] - write-only sink such as a device node or spool file
//! - [`MemoryTransport`] - in-process loopback for tests and simulation

mod file;
mod memory;
mod tcp;

pub use file::FileTransport;
pub use memory::MemoryTransport;
pub use tcp::TcpTransport;

use async_trait::async_trait;
use std::io;

/// Byte-level medium between the link and the device
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Read whatever is available into `buf`
    ///
    /// Returns 0 when nothing is available. May wait briefly; the inbound loop
    /// bounds every call with its read timeout.
    async fn read_bytes(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write a prefix of `data`, returning how many bytes the medium accepted
    ///
    /// An error means none of the bytes of this call are known to have been
    /// accepted.
    async fn write_bytes(&self, data: &[u8]) -> io::Result<usize>;

    /// Push buffered output to the device (best effort)
    async fn flush(&self) -> io::Result<()>;

    /// Release the medium; called once when the link shuts down
    async fn close(&self) -> io::Result<()> {
        Ok(())
    }
}
