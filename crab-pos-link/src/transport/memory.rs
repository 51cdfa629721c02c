//! In-process loopback transport
//!
//! Clones share the same state, so a test can keep one handle while the link
//! owns another: inject device replies, break the medium on purpose, and
//! inspect exactly what the link wrote.

use super::Transport;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

#[derive(Debug, Default)]
struct MemoryState {
    /// Payload of every successful write call, in order
    writes: Vec<Vec<u8>>,
    flushes: usize,
    closes: usize,
    inbound: VecDeque<u8>,
    fail_writes: usize,
    fail_reads: usize,
    fail_flushes: usize,
    max_write: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes as if the device had sent them
    pub fn inject(&self, bytes: &[u8]) {
        self.state.lock().inbound.extend(bytes.iter().copied());
    }

    /// Fail the next `n` write calls with `BrokenPipe`
    pub fn fail_next_writes(&self, n: usize) {
        self.state.lock().fail_writes = n;
    }

    /// Fail the next `n` read calls with `ConnectionReset`
    pub fn fail_next_reads(&self, n: usize) {
        self.state.lock().fail_reads = n;
    }

    /// Fail the next `n` flush calls
    pub fn fail_next_flushes(&self, n: usize) {
        self.state.lock().fail_flushes = n;
    }

    /// Accept at most `limit` bytes per write call (short writes)
    pub fn limit_write_size(&self, limit: Option<usize>) {
        self.state.lock().max_write = limit;
    }

    /// All bytes written so far, concatenated
    pub fn written(&self) -> Vec<u8> {
        self.state.lock().writes.concat()
    }

    /// Payload of each successful write call
    pub fn write_calls(&self) -> Vec<Vec<u8>> {
        self.state.lock().writes.clone()
    }

    pub fn flush_count(&self) -> usize {
        self.state.lock().flushes
    }

    pub fn close_count(&self) -> usize {
        self.state.lock().closes
    }

    /// Forget recorded writes and flushes
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.writes.clear();
        state.flushes = 0;
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn read_bytes(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        if state.fail_reads > 0 {
            state.fail_reads -= 1;
            return Err(io::ErrorKind::ConnectionReset.into());
        }

        let n = buf.len().min(state.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(state.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    async fn write_bytes(&self, data: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        if state.fail_writes > 0 {
            state.fail_writes -= 1;
            return Err(io::ErrorKind::BrokenPipe.into());
        }

        let n = state.max_write.map_or(data.len(), |max| data.len().min(max));
        state.writes.push(data[..n].to_vec());
        Ok(n)
    }

    async fn flush(&self) -> io::Result<()> {
        let mut state = self.state.lock();
        if state.fail_flushes > 0 {
            state.fail_flushes -= 1;
            return Err(io::Error::other("flush failed"));
        }
        state.flushes += 1;
        Ok(())
    }

    async fn close(&self) -> io::Result<()> {
        self.state.lock().closes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_inject_and_read() {
        let t = MemoryTransport::new();
        t.inject(&[1, 2, 3, 4, 5]);

        let mut buf = [0u8; 3];
        assert_eq!(t.read_bytes(&mut buf).await.unwrap(), 3);
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(t.read_bytes(&mut buf).await.unwrap(), 2);
        assert_eq!(&buf[..2], &[4, 5]);
        assert_eq!(t.read_bytes(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_injected_write_failure() {
        let t = MemoryTransport::new();
        t.fail_next_writes(1);

        assert!(t.write_bytes(&[1]).await.is_err());
        assert_eq!(t.write_bytes(&[2]).await.unwrap(), 1);
        assert_eq!(t.written(), vec![2]);
    }

    #[tokio::test]
    async fn test_short_writes() {
        let t = MemoryTransport::new();
        t.limit_write_size(Some(2));

        assert_eq!(t.write_bytes(&[1, 2, 3]).await.unwrap(), 2);
        assert_eq!(t.write_calls(), vec![vec![1, 2]]);
    }

    #[tokio::test]
    async fn test_clear_forgets_history() {
        let t = MemoryTransport::new();
        t.write_bytes(&[1, 2]).await.unwrap();
        t.flush().await.unwrap();

        t.clear();
        assert!(t.written().is_empty());
        assert_eq!(t.flush_count(), 0);

        t.write_bytes(&[3]).await.unwrap();
        assert_eq!(t.write_calls(), vec![vec![3]]);
    }
}
