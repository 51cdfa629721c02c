//! Outbound pipeline
//!
//! Drains caller submissions to the transport one tick at a time:
//! at most one submission is taken per tick, written in chunks of at most
//! `max_chunk_size`, and flushed either as soon as `flush_threshold` bytes
//! have gone out or once at the end of the tick. When nothing was submitted
//! for `idle_poll_interval`, a paper status request is written instead so the
//! device keeps reporting.

use crate::command::PAPER_STATUS_POLL;
use crate::config::LinkConfig;
use crate::event::{EventHub, FaultStage};
use crate::link::StopFlag;
use crate::transport::Transport;
use std::io;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

pub(crate) struct OutboundLoop {
    transport: Arc<dyn Transport>,
    queue: mpsc::UnboundedReceiver<Vec<u8>>,
    config: LinkConfig,
    hub: EventHub,
    cancel: CancellationToken,
    /// Accumulated bytes not yet accepted by the transport
    pending: Vec<u8>,
    idle_since: Instant,
    since_flush: usize,
}

impl OutboundLoop {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        queue: mpsc::UnboundedReceiver<Vec<u8>>,
        config: LinkConfig,
        hub: EventHub,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transport,
            queue,
            config,
            hub,
            cancel,
            pending: Vec::new(),
            idle_since: Instant::now(),
            since_flush: 0,
        }
    }

    /// Run until cancelled with an empty queue
    pub(crate) async fn run(mut self, stopped: StopFlag) {
        let _stopped = stopped;
        info!("Outbound loop started");

        loop {
            if self.cancel.is_cancelled() && self.queue.is_empty() {
                break;
            }

            self.tick().await;

            tokio::select! {
                _ = tokio::time::sleep(self.config.tick) => {}
                _ = self.cancel.cancelled() => {}
            }
        }

        if !self.pending.is_empty() {
            warn!(
                bytes = self.pending.len(),
                "Outbound loop stopping with unwritten bytes"
            );
        }

        // Final flush happens here, never concurrently with a write
        self.flush().await;
        info!("Outbound loop stopped");
    }

    /// One iteration: take work, write it, flush
    pub(crate) async fn tick(&mut self) {
        match self.queue.try_recv() {
            Ok(frame) => {
                trace!(bytes = frame.len(), "Dequeued submission");
                self.pending.extend_from_slice(&frame);
                self.idle_since = Instant::now();
            }
            Err(_) if self.idle_since.elapsed() > self.config.idle_poll_interval => {
                trace!("Idle, polling printer status");
                self.pending.extend_from_slice(&PAPER_STATUS_POLL);
                self.idle_since = Instant::now();
            }
            Err(_) => {}
        }

        self.write_pending().await;

        if self.since_flush > 0 {
            self.flush().await;
        }
    }

    async fn write_pending(&mut self) {
        while !self.pending.is_empty() {
            let end = self.pending.len().min(self.config.max_chunk_size);

            let written = match self.transport.write_bytes(&self.pending[..end]).await {
                Ok(0) => {
                    self.hub
                        .fault(FaultStage::Write, io::Error::from(io::ErrorKind::WriteZero));
                    return;
                }
                Ok(n) => n.min(end),
                Err(e) => {
                    // Unwritten bytes stay buffered for the next tick
                    self.hub.fault(FaultStage::Write, e);
                    return;
                }
            };

            self.pending.drain(..written);
            self.since_flush += written;
            debug!(bytes = written, remaining = self.pending.len(), "Wrote chunk");

            if self.since_flush >= self.config.flush_threshold {
                self.flush().await;
            }
        }
    }

    async fn flush(&mut self) {
        if let Err(e) = self.transport.flush().await {
            self.hub.fault(FaultStage::Flush, e);
        }
        self.since_flush = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;
    use std::time::Duration;

    fn outbound(
        transport: &MemoryTransport,
        config: LinkConfig,
    ) -> (OutboundLoop, mpsc::UnboundedSender<Vec<u8>>, EventHub) {
        let (tx, rx) = mpsc::unbounded_channel();
        let hub = EventHub::new(16);
        let out = OutboundLoop::new(
            Arc::new(transport.clone()),
            rx,
            config,
            hub.clone(),
            CancellationToken::new(),
        );
        (out, tx, hub)
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_submission_per_tick() {
        let t = MemoryTransport::new();
        let (mut out, tx, _) = outbound(&t, LinkConfig::default());

        tx.send(vec![1, 2]).unwrap();
        tx.send(vec![3, 4]).unwrap();

        out.tick().await;
        assert_eq!(t.written(), vec![1, 2]);
        out.tick().await;
        assert_eq!(t.written(), vec![1, 2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunking() {
        let t = MemoryTransport::new();
        let config = LinkConfig {
            max_chunk_size: 4,
            ..Default::default()
        };
        let (mut out, tx, _) = outbound(&t, config);

        let data: Vec<u8> = (0..10).collect();
        tx.send(data.clone()).unwrap();
        out.tick().await;

        let calls = t.write_calls();
        assert_eq!(calls.len(), 3);
        assert!(calls.iter().all(|c| c.len() <= 4));
        assert_eq!(t.written(), data);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_threshold_forces_flush() {
        let t = MemoryTransport::new();
        let config = LinkConfig {
            max_chunk_size: 100,
            flush_threshold: 200,
            ..Default::default()
        };
        let (mut out, tx, _) = outbound(&t, config);

        tx.send(vec![0u8; 450]).unwrap();
        out.tick().await;

        // Forced after 200 and 400 bytes, then the end-of-tick flush for the last 50
        assert_eq!(t.flush_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_small_write_flushed_once() {
        let t = MemoryTransport::new();
        let (mut out, tx, _) = outbound(&t, LinkConfig::default());

        tx.send(vec![0x1B, 0x40]).unwrap();
        out.tick().await;
        assert_eq!(t.flush_count(), 1);

        // Nothing written, nothing to flush
        out.tick().await;
        assert_eq!(t.flush_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_poll_injected() {
        let t = MemoryTransport::new();
        let (mut out, _tx, _) = outbound(&t, LinkConfig::default());

        out.tick().await;
        assert!(t.written().is_empty());

        // Exactly the interval is not enough; the poll lands on the next tick
        tokio::time::advance(Duration::from_millis(400)).await;
        out.tick().await;
        assert!(t.written().is_empty());

        tokio::time::advance(Duration::from_millis(100)).await;
        out.tick().await;
        assert_eq!(t.written(), PAPER_STATUS_POLL.to_vec());
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_failure_keeps_bytes() {
        let t = MemoryTransport::new();
        let (mut out, tx, hub) = outbound(&t, LinkConfig::default());
        let mut faults = hub.subscribe_faults();

        t.fail_next_writes(1);
        tx.send(vec![7, 8, 9]).unwrap();

        out.tick().await;
        assert!(t.written().is_empty());
        assert_eq!(faults.try_recv().unwrap().stage, FaultStage::Write);

        out.tick().await;
        assert_eq!(t.written(), vec![7, 8, 9]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_writes_accounted() {
        let t = MemoryTransport::new();
        t.limit_write_size(Some(3));
        let (mut out, tx, _) = outbound(&t, LinkConfig::default());

        let data: Vec<u8> = (0..8).collect();
        tx.send(data.clone()).unwrap();
        out.tick().await;

        assert_eq!(t.write_calls().len(), 3);
        assert_eq!(t.written(), data);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_failure_not_fatal() {
        let t = MemoryTransport::new();
        let (mut out, tx, hub) = outbound(&t, LinkConfig::default());
        let mut faults = hub.subscribe_faults();

        t.fail_next_flushes(1);
        tx.send(vec![1]).unwrap();
        tx.send(vec![2]).unwrap();

        out.tick().await;
        assert_eq!(faults.try_recv().unwrap().stage, FaultStage::Flush);

        out.tick().await;
        assert_eq!(t.written(), vec![1, 2]);
        assert_eq!(t.flush_count(), 1);
    }
}
