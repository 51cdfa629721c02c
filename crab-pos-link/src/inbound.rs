//! Inbound pipeline
//!
//! Reads whatever the device sent, feeds it byte by byte into frame assembly
//! and infers connection liveness from read activity.

use crate::assembler::FrameAssembler;
use crate::config::LinkConfig;
use crate::event::{EventHub, FaultStage};
use crate::link::StopFlag;
use crate::tracker::StatusTracker;
use crate::transport::Transport;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, trace};

pub(crate) struct InboundLoop {
    transport: Arc<dyn Transport>,
    config: LinkConfig,
    hub: EventHub,
    cancel: CancellationToken,
    assembler: FrameAssembler,
    tracker: StatusTracker,
    last_read: Instant,
    buf: Vec<u8>,
}

impl InboundLoop {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        config: LinkConfig,
        hub: EventHub,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transport,
            buf: vec![0u8; config.read_buffer_size],
            config,
            tracker: StatusTracker::new(hub.clone()),
            hub,
            cancel,
            assembler: FrameAssembler::new(),
            last_read: Instant::now(),
        }
    }

    /// Run until cancelled; no draining is needed on the read side
    pub(crate) async fn run(mut self, stopped: StopFlag) {
        let _stopped = stopped;
        info!("Inbound loop started");

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            self.tick().await;

            tokio::select! {
                _ = tokio::time::sleep(self.config.tick) => {}
                _ = self.cancel.cancelled() => {}
            }
        }

        info!("Inbound loop stopped");
    }

    pub(crate) async fn tick(&mut self) {
        let read = tokio::time::timeout(
            self.config.read_timeout,
            self.transport.read_bytes(&mut self.buf),
        )
        .await;

        let n = match read {
            Ok(Ok(n)) => n.min(self.buf.len()),
            Ok(Err(e)) => {
                self.hub.fault(FaultStage::Read, e);
                0
            }
            // Nothing arrived within the read timeout
            Err(_) => 0,
        };

        if n > 0 {
            trace!(bytes = n, "Read from printer");
            self.last_read = Instant::now();
            self.tracker.set_connected(true);

            for &byte in &self.buf[..n] {
                if let Some(frame) = self.assembler.push(byte) {
                    self.tracker.offer_frame(frame);
                }
            }
        } else if self.tracker.is_connected()
            && self.last_read.elapsed() > self.config.inactivity_timeout
        {
            self.tracker.set_connected(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::PrinterEvent;
    use crate::transport::MemoryTransport;
    use std::time::Duration;

    fn inbound(t: &MemoryTransport) -> (InboundLoop, EventHub) {
        let hub = EventHub::new(32);
        let inbound = InboundLoop::new(
            Arc::new(t.clone()),
            LinkConfig::default(),
            hub.clone(),
            CancellationToken::new(),
        );
        (inbound, hub)
    }

    #[tokio::test(start_paused = true)]
    async fn test_frame_split_across_reads() {
        let t = MemoryTransport::new();
        let (mut rx_loop, hub) = inbound(&t);

        t.inject(&[0x14, 0x00]);
        rx_loop.tick().await;
        assert!(hub.current().device.is_none());

        t.inject(&[0x0C, 0x00]);
        rx_loop.tick().await;

        let status = hub.current();
        assert!(status.is_connected);
        assert!(status.paper_out());
    }

    #[tokio::test(start_paused = true)]
    async fn test_several_frames_in_one_read() {
        let t = MemoryTransport::new();
        let (mut rx_loop, hub) = inbound(&t);
        let mut events = hub.subscribe();

        t.inject(&[0x14, 0, 0, 0, 0x14, 0, 0x0C, 0]);
        rx_loop.tick().await;

        // Connected, forced publish, first frame, changed frame
        let mut changes = 0;
        while let Ok(e) = events.try_recv() {
            if matches!(e, PrinterEvent::StatusChanged(_)) {
                changes += 1;
            }
        }
        assert_eq!(changes, 3);
        assert!(hub.current().paper_out());
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_error_swallowed() {
        let t = MemoryTransport::new();
        let (mut rx_loop, hub) = inbound(&t);
        let mut faults = hub.subscribe_faults();

        t.fail_next_reads(1);
        rx_loop.tick().await;
        assert_eq!(faults.try_recv().unwrap().stage, FaultStage::Read);

        t.inject(&[0x14, 0, 0, 0]);
        rx_loop.tick().await;
        assert!(hub.current().is_connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inactivity_marks_down() {
        let t = MemoryTransport::new();
        let (mut rx_loop, hub) = inbound(&t);

        t.inject(&[0x14, 0, 0, 0]);
        rx_loop.tick().await;
        assert!(hub.current().is_connected);

        tokio::time::advance(Duration::from_millis(2000)).await;
        rx_loop.tick().await;
        assert!(hub.current().is_connected);

        tokio::time::advance(Duration::from_millis(1)).await;
        rx_loop.tick().await;
        assert!(!hub.current().is_connected);
    }
}
