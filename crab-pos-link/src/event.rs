//! Link events and fault reporting
//!
//! ```text
//! inbound loop ──▶ EventHub ──┬─▶ watch<StatusSnapshot>      (latest status)
//!                             ├─▶ broadcast<PrinterEvent>    (subscribers)
//! both loops ──────────────── └─▶ broadcast<LinkFault>       (diagnostics)
//! ```
//!
//! Sending never blocks: broadcast drops the oldest events for lagging
//! receivers and publishing with zero subscribers is fine.

use crate::status::StatusSnapshot;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

/// Caller-visible printer event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrinterEvent {
    /// Bytes arrived after the link was marked down (or never up)
    Connected,
    /// No bytes arrived for longer than the inactivity timeout
    Disconnected,
    /// A new status snapshot was published
    StatusChanged(StatusSnapshot),
}

/// Where a swallowed failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultStage {
    Read,
    Write,
    Flush,
    Cancel,
}

impl fmt::Display for FaultStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultStage::Read => write!(f, "read"),
            FaultStage::Write => write!(f, "write"),
            FaultStage::Flush => write!(f, "flush"),
            FaultStage::Cancel => write!(f, "cancel"),
        }
    }
}

/// A non-fatal failure inside a background loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkFault {
    pub stage: FaultStage,
    pub error: String,
}

/// Fan-out point for status, events and faults
#[derive(Debug, Clone)]
pub(crate) struct EventHub {
    status: Arc<watch::Sender<StatusSnapshot>>,
    events: broadcast::Sender<PrinterEvent>,
    faults: broadcast::Sender<LinkFault>,
}

impl EventHub {
    pub(crate) fn new(capacity: usize) -> Self {
        let (status, _) = watch::channel(StatusSnapshot::default());
        let (events, _) = broadcast::channel(capacity);
        let (faults, _) = broadcast::channel(capacity);
        Self {
            status: Arc::new(status),
            events,
            faults,
        }
    }

    /// Replace the current snapshot and notify subscribers
    pub(crate) fn publish_status(&self, snapshot: StatusSnapshot) {
        self.status.send_replace(snapshot);
        let _ = self.events.send(PrinterEvent::StatusChanged(snapshot));
    }

    pub(crate) fn emit(&self, event: PrinterEvent) {
        // No receivers is not an error for us
        let _ = self.events.send(event);
    }

    pub(crate) fn fault(&self, stage: FaultStage, error: impl fmt::Display) {
        let error = error.to_string();
        tracing::warn!(stage = %stage, error = %error, "Printer link fault");
        let _ = self.faults.send(LinkFault { stage, error });
    }

    pub(crate) fn current(&self) -> StatusSnapshot {
        *self.status.borrow()
    }

    pub(crate) fn watch(&self) -> watch::Receiver<StatusSnapshot> {
        self.status.subscribe()
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<PrinterEvent> {
        self.events.subscribe()
    }

    pub(crate) fn subscribe_faults(&self) -> broadcast::Receiver<LinkFault> {
        self.faults.subscribe()
    }
}
